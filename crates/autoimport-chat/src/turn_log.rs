//! Ordered transcript of one conversation.

use autoimport_core::{HistoryEntry, Role, Turn};
use chrono::Utc;

use crate::degradation::Disposition;

/// A turn before the log assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub role: Role,
    pub content: String,
    pub is_error: bool,
    pub retryable: bool,
}

impl NewTurn {
    /// A regular turn: typed by a human or replied by the backend.
    pub fn message(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_error: false,
            retryable: false,
        }
    }

    /// A reply synthesized from a failed exchange.
    pub fn failure(role: Role, disposition: &Disposition) -> Self {
        Self {
            role,
            content: disposition.text.clone(),
            is_error: disposition.is_error && !role.is_human(),
            retryable: disposition.offer_retry && !role.is_human(),
        }
    }
}

/// What `take_retry_target` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryTarget {
    /// Id of the error turn that was removed.
    pub removed_turn_id: u64,
    /// Content of the human turn to resubmit, unchanged.
    pub content: String,
    /// History preceding that human turn.
    pub history: Vec<HistoryEntry>,
}

/// Append-only list of turns, except for the single-turn retry removal.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
    next_id: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return it with its id and timestamp assigned.
    pub fn append(&mut self, turn: NewTurn) -> Turn {
        let turn = Turn {
            id: self.next_id,
            role: turn.role,
            content: turn.content,
            timestamp: Utc::now(),
            is_error: turn.is_error,
            retryable: turn.retryable,
        };
        self.next_id += 1;
        self.turns.push(turn.clone());
        turn
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of user/manager turns in the log.
    pub fn human_turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role.is_human()).count()
    }

    /// History sent with an exchange: every turn before `index`.
    pub fn history_before(&self, index: usize) -> Vec<HistoryEntry> {
        self.turns[..index.min(self.turns.len())]
            .iter()
            .map(Turn::to_history_entry)
            .collect()
    }

    /// Every turn, in order, as history entries.
    pub fn full_history(&self) -> Vec<HistoryEntry> {
        self.turns.iter().map(Turn::to_history_entry).collect()
    }

    /// Remove the last turn if it is a retryable error reply and return the
    /// human turn to resubmit.
    ///
    /// Leaves the log untouched and returns `None` when the last turn is not
    /// a retryable error or no human turn precedes it. Never removes more
    /// than one turn.
    pub fn take_retry_target(&mut self) -> Option<RetryTarget> {
        let last = self.turns.last()?;
        if !last.is_retryable_error() {
            return None;
        }
        let error_index = self.turns.len() - 1;
        let human_index = self.turns[..error_index]
            .iter()
            .rposition(|t| t.role.is_human())?;

        let content = self.turns[human_index].content.clone();
        let history = self.history_before(human_index);
        let removed = self.turns.pop()?;
        Some(RetryTarget {
            removed_turn_id: removed.id,
            content,
            history,
        })
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.next_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retryable_error(text: &str) -> NewTurn {
        NewTurn {
            role: Role::Assistant,
            content: text.to_string(),
            is_error: true,
            retryable: true,
        }
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let mut log = ConversationLog::new();
        let a = log.append(NewTurn::message(Role::User, "Привет"));
        let b = log.append(NewTurn::message(Role::Assistant, "Здравствуйте!"));
        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert!(a.timestamp <= b.timestamp);
        assert_eq!(log.len(), 2);
        assert_eq!(log.turns()[1].content, "Здравствуйте!");
    }

    #[test]
    fn test_ids_stay_unique_after_retry_removal() {
        let mut log = ConversationLog::new();
        log.append(NewTurn::message(Role::User, "Привет"));
        log.append(retryable_error("timeout"));
        log.take_retry_target().unwrap();
        let next = log.append(NewTurn::message(Role::Assistant, "Здравствуйте!"));
        assert_eq!(next.id, 2);
    }

    #[test]
    fn test_failure_turn_never_flags_human_roles() {
        let disposition = Disposition {
            text: "x".to_string(),
            is_error: true,
            offer_retry: true,
            degraded: false,
        };
        let turn = NewTurn::failure(Role::Manager, &disposition);
        assert!(!turn.is_error);
        assert!(!turn.retryable);

        let turn = NewTurn::failure(Role::Client, &disposition);
        assert!(turn.is_error);
        assert!(turn.retryable);
    }

    #[test]
    fn test_human_turn_count() {
        let mut log = ConversationLog::new();
        log.append(NewTurn::message(Role::Manager, "Добрый день"));
        log.append(NewTurn::message(Role::Client, "Ну?"));
        log.append(NewTurn::message(Role::Manager, "Есть Camry"));
        assert_eq!(log.human_turn_count(), 2);
    }

    #[test]
    fn test_history_before_keeps_error_turns() {
        let mut log = ConversationLog::new();
        log.append(NewTurn::message(Role::User, "Привет"));
        log.append(retryable_error("timeout"));
        log.append(NewTurn::message(Role::User, "Алло?"));
        let history = log.history_before(2);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "Привет");
        assert_eq!(history[1].content, "timeout");
        assert_eq!(log.history_before(100).len(), 3);
        assert_eq!(log.full_history().len(), 3);
    }

    #[test]
    fn test_retry_on_empty_log_is_noop() {
        let mut log = ConversationLog::new();
        assert_eq!(log.take_retry_target(), None);
    }

    #[test]
    fn test_retry_when_last_is_not_retryable_is_noop() {
        let mut log = ConversationLog::new();
        log.append(NewTurn::message(Role::User, "Привет"));
        log.append(NewTurn {
            role: Role::Assistant,
            content: "HTTP 500".to_string(),
            is_error: true,
            retryable: false,
        });
        assert_eq!(log.take_retry_target(), None);
        assert_eq!(log.len(), 2);

        log.append(NewTurn::message(Role::User, "Ещё раз"));
        assert_eq!(log.take_retry_target(), None);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_retry_without_preceding_human_turn_is_noop() {
        let mut log = ConversationLog::new();
        log.append(retryable_error("timeout"));
        assert_eq!(log.take_retry_target(), None);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_retry_removes_exactly_one_turn() {
        let mut log = ConversationLog::new();
        log.append(NewTurn::message(Role::User, "Привет"));
        log.append(NewTurn::message(Role::Assistant, "Здравствуйте!"));
        log.append(NewTurn::message(Role::User, "Hyundai Tucson, budget 2.5 million"));
        let error = log.append(retryable_error("timeout"));

        let target = log.take_retry_target().unwrap();
        assert_eq!(target.removed_turn_id, error.id);
        assert_eq!(target.content, "Hyundai Tucson, budget 2.5 million");
        assert_eq!(target.history.len(), 2);
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().role, Role::User);
    }

    #[test]
    fn test_clear() {
        let mut log = ConversationLog::new();
        log.append(NewTurn::message(Role::User, "Привет"));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.append(NewTurn::message(Role::User, "Снова")).id, 0);
    }
}
