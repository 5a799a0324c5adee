//! A single conversation: log, session identity, failure counter and the
//! exchange sequence that ties them together.
//!
//! One exchange runs at a time. A second `send_turn` or `retry_last_turn`
//! while one is in flight returns [`SendOutcome::Ignored`]. Changes are
//! published on a broadcast channel; the engine never calls into UI code.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use autoimport_core::{
    AutoImportConfig, Channel, ConversationEvent, ConversationId, HistoryEntry, Turn,
};
use chrono::Utc;
use tokio::sync::broadcast;

use crate::degradation::DegradationPolicy;
use crate::error::ChatError;
use crate::lifecycle::{ExchangeOutcome, FailureStats, RequestController};
use crate::turn_log::{ConversationLog, NewTurn};
use crate::script;
use crate::session::SessionIdentity;
use crate::transport::{ExchangeBackend, ExchangeRequest};

const EVENT_CAPACITY: usize = 256;

// =============================================================================
// Settings
// =============================================================================

/// Per-conversation tunables, usually derived from [`AutoImportConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSettings {
    pub request_timeout: Duration,
    pub failure_threshold: u32,
    /// Maximum message length in characters, after trimming.
    pub max_message_length: usize,
}

impl ConversationSettings {
    pub fn customer(config: &AutoImportConfig) -> Self {
        Self {
            request_timeout: config.backend.request_timeout(),
            failure_threshold: config.chat.failure_threshold,
            max_message_length: config.chat.max_message_length,
        }
    }

    pub fn training(config: &AutoImportConfig) -> Self {
        Self {
            request_timeout: config.backend.request_timeout(),
            failure_threshold: config.simulator.failure_threshold,
            max_message_length: config.simulator.max_message_length,
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self::customer(&AutoImportConfig::default())
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// What a `send_turn` or `retry_last_turn` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The backend replied; carries the appended reply turn.
    Replied(Turn),
    /// The exchange failed; carries the synthesized reply turn, which is
    /// either an error or a scripted line.
    Failed(Turn),
    /// Nothing happened: busy, nothing to retry, or the session does not
    /// accept turns right now.
    Ignored,
    /// The conversation was restarted while the exchange was in flight; its
    /// result was dropped.
    Superseded,
}

impl SendOutcome {
    pub fn turn(&self) -> Option<&Turn> {
        match self {
            SendOutcome::Replied(turn) | SendOutcome::Failed(turn) => Some(turn),
            SendOutcome::Ignored | SendOutcome::Superseded => None,
        }
    }
}

// =============================================================================
// Conversation
// =============================================================================

struct ConversationState {
    id: ConversationId,
    log: ConversationLog,
    session: SessionIdentity,
    /// Bumped on every restart; exchanges started under an older epoch are
    /// discarded when they settle.
    epoch: u64,
    /// Simulator preset sent with each exchange.
    scope: Option<String>,
}

/// Conversation engine for one channel.
pub struct Conversation {
    channel: Channel,
    backend: Arc<dyn ExchangeBackend>,
    controller: RequestController,
    policy: DegradationPolicy,
    max_message_length: usize,
    state: Mutex<ConversationState>,
    busy: AtomicBool,
    events: broadcast::Sender<ConversationEvent>,
}

impl Conversation {
    pub fn new(
        channel: Channel,
        backend: Arc<dyn ExchangeBackend>,
        settings: ConversationSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            channel,
            backend,
            controller: RequestController::new(settings.request_timeout),
            policy: DegradationPolicy::new(
                settings.failure_threshold,
                script::for_channel(channel),
            ),
            max_message_length: settings.max_message_length,
            state: Mutex::new(ConversationState {
                id: ConversationId::new(),
                log: ConversationLog::new(),
                session: SessionIdentity::new(),
                epoch: 0,
                scope: None,
            }),
            busy: AtomicBool::new(false),
            events,
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    /// Discard the log, session identifier and failure counter and start over.
    /// An exchange still in flight is aborted and its result dropped.
    pub fn start(&self) -> Result<ConversationId, ChatError> {
        let scope = self.lock_state()?.scope.clone();
        self.restart(scope)
    }

    pub(crate) fn restart(&self, scope: Option<String>) -> Result<ConversationId, ChatError> {
        self.controller.abort_in_flight();
        let mut state = self.lock_state()?;
        state.epoch += 1;
        state.id = ConversationId::new();
        state.log.clear();
        state.session.clear();
        state.scope = scope;
        self.controller.reset();

        tracing::info!(
            channel = %self.channel,
            conversation_id = %state.id,
            preset = ?state.scope,
            "Conversation started"
        );
        self.emit(ConversationEvent::ConversationReset {
            channel: self.channel,
            conversation_id: state.id,
            timestamp: Utc::now(),
        });
        Ok(state.id)
    }

    /// Append a human turn and exchange it with the backend.
    ///
    /// `text` is trimmed first. Empty or over-long input is refused with an
    /// error and leaves the log untouched.
    pub async fn send_turn(&self, text: &str) -> Result<SendOutcome, ChatError> {
        let content = self.validate(text)?;
        let Some(_busy) = self.begin() else {
            tracing::debug!(channel = %self.channel, "Exchange in flight, send ignored");
            return Ok(SendOutcome::Ignored);
        };

        let (request, epoch) = {
            let mut state = self.lock_state()?;
            let history = state.log.history_before(state.log.len());
            let turn = state
                .log
                .append(NewTurn::message(self.channel.human_role(), content.clone()));
            self.emit(ConversationEvent::TurnAppended {
                channel: self.channel,
                turn,
                timestamp: Utc::now(),
            });
            let request = ExchangeRequest {
                message: content,
                history,
                session_id: state.session.get().map(str::to_string),
                preset: state.scope.clone(),
            };
            (request, state.epoch)
        };

        self.settle(request, epoch).await
    }

    /// Remove a trailing retryable error turn and resubmit the human turn
    /// before it. A no-op when there is nothing to retry.
    pub async fn retry_last_turn(&self) -> Result<SendOutcome, ChatError> {
        let Some(_busy) = self.begin() else {
            return Ok(SendOutcome::Ignored);
        };

        let (request, epoch) = {
            let mut state = self.lock_state()?;
            let Some(target) = state.log.take_retry_target() else {
                tracing::debug!(channel = %self.channel, "Nothing to retry");
                return Ok(SendOutcome::Ignored);
            };
            self.emit(ConversationEvent::TurnRemoved {
                channel: self.channel,
                turn_id: target.removed_turn_id,
                timestamp: Utc::now(),
            });
            let request = ExchangeRequest {
                message: target.content,
                history: target.history,
                session_id: state.session.get().map(str::to_string),
                preset: state.scope.clone(),
            };
            (request, state.epoch)
        };

        tracing::info!(channel = %self.channel, "Retrying last turn");
        self.settle(request, epoch).await
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn id(&self) -> Result<ConversationId, ChatError> {
        Ok(self.lock_state()?.id)
    }

    pub fn turns(&self) -> Result<Vec<Turn>, ChatError> {
        Ok(self.lock_state()?.log.turns().to_vec())
    }

    pub fn session_id(&self) -> Result<Option<String>, ChatError> {
        Ok(self.lock_state()?.session.get().map(str::to_string))
    }

    /// Whether the last turn offers a retry.
    pub fn can_retry(&self) -> Result<bool, ChatError> {
        Ok(self
            .lock_state()?
            .log
            .last()
            .is_some_and(Turn::is_retryable_error))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn failure_stats(&self) -> FailureStats {
        self.controller.failure_stats()
    }

    /// Whether the next failure would be answered from the fallback script.
    pub fn is_degraded(&self) -> bool {
        self.policy
            .is_degraded(self.controller.consecutive_failures().saturating_add(1))
    }

    // =========================================================================
    // Crate-internal hooks for the training session
    // =========================================================================

    pub(crate) fn controller(&self) -> &RequestController {
        &self.controller
    }

    pub(crate) fn epoch(&self) -> Result<u64, ChatError> {
        Ok(self.lock_state()?.epoch)
    }

    /// `(epoch, turn count, full history)` taken under one lock.
    pub(crate) fn transcript_snapshot(&self) -> Result<(u64, usize, Vec<HistoryEntry>), ChatError> {
        let state = self.lock_state()?;
        Ok((state.epoch, state.log.len(), state.log.full_history()))
    }

    pub(crate) fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Mark the conversation busy, or `None` if it already is.
    pub(crate) fn begin(&self) -> Option<BusyGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        self.emit(ConversationEvent::BusyChanged {
            channel: self.channel,
            busy: true,
            timestamp: Utc::now(),
        });
        Some(BusyGuard { conversation: self })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn validate(&self, text: &str) -> Result<String, ChatError> {
        let content = text.trim();
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if content.chars().count() > self.max_message_length {
            return Err(ChatError::MessageTooLong(self.max_message_length));
        }
        Ok(content.to_string())
    }

    /// Run the exchange and append exactly one reply turn, unless the
    /// conversation was restarted in the meantime.
    async fn settle(&self, request: ExchangeRequest, epoch: u64) -> Result<SendOutcome, ChatError> {
        let outcome = self
            .controller
            .exchange(self.backend.as_ref(), request)
            .await;

        let mut state = self.lock_state()?;
        if state.epoch != epoch || matches!(outcome, ExchangeOutcome::Aborted) {
            tracing::debug!(channel = %self.channel, "Dropping result of superseded exchange");
            return Ok(SendOutcome::Superseded);
        }

        let reply_role = self.channel.reply_role();
        match outcome {
            ExchangeOutcome::Replied(reply) => {
                if let Some(session_id) = reply.session_id {
                    if state.session.set(session_id.clone()) {
                        tracing::debug!(channel = %self.channel, session_id = %session_id, "Session assigned");
                        self.emit(ConversationEvent::SessionAssigned {
                            channel: self.channel,
                            session_id,
                            timestamp: Utc::now(),
                        });
                    }
                }
                if let Some(status) = reply.lead_status {
                    self.emit(ConversationEvent::LeadStatusChanged {
                        status,
                        timestamp: Utc::now(),
                    });
                }
                let turn = state.log.append(NewTurn::message(reply_role, reply.text));
                self.emit(ConversationEvent::TurnAppended {
                    channel: self.channel,
                    turn: turn.clone(),
                    timestamp: Utc::now(),
                });
                Ok(SendOutcome::Replied(turn))
            }
            ExchangeOutcome::Failed {
                failure,
                consecutive_failures,
            } => {
                let disposition = self.policy.classify(
                    &failure,
                    consecutive_failures,
                    state.log.human_turn_count(),
                );
                if disposition.degraded {
                    tracing::warn!(
                        channel = %self.channel,
                        consecutive_failures,
                        "Backend unavailable, answering from fallback script"
                    );
                    self.emit(ConversationEvent::Degraded {
                        channel: self.channel,
                        consecutive_failures,
                        timestamp: Utc::now(),
                    });
                }
                let turn = state.log.append(NewTurn::failure(reply_role, &disposition));
                self.emit(ConversationEvent::TurnAppended {
                    channel: self.channel,
                    turn: turn.clone(),
                    timestamp: Utc::now(),
                });
                Ok(SendOutcome::Failed(turn))
            }
            ExchangeOutcome::Aborted => Ok(SendOutcome::Superseded),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ConversationState>, ChatError> {
        self.state
            .lock()
            .map_err(|e| ChatError::StatePoisoned(format!("conversation lock poisoned: {}", e)))
    }
}

/// Clears the busy flag when the exchange that set it ends, however it ends.
pub(crate) struct BusyGuard<'a> {
    conversation: &'a Conversation,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.conversation.busy.store(false, Ordering::Release);
        self.conversation.emit(ConversationEvent::BusyChanged {
            channel: self.conversation.channel,
            busy: false,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::degradation::{NETWORK_TEXT, TIMEOUT_TEXT};
    use crate::script::{CUSTOMER_SCRIPT, TRAINING_SCRIPT};
    use crate::test_support::{ScriptedBackend, Step};
    use crate::transport::{FailureKind, Reply};
    use autoimport_core::Role;

    fn conversation(steps: Vec<Step<Reply>>) -> (Arc<ScriptedBackend>, Conversation) {
        let backend = Arc::new(ScriptedBackend::new(steps));
        let conversation = Conversation::new(
            Channel::Customer,
            backend.clone(),
            ConversationSettings::default(),
        );
        (backend, conversation)
    }

    fn service_error(text: &str) -> Step<Reply> {
        Step::fail(FailureKind::ServiceError(text.to_string()))
    }

    // =========================================================================
    // Exchanges
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_success_appends_user_then_assistant() {
        let (_, conv) = conversation(vec![Step::reply_with_session("Какой бюджет?", "a1b2")]);

        let outcome = conv.send_turn("  Hyundai Tucson  ").await.unwrap();
        let turns = conv.turns().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "Hyundai Tucson");
        assert!(!turns[0].is_error);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "Какой бюджет?");
        assert!(!turns[1].is_error);
        assert!(turns[0].id < turns[1].id);
        assert_eq!(outcome, SendOutcome::Replied(turns[1].clone()));
        assert_eq!(conv.session_id().unwrap().as_deref(), Some("a1b2"));
        assert!(!conv.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_without_session_id_keeps_session_absent() {
        let (_, conv) = conversation(vec![Step::reply("Какой бюджет?")]);
        conv.send_turn("Hyundai Tucson, budget 2.5 million").await.unwrap();
        assert_eq!(conv.session_id().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_id_is_forwarded_and_rotated() {
        let (backend, conv) = conversation(vec![
            Step::reply_with_session("Здравствуйте!", "s-1"),
            Step::reply("Какой бюджет?"),
            Step::reply_with_session("Записал", "s-2"),
        ]);
        conv.send_turn("Привет").await.unwrap();
        conv.send_turn("Toyota RAV4").await.unwrap();
        assert_eq!(conv.session_id().unwrap().as_deref(), Some("s-1"));
        conv.send_turn("2 млн").await.unwrap();
        assert_eq!(conv.session_id().unwrap().as_deref(), Some("s-2"));

        let requests = backend.requests();
        assert_eq!(requests[0].session_id, None);
        assert_eq!(requests[1].session_id.as_deref(), Some("s-1"));
        assert_eq!(requests[2].session_id.as_deref(), Some("s-1"));
        assert_eq!(requests[2].history.len(), 4);
        assert_eq!(requests[2].history[3].content, "Какой бюджет?");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_input_is_refused() {
        let (backend, conv) = conversation(vec![]);
        assert!(matches!(conv.send_turn("   ").await, Err(ChatError::EmptyMessage)));

        let long = "а".repeat(2001);
        assert!(matches!(
            conv.send_turn(&long).await,
            Err(ChatError::MessageTooLong(2000))
        ));
        assert!(conv.turns().unwrap().is_empty());
        assert!(backend.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_send_is_ignored() {
        let (backend, conv) = conversation(vec![Step::delayed_reply(
            Duration::from_secs(2),
            "Какой бюджет?",
        )]);
        let conv = Arc::new(conv);

        let first = {
            let conv = conv.clone();
            tokio::spawn(async move { conv.send_turn("Привет").await })
        };
        backend.wait_for_requests(1).await;
        assert!(conv.is_busy());
        assert_eq!(conv.send_turn("Алло?").await.unwrap(), SendOutcome::Ignored);
        assert_eq!(conv.retry_last_turn().await.unwrap(), SendOutcome::Ignored);

        assert!(matches!(first.await.unwrap().unwrap(), SendOutcome::Replied(_)));
        assert_eq!(conv.turns().unwrap().len(), 2);
        assert_eq!(backend.requests().len(), 1);
    }

    // =========================================================================
    // Failures and degradation
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_timeout_turn_offers_retry() {
        let (_, conv) = conversation(vec![Step::Hang]);
        let outcome = conv.send_turn("Привет").await.unwrap();
        let turn = outcome.turn().unwrap();
        assert_eq!(turn.content, TIMEOUT_TEXT);
        assert!(turn.is_error);
        assert!(turn.retryable);
        assert!(conv.can_retry().unwrap());
        assert_eq!(conv.failure_stats().consecutive_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_error_shown_verbatim_without_retry() {
        let (_, conv) = conversation(vec![service_error("Сервис временно перегружен")]);
        let outcome = conv.send_turn("Привет").await.unwrap();
        let turn = outcome.turn().unwrap();
        assert_eq!(turn.content, "Сервис временно перегружен");
        assert!(turn.is_error);
        assert!(!conv.can_retry().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_timeouts_with_retries_degrade_to_first_script_line() {
        let (_, conv) = conversation(vec![Step::Hang, Step::Hang, Step::Hang]);

        conv.send_turn("Hyundai Tucson, budget 2.5 million").await.unwrap();
        conv.retry_last_turn().await.unwrap();
        let outcome = conv.retry_last_turn().await.unwrap();

        let turns = conv.turns().unwrap();
        assert_eq!(turns.len(), 2);
        let last = &turns[1];
        assert_eq!(last.content, CUSTOMER_SCRIPT[0]);
        assert!(last.content.starts_with("Отличный выбор!"));
        assert!(!last.is_error);
        assert!(!last.retryable);
        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert!(!conv.can_retry().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_failure_uses_script_line_for_turn_count() {
        let (_, conv) = conversation(vec![
            service_error("boom"),
            service_error("boom"),
            service_error("boom"),
            service_error("boom"),
        ]);
        conv.send_turn("1").await.unwrap();
        conv.send_turn("2").await.unwrap();
        let third = conv.send_turn("3").await.unwrap();
        assert_eq!(third.turn().unwrap().content, CUSTOMER_SCRIPT[2]);
        assert!(!third.turn().unwrap().is_error);

        let fourth = conv.send_turn("4").await.unwrap();
        assert_eq!(fourth.turn().unwrap().content, CUSTOMER_SCRIPT[3]);
        assert!(conv.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_saturates_at_last_line() {
        let steps = (0..8).map(|_| service_error("boom")).collect();
        let (_, conv) = conversation(steps);
        let mut last = None;
        for i in 0..8 {
            last = Some(conv.send_turn(&format!("msg {i}")).await.unwrap());
        }
        assert_eq!(
            last.unwrap().turn().unwrap().content,
            CUSTOMER_SCRIPT[CUSTOMER_SCRIPT.len() - 1]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_counter() {
        let (_, conv) = conversation(vec![
            Step::fail(FailureKind::NetworkUnreachable("connection refused".to_string())),
            Step::fail(FailureKind::NetworkUnreachable("connection refused".to_string())),
            Step::reply("Снова на связи"),
            Step::fail(FailureKind::NetworkUnreachable("connection refused".to_string())),
        ]);
        conv.send_turn("1").await.unwrap();
        conv.send_turn("2").await.unwrap();
        conv.send_turn("3").await.unwrap();
        assert_eq!(conv.failure_stats().consecutive_failures, 0);

        let fourth = conv.send_turn("4").await.unwrap();
        let turn = fourth.turn().unwrap();
        assert_eq!(turn.content, NETWORK_TEXT);
        assert!(turn.is_error);
        assert!(turn.retryable);
        assert_eq!(conv.failure_stats().total_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_history_is_sent_including_error_turns() {
        let (backend, conv) = conversation(vec![Step::Hang, Step::reply("ok")]);
        conv.send_turn("Привет").await.unwrap();
        conv.send_turn("Алло?").await.unwrap();
        let requests = backend.requests();
        let contents: Vec<&str> = requests[1]
            .history
            .iter()
            .map(|h| h.content.as_str())
            .collect();
        assert_eq!(contents, vec!["Привет", TIMEOUT_TEXT]);
        assert_eq!(requests[1].history[1].role, Role::Assistant);
    }

    // =========================================================================
    // Retry
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_retry_on_empty_log_is_noop() {
        let (backend, conv) = conversation(vec![]);
        assert_eq!(conv.retry_last_turn().await.unwrap(), SendOutcome::Ignored);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_success_is_noop() {
        let (backend, conv) = conversation(vec![Step::reply("Здравствуйте!")]);
        conv.send_turn("Привет").await.unwrap();
        assert_eq!(conv.retry_last_turn().await.unwrap(), SendOutcome::Ignored);
        assert_eq!(conv.turns().unwrap().len(), 2);
        assert_eq!(backend.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_resubmits_same_content_and_history() {
        let (backend, conv) = conversation(vec![
            Step::reply_with_session("Здравствуйте!", "s-1"),
            Step::Hang,
            Step::reply("Какой бюджет?"),
        ]);
        conv.send_turn("Привет").await.unwrap();
        conv.send_turn("Hyundai Tucson").await.unwrap();
        let before = conv.turns().unwrap();
        assert_eq!(before.len(), 4);

        let mut events = conv.subscribe();
        let outcome = conv.retry_last_turn().await.unwrap();
        assert!(matches!(outcome, SendOutcome::Replied(_)));

        let after = conv.turns().unwrap();
        assert_eq!(after.len(), 4);
        assert_eq!(&after[..3], &before[..3]);
        assert_eq!(after[3].content, "Какой бюджет?");

        let requests = backend.requests();
        assert_eq!(requests[2].message, requests[1].message);
        assert_eq!(requests[2].history, requests[1].history);
        assert_eq!(requests[2].session_id.as_deref(), Some("s-1"));

        let mut names = Vec::new();
        while let Ok(event) = events.try_recv() {
            names.push(event.event_name());
        }
        assert_eq!(
            names,
            vec!["busy_changed", "turn_removed", "turn_appended", "busy_changed"]
        );
    }

    // =========================================================================
    // Restart
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_start_clears_everything() {
        let (_, conv) = conversation(vec![
            Step::reply_with_session("Здравствуйте!", "s-1"),
            service_error("boom"),
        ]);
        let first_id = conv.id().unwrap();
        conv.send_turn("Привет").await.unwrap();
        conv.send_turn("Алло").await.unwrap();

        let new_id = conv.start().unwrap();
        assert_ne!(new_id, first_id);
        assert!(conv.turns().unwrap().is_empty());
        assert_eq!(conv.session_id().unwrap(), None);
        assert_eq!(conv.failure_stats(), FailureStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_mid_flight_discards_late_result() {
        let (backend, conv) = conversation(vec![Step::delayed_reply(
            Duration::from_secs(5),
            "поздний ответ",
        )]);
        let conv = Arc::new(conv);

        let pending = {
            let conv = conv.clone();
            tokio::spawn(async move { conv.send_turn("Привет").await })
        };
        backend.wait_for_requests(1).await;
        conv.start().unwrap();

        assert_eq!(pending.await.unwrap().unwrap(), SendOutcome::Superseded);
        assert!(conv.turns().unwrap().is_empty());
        assert!(!conv.is_busy());
        assert_eq!(backend.completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_for_successful_exchange() {
        let (_, conv) = conversation(vec![Step::Respond(Ok(Reply {
            text: "Записал!".to_string(),
            session_id: Some("s-9".to_string()),
            lead_status: Some("warm".to_string()),
            extracted_data: None,
        }))]);
        let mut events = conv.subscribe();
        conv.send_turn("Иван, +7 900 000-00-00").await.unwrap();

        let mut names = Vec::new();
        while let Ok(event) = events.try_recv() {
            names.push(event.event_name());
        }
        assert_eq!(
            names,
            vec![
                "busy_changed",
                "turn_appended",
                "session_assigned",
                "lead_status_changed",
                "turn_appended",
                "busy_changed",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_training_channel_roles_and_script() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Step::Hang,
            Step::Hang,
            Step::Hang,
        ]));
        let conv = Conversation::new(
            Channel::Training,
            backend.clone(),
            ConversationSettings::training(&AutoImportConfig::default()),
        );
        conv.send_turn("Добрый день!").await.unwrap();
        conv.retry_last_turn().await.unwrap();
        conv.retry_last_turn().await.unwrap();

        let turns = conv.turns().unwrap();
        assert_eq!(turns[0].role, Role::Manager);
        assert_eq!(turns[1].role, Role::Client);
        assert_eq!(turns[1].content, TRAINING_SCRIPT[0]);
        assert!(!turns[1].is_error);
    }
}
