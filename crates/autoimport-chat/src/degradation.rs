//! Failure classification and degradation.
//!
//! Turns a failed exchange into the reply the user sees. Below the failure
//! threshold the reply explains what went wrong; at or above it the reply is
//! a scripted line that keeps the conversation going and is not marked as an
//! error.

use std::sync::LazyLock;

use regex::Regex;

use crate::transport::FailureKind;

/// Shown when the exchange exceeded its deadline.
pub const TIMEOUT_TEXT: &str = "Запрос занял слишком много времени. Попробуйте ещё раз.";

/// Shown when the backend could not be reached.
pub const NETWORK_TEXT: &str =
    "Не удалось подключиться к сервису. Проверьте интернет-соединение.";

/// Shown for a service error that carried no text of its own.
pub const GENERIC_FAILURE_TEXT: &str = "Извините, возникла техническая ошибка. Пожалуйста, попробуйте ещё раз через несколько секунд. Если проблема повторится, оставьте ваш телефон, и менеджер свяжется с вами.";

// =============================================================================
// Network detection
// =============================================================================

static NETWORK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)failed to fetch|network\s*error|connection (?:refused|reset|closed|aborted)|error sending request|dns error|не удалось подключиться|нет соединения",
    )
    .expect("Invalid network regex")
});

/// Whether a failure message describes a connectivity problem rather than a
/// service-side error. Decided by message content, never by HTTP status.
pub fn looks_like_network_failure(message: &str) -> bool {
    NETWORK_PATTERN.is_match(message)
}

// =============================================================================
// Policy
// =============================================================================

/// How a failed exchange is presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    pub text: String,
    pub is_error: bool,
    pub offer_retry: bool,
    /// The text came from the fallback script.
    pub degraded: bool,
}

/// Maps `(failure, consecutive failures, human turn count)` to a [`Disposition`].
#[derive(Debug, Clone)]
pub struct DegradationPolicy {
    threshold: u32,
    script: &'static [&'static str],
}

impl DegradationPolicy {
    /// `threshold` below 1 is treated as 1.
    pub fn new(threshold: u32, script: &'static [&'static str]) -> Self {
        Self {
            threshold: threshold.max(1),
            script,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Whether `consecutive_failures` (counted after this failure) means the
    /// conversation runs on the script.
    pub fn is_degraded(&self, consecutive_failures: u32) -> bool {
        consecutive_failures >= self.threshold
    }

    pub fn classify(
        &self,
        failure: &FailureKind,
        consecutive_failures: u32,
        human_turns: usize,
    ) -> Disposition {
        if self.is_degraded(consecutive_failures) {
            if let Some(line) = self.script_line(human_turns) {
                return Disposition {
                    text: line.to_string(),
                    is_error: false,
                    offer_retry: false,
                    degraded: true,
                };
            }
        }

        let (text, offer_retry) = match failure {
            FailureKind::Timeout => (TIMEOUT_TEXT.to_string(), true),
            FailureKind::NetworkUnreachable(_) => (NETWORK_TEXT.to_string(), true),
            FailureKind::ServiceError(message) if looks_like_network_failure(message) => {
                (NETWORK_TEXT.to_string(), true)
            }
            FailureKind::ServiceError(message) if message.trim().is_empty() => {
                (GENERIC_FAILURE_TEXT.to_string(), false)
            }
            FailureKind::ServiceError(message) => (message.clone(), false),
        };
        Disposition {
            text,
            is_error: true,
            offer_retry,
            degraded: false,
        }
    }

    /// Line for the conversation's `human_turns`-th human turn; the last line
    /// repeats once the script is exhausted.
    pub fn script_line(&self, human_turns: usize) -> Option<&'static str> {
        let last = self.script.len().checked_sub(1)?;
        Some(self.script[human_turns.saturating_sub(1).min(last)])
    }
}
