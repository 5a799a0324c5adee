use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Channel, ConversationId, Turn};

/// Change notifications emitted by a conversation.
///
/// UIs subscribe to these instead of polling conversation state; the engine
/// never calls into rendering code.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConversationEvent {
    // =========================================================================
    // Transcript
    // =========================================================================
    /// The log, session identifier and failure counter were cleared.
    ConversationReset {
        channel: Channel,
        conversation_id: ConversationId,
        timestamp: DateTime<Utc>,
    },

    /// A turn was appended to the log.
    TurnAppended {
        channel: Channel,
        turn: Turn,
        timestamp: DateTime<Utc>,
    },

    /// A retryable error turn was removed ahead of a retry.
    TurnRemoved {
        channel: Channel,
        turn_id: u64,
        timestamp: DateTime<Utc>,
    },

    /// An exchange started or settled.
    BusyChanged {
        channel: Channel,
        busy: bool,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Remote session
    // =========================================================================
    /// The backend issued (or rotated) the session identifier.
    SessionAssigned {
        channel: Channel,
        session_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Replies now come from the local fallback script.
    Degraded {
        channel: Channel,
        consecutive_failures: u32,
        timestamp: DateTime<Utc>,
    },

    /// The backend reported a new qualification status for the lead.
    LeadStatusChanged {
        status: String,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Training simulator
    // =========================================================================
    /// A preset was selected and a fresh training session started.
    PresetSelected {
        preset_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The scoring endpoint returned an evaluation.
    EvaluationReady {
        overall_score: f64,
        timestamp: DateTime<Utc>,
    },

    /// The scoring request failed; the session stays active.
    EvaluationFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl ConversationEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ConversationEvent::ConversationReset { timestamp, .. }
            | ConversationEvent::TurnAppended { timestamp, .. }
            | ConversationEvent::TurnRemoved { timestamp, .. }
            | ConversationEvent::BusyChanged { timestamp, .. }
            | ConversationEvent::SessionAssigned { timestamp, .. }
            | ConversationEvent::Degraded { timestamp, .. }
            | ConversationEvent::LeadStatusChanged { timestamp, .. }
            | ConversationEvent::PresetSelected { timestamp, .. }
            | ConversationEvent::EvaluationReady { timestamp, .. }
            | ConversationEvent::EvaluationFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Returns a stable event name for logging and UI dispatch.
    pub fn event_name(&self) -> &'static str {
        match self {
            ConversationEvent::ConversationReset { .. } => "conversation_reset",
            ConversationEvent::TurnAppended { .. } => "turn_appended",
            ConversationEvent::TurnRemoved { .. } => "turn_removed",
            ConversationEvent::BusyChanged { .. } => "busy_changed",
            ConversationEvent::SessionAssigned { .. } => "session_assigned",
            ConversationEvent::Degraded { .. } => "degraded",
            ConversationEvent::LeadStatusChanged { .. } => "lead_status_changed",
            ConversationEvent::PresetSelected { .. } => "preset_selected",
            ConversationEvent::EvaluationReady { .. } => "evaluation_ready",
            ConversationEvent::EvaluationFailed { .. } => "evaluation_failed",
        }
    }
}
