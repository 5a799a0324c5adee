use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Conversation roles and channels
// =============================================================================

/// Author of a turn.
///
/// The customer chat uses `User`/`Assistant`; the training simulator uses
/// `Manager`/`Client`. The wire names are the lowercase variant names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Customer writing to the assistant widget.
    User,
    /// Assistant reply (remote or degraded).
    Assistant,
    /// Sales manager practicing in the simulator.
    Manager,
    /// Simulated customer reply.
    Client,
}

impl Role {
    /// Whether this role is typed by a human at the keyboard.
    pub fn is_human(&self) -> bool {
        matches!(self, Role::User | Role::Manager)
    }

    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Manager => "manager",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which conversation surface a turn or event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Customer-facing assistant widget.
    Customer,
    /// Sales training simulator.
    Training,
}

impl Channel {
    /// Role of the human side of this channel.
    pub fn human_role(&self) -> Role {
        match self {
            Channel::Customer => Role::User,
            Channel::Training => Role::Manager,
        }
    }

    /// Role of the replying side of this channel.
    pub fn reply_role(&self) -> Role {
        match self {
            Channel::Customer => Role::Assistant,
            Channel::Training => Role::Client,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Customer => write!(f, "customer"),
            Channel::Training => write!(f, "training"),
        }
    }
}

/// Identifier of one locally owned conversation (not the remote session id).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Turns
// =============================================================================

/// One message in a conversation transcript.
///
/// `id` and `timestamp` are assigned by the conversation log at append time
/// and never change afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Ordering key, unique within the conversation.
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// True only for reply turns synthesized from a failure path.
    pub is_error: bool,
    /// Whether the UI should offer to retry this turn.
    pub retryable: bool,
}

impl Turn {
    /// Whether `retry_last` may remove this turn.
    pub fn is_retryable_error(&self) -> bool {
        !self.role.is_human() && self.is_error && self.retryable
    }

    /// Wire form sent to the backend as part of the history.
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// `{role, content}` pair as it travels in the `history` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

// =============================================================================
// Simulator catalog and scoring
// =============================================================================

/// A simulated-customer persona the trainee can practice against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub description: String,
    /// 1 (easy) upwards.
    pub difficulty: u8,
}

/// The five scored skills of a training conversation.
///
/// Scores arrive as whatever JSON number the grader produced, so fractions
/// are kept; `Evaluation::validate` enforces the range.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub contact: f64,
    pub needs_discovery: f64,
    pub objection_handling: f64,
    pub presentation: f64,
    pub closing: f64,
}

impl ScoreBreakdown {
    /// Scores in display order, paired with their wire names.
    pub fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("contact", self.contact),
            ("needs_discovery", self.needs_discovery),
            ("objection_handling", self.objection_handling),
            ("presentation", self.presentation),
            ("closing", self.closing),
        ]
    }
}

/// Scored assessment of a finished training conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub scores: ScoreBreakdown,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub overall_score: f64,
    pub recommendations: String,
}

impl Evaluation {
    /// Highest score any field may carry.
    pub const MAX_SCORE: f64 = 100.0;

    fn in_range(value: f64) -> bool {
        (0.0..=Self::MAX_SCORE).contains(&value)
    }

    /// Check that every score lies within 0..=100.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in self.scores.entries() {
            if !Self::in_range(value) {
                return Err(format!("score {} out of range: {}", name, value));
            }
        }
        if !Self::in_range(self.overall_score) {
            return Err(format!(
                "overall score out of range: {}",
                self.overall_score
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Leads (read API)
// =============================================================================

/// Lead temperature assigned by the qualification step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualification {
    Hot,
    Warm,
    Cold,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Qualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualification::Hot => write!(f, "hot"),
            Qualification::Warm => write!(f, "warm"),
            Qualification::Cold => write!(f, "cold"),
            Qualification::Unknown => write!(f, "unknown"),
        }
    }
}

/// A captured contact / vehicle-preference record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: i64,
    pub session_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub car_brand: Option<String>,
    #[serde(default)]
    pub car_model: Option<String>,
    #[serde(default)]
    pub budget_min: Option<i64>,
    #[serde(default)]
    pub budget_max: Option<i64>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
    pub status: String,
    #[serde(default)]
    pub qualification: Option<Qualification>,
    pub created_at: String,
}

impl LeadRecord {
    /// "Brand Model" with whichever parts are known.
    pub fn vehicle(&self) -> Option<String> {
        match (&self.car_brand, &self.car_model) {
            (Some(brand), Some(model)) => Some(format!("{} {}", brand, model)),
            (Some(brand), None) => Some(brand.clone()),
            (None, Some(model)) => Some(model.clone()),
            (None, None) => None,
        }
    }
}

/// Aggregate lead counts. `hot + warm + cold <= total` is not enforced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStats {
    pub total_leads: u64,
    pub hot_leads: u64,
    pub warm_leads: u64,
    pub cold_leads: u64,
}

/// One stored message of a past customer conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
    pub created_at: String,
}
