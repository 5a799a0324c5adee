//! Conversation engine for the AutoImport assistant and sales simulator.
//!
//! Runs one exchange at a time per conversation, bounds it with a deadline,
//! turns failures into user-facing replies and degrades to a fallback script
//! after repeated failures. The training simulator adds presets and scoring
//! on top of the same engine.

pub mod conversation;
pub mod degradation;
pub mod error;
pub mod lifecycle;
pub mod script;
pub mod session;
pub mod simulator;
pub mod transport;
pub mod turn_log;

#[cfg(test)]
pub(crate) mod test_support;

pub use conversation::{Conversation, ConversationSettings, SendOutcome};
pub use degradation::{DegradationPolicy, Disposition};
pub use error::ChatError;
pub use lifecycle::{ExchangeOutcome, FailureStats, RequestController};
pub use turn_log::ConversationLog;
pub use session::SessionIdentity;
pub use simulator::{
    builtin_presets, EvaluationOutcome, SimulatorState, TrainingSession, MIN_TURNS_FOR_EVALUATION,
};
pub use transport::{
    CustomerEndpoint, ExchangeBackend, ExchangeRequest, FailureKind, Reply, TrainingBackend,
    TrainingEndpoint,
};
