//! Typed HTTP client for the AutoImport backend.
//!
//! Covers the chat and simulator exchanges, the preset catalog, session
//! evaluation, and the read-only lead dashboard endpoints.

pub mod client;
pub mod error;
pub mod wire;

pub use client::BackendClient;
pub use error::ClientError;
pub use wire::{
    ChatReply, ChatRequest, EvaluationRequest, HealthReport, SimulatorReply, SimulatorRequest,
};
