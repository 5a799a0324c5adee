//! Request and response bodies of the backend endpoints.

use autoimport_core::{HistoryEntry, Preset};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
    /// Sent as `null` before the first successful exchange.
    pub session_id: Option<String>,
}

/// Successful body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Contact and vehicle details the assistant picked out of the message.
    #[serde(default)]
    pub extracted_data: Option<serde_json::Value>,
    #[serde(default)]
    pub lead_status: Option<String>,
    /// Backend-side problem reported next to an otherwise usable reply.
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /api/simulator/chat`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatorRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
    pub session_id: Option<String>,
    pub preset: String,
}

/// Successful body of `POST /api/simulator/chat`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatorReply {
    pub response: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub persona_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /api/simulator/evaluate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRequest {
    pub history: Vec<HistoryEntry>,
    pub preset: String,
}

/// `GET /api/simulator/presets` answers either a bare list or `{"presets": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PresetListing {
    Wrapped { presets: Vec<Preset> },
    Bare(Vec<Preset>),
}

impl PresetListing {
    pub(crate) fn into_presets(self) -> Vec<Preset> {
        match self {
            PresetListing::Wrapped { presets } => presets,
            PresetListing::Bare(presets) => presets,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub openai_configured: Option<bool>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
