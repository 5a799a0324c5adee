//! Backend seams used by the conversation engine.
//!
//! `ExchangeBackend` is one request/reply round trip; `TrainingBackend` adds
//! the simulator's catalog and scoring calls. `CustomerEndpoint` and
//! `TrainingEndpoint` implement them over `BackendClient`; tests substitute
//! scripted backends.

use async_trait::async_trait;
use autoimport_client::{
    BackendClient, ChatRequest, ClientError, EvaluationRequest, SimulatorRequest,
};
use autoimport_core::{Evaluation, HistoryEntry, Preset};

// =============================================================================
// Request / reply
// =============================================================================

/// One outbound exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRequest {
    pub message: String,
    /// Prior turns, oldest first, excluding the message itself.
    pub history: Vec<HistoryEntry>,
    pub session_id: Option<String>,
    /// Simulator persona; ignored by the customer endpoint.
    pub preset: Option<String>,
}

/// A successful exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub text: String,
    pub session_id: Option<String>,
    pub lead_status: Option<String>,
    pub extracted_data: Option<serde_json::Value>,
}

/// Why an exchange produced no reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureKind {
    #[error("request timed out")]
    Timeout,
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),
    /// Carries the backend's error text, or `HTTP <status>` when it sent none.
    #[error("service error: {0}")]
    ServiceError(String),
}

impl FailureKind {
    /// Whether the user should be offered a retry before degradation kicks in.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::NetworkUnreachable(_)
        )
    }
}

impl From<ClientError> for FailureKind {
    fn from(err: ClientError) -> Self {
        if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_connect() {
            FailureKind::NetworkUnreachable(err.to_string())
        } else {
            FailureKind::ServiceError(err.service_message())
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// A single request/reply round trip.
///
/// Implementations must be cancel-safe: the caller drops the future when its
/// deadline passes, and nothing may be observed from it afterwards.
#[async_trait]
pub trait ExchangeBackend: Send + Sync {
    async fn exchange(&self, request: ExchangeRequest) -> Result<Reply, FailureKind>;
}

/// Simulator backend: exchanges plus the preset catalog and scoring.
#[async_trait]
pub trait TrainingBackend: ExchangeBackend {
    async fn presets(&self) -> Result<Vec<Preset>, FailureKind>;

    async fn evaluate(
        &self,
        preset: &str,
        history: Vec<HistoryEntry>,
    ) -> Result<Evaluation, FailureKind>;
}

// =============================================================================
// HTTP implementations
// =============================================================================

/// Session id the backend fills in when it had none to report.
const PLACEHOLDER_SESSION_ID: &str = "error";

/// Session id worth adopting from a 2xx reply.
fn adoptable_session_id(session_id: Option<String>) -> Option<String> {
    session_id.filter(|id| !id.trim().is_empty() && id != PLACEHOLDER_SESSION_ID)
}

/// A 2xx reply is a reply even when it carries an `error` field; the field
/// describes a backend-side problem and is never shown to the user.
fn log_inline_error(error: Option<&str>) {
    if let Some(error) = error.filter(|e| !e.trim().is_empty()) {
        tracing::warn!(error = %error, "Backend reported an error alongside its reply");
    }
}

/// `POST /api/chat`.
#[derive(Debug, Clone)]
pub struct CustomerEndpoint {
    client: BackendClient,
}

impl CustomerEndpoint {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExchangeBackend for CustomerEndpoint {
    async fn exchange(&self, request: ExchangeRequest) -> Result<Reply, FailureKind> {
        let reply = self
            .client
            .chat(&ChatRequest {
                message: request.message,
                history: request.history,
                session_id: request.session_id,
            })
            .await?;
        log_inline_error(reply.error.as_deref());
        Ok(Reply {
            text: reply.response,
            session_id: adoptable_session_id(reply.session_id),
            lead_status: reply.lead_status,
            extracted_data: reply.extracted_data,
        })
    }
}

/// `POST /api/simulator/*` and `GET /api/simulator/presets`.
#[derive(Debug, Clone)]
pub struct TrainingEndpoint {
    client: BackendClient,
    default_preset: String,
}

impl TrainingEndpoint {
    /// `default_preset` is sent when an exchange carries no preset.
    pub fn new(client: BackendClient, default_preset: impl Into<String>) -> Self {
        Self {
            client,
            default_preset: default_preset.into(),
        }
    }
}

#[async_trait]
impl ExchangeBackend for TrainingEndpoint {
    async fn exchange(&self, request: ExchangeRequest) -> Result<Reply, FailureKind> {
        let reply = self
            .client
            .simulator_chat(&SimulatorRequest {
                message: request.message,
                history: request.history,
                session_id: request.session_id,
                preset: request
                    .preset
                    .unwrap_or_else(|| self.default_preset.clone()),
            })
            .await?;
        log_inline_error(reply.error.as_deref());
        if let Some(persona) = &reply.persona_name {
            tracing::debug!(persona = %persona, "Simulated client replied");
        }
        Ok(Reply {
            text: reply.response,
            session_id: adoptable_session_id(reply.session_id),
            ..Reply::default()
        })
    }
}

#[async_trait]
impl TrainingBackend for TrainingEndpoint {
    async fn presets(&self) -> Result<Vec<Preset>, FailureKind> {
        Ok(self.client.presets().await?)
    }

    async fn evaluate(
        &self,
        preset: &str,
        history: Vec<HistoryEntry>,
    ) -> Result<Evaluation, FailureKind> {
        Ok(self
            .client
            .evaluate(&EvaluationRequest {
                history,
                preset: preset.to_string(),
            })
            .await?)
    }
}
