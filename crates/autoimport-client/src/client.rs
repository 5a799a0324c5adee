//! `BackendClient`: one method per backend endpoint.
//!
//! The client applies no timeout of its own. Callers that need one race the
//! returned future against a timer and drop it when the timer wins, which
//! aborts the in-flight request.

use autoimport_core::{Evaluation, LeadRecord, LeadStats, Preset, TranscriptEntry};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ClientError, ErrorPayload};
use crate::wire::{
    ChatReply, ChatRequest, EvaluationRequest, HealthReport, PresetListing, SimulatorReply,
    SimulatorRequest,
};

/// HTTP client for the AutoImport backend.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client for the backend at `base_url` (e.g. `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_http_client(Client::new(), base_url)
    }

    /// Create a client that reuses an existing `reqwest::Client`.
    pub fn with_http_client(
        http: Client,
        base_url: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let parsed =
            Url::parse(&base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// `POST /api/chat`: one customer chat exchange.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ClientError> {
        self.post_json("/api/chat", request).await
    }

    /// `POST /api/simulator/chat`: one manager/client exchange.
    pub async fn simulator_chat(
        &self,
        request: &SimulatorRequest,
    ) -> Result<SimulatorReply, ClientError> {
        self.post_json("/api/simulator/chat", request).await
    }

    /// `GET /api/simulator/presets`.
    pub async fn presets(&self) -> Result<Vec<Preset>, ClientError> {
        let listing: PresetListing = self.get_json(self.endpoint("/api/simulator/presets")?).await?;
        Ok(listing.into_presets())
    }

    /// `POST /api/simulator/evaluate`.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, ClientError> {
        self.post_json("/api/simulator/evaluate", request).await
    }

    // =========================================================================
    // Leads dashboard
    // =========================================================================

    /// `GET /api/leads`, in the order the backend returns them.
    pub async fn leads(&self) -> Result<Vec<LeadRecord>, ClientError> {
        self.get_json(self.endpoint("/api/leads")?).await
    }

    /// `GET /api/leads/{session_id}`.
    pub async fn lead(&self, session_id: &str) -> Result<LeadRecord, ClientError> {
        self.get_json(self.endpoint_with_segment("/api/leads", session_id)?)
            .await
    }

    /// `GET /api/stats`.
    pub async fn stats(&self) -> Result<LeadStats, ClientError> {
        self.get_json(self.endpoint("/api/stats")?).await
    }

    /// `GET /api/conversations/{session_id}`.
    pub async fn transcript(&self, session_id: &str) -> Result<Vec<TranscriptEntry>, ClientError> {
        self.get_json(self.endpoint_with_segment("/api/conversations", session_id)?)
            .await
    }

    /// `GET /health`. An unhealthy backend answers 503, surfaced as `ClientError::Status`.
    pub async fn health(&self) -> Result<HealthReport, ClientError> {
        self.get_json(self.endpoint("/health")?).await
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| ClientError::InvalidUrl(format!("{raw}: {e}")))
    }

    /// Append `segment` as a single, percent-encoded path segment.
    fn endpoint_with_segment(&self, path: &str, segment: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.clone()))?
            .push(segment);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        tracing::debug!(url = %url, "GET");
        let response = self.http.get(url).send().await?;
        decode(response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.endpoint(path)?;
        tracing::debug!(url = %url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        decode(response).await
    }
}

/// Turn a response into `T`, or into `ClientError::Status` for non-2xx codes.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = ErrorPayload::message_from(&body);
        tracing::debug!(status = status.as_u16(), message = ?message, "Backend returned error status");
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
}
