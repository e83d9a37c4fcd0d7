//! Remote research service contract and its HTTP implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{ResearchError, ResearchRequest, SecretValue};

pub const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// Upper bound on a single status request.
pub const STATUS_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw transport chunks of a server-sent-event response.
pub type ChunkStream = BoxStream<'static, Result<Bytes, ResearchError>>;

/// Opaque identifier correlating status polls with a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle(String);

impl RequestHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body returned when a job is submitted in polling mode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub request_id: Option<String>,
}

impl SubmitResponse {
    /// The job handle; an absent or blank id is a submission failure.
    pub fn handle(&self) -> Result<RequestHandle, ResearchError> {
        self.request_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(RequestHandle::new)
            .ok_or_else(|| {
                ResearchError::Submission("no request_id returned by research initiation".into())
            })
    }
}

/// Lifecycle state reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Failed,
    /// Any non-terminal state, kept verbatim (`queued`, `running`, ...).
    Pending(String),
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        match value {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Pending(other.to_string()),
        }
    }
}

/// Body returned by the status endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub sources: Option<Vec<Value>>,
    /// Usually a message string, but some failures carry a structured object.
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub response_time: Option<f64>,
}

impl StatusResponse {
    pub fn job_status(&self) -> JobStatus {
        JobStatus::from(self.status.as_deref().unwrap_or("unknown"))
    }

    /// The failure message; non-string errors are rendered as compact JSON.
    pub fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(message) => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// The two operations the research service exposes.
#[async_trait]
pub trait ResearchApi: Send + Sync {
    /// Submit a job in polling mode and return the service's acknowledgement.
    async fn submit(&self, request: &ResearchRequest) -> Result<SubmitResponse, ResearchError>;

    /// Submit a job in streaming mode and return the live event stream.
    async fn open_stream(&self, request: &ResearchRequest) -> Result<ChunkStream, ResearchError>;

    /// Fetch the current state of a submitted job.
    async fn status(&self, handle: &RequestHandle) -> Result<StatusResponse, ResearchError>;
}

#[derive(Serialize)]
struct ResearchBody<'a> {
    input: &'a str,
    model: &'a str,
    citation_format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_schema: Option<&'a Value>,
    stream: bool,
    timeout: u64,
}

impl<'a> ResearchBody<'a> {
    fn new(request: &'a ResearchRequest, stream: bool) -> Self {
        Self {
            input: request.topic(),
            model: request.model().as_str(),
            citation_format: request.citation_format().as_str(),
            output_schema: request.output_schema(),
            stream,
            timeout: request.timeout().as_secs(),
        }
    }
}

/// reqwest-backed client for the hosted research API.
#[derive(Clone)]
pub struct HttpResearchApi {
    client: Client,
    base_url: String,
    api_key: SecretValue,
}

impl HttpResearchApi {
    pub fn new(base_url: impl Into<String>, api_key: SecretValue) -> Result<Self, ResearchError> {
        let client = Client::builder()
            .user_agent(concat!("tavily-research/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn research_url(&self) -> String {
        format!("{}/research", self.base_url)
    }

    async fn post_research(
        &self,
        request: &ResearchRequest,
        stream: bool,
    ) -> Result<Response, ResearchError> {
        let body = ResearchBody::new(request, stream);
        debug!(model = body.model, stream, "submitting research request");
        let response = self
            .client
            .post(self.research_url())
            .bearer_auth(self.api_key.expose())
            .timeout(request.timeout())
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, ResearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ResearchError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ResearchApi for HttpResearchApi {
    async fn submit(&self, request: &ResearchRequest) -> Result<SubmitResponse, ResearchError> {
        let response = self.post_research(request, false).await?;
        Ok(response.json().await?)
    }

    async fn open_stream(&self, request: &ResearchRequest) -> Result<ChunkStream, ResearchError> {
        let response = self.post_research(request, true).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ResearchError::from))
            .boxed())
    }

    async fn status(&self, handle: &RequestHandle) -> Result<StatusResponse, ResearchError> {
        let url = format!("{}/{}", self.research_url(), handle.as_str());
        let response = self
            .client
            .get(url)
            .bearer_auth(self.api_key.expose())
            .timeout(STATUS_REQUEST_TIMEOUT)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CitationFormat, ResearchModel};
    use serde_json::json;

    #[test]
    fn submit_without_request_id_is_submission_error() {
        let err = SubmitResponse::default().handle().unwrap_err();
        assert!(matches!(err, ResearchError::Submission(_)));

        let blank = SubmitResponse {
            request_id: Some("  ".into()),
        };
        assert!(blank.handle().is_err());
    }

    #[test]
    fn submit_response_yields_handle() {
        let response: SubmitResponse =
            serde_json::from_value(json!({"request_id": "req-123", "status": "pending"})).unwrap();
        assert_eq!(response.handle().unwrap().as_str(), "req-123");
    }

    #[test]
    fn status_response_tolerates_missing_fields() {
        let response: StatusResponse =
            serde_json::from_value(json!({"status": "running"})).unwrap();
        assert_eq!(response.job_status(), JobStatus::Pending("running".into()));
        assert!(response.sources.is_none());

        let done: StatusResponse = serde_json::from_value(json!({
            "status": "completed",
            "content": "report",
            "sources": null,
            "response_time": 12.5
        }))
        .unwrap();
        assert_eq!(done.job_status(), JobStatus::Completed);
        assert_eq!(done.response_time, Some(12.5));
    }

    #[test]
    fn structured_error_decodes_and_renders_as_json() {
        let failed: StatusResponse = serde_json::from_value(json!({
            "status": "failed",
            "error": {"code": "quota", "detail": "monthly limit reached"}
        }))
        .unwrap();
        assert_eq!(failed.job_status(), JobStatus::Failed);
        assert_eq!(
            failed.error_message().as_deref(),
            Some(r#"{"code":"quota","detail":"monthly limit reached"}"#)
        );

        let plain: StatusResponse =
            serde_json::from_value(json!({"status": "failed", "error": "quota exceeded"})).unwrap();
        assert_eq!(plain.error_message().as_deref(), Some("quota exceeded"));

        let null: StatusResponse =
            serde_json::from_value(json!({"status": "failed", "error": null})).unwrap();
        assert_eq!(null.error_message(), None);
    }

    #[test]
    fn body_carries_stream_flag_and_schema() {
        let request = ResearchRequest::new("grid storage")
            .with_model(ResearchModel::Auto)
            .with_citation_format(CitationFormat::Apa)
            .with_output_schema(Some(json!({"properties": {}})));

        let body = serde_json::to_value(ResearchBody::new(&request, true)).unwrap();
        assert_eq!(
            body,
            json!({
                "input": "grid storage",
                "model": "auto",
                "citation_format": "apa",
                "output_schema": {"properties": {}},
                "stream": true,
                "timeout": 600
            })
        );

        let plain = ResearchRequest::new("grid storage");
        let body = serde_json::to_value(ResearchBody::new(&plain, false)).unwrap();
        assert!(body.get("output_schema").is_none());
        assert_eq!(body["stream"], false);
    }
}
