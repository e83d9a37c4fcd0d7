//! Tavily Research API client core.
//!
//! Submits a research topic to the hosted service, retrieves the finished
//! result by polling or by consuming a server-sent-event stream, validates an
//! optional output schema, and formats everything into a stable JSON report.

pub mod api;
mod config;
mod error;
mod orchestrator;
mod progress;
mod report;
mod request;
pub mod retrieval;
mod schema;
mod security;
mod telemetry;

pub use api::{HttpResearchApi, RequestHandle, ResearchApi};
pub use config::{ApiConfig, Config, ConfigLoader, LoggingConfig, ResearchDefaults};
pub use error::{ResearchError, SchemaError, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_TIMEOUT};
pub use orchestrator::{run_research, run_research_to, ResearchOptions};
pub use progress::Progress;
pub use report::{emit_report, format_report, write_report, ReportEnvelope, ReportMeta};
pub use request::{
    CitationFormat, ResearchModel, ResearchRequest, DEFAULT_POLL_INTERVAL, MAX_POLL_TIME,
};
pub use retrieval::{RetrievalMode, RetrievalResult, Retriever};
pub use schema::{load_schema, property_count, validate_schema};
pub use security::{Credential, SecretValue};
pub use telemetry::{init_telemetry, TelemetryOptions};
