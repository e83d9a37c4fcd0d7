//! Sequencing of a single research run, from input validation to the report sink.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::api::ResearchApi;
use crate::report::{emit_report, format_report, write_report, ReportEnvelope};
use crate::request::{DEFAULT_POLL_INTERVAL, MAX_POLL_TIME};
use crate::retrieval::{PollingRetriever, RetrievalMode, Retriever, StreamingRetriever};
use crate::schema::{load_schema, property_count, validate_schema};
use crate::{
    CitationFormat, Credential, Progress, ResearchError, ResearchModel, ResearchRequest,
    SecretValue,
};

/// Options for a research run, as supplied by the caller.
///
/// `model` and `citation_format` are raw strings; membership is checked by
/// [`run_research`] after the credential check.
#[derive(Debug, Clone)]
pub struct ResearchOptions {
    pub topic: String,
    pub model: String,
    pub citation_format: String,
    pub schema: Option<String>,
    pub mode: RetrievalMode,
    pub output: Option<PathBuf>,
    pub poll_interval: Duration,
    pub max_poll_time: Duration,
    pub quiet: bool,
}

impl ResearchOptions {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            model: ResearchModel::default().as_str().to_string(),
            citation_format: CitationFormat::default().as_str().to_string(),
            schema: None,
            mode: RetrievalMode::Poll,
            output: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
            max_poll_time: Duration::from_secs(MAX_POLL_TIME),
            quiet: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_citation_format(mut self, citation_format: impl Into<String>) -> Self {
        self.citation_format = citation_format.into();
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_time(mut self, ceiling: Duration) -> Self {
        self.max_poll_time = ceiling;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

/// Run a research job and emit the report to stdout when no output file is set.
///
/// `connect` builds the API client once every local precondition has passed,
/// so an invalid invocation never reaches the network.
pub async fn run_research<F>(
    options: ResearchOptions,
    credential: &Credential,
    connect: F,
) -> Result<ReportEnvelope, ResearchError>
where
    F: FnOnce(&SecretValue) -> Result<Arc<dyn ResearchApi>, ResearchError>,
{
    run_research_to(options, credential, connect, io::stdout()).await
}

/// Like [`run_research`], writing stdout-bound output to `stdout`.
pub async fn run_research_to<F, W>(
    options: ResearchOptions,
    credential: &Credential,
    connect: F,
    stdout: W,
) -> Result<ReportEnvelope, ResearchError>
where
    F: FnOnce(&SecretValue) -> Result<Arc<dyn ResearchApi>, ResearchError>,
    W: Write,
{
    let progress = Progress::new(options.quiet);

    let api_key = credential.require()?;
    let model: ResearchModel = options.model.parse()?;
    let citation_format: CitationFormat = options.citation_format.parse()?;

    let schema = load_schema(options.schema.as_deref())?;
    if let Some(schema) = &schema {
        validate_schema(schema)?;
        progress.status(format!(
            "Using custom schema with {} properties",
            property_count(schema)
        ));
    }

    let request = ResearchRequest::new(options.topic.as_str())
        .with_model(model)
        .with_citation_format(citation_format)
        .with_output_schema(schema)
        .with_timeout(options.max_poll_time);

    let api = connect(api_key)?;
    let retriever: Box<dyn Retriever> = match options.mode {
        RetrievalMode::Stream => Box::new(StreamingRetriever::new(api).with_progress(progress)),
        RetrievalMode::Poll => Box::new(
            PollingRetriever::new(api)
                .with_poll_interval(options.poll_interval)
                .with_max_poll_time(options.max_poll_time)
                .with_progress(progress),
        ),
    };

    info!(topic = %request.topic(), %model, mode = options.mode.label(), "starting research");
    progress.status(format!("Starting research ({} mode)...", options.mode.label()));
    let result = retriever.retrieve(&request).await?;

    let report = format_report(
        request.topic(),
        model,
        result.content,
        result.sources,
        result.elapsed_seconds,
    );

    match &options.output {
        Some(path) => {
            write_report(&report, path)?;
            progress.status(format!("Results saved to: {}", path.display()));
        }
        None => emit_report(&report, stdout)?,
    }

    Ok(report)
}
