use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tavily_research_core::{
    init_telemetry, run_research, ConfigLoader, HttpResearchApi, ResearchApi, ResearchError,
    ResearchOptions, RetrievalMode, TelemetryOptions, EXIT_FAILURE,
};
use tokio::runtime::Runtime;
use tracing::debug;

const EXAMPLES: &str = "\
Examples:
  tavily-research \"Latest developments in quantum computing\"
  tavily-research \"AI market analysis\" --schema ./market_schema.json --model pro
  tavily-research \"Compare React vs Vue\" --stream --output ./report.json
  tavily-research \"Quick overview of RAG\" --model mini --quiet";

#[derive(Parser, Debug)]
#[command(
    name = "tavily-research",
    version,
    about = "Tavily Research API - general purpose research client",
    after_help = EXAMPLES
)]
struct Cli {
    /// Research topic or question.
    topic: String,

    /// Path to a JSON schema file or an inline JSON string for structured output.
    #[arg(short, long, value_name = "PATH_OR_JSON")]
    schema: Option<String>,

    /// Stream events as they arrive instead of polling for the finished job.
    #[arg(long)]
    stream: bool,

    /// Research model: mini, pro or auto (default: mini).
    #[arg(short, long)]
    model: Option<String>,

    /// Citation format: numbered, mla, apa or chicago (default: numbered).
    #[arg(short, long)]
    citation: Option<String>,

    /// Output file path (default: stdout).
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Seconds between status polls (default: 5).
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval: Option<u64>,

    /// Suppress progress output.
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file (falls back to `TAVILY_RESEARCH_CONFIG`, then `research.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_FAILURE } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), ResearchError> {
    let config = ConfigLoader::load(cli.config.clone())?;

    init_telemetry(TelemetryOptions {
        env_filter: config.logging.level.clone(),
        ..TelemetryOptions::default()
    })?;
    debug!(?config, "configuration loaded");

    let credential = config.credential();
    let defaults = &config.research;
    let mut options = ResearchOptions::new(cli.topic)
        .with_model(cli.model.unwrap_or_else(|| defaults.model.clone()))
        .with_citation_format(
            cli.citation
                .unwrap_or_else(|| defaults.citation_format.clone()),
        )
        .with_mode(if cli.stream {
            RetrievalMode::Stream
        } else {
            RetrievalMode::Poll
        })
        .with_poll_interval(Duration::from_secs(
            cli.poll_interval.unwrap_or(defaults.poll_interval_secs),
        ))
        .with_max_poll_time(Duration::from_secs(defaults.max_poll_secs))
        .quiet(cli.quiet);
    if let Some(schema) = cli.schema {
        options = options.with_schema(schema);
    }
    if let Some(output) = cli.output {
        options = options.with_output(output);
    }

    let base_url = config.api.base_url.clone();
    let rt = Runtime::new().map_err(|err| ResearchError::Other(err.into()))?;
    rt.block_on(async move {
        let research = run_research(options, &credential, |api_key| {
            let api = HttpResearchApi::new(base_url, api_key.clone())?;
            Ok(Arc::new(api) as Arc<dyn ResearchApi>)
        });

        tokio::select! {
            result = research => result.map(|_| ()),
            Ok(()) = tokio::signal::ctrl_c() => Err(ResearchError::Interrupted),
        }
    })
}

fn report_error(err: &ResearchError) {
    match err {
        ResearchError::Interrupted => eprintln!("\nResearch cancelled."),
        other => eprintln!("{}: {other}", other.category()),
    }
}
