use std::path::PathBuf;

use thiserror::Error;

/// Exit code for precondition, remote and unexpected failures.
pub const EXIT_FAILURE: u8 = 1;
/// Exit code when the poll ceiling is reached.
pub const EXIT_TIMEOUT: u8 = 2;
/// Exit code after a user interrupt (128 + SIGINT).
pub const EXIT_INTERRUPTED: u8 = 130;

/// Core error type for a research run.
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("{env_var} environment variable not set. Get your key at https://tavily.com")]
    MissingCredential { env_var: String },
    #[error("invalid model '{0}'. Must be one of: mini, pro, auto")]
    InvalidModel(String),
    #[error("invalid citation format '{0}'. Must be one of: numbered, mla, apa, chicago")]
    InvalidCitationFormat(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to submit research request: {0}")]
    Submission(String),
    #[error("remote research job failed: {0}")]
    RemoteFailure(String),
    #[error("research timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("research API returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to write report to {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("research cancelled")]
    Interrupted,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResearchError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }

    pub fn output(path: PathBuf, source: std::io::Error) -> Self {
        Self::Output { path, source }
    }

    /// Process exit code associated with this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Timeout { .. } => EXIT_TIMEOUT,
            Self::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }

    /// Prefix used when reporting the error on stderr.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "Timeout",
            Self::RemoteFailure(_) | Self::Submission(_) => "Research failed",
            Self::Interrupted => "Cancelled",
            Self::Http { .. } | Self::Transport(_) | Self::Other(_) => "Unexpected error",
            _ => "Error",
        }
    }
}

impl From<reqwest::Error> for ResearchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Failures raised while loading or validating an output schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema must have 'properties' key at root level")]
    MissingPropertiesKey,
    #[error("property '{path}' missing required 'type' field")]
    MissingType { path: String },
    #[error(
        "property '{path}' missing required 'description' field; descriptions guide content extraction"
    )]
    MissingDescription { path: String },
    #[error("invalid JSON in schema file {path}: {source}")]
    InvalidSchemaFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read schema file {path}: {source}")]
    SchemaIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("schema argument is neither a valid file path nor valid JSON: {source}")]
    InvalidSchemaArgument {
        #[source]
        source: serde_json::Error,
    },
}
