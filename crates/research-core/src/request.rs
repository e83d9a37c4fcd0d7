use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ResearchError;

/// Ceiling for a single research job, in seconds.
pub const MAX_POLL_TIME: u64 = 600;
pub const DEFAULT_POLL_INTERVAL: u64 = 5;

/// Research model offered by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchModel {
    #[default]
    Mini,
    Pro,
    Auto,
}

impl ResearchModel {
    pub const ALL: [ResearchModel; 3] = [Self::Mini, Self::Pro, Self::Auto];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mini => "mini",
            Self::Pro => "pro",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for ResearchModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResearchModel {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| ResearchError::InvalidModel(s.to_string()))
    }
}

/// How the service renders source references inside the content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationFormat {
    #[default]
    Numbered,
    Mla,
    Apa,
    Chicago,
}

impl CitationFormat {
    pub const ALL: [CitationFormat; 4] = [Self::Numbered, Self::Mla, Self::Apa, Self::Chicago];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numbered => "numbered",
            Self::Mla => "mla",
            Self::Apa => "apa",
            Self::Chicago => "chicago",
        }
    }
}

impl fmt::Display for CitationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CitationFormat {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| ResearchError::InvalidCitationFormat(s.to_string()))
    }
}

/// A validated research job description.
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    topic: String,
    model: ResearchModel,
    citation_format: CitationFormat,
    output_schema: Option<Value>,
    timeout: Duration,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            model: ResearchModel::default(),
            citation_format: CitationFormat::default(),
            output_schema: None,
            timeout: Duration::from_secs(MAX_POLL_TIME),
        }
    }

    pub fn with_model(mut self, model: ResearchModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_citation_format(mut self, citation_format: CitationFormat) -> Self {
        self.citation_format = citation_format;
        self
    }

    pub fn with_output_schema(mut self, schema: Option<Value>) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn model(&self) -> ResearchModel {
        self.model
    }

    pub fn citation_format(&self) -> CitationFormat {
        self.citation_format
    }

    pub fn output_schema(&self) -> Option<&Value> {
        self.output_schema.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
