//! Interchangeable ways of obtaining a completed research result.

mod polling;
mod sse;
mod streaming;

use async_trait::async_trait;
use serde_json::Value;

use crate::{ResearchError, ResearchRequest};

pub use polling::PollingRetriever;
pub use sse::{SseDecoder, StreamAccumulator, StreamSignal};
pub use streaming::StreamingRetriever;

/// Output of a retrieval strategy, independent of how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub content: Value,
    pub sources: Vec<Value>,
    pub elapsed_seconds: Option<f64>,
}

/// Caller-selected retrieval strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetrievalMode {
    #[default]
    Poll,
    Stream,
}

impl RetrievalMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Poll => "polling",
            Self::Stream => "streaming",
        }
    }
}

/// Obtain a completed research result for `request`.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, request: &ResearchRequest) -> Result<RetrievalResult, ResearchError>;
}
