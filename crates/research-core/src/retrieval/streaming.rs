use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use super::{RetrievalResult, Retriever, SseDecoder, StreamAccumulator, StreamSignal};
use crate::api::ResearchApi;
use crate::{Progress, ResearchError, ResearchRequest};

/// Single-request retrieval over a server-sent-event stream.
pub struct StreamingRetriever {
    api: Arc<dyn ResearchApi>,
    progress: Progress,
}

impl StreamingRetriever {
    pub fn new(api: Arc<dyn ResearchApi>) -> Self {
        Self {
            api,
            progress: Progress::default(),
        }
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    fn apply(&self, accumulator: &mut StreamAccumulator, line: &str, malformed: &mut usize) {
        match accumulator.apply_line(line) {
            StreamSignal::Event { tools } => {
                for tool in tools {
                    debug!(%tool, "research tool invoked");
                    self.progress.tool(&tool);
                }
            }
            StreamSignal::Malformed => *malformed += 1,
            StreamSignal::Skipped | StreamSignal::Done => {}
        }
    }
}

#[async_trait]
impl Retriever for StreamingRetriever {
    #[instrument(name = "retrieve.stream", skip_all, fields(model = %request.model()))]
    async fn retrieve(&self, request: &ResearchRequest) -> Result<RetrievalResult, ResearchError> {
        let started = Instant::now();
        let mut stream = self.api.open_stream(request).await?;

        let mut decoder = SseDecoder::new();
        let mut accumulator = StreamAccumulator::new();
        let mut malformed = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for line in decoder.push(&chunk) {
                self.apply(&mut accumulator, &line, &mut malformed);
            }
        }
        if let Some(line) = decoder.finish() {
            self.apply(&mut accumulator, &line, &mut malformed);
        }
        self.progress.end_line();

        let elapsed = started.elapsed().as_secs_f64();
        info!(
            content_len = accumulator.content().len(),
            sources = accumulator.sources().len(),
            malformed,
            "research stream finished"
        );

        let (content, sources) = accumulator.finish(request.output_schema().is_some());
        Ok(RetrievalResult {
            content,
            sources,
            elapsed_seconds: Some(elapsed),
        })
    }
}
