use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, instrument};

use super::{RetrievalResult, Retriever};
use crate::api::{JobStatus, RequestHandle, ResearchApi};
use crate::request::{DEFAULT_POLL_INTERVAL, MAX_POLL_TIME};
use crate::{Progress, ResearchError, ResearchRequest};

/// Two-step retrieval: submit the job, then poll its status until it settles.
pub struct PollingRetriever {
    api: Arc<dyn ResearchApi>,
    poll_interval: Duration,
    max_poll_time: Duration,
    progress: Progress,
}

impl PollingRetriever {
    pub fn new(api: Arc<dyn ResearchApi>) -> Self {
        Self {
            api,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
            max_poll_time: Duration::from_secs(MAX_POLL_TIME),
            progress: Progress::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_time(mut self, ceiling: Duration) -> Self {
        self.max_poll_time = ceiling;
        self
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }
}

#[async_trait]
impl Retriever for PollingRetriever {
    #[instrument(name = "retrieve.poll", skip_all, fields(model = %request.model()))]
    async fn retrieve(&self, request: &ResearchRequest) -> Result<RetrievalResult, ResearchError> {
        self.progress
            .status(format!("Initiating research on: {}", request.topic()));

        let handle = self.api.submit(request).await?.handle()?;
        info!(request_id = %handle, "research job submitted");
        self.progress.status(format!("Request ID: {handle}"));

        let started = Instant::now();
        timeout_at(started + self.max_poll_time, self.poll_until_settled(&handle, started))
            .await
            .unwrap_or_else(|_| Err(self.timed_out()))
    }
}

impl PollingRetriever {
    async fn poll_until_settled(
        &self,
        handle: &RequestHandle,
        started: Instant,
    ) -> Result<RetrievalResult, ResearchError> {
        let mut polls = 0u32;
        while started.elapsed() < self.max_poll_time {
            let response = self.api.status(handle).await?;
            polls += 1;

            match response.job_status() {
                JobStatus::Completed => {
                    info!(polls, "research job completed");
                    return Ok(RetrievalResult {
                        content: response.content.unwrap_or_default(),
                        sources: response.sources.unwrap_or_default(),
                        elapsed_seconds: response.response_time,
                    });
                }
                JobStatus::Failed => {
                    let message = response
                        .error_message()
                        .unwrap_or_else(|| "Unknown error".to_string());
                    return Err(ResearchError::RemoteFailure(message));
                }
                JobStatus::Pending(status) => {
                    debug!(%status, polls, "research job still in progress");
                    self.progress.status(format!(
                        "Status: {status}... waiting {}s",
                        self.poll_interval.as_secs()
                    ));
                    sleep(self.poll_interval).await;
                }
            }
        }

        Err(self.timed_out())
    }

    fn timed_out(&self) -> ResearchError {
        ResearchError::Timeout {
            seconds: self.max_poll_time.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChunkStream, StatusResponse, SubmitResponse};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted status responses; repeats the last one once exhausted.
    struct ScriptedApi {
        request_id: Option<String>,
        statuses: Mutex<VecDeque<StatusResponse>>,
        last: Mutex<Option<StatusResponse>>,
        polls: AtomicUsize,
    }

    impl ScriptedApi {
        fn new(statuses: Vec<StatusResponse>) -> Self {
            Self {
                request_id: Some("req-42".into()),
                statuses: Mutex::new(statuses.into()),
                last: Mutex::new(None),
                polls: AtomicUsize::new(0),
            }
        }
    }

    fn status(name: &str) -> StatusResponse {
        StatusResponse {
            status: Some(name.to_string()),
            ..StatusResponse::default()
        }
    }

    #[async_trait]
    impl ResearchApi for ScriptedApi {
        async fn submit(&self, _: &ResearchRequest) -> Result<SubmitResponse, ResearchError> {
            Ok(SubmitResponse {
                request_id: self.request_id.clone(),
            })
        }

        async fn open_stream(&self, _: &ResearchRequest) -> Result<ChunkStream, ResearchError> {
            unreachable!("polling never opens a stream")
        }

        async fn status(&self, handle: &RequestHandle) -> Result<StatusResponse, ResearchError> {
            assert_eq!(handle.as_str(), "req-42");
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.statuses.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = Some(next);
            }
            Ok(last.clone().expect("script must not be empty"))
        }
    }

    fn retriever(api: Arc<ScriptedApi>) -> PollingRetriever {
        PollingRetriever::new(api)
            .with_poll_interval(Duration::from_secs(5))
            .with_progress(Progress::quiet())
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_two_sleeps() {
        let completed = StatusResponse {
            status: Some("completed".into()),
            content: Some(json!("final report")),
            sources: Some(vec![json!({"url": "https://example.org"})]),
            error: None,
            response_time: Some(31.0),
        };
        let api = Arc::new(ScriptedApi::new(vec![
            status("running"),
            status("running"),
            completed,
        ]));

        let started = Instant::now();
        let result = retriever(api.clone())
            .retrieve(&ResearchRequest::new("topic"))
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(15));
        assert_eq!(api.polls.load(Ordering::SeqCst), 3);
        assert_eq!(result.content, json!("final report"));
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.elapsed_seconds, Some(31.0));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_polling_immediately() {
        let failed = StatusResponse {
            status: Some("failed".into()),
            error: Some(json!("quota exceeded")),
            ..StatusResponse::default()
        };
        let api = Arc::new(ScriptedApi::new(vec![failed, status("completed")]));

        let started = Instant::now();
        let err = retriever(api.clone())
            .retrieve(&ResearchRequest::new("topic"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::RemoteFailure(ref msg) if msg == "quota exceeded"));
        assert_eq!(api.polls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_message_uses_default() {
        let api = Arc::new(ScriptedApi::new(vec![status("failed")]));
        let err = retriever(api)
            .retrieve(&ResearchRequest::new("topic"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::RemoteFailure(ref msg) if msg == "Unknown error"));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_ceiling() {
        let api = Arc::new(ScriptedApi::new(vec![status("running")]));

        let started = Instant::now();
        let err = retriever(api.clone())
            .retrieve(&ResearchRequest::new("topic"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::Timeout { seconds: 600 }));
        assert_eq!(err.exit_code(), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(600) && elapsed < Duration::from_secs(605));
        assert_eq!(api.polls.load(Ordering::SeqCst), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_ceiling_is_respected() {
        let api = Arc::new(ScriptedApi::new(vec![status("queued")]));
        let err = retriever(api.clone())
            .with_max_poll_time(Duration::from_secs(12))
            .retrieve(&ResearchRequest::new("topic"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::Timeout { seconds: 12 }));
        assert_eq!(api.polls.load(Ordering::SeqCst), 3);
    }

    /// Accepts submissions, then never answers a status request.
    struct HangingStatusApi;

    #[async_trait]
    impl ResearchApi for HangingStatusApi {
        async fn submit(&self, _: &ResearchRequest) -> Result<SubmitResponse, ResearchError> {
            Ok(SubmitResponse {
                request_id: Some("req-42".into()),
            })
        }

        async fn open_stream(&self, _: &ResearchRequest) -> Result<ChunkStream, ResearchError> {
            unreachable!("polling never opens a stream")
        }

        async fn status(&self, _: &RequestHandle) -> Result<StatusResponse, ResearchError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_status_request_still_times_out_at_ceiling() {
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(3600),
            PollingRetriever::new(Arc::new(HangingStatusApi))
                .with_progress(Progress::quiet())
                .retrieve(&ResearchRequest::new("topic")),
        )
        .await
        .expect("retrieval must end at the poll ceiling");

        let err = outcome.unwrap_err();
        assert!(matches!(err, ResearchError::Timeout { seconds: 600 }));
        assert_eq!(err.exit_code(), 2);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(600) && elapsed < Duration::from_secs(605));
    }

    #[tokio::test(start_paused = true)]
    async fn structured_failure_message_is_reported() {
        let failed = StatusResponse {
            status: Some("failed".into()),
            error: Some(json!({"code": "quota"})),
            ..StatusResponse::default()
        };
        let api = Arc::new(ScriptedApi::new(vec![failed]));

        let err = retriever(api)
            .retrieve(&ResearchRequest::new("topic"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResearchError::RemoteFailure(ref msg) if msg == r#"{"code":"quota"}"#
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_request_id_is_submission_error() {
        let mut api = ScriptedApi::new(vec![status("running")]);
        api.request_id = None;
        let api = Arc::new(api);

        let err = retriever(api.clone())
            .retrieve(&ResearchRequest::new("topic"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::Submission(_)));
        assert_eq!(api.polls.load(Ordering::SeqCst), 0);
    }
}
