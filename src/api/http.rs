//! reqwest-backed StudyApi implementation
//!
//! Plain request/response endpoints share one JSON POST helper; the plan
//! endpoint streams its body through [`FrameReader`]. No retry or backoff
//! anywhere: a failed call is reported to the caller and that is it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    ApiError, ChatReply, ChatRequest, PlanRequest, PlanStreamOutcome, SearchRequest, StudyApi, TaskUpdateDetect,
    TaskUpdateExecute,
};
use crate::config::ServerConfig;
use crate::stream::{FrameReader, PlanEvent};

/// HTTP client for a study-platform server
pub struct HttpApi {
    base_url: String,
    http: Client,
}

impl HttpApi {
    /// Create a client from server configuration
    pub fn new(config: &ServerConfig) -> Result<Self, ApiError> {
        debug!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "HttpApi::new: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// POST a JSON payload and decode a JSON reply
    ///
    /// A non-2xx status surfaces the response body as the error detail.
    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "post_json: called");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "post_json: non-success status");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl StudyApi for HttpApi {
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ApiError> {
        debug!(id = %request.id, messages = request.messages.len(), "chat: called");
        let value = self.post_json("/api/chat1/stream", &request).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn stream_plan(
        &self,
        request: PlanRequest,
        events: mpsc::Sender<PlanEvent>,
    ) -> Result<PlanStreamOutcome, ApiError> {
        let url = format!("{}/api/learning/plan/stream_generate", self.base_url);
        debug!(%url, id = %request.id, update = request.advise.is_some(), "stream_plan: called");
        let body = request.to_body()?;

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "stream_plan: non-success status");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut reader = FrameReader::new(response.bytes_stream());
        let mut outcome = PlanStreamOutcome::default();
        while let Some(event) = reader.next_event().await? {
            match &event {
                PlanEvent::Introduction(introduction) => outcome.introduction = Some(introduction.clone()),
                PlanEvent::Done { plan } => outcome.plan = plan.clone(),
                _ => {}
            }
            // The receiver hanging up must not abort the read loop
            let _ = events.send(event).await;
        }

        debug!(
            got_plan = outcome.plan.is_some(),
            got_introduction = outcome.introduction.is_some(),
            "stream_plan: stream ended"
        );
        Ok(outcome)
    }

    async fn generate_task(&self, step: Value) -> Result<Value, ApiError> {
        self.post_json("/api/task/generate", &step).await
    }

    async fn web_search(&self, request: SearchRequest) -> Result<Value, ApiError> {
        self.post_json("/api/web/search", &request).await
    }

    async fn video_search(&self, request: SearchRequest) -> Result<Value, ApiError> {
        self.post_json("/api/video/search", &request).await
    }

    async fn image_search(&self, request: SearchRequest) -> Result<Value, ApiError> {
        self.post_json("/api/image/search", &request).await
    }

    async fn detect_task_update(&self, request: TaskUpdateDetect) -> Result<Value, ApiError> {
        self.post_json("/api/task/update/detect", &request).await
    }

    async fn execute_task_update(&self, request: TaskUpdateExecute) -> Result<Value, ApiError> {
        self.post_json("/api/task/update/execute", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ServerConfig {
            base_url: "http://localhost:5001/".to_string(),
            ..Default::default()
        };
        let api = HttpApi::new(&config).unwrap();
        assert_eq!(api.base_url, "http://localhost:5001");
    }
}
