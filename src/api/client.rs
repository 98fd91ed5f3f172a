//! StudyApi trait definition

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    ApiError, ChatReply, ChatRequest, PlanRequest, PlanStreamOutcome, SearchRequest, TaskUpdateDetect,
    TaskUpdateExecute,
};
use crate::stream::PlanEvent;

/// Client for the study-platform endpoints
///
/// One method per remote operation; every call is independent and carries the
/// session id in its payload, so implementations hold no conversation state.
/// The trait exists so the orchestrator can be driven by a mock in tests.
#[async_trait]
pub trait StudyApi: Send + Sync {
    /// One chat turn carrying the full transcript
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ApiError>;

    /// Streaming plan generation
    ///
    /// Decoded events are forwarded to `events` as they arrive; the method
    /// returns once the stream ends, carrying the final plan and any
    /// introduction frame that was seen.
    async fn stream_plan(
        &self,
        request: PlanRequest,
        events: mpsc::Sender<PlanEvent>,
    ) -> Result<PlanStreamOutcome, ApiError>;

    /// Generate the task document for one plan step
    async fn generate_task(&self, step: Value) -> Result<Value, ApiError>;

    async fn web_search(&self, request: SearchRequest) -> Result<Value, ApiError>;

    async fn video_search(&self, request: SearchRequest) -> Result<Value, ApiError>;

    async fn image_search(&self, request: SearchRequest) -> Result<Value, ApiError>;

    /// Ask the server whether a task needs updating after user feedback
    async fn detect_task_update(&self, request: TaskUpdateDetect) -> Result<Value, ApiError>;

    /// Apply a previously detected update suggestion to a task
    async fn execute_task_update(&self, request: TaskUpdateExecute) -> Result<Value, ApiError>;
}
