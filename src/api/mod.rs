//! Study-platform API client module
//!
//! Provides the [`StudyApi`] trait covering every endpoint the CLI talks to,
//! the reqwest-backed [`HttpApi`] implementation, and the request/response
//! types shared by both.

mod client;
mod error;
mod http;
mod types;

pub use client::StudyApi;
pub use error::ApiError;
pub use http::HttpApi;
pub use types::{
    Advise, ChatMessage, ChatReply, ChatRequest, PlanRequest, PlanStreamOutcome, Role, SearchRequest,
    TaskUpdateDetect, TaskUpdateExecute,
};

#[cfg(test)]
pub use client::mock;
