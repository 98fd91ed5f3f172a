//! studyctl - CLI client for the study-platform learning API
//!
//! The study-platform service exposes a handful of HTTP endpoints: a chat
//! turn, a streaming learning-plan generator, per-step task generation,
//! task-update detect/execute, and web/video/image search. studyctl drives
//! them from the command line.
//!
//! # Core pieces
//!
//! - [`stream`] - line-framed streaming response reader (`data: ` frames)
//! - [`session`] - multi-round conversation orchestrator
//! - [`api`] - the [`api::StudyApi`] trait and its reqwest implementation
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface
//! - [`repl`] - interactive terminal driver for [`session::Session`]

pub mod api;
pub mod cli;
pub mod config;
pub mod repl;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use api::{
    Advise, ApiError, ChatMessage, ChatReply, ChatRequest, HttpApi, PlanRequest, PlanStreamOutcome, Role,
    SearchRequest, StudyApi, TaskUpdateDetect, TaskUpdateExecute,
};
pub use config::{Config, OutputConfig, ServerConfig};
pub use session::{
    ChatOutcome, PlanResult, RoundInput, RoundOutcome, Session, SessionConfig, SessionError, merge_introduction,
};
pub use stream::{FrameReader, PlanEvent};
