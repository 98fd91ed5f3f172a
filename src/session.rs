//! Multi-round conversation orchestrator
//!
//! A [`Session`] owns a stable session id and an append-only transcript, and
//! drives one round at a time: chat turn, plan (re)generation over the
//! streaming endpoint, then a concurrent fan-out of per-step task generation
//! whose results rejoin the plan by original index. The session never touches
//! a terminal; interactive drivers live in [`crate::repl`].

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{Advise, ApiError, ChatMessage, ChatRequest, PlanRequest, StudyApi};
use crate::stream::PlanEvent;

/// Errors from driving a session round
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to write plan file: {0}")]
    Persist(#[from] std::io::Error),
}

/// Per-session settings, passed in at construction
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Language tag sent with every call
    pub lang: String,

    /// Directory for persisted plan files
    pub output_dir: PathBuf,

    /// Persist each completed plan to `plan_and_tasks_<id>.json`
    pub save_plans: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            output_dir: PathBuf::from("output"),
            save_plans: false,
        }
    }
}

/// Input for one conversation round
#[derive(Debug, Clone)]
pub struct RoundInput {
    /// The user's utterance for this round
    pub utterance: String,

    /// Advise to fall back on when an update round has no machine-suggested
    /// steps; ignored on create rounds and when a suggestion exists
    pub manual_advise: Option<Advise>,
}

impl RoundInput {
    pub fn new(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            manual_advise: None,
        }
    }

    pub fn with_manual_advise(mut self, advise: Advise) -> Self {
        self.manual_advise = Some(advise);
        self
    }
}

/// Result of the chat phase of a round
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// Assistant reply text, already appended to the transcript
    pub response: String,

    /// Machine-suggested update advise, when the server offered one
    pub suggested: Option<Advise>,
}

/// Result of the plan phase of a round
#[derive(Debug, Clone)]
pub struct PlanResult {
    /// The plan document, steps carrying their generated `task` fields
    pub plan: Value,

    /// Where the plan was written, when persistence is enabled
    pub saved_to: Option<PathBuf>,
}

/// Result of one full round
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round: u64,
    pub response: String,
    pub plan: Option<Value>,
    pub saved_to: Option<PathBuf>,
}

/// One interactive conversation against the study-platform API
pub struct Session {
    api: Arc<dyn StudyApi>,
    config: SessionConfig,
    id: String,
    transcript: Vec<ChatMessage>,
    round: u64,
}

impl Session {
    /// Create a session with a fresh id
    pub fn new(api: Arc<dyn StudyApi>, config: SessionConfig) -> Self {
        Self::with_id(api, config, Uuid::new_v4().to_string())
    }

    /// Create a session reusing an existing id
    pub fn with_id(api: Arc<dyn StudyApi>, config: SessionConfig, id: String) -> Self {
        debug!(%id, "Session::with_id: called");
        Self {
            api,
            config,
            id,
            transcript: Vec::new(),
            round: 0,
        }
    }

    /// Stable identifier correlating all calls of this conversation
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rounds started so far (failed rounds count)
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Whether the plan phase of the current round is an update (round > 1)
    pub fn is_update_round(&self) -> bool {
        self.round > 1
    }

    /// Chat phase: append the utterance, call the chat endpoint with the full
    /// transcript, append the assistant reply.
    ///
    /// On failure the transcript is left exactly as it was before the call.
    pub async fn chat_turn(&mut self, utterance: &str) -> Result<ChatOutcome, SessionError> {
        self.round += 1;
        debug!(round = self.round, "chat_turn: called");

        self.transcript.push(ChatMessage::user(utterance));
        let request = ChatRequest {
            id: self.id.clone(),
            messages: self.transcript.clone(),
            lang: self.config.lang.clone(),
        };

        let reply = match self.api.chat(request).await {
            Ok(reply) => reply,
            Err(e) => {
                // A failed turn must not leave the utterance behind
                self.transcript.pop();
                return Err(e.into());
            }
        };

        self.transcript.push(ChatMessage::assistant(&reply.response));
        let suggested = reply.suggested_advise();
        debug!(suggested = suggested.is_some(), "chat_turn: reply appended");

        Ok(ChatOutcome {
            response: reply.response,
            suggested,
        })
    }

    /// Plan phase: stream-generate the plan, merge any introduction frame,
    /// fan out task generation, optionally persist.
    ///
    /// `advise` only applies to update rounds; decoded stream events are
    /// forwarded to `events` as they arrive. Returns `None` when the stream
    /// ended without a plan.
    pub async fn plan_round(
        &mut self,
        advise: Option<Advise>,
        events: mpsc::Sender<PlanEvent>,
    ) -> Result<Option<PlanResult>, SessionError> {
        let advise = if self.is_update_round() { advise } else { None };
        debug!(round = self.round, update = advise.is_some(), "plan_round: called");

        let request = PlanRequest {
            id: self.id.clone(),
            messages: self.transcript.clone(),
            lang: self.config.lang.clone(),
            advise,
        };

        let outcome = self.api.stream_plan(request, events).await?;
        let Some(mut plan) = outcome.plan else {
            warn!(round = self.round, "plan_round: stream ended without a plan");
            return Ok(None);
        };

        merge_introduction(&mut plan, outcome.introduction);
        self.generate_tasks(&mut plan).await;

        let saved_to = if self.config.save_plans {
            Some(self.persist_plan(&plan)?)
        } else {
            None
        };

        Ok(Some(PlanResult { plan, saved_to }))
    }

    /// One full round: chat turn, then the plan/task phases
    ///
    /// A chat failure aborts the round. A plan failure only skips the
    /// plan/task phases; the chat exchange stands.
    pub async fn run_round(
        &mut self,
        input: RoundInput,
        events: mpsc::Sender<PlanEvent>,
    ) -> Result<RoundOutcome, SessionError> {
        let chat = self.chat_turn(&input.utterance).await?;

        // Machine-suggested steps win over the manual fallback
        let advise = chat.suggested.clone().or(input.manual_advise);

        let (plan, saved_to) = match self.plan_round(advise, events).await {
            Ok(Some(result)) => (Some(result.plan), result.saved_to),
            Ok(None) => (None, None),
            Err(e) => {
                warn!(round = self.round, error = %e, "run_round: plan generation failed");
                (None, None)
            }
        };

        Ok(RoundOutcome {
            round: self.round,
            response: chat.response,
            plan,
            saved_to,
        })
    }

    /// Fan out one task-generation call per plan step, concurrently, and
    /// rejoin results by original index.
    ///
    /// A failed call leaves its step without a `task` field; siblings are
    /// unaffected.
    async fn generate_tasks(&self, plan: &mut Value) {
        let Some(steps) = plan.get("plan").and_then(Value::as_array) else {
            debug!("generate_tasks: plan carries no step list");
            return;
        };

        let calls: Vec<_> = steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let mut payload = step.clone();
                if let Some(object) = payload.as_object_mut() {
                    object.insert("id".to_string(), json!(self.id));
                }
                let api = Arc::clone(&self.api);
                async move { (index, api.generate_task(payload).await) }
            })
            .collect();

        info!(steps = calls.len(), "generate_tasks: fanning out");
        let results = futures::future::join_all(calls).await;

        let Some(steps) = plan.get_mut("plan").and_then(Value::as_array_mut) else {
            return;
        };
        for (index, result) in results {
            match result {
                Ok(task) => {
                    if let Some(slot) = steps.get_mut(index).and_then(Value::as_object_mut) {
                        slot.insert("task".to_string(), task);
                    }
                }
                Err(e) => warn!(step = index + 1, error = %e, "generate_tasks: task generation failed"),
            }
        }
    }

    /// Write the plan to `<output_dir>/plan_and_tasks_<session_id>.json`
    fn persist_plan(&self, plan: &Value) -> Result<PathBuf, SessionError> {
        fs::create_dir_all(&self.config.output_dir)?;
        let path = self.config.output_dir.join(format!("plan_and_tasks_{}.json", self.id));
        let pretty = serde_json::to_string_pretty(plan).map_err(ApiError::Json)?;
        fs::write(&path, pretty)?;
        info!(path = %path.display(), "persist_plan: plan written");
        Ok(path)
    }
}

/// Attach a captured introduction under the plan's `introduction` key, unless
/// the plan already carries one of its own
pub fn merge_introduction(plan: &mut Value, introduction: Option<Value>) {
    let Some(introduction) = introduction else { return };
    if let Some(object) = plan.as_object_mut()
        && !object.contains_key("introduction")
    {
        object.insert("introduction".to_string(), introduction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use crate::api::{ChatReply, PlanStreamOutcome};

    fn session_with(api: MockApi) -> Session {
        Session::new(Arc::new(api), SessionConfig::default())
    }

    fn events() -> mpsc::Sender<PlanEvent> {
        // Receiver intentionally dropped; senders must tolerate that
        mpsc::channel(100).0
    }

    fn three_step_plan() -> Value {
        json!({
            "plan": [
                { "step": 1, "title": "a" },
                { "step": 2, "title": "b" },
                { "step": 3, "title": "c" },
            ]
        })
    }

    fn reply(text: &str) -> ChatReply {
        ChatReply {
            response: text.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_chat_turn_appends_both_messages() {
        let api = MockApi::new();
        api.queue_chat(reply("hello back"));
        let mut session = session_with(api);

        let outcome = session.chat_turn("hello").await.unwrap();
        assert_eq!(outcome.response, "hello back");
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[0].content, "hello");
        assert_eq!(session.transcript()[1].content, "hello back");
    }

    #[tokio::test]
    async fn test_chat_failure_leaves_transcript_unchanged() {
        let api = MockApi::new();
        api.queue_chat_error(ApiError::Api {
            status: 500,
            message: "server down".to_string(),
        });
        let mut session = session_with(api);

        let result = session.chat_turn("hello").await;
        assert!(matches!(
            result,
            Err(SessionError::Api(ApiError::Api { status: 500, .. }))
        ));
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_failed_chat_skips_plan_generation() {
        let api = MockApi::new();
        api.queue_chat_error(ApiError::Api {
            status: 500,
            message: "server down".to_string(),
        });
        let api = Arc::new(api);
        let mut session = Session::new(Arc::clone(&api) as Arc<dyn StudyApi>, SessionConfig::default());

        let result = session.run_round(RoundInput::new("hello"), events()).await;
        assert!(result.is_err());
        assert!(api.plan_requests.lock().unwrap().is_empty());
        assert!(session.transcript().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_rejoins_by_index() {
        let mut api = MockApi::new();
        api.queue_plan(PlanStreamOutcome {
            plan: Some(three_step_plan()),
            introduction: None,
        });
        // Step 2 completes last, step 3 first
        api.delay_task(1, 30);
        api.delay_task(2, 50);
        api.delay_task(3, 10);
        let api = Arc::new(api);
        let mut session = Session::new(Arc::clone(&api) as Arc<dyn StudyApi>, SessionConfig::default());
        session.round = 1;

        let result = session.plan_round(None, events()).await.unwrap().unwrap();
        let steps = result.plan["plan"].as_array().unwrap();

        // Exactly one call per step, each carrying the session id
        let requests = api.task_requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        for request in requests.iter() {
            assert_eq!(request["id"], json!(session.id()));
        }

        // Completion order differed from step order...
        assert_eq!(*api.task_completions.lock().unwrap(), vec![3, 1, 2]);

        // ...but each result landed back in its own step slot
        assert_eq!(steps[0]["task"]["title"], "task-1");
        assert_eq!(steps[1]["task"]["title"], "task-2");
        assert_eq!(steps[2]["task"]["title"], "task-3");
        assert_eq!(steps[0]["title"], "a");
        assert_eq!(steps[1]["title"], "b");
        assert_eq!(steps[2]["title"], "c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_call_spares_siblings() {
        let mut api = MockApi::new();
        api.queue_plan(PlanStreamOutcome {
            plan: Some(three_step_plan()),
            introduction: None,
        });
        api.fail_task(2);
        let api = Arc::new(api);
        let mut session = Session::new(Arc::clone(&api) as Arc<dyn StudyApi>, SessionConfig::default());
        session.round = 1;

        let result = session.plan_round(None, events()).await.unwrap().unwrap();
        let steps = result.plan["plan"].as_array().unwrap();

        assert_eq!(steps[0]["task"]["title"], "task-1");
        assert!(steps[1].get("task").is_none());
        assert_eq!(steps[2]["task"]["title"], "task-3");
    }

    #[tokio::test]
    async fn test_create_round_sends_no_advise() {
        let api = Arc::new(MockApi::new());
        let mut session = Session::new(Arc::clone(&api) as Arc<dyn StudyApi>, SessionConfig::default());

        session
            .run_round(RoundInput::new("teach me rust"), events())
            .await
            .unwrap();

        let requests = api.plan_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].advise.is_none());
    }

    #[tokio::test]
    async fn test_update_round_prefers_machine_suggestion() {
        let api = Arc::new(MockApi::new());
        api.queue_chat(reply("first"));
        api.queue_chat(ChatReply {
            response: "second".to_string(),
            update_steps: vec![2, 4],
            reason: "go deeper".to_string(),
        });
        let mut session = Session::new(Arc::clone(&api) as Arc<dyn StudyApi>, SessionConfig::default());

        session.run_round(RoundInput::new("round one"), events()).await.unwrap();

        let manual = Advise::from_manual("1", "manual reason").unwrap();
        session
            .run_round(RoundInput::new("round two").with_manual_advise(manual), events())
            .await
            .unwrap();

        let requests = api.plan_requests.lock().unwrap();
        let advise = requests[1].advise.as_ref().unwrap();
        assert_eq!(advise.update_steps, vec![2, 4]);
        assert_eq!(advise.reason, "go deeper");
    }

    #[tokio::test]
    async fn test_update_round_falls_back_to_manual_advise() {
        let api = Arc::new(MockApi::new());
        let mut session = Session::new(Arc::clone(&api) as Arc<dyn StudyApi>, SessionConfig::default());

        session.run_round(RoundInput::new("round one"), events()).await.unwrap();

        let manual = Advise::from_manual("1, 3", "focus more").unwrap();
        session
            .run_round(RoundInput::new("round two").with_manual_advise(manual.clone()), events())
            .await
            .unwrap();

        let requests = api.plan_requests.lock().unwrap();
        assert_eq!(requests[1].advise, Some(manual));
    }

    #[tokio::test]
    async fn test_introduction_merged_when_plan_lacks_one() {
        let api = MockApi::new();
        api.queue_plan(PlanStreamOutcome {
            plan: Some(json!({ "plan": [] })),
            introduction: Some(json!({ "title": "Rust 101" })),
        });
        let mut session = session_with(api);
        session.round = 1;

        let result = session.plan_round(None, events()).await.unwrap().unwrap();
        assert_eq!(result.plan["introduction"]["title"], "Rust 101");
    }

    #[tokio::test]
    async fn test_introduction_does_not_overwrite_existing() {
        let api = MockApi::new();
        api.queue_plan(PlanStreamOutcome {
            plan: Some(json!({ "plan": [], "introduction": { "title": "original" } })),
            introduction: Some(json!({ "title": "captured" })),
        });
        let mut session = session_with(api);
        session.round = 1;

        let result = session.plan_round(None, events()).await.unwrap().unwrap();
        assert_eq!(result.plan["introduction"]["title"], "original");
    }

    #[tokio::test]
    async fn test_plan_failure_keeps_chat_exchange() {
        let api = MockApi::new();
        api.queue_chat(reply("sure"));
        api.queue_plan_error(ApiError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        });
        let mut session = session_with(api);

        let outcome = session.run_round(RoundInput::new("hello"), events()).await.unwrap();
        assert_eq!(outcome.response, "sure");
        assert!(outcome.plan.is_none());
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_plan_persisted_when_enabled() {
        let dir = tempfile::TempDir::new().unwrap();
        let api = MockApi::new();
        api.queue_plan(PlanStreamOutcome {
            plan: Some(three_step_plan()),
            introduction: None,
        });
        let config = SessionConfig {
            save_plans: true,
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut session = Session::new(Arc::new(api), config);
        session.round = 1;

        let result = session.plan_round(None, events()).await.unwrap().unwrap();
        let path = result.saved_to.unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("plan_and_tasks_{}.json", session.id())
        );

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["plan"][0]["task"]["title"], "task-1");
    }

    #[tokio::test]
    async fn test_plan_without_step_list_is_returned_untouched() {
        let api = Arc::new(MockApi::new());
        api.queue_plan(PlanStreamOutcome {
            plan: Some(json!({ "note": "empty" })),
            introduction: None,
        });
        let mut session = Session::new(Arc::clone(&api) as Arc<dyn StudyApi>, SessionConfig::default());
        session.round = 1;

        let result = session.plan_round(None, events()).await.unwrap().unwrap();
        assert_eq!(result.plan, json!({ "note": "empty" }));
        assert!(api.task_requests.lock().unwrap().is_empty());
    }
}
