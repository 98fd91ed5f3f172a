//! studyctl - CLI client for the study-platform learning API
//!
//! Entry point: logging setup, config loading, command dispatch.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use eyre::{Context, Result};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use studyctl::api::{
    Advise, ChatMessage, HttpApi, PlanRequest, SearchRequest, StudyApi, TaskUpdateDetect, TaskUpdateExecute,
};
use studyctl::cli::{Cli, Command, SearchCommand, TaskCommand};
use studyctl::config::Config;
use studyctl::repl::{InteractiveSession, print_plan_events};
use studyctl::session::{SessionConfig, merge_introduction};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("studyctl")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    // Log to a file so output doesn't garble the interactive prompt
    let log_file = fs::File::create(log_dir.join("studyctl.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }
    if let Some(lang) = cli.lang {
        config.server.lang = lang;
    }

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;
    info!(server = %config.server.base_url, lang = %config.server.lang, "studyctl starting");

    let api: Arc<dyn StudyApi> = Arc::new(HttpApi::new(&config.server)?);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Interactive { save } => cmd_interactive(api, &config, save).await,
        Command::Plan {
            prompt,
            id,
            update_steps,
            reason,
            save,
        } => cmd_plan(api, &config, prompt, id, update_steps, reason, save).await,
        Command::Task { command } => match command {
            TaskCommand::Generate { step_file, id } => cmd_task_generate(api, &config, &step_file, id).await,
            TaskCommand::UpdateDetect {
                task_file,
                message,
                chat_id,
            } => cmd_task_update_detect(api, &config, &task_file, message, chat_id).await,
            TaskCommand::UpdateExecute {
                task_file,
                suggestion_file,
                chat_id,
            } => cmd_task_update_execute(api, &config, &task_file, &suggestion_file, chat_id).await,
        },
        Command::Search { command } => cmd_search(api, &config, command).await,
    }
}

/// Drive the interactive multi-round session
async fn cmd_interactive(api: Arc<dyn StudyApi>, config: &Config, save: bool) -> Result<()> {
    let session_config = SessionConfig {
        lang: config.server.lang.clone(),
        output_dir: config.output.dir.clone(),
        save_plans: save || config.output.save_plans,
    };

    InteractiveSession::new(api, session_config).run().await
}

/// One-shot streaming plan generation, printing frames as they arrive
async fn cmd_plan(
    api: Arc<dyn StudyApi>,
    config: &Config,
    prompt: String,
    id: Option<String>,
    update_steps: Option<String>,
    reason: Option<String>,
    save: bool,
) -> Result<()> {
    let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let advise = match update_steps {
        Some(steps) => Some(
            Advise::from_manual(&steps, reason.as_deref().unwrap_or_default())
                .map_err(|e| eyre::eyre!("invalid --update-steps: {}", e))?,
        ),
        None => None,
    };

    println!("Session id: {}", id);
    let request = PlanRequest {
        id: id.clone(),
        messages: vec![ChatMessage::user(prompt)],
        lang: config.server.lang.clone(),
        advise,
    };

    let (tx, rx) = mpsc::channel(100);
    let printer = tokio::spawn(print_plan_events(rx));
    let outcome = api.stream_plan(request, tx).await?;
    let _ = printer.await;

    let Some(mut plan) = outcome.plan else {
        println!("Stream ended without a plan.");
        return Ok(());
    };
    merge_introduction(&mut plan, outcome.introduction);

    let steps = plan["plan"].as_array().map(Vec::len).unwrap_or(0);
    println!("Plan contains {} steps.", steps);

    if save {
        fs::create_dir_all(&config.output.dir).context("Failed to create output directory")?;
        let path = config
            .output
            .dir
            .join(format!("plan_{}_{}.json", id, Utc::now().timestamp()));
        fs::write(&path, serde_json::to_string_pretty(&plan)?).context("Failed to write plan file")?;
        println!("Plan saved to {}", path.display());
    }

    Ok(())
}

/// Generate the task document for a single step record
async fn cmd_task_generate(api: Arc<dyn StudyApi>, config: &Config, step_file: &PathBuf, id: Option<String>) -> Result<()> {
    let mut step = read_json(step_file)?;
    if let Some(object) = step.as_object_mut() {
        object.insert(
            "id".to_string(),
            json!(id.unwrap_or_else(|| Uuid::new_v4().to_string())),
        );
        object
            .entry("lang".to_string())
            .or_insert_with(|| json!(config.server.lang));
    }

    let task = api.generate_task(step).await?;
    print_json(&task)
}

async fn cmd_task_update_detect(
    api: Arc<dyn StudyApi>,
    config: &Config,
    task_file: &PathBuf,
    message: String,
    chat_id: Option<String>,
) -> Result<()> {
    let request = TaskUpdateDetect {
        task_data: read_json(task_file)?,
        user_message: message,
        lang: config.server.lang.clone(),
        chat_id: chat_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
    };

    let result = api.detect_task_update(request).await?;
    print_json(&result)
}

async fn cmd_task_update_execute(
    api: Arc<dyn StudyApi>,
    config: &Config,
    task_file: &PathBuf,
    suggestion_file: &PathBuf,
    chat_id: Option<String>,
) -> Result<()> {
    let request = TaskUpdateExecute {
        task_data: read_json(task_file)?,
        suggestion: read_json(suggestion_file)?,
        lang: config.server.lang.clone(),
        chat_id: chat_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
    };

    let result = api.execute_task_update(request).await?;
    print_json(&result)
}

async fn cmd_search(api: Arc<dyn StudyApi>, config: &Config, command: SearchCommand) -> Result<()> {
    let request = |keyword: &str| SearchRequest {
        search_keyword: keyword.to_string(),
        lang: config.server.lang.clone(),
    };

    let result = match command {
        SearchCommand::Web { keyword } => api.web_search(request(&keyword)).await?,
        SearchCommand::Video { keyword } => api.video_search(request(&keyword)).await?,
        SearchCommand::Image { keyword } => api.image_search(request(&keyword)).await?,
    };

    print_json(&result)
}

fn read_json(path: &PathBuf) -> Result<Value> {
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).context(format!("Failed to parse {} as JSON", path.display()))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
