//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// studyctl - CLI client for the study-platform learning API
#[derive(Parser)]
#[command(
    name = "studyctl",
    about = "Command-line client for the study-platform learning API",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Server base URL (overrides config)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Language tag, zh or en (overrides config)
    #[arg(long, global = true)]
    pub lang: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Multi-round conversation: chat, plan generation, task fan-out
    Interactive {
        /// Save each completed plan to a JSON file
        #[arg(long)]
        save: bool,
    },

    /// One-shot streaming plan generation
    Plan {
        /// Prompt describing what to learn
        prompt: String,

        /// Session id to reuse (fresh one generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Step numbers to update, comma separated (switches to update mode)
        #[arg(long = "update-steps")]
        update_steps: Option<String>,

        /// Reason for the update
        #[arg(long)]
        reason: Option<String>,

        /// Save the final plan to a JSON file
        #[arg(long)]
        save: bool,
    },

    /// Task generation and updating
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Web, video, and image search
    Search {
        #[command(subcommand)]
        command: SearchCommand,
    },
}

/// Task subcommands
#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// Generate the task document for one plan step
    Generate {
        /// Path to a JSON file holding the step record
        step_file: PathBuf,

        /// Session id to attach (fresh one generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Ask the server whether a task needs updating
    UpdateDetect {
        /// Path to a JSON file holding the task data
        task_file: PathBuf,

        /// User feedback driving the update
        message: String,

        /// Chat id to attach (fresh one generated when omitted)
        #[arg(long)]
        chat_id: Option<String>,
    },

    /// Apply an update suggestion to a task
    UpdateExecute {
        /// Path to a JSON file holding the task data
        task_file: PathBuf,

        /// Path to a JSON file holding the update suggestion
        suggestion_file: PathBuf,

        /// Chat id to attach (fresh one generated when omitted)
        #[arg(long)]
        chat_id: Option<String>,
    },
}

/// Search subcommands
#[derive(Debug, Subcommand)]
pub enum SearchCommand {
    /// Web search
    Web {
        /// Search keyword
        keyword: String,
    },

    /// Video search
    Video {
        /// Search keyword
        keyword: String,
    },

    /// Image search
    Image {
        /// Search keyword
        keyword: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
