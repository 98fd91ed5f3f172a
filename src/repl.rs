//! Interactive terminal driver for a conversation session
//!
//! All console I/O lives here; [`crate::session::Session`] itself is
//! terminal-free so it can be driven by tests.

use std::sync::Arc;

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::api::{Advise, StudyApi};
use crate::session::{Session, SessionConfig};
use crate::stream::PlanEvent;

/// Interactive multi-round conversation
pub struct InteractiveSession {
    session: Session,
}

impl InteractiveSession {
    pub fn new(api: Arc<dyn StudyApi>, config: SessionConfig) -> Self {
        Self {
            session: Session::new(api, config),
        }
    }

    /// Run the round loop until the user quits
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            println!();
            println!("{}", format!("===== round {} =====", self.session.round() + 1).bold());

            let readline = rl.readline(&format!("{} ", ">".bright_green()));
            match readline {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    if input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
                        break;
                    }

                    let _ = rl.add_history_entry(input);
                    self.run_round(input, &mut rl).await;
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C - just show a new prompt
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D - exit
                    println!();
                    break;
                }
                Err(err) => {
                    return Err(eyre::eyre!("Readline error: {}", err));
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "studyctl interactive session".bright_cyan().bold());
        println!("Session id: {}", self.session.id());
        println!("Enter {} to quit", "q".yellow());
    }

    /// Drive one round, reporting failures without ending the loop
    async fn run_round(&mut self, utterance: &str, rl: &mut DefaultEditor) {
        let chat = match self.session.chat_turn(utterance).await {
            Ok(chat) => chat,
            Err(e) => {
                eprintln!("{} {}", "Chat call failed:".red(), e);
                println!("{}", "Skipping this round.".dimmed());
                return;
            }
        };

        println!();
        println!("{}", chat.response.bright_blue());
        if let Some(advise) = &chat.suggested {
            println!();
            println!("Suggested steps to update: {:?}", advise.update_steps);
            println!("Reason: {}", advise.reason);
        }

        let advise = if self.session.is_update_round() {
            match chat.suggested {
                Some(advise) => Some(advise),
                None => prompt_manual_advise(rl),
            }
        } else {
            None
        };

        let (tx, rx) = mpsc::channel::<PlanEvent>(100);
        let printer = tokio::spawn(print_plan_events(rx));
        let result = self.session.plan_round(advise, tx).await;
        let _ = printer.await;

        match result {
            Ok(Some(plan_result)) => {
                let steps = plan_result.plan["plan"].as_array().map(Vec::len).unwrap_or(0);
                println!();
                println!("{}", format!("Plan ready with {} steps.", steps).green());
                if let Some(path) = plan_result.saved_to {
                    println!("Saved to {}", path.display());
                }
            }
            Ok(None) => {
                println!("{}", "Plan generation produced no plan.".yellow());
            }
            Err(e) => {
                eprintln!("{} {}", "Plan generation failed:".red(), e);
            }
        }
    }
}

/// Ask for update steps and a reason when the server suggested none
fn prompt_manual_advise(rl: &mut DefaultEditor) -> Option<Advise> {
    println!();
    println!("No suggested update steps from the server.");
    let steps = rl.readline("Steps to update (comma separated, empty to skip): ").ok()?;
    let steps = steps.trim().to_string();
    if steps.is_empty() {
        return None;
    }
    let reason = rl.readline("Reason: ").unwrap_or_default();

    match Advise::from_manual(&steps, reason.trim()) {
        Ok(advise) => Some(advise),
        Err(_) => {
            println!("{}", "Invalid step numbers, proceeding without an update advise.".yellow());
            None
        }
    }
}

/// Print decoded plan-stream events as they arrive
pub async fn print_plan_events(mut rx: mpsc::Receiver<PlanEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PlanEvent::Error(message) => {
                eprintln!("{} {}", "Error:".red(), message);
            }
            PlanEvent::Warning(message) => {
                println!("{} {}", "Warning:".yellow(), message);
            }
            PlanEvent::Status(message) => {
                println!("{}", message.dimmed());
            }
            PlanEvent::Introduction(introduction) => {
                println!();
                println!("{}", "Course introduction:".bright_cyan());
                println!("{}", pretty(&introduction));
            }
            PlanEvent::Step { payload, number, total } => {
                let total = total.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string());
                println!();
                println!("{}", format!("Step {}/{}:", number, total).bold());
                println!("{}", pretty(&payload));
            }
            PlanEvent::Done { .. } => {
                println!();
                println!("{}", "Plan stream complete.".green());
            }
            PlanEvent::ParseError { raw, detail } => {
                eprintln!("{} {} ({})", "Bad frame:".red(), raw, detail);
            }
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
