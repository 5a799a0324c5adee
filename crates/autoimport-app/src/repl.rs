//! Interactive terminal front ends for the customer chat and the trainer.
//!
//! The transcript goes to stdout; diagnostics go through `tracing` to stderr.

use std::io::Write;

use autoimport_chat::{
    ChatError, Conversation, EvaluationOutcome, SendOutcome, TrainingSession,
};
use autoimport_core::{ConversationEvent, Role, Turn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::dashboard;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Say(String),
    Retry,
    New,
    Preset(String),
    Evaluate,
    Help,
    Quit,
    Unknown(String),
}

impl ReplCommand {
    /// `None` for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(ReplCommand::Say(line.to_string()));
        };
        let mut parts = command.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();
        Some(match (name, arg) {
            ("retry", _) => ReplCommand::Retry,
            ("new", _) => ReplCommand::New,
            ("preset", id) if !id.is_empty() => ReplCommand::Preset(id.to_string()),
            ("evaluate", _) => ReplCommand::Evaluate,
            ("help", _) => ReplCommand::Help,
            ("quit" | "exit", _) => ReplCommand::Quit,
            _ => ReplCommand::Unknown(line.to_string()),
        })
    }
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "Вы",
        Role::Assistant => "Ассистент",
        Role::Manager => "Менеджер",
        Role::Client => "Клиент",
    }
}

fn print_turn(turn: &Turn) {
    println!("{}: {}", speaker(turn.role), turn.content);
    if turn.retryable {
        println!("  (/retry, чтобы повторить)");
    }
}

fn print_outcome(outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Replied(turn) | SendOutcome::Failed(turn) => print_turn(turn),
        SendOutcome::Ignored => println!("(ничего не отправлено)"),
        SendOutcome::Superseded => {}
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Log conversation events until the channel closes.
fn spawn_event_logger(events: broadcast::Receiver<ConversationEvent>) {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(events);
        while let Some(item) = stream.next().await {
            match item {
                Ok(ConversationEvent::SessionAssigned { session_id, .. }) => {
                    tracing::info!(session_id = %session_id, "Backend session assigned");
                }
                Ok(ConversationEvent::LeadStatusChanged { status, .. }) => {
                    tracing::info!(status = %status, "Lead status changed");
                }
                Ok(ConversationEvent::Degraded {
                    consecutive_failures,
                    ..
                }) => {
                    tracing::warn!(consecutive_failures, "Conversation degraded to fallback script");
                }
                Ok(event) => tracing::trace!(event = event.event_name(), "Conversation event"),
                Err(e) => tracing::debug!(error = %e, "Event logger lagged"),
            }
        }
    });
}

/// Next input line; `None` at end of input or on a read error, which is logged.
async fn next_line<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Option<String> {
    match lines.next_line().await {
        Ok(line) => line,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read input, leaving the session");
            None
        }
    }
}

/// Report engine refusals without leaving the loop.
fn report(result: Result<(), ChatError>) {
    if let Err(e) = result {
        eprintln!("{}", e);
    }
}

/// Customer chat loop: `/retry`, `/new`, `/quit`.
pub async fn run_chat(conversation: &Conversation) -> Result<(), ChatError> {
    spawn_event_logger(conversation.subscribe());
    println!("Чат АвтоИмпорт. Команды: /retry, /new, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = next_line(&mut lines).await {
        match ReplCommand::parse(&line) {
            None => {}
            Some(ReplCommand::Quit) => break,
            Some(ReplCommand::Say(text)) => {
                report(conversation.send_turn(&text).await.map(|o| print_outcome(&o)))
            }
            Some(ReplCommand::Retry) => {
                report(conversation.retry_last_turn().await.map(|o| print_outcome(&o)))
            }
            Some(ReplCommand::New) => {
                conversation.start()?;
                println!("(новый диалог)");
            }
            Some(_) => println!("Команды: /retry, /new, /quit"),
        }
        prompt();
    }
    Ok(())
}

/// Trainer loop: `/retry`, `/new`, `/preset ID`, `/evaluate`, `/quit`.
pub async fn run_trainer(session: &TrainingSession) -> Result<(), ChatError> {
    spawn_event_logger(session.subscribe());
    let preset = session.current_preset()?;
    println!("Тренажёр продаж. Клиент: {} ({})", preset.name, preset.description);
    println!("Команды: /retry, /new, /preset ID, /evaluate, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = next_line(&mut lines).await {
        match ReplCommand::parse(&line) {
            None => {}
            Some(ReplCommand::Quit) => break,
            Some(ReplCommand::Say(text)) => {
                report(session.send_turn(&text).await.map(|o| print_outcome(&o)))
            }
            Some(ReplCommand::Retry) => {
                report(session.retry_last_turn().await.map(|o| print_outcome(&o)))
            }
            Some(ReplCommand::New) => {
                session.new_session()?;
                println!("(новая сессия)");
            }
            Some(ReplCommand::Preset(id)) => report(session.select_preset(&id).map(|p| {
                println!("(клиент: {}, {})", p.name, p.description);
            })),
            Some(ReplCommand::Evaluate) => match session.request_evaluation().await {
                Ok(EvaluationOutcome::Ready(evaluation)) => {
                    print!("{}", dashboard::format_evaluation(&evaluation));
                    println!("(/new, чтобы начать заново)");
                }
                Ok(EvaluationOutcome::Ignored) => {
                    println!("(для оценки нужно хотя бы две реплики)")
                }
                Ok(EvaluationOutcome::Superseded) => {}
                Err(e) => eprintln!("{}", e),
            },
            Some(_) => println!("Команды: /retry, /new, /preset ID, /evaluate, /quit"),
        }
        prompt();
    }
    Ok(())
}
