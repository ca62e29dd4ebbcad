//! `assist ask` and `assist chat`.
//!
//! Both commands answer through a [`SessionContext`]. Answers, the per-turn
//! caption, and the session cost are printed to stdout; logs go to stderr.

use std::io::Write;

use anyhow::Result;
use course_assistant_core::conversation::Role;
use course_assistant_core::usage::format_cost;
use course_assistant_core::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::index_cmd::prepare_index;
use crate::session::{SessionContext, TurnOutcome};

const HELP: &str = "Commands: /clear  /cost  /history  /help  /quit";

/// Answer a single prompt.
pub async fn run_ask(config: &Config, prompt: &str, stream: bool) -> Result<()> {
    let mut session = start_session(config).await?;

    let outcome = answer(&mut session, prompt, stream)
        .await
        .map_err(|e| anyhow::anyhow!(error_message(&e)))?;
    if !stream {
        println!("{}", outcome.text);
    }
    println!();
    println!("{}", turn_caption(&outcome));
    Ok(())
}

/// Interactive chat loop on stdin.
pub async fn run_chat(config: &Config, stream: bool) -> Result<()> {
    let mut session = start_session(config).await?;

    println!("Course assistant (syllabus {})", session.syllabus().version);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/clear" => {
                session.reset();
                println!("Conversation cleared. Session cost: {}", format_cost(0.0));
            }
            "/cost" => print_session_cost(&session),
            "/history" => print_history(&session),
            _ => match answer(&mut session, input, stream).await {
                Ok(outcome) => {
                    if !stream {
                        println!("{}", outcome.text);
                    }
                    println!();
                    println!("{}", turn_caption(&outcome));
                    print_session_cost(&session);
                }
                Err(e) => println!("Error: {}", error_message(&e)),
            },
        }
    }

    print_session_cost(&session);
    Ok(())
}

async fn start_session(config: &Config) -> Result<SessionContext> {
    let mut session = SessionContext::from_config(config)?;
    if let Err(e) = prepare_index(&mut session, config).await {
        eprintln!("Warning: course material unavailable: {e:#}");
    }
    Ok(session)
}

async fn answer(session: &mut SessionContext, prompt: &str, stream: bool) -> Result<TurnOutcome, Error> {
    if stream {
        let outcome = session
            .ask_streaming(prompt, |fragment| {
                print!("{fragment}");
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();
        outcome
    } else {
        session.ask(prompt).await
    }
}

/// `Used N tokens | Turn Cost: $x.xxxxx`, or a note when usage is missing.
pub fn turn_caption(outcome: &TurnOutcome) -> String {
    match (outcome.usage, outcome.cost) {
        (Some(usage), Some(cost)) => format!(
            "Used {} tokens | Turn Cost: {}",
            usage.total(),
            format_cost(cost)
        ),
        _ => "Token usage unavailable for this turn".to_string(),
    }
}

/// User-facing text for a failed turn.
pub fn error_message(error: &Error) -> String {
    if error.is_rate_limited() {
        "Rate limit reached. Please wait a moment and try again.".to_string()
    } else {
        error.to_string()
    }
}

fn print_session_cost(session: &SessionContext) {
    let usage = session.usage();
    println!(
        "Session cost: {} ({} tokens over {} turns)",
        format_cost(usage.total_cost()),
        usage.total_tokens(),
        usage.turns()
    );
}

fn print_history(session: &SessionContext) {
    let turns = session.conversation().turns();
    if turns.is_empty() {
        println!("(no messages)");
        return;
    }
    for turn in turns {
        let speaker = match turn.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        println!("[{}] {}: {}", turn.created_at.format("%H:%M:%S"), speaker, turn.content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_assistant_core::usage::TokenUsage;
    use course_assistant_core::Service;

    fn outcome(usage: Option<TokenUsage>, cost: Option<f64>) -> TurnOutcome {
        TurnOutcome {
            text: "answer".to_string(),
            usage,
            cost,
            sources: Vec::new(),
            dropped_chunks: 0,
        }
    }

    #[test]
    fn test_caption_with_usage() {
        let caption = turn_caption(&outcome(Some(TokenUsage::new(100, 50)), Some(0.00003)));
        assert_eq!(caption, "Used 150 tokens | Turn Cost: $0.00003");
    }

    #[test]
    fn test_caption_without_usage() {
        assert_eq!(
            turn_caption(&outcome(None, None)),
            "Token usage unavailable for this turn"
        );
    }

    #[test]
    fn test_rate_limit_message() {
        let err = Error::RateLimited {
            service: Service::Generation,
            message: "429".to_string(),
        };
        assert!(error_message(&err).starts_with("Rate limit reached"));
        assert_eq!(
            error_message(&Error::GenerationService("boom".into())),
            "generation service error: boom"
        );
    }
}
