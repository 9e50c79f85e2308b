//! High-Low Game
//!
//! A number guessing skill. The skill picks a number between 1 and 100 and
//! answers each guess with "higher" or "lower".
//!
//! ```text
//! NewSession ──▶ StartMode ──(YesIntent)──▶ GuessMode ──(correct)──▶ StartMode
//!                    │                          │
//!                (NoIntent)              (StopIntent / end)
//!                    ▼                          ▼
//!                  :tell                   :saveState
//! ```
//!
//! Requests are read from JSON files and replayed in order; with `--chain`
//! the session attributes of each response are fed into the next request.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package high-low -- --chain --secret 42 \
//!     demos/high-low/requests/launch.json \
//!     demos/high-low/requests/yes.json \
//!     demos/high-low/requests/guess.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Value, json};
use skillkit::prelude::*;
use tracing::{debug, info};

const START_MODE: &str = "StartMode";
const GUESS_MODE: &str = "GuessMode";

#[derive(Parser)]
#[command(name = "high-low", about = "Replay requests against the High-Low skill")]
struct Cli {
    /// Path to a skillkit config file. Searches the default locations if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fix the number to guess instead of drawing one per game.
    #[arg(long)]
    secret: Option<u32>,

    /// Carry session attributes from each response into the next request.
    #[arg(long)]
    chain: bool,

    /// Request envelopes to dispatch, in order.
    #[arg(required = true)]
    requests: Vec<PathBuf>,
}

// ============================================================================
// Handlers
// ============================================================================

fn game(secret: Option<u32>) -> Vec<HandlerGroup> {
    let new_session = HandlerGroup::new()
        .on("NewSession", |ctx: HandlerContext| async move {
            let played = ctx.attribute("gamesPlayed").and_then(|v| v.as_u64()).unwrap_or(0);
            if ctx.attribute("gamesPlayed").is_none() {
                ctx.set_attribute("gamesPlayed", 0);
            }
            ctx.set_state(START_MODE);

            let speech = format!(
                "Welcome to High Low guessing game. You have played {played} times. \
                 Would you like to play?"
            );
            ctx.ask(&speech, "Say yes to start the game or no to quit.")
                .await
        })
        .on("TooHigh", |ctx: HandlerContext| async move {
            let guess = ctx.arg(0).cloned().unwrap_or(Value::Null);
            ctx.ask(&format!("{guess} is too high."), "Try saying a smaller number.")
                .await
        })
        .on("TooLow", |ctx: HandlerContext| async move {
            let guess = ctx.arg(0).cloned().unwrap_or(Value::Null);
            ctx.ask(&format!("{guess} is too low."), "Try saying a larger number.")
                .await
        });

    let start_mode = HandlerGroup::for_state(START_MODE)
        .on("AMAZON.YesIntent", move |ctx: HandlerContext| async move {
            let target = secret.unwrap_or_else(|| rand::random_range(1..=100));
            debug!(target, "Starting a new game");
            ctx.set_attribute("guessNumber", target);
            ctx.set_state(GUESS_MODE);
            ctx.ask("Great! Try saying a number to start the game.", "Try saying a number.")
                .await
        })
        .on("AMAZON.NoIntent", |ctx: HandlerContext| async move {
            ctx.clear_state();
            ctx.tell("Ok, see you next time!").await
        })
        .on("SessionEndedRequest", |ctx: HandlerContext| async move {
            ctx.save_state(true).await
        })
        .on("Unhandled", |ctx: HandlerContext| async move {
            ctx.ask(
                "Sorry, I didn't get that. Say yes to start a new game or no to quit.",
                "Say yes to start a new game or no to quit.",
            )
            .await
        });

    let guess_mode = HandlerGroup::for_state(GUESS_MODE)
        .on("NumberGuessIntent", |ctx: HandlerContext| async move {
            let guess = ctx
                .request()
                .intent()
                .and_then(|intent| intent.slot_value("number"))
                .and_then(|value| value.parse::<u64>().ok());
            let target = ctx.attribute("guessNumber").and_then(|v| v.as_u64());

            let (Some(guess), Some(target)) = (guess, target) else {
                return ctx.emit(format!("NotANum{GUESS_MODE}")).await;
            };

            if guess > target {
                ctx.emit_with("TooHigh", vec![json!(guess)]).await
            } else if guess < target {
                ctx.emit_with("TooLow", vec![json!(guess)]).await
            } else {
                let played = ctx.attribute("gamesPlayed").and_then(|v| v.as_u64()).unwrap_or(0);
                ctx.set_attribute("gamesPlayed", played + 1);
                ctx.remove_attribute("guessNumber");
                ctx.set_state(START_MODE);
                ctx.ask(
                    &format!("{guess} is correct! Would you like to play a new game?"),
                    "Say yes to start a new game, or no to end the game.",
                )
                .await
            }
        })
        .on("NotANum", |ctx: HandlerContext| async move {
            ctx.ask("Sorry, I didn't get that. Try saying a number.", "Try saying a number.")
                .await
        })
        .on("AMAZON.StopIntent", |ctx: HandlerContext| async move {
            ctx.tell("Goodbye!").await
        })
        .on("SessionEndedRequest", |ctx: HandlerContext| async move {
            ctx.save_state(true).await
        })
        .on("Unhandled", |ctx: HandlerContext| async move {
            ctx.ask(
                "Sorry, I didn't get that. Try saying a number.",
                "Try saying a number.",
            )
            .await
        });

    vec![new_session, start_mode, guess_mode]
}

// ============================================================================
// Replay
// ============================================================================

async fn replay(runtime: &SkillRuntime, cli: &Cli) -> Result<Vec<Option<ResponseEnvelope>>> {
    let mut carried: Option<Attributes> = None;
    let mut responses = Vec::with_capacity(cli.requests.len());

    for path in &cli.requests {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read request {}", path.display()))?;
        let mut envelope = RequestEnvelope::from_json(&text)
            .with_context(|| format!("{} is not a request envelope", path.display()))?;

        if let Some(attributes) = carried.take() {
            envelope.session.attributes = attributes;
        }

        info!(path = %path.display(), "Dispatching request");
        let response = runtime
            .handle(envelope)
            .await
            .with_context(|| format!("dispatch of {} failed", path.display()))?;

        if cli.chain {
            carried = response.as_ref().map(|r| r.session_attributes.clone());
        }
        responses.push(response);
    }

    Ok(responses)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().file(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load()?;
    logging::init_from_config(&config.logging);

    let mut runtime = SkillRuntime::from_config(&config).await?;
    runtime.register(game(cli.secret))?;

    for response in replay(&runtime, &cli).await? {
        let rendered = match response {
            Some(response) => serde_json::to_string_pretty(&response)?,
            None => "null".to_string(),
        };
        println!("{rendered}");
    }

    Ok(())
}
