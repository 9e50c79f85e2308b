//! Built-in response listeners.
//!
//! Every dispatcher registers these before any integrator group, so an
//! integrator binding the same name overrides them: the built-in still fires
//! first, sees [`is_overridden`](HandlerContext::is_overridden) and returns
//! without acting.
//!
//! | Event | Arguments |
//! |-------|-----------|
//! | `:tell` | speech |
//! | `:ask` | speech, reprompt |
//! | `:tellWithCard` | speech, title, content, image? |
//! | `:askWithCard` | speech, reprompt, title, content, image? |
//! | `:tellWithLinkAccountCard` | speech |
//! | `:askWithLinkAccountCard` | speech, reprompt |
//! | `:responseReady` | |
//! | `:saveState` | force? |
//! | `:saveStateError` | message |

use serde_json::Value;
use tracing::{debug, error, warn};

use skillkit_core::{Card, Image, ResponseBuilder};

use crate::context::HandlerContext;
use crate::handler::HandlerResult;
use crate::registry::HandlerGroup;

pub const TELL: &str = ":tell";
pub const ASK: &str = ":ask";
pub const TELL_WITH_CARD: &str = ":tellWithCard";
pub const ASK_WITH_CARD: &str = ":askWithCard";
pub const TELL_WITH_LINK_ACCOUNT_CARD: &str = ":tellWithLinkAccountCard";
pub const ASK_WITH_LINK_ACCOUNT_CARD: &str = ":askWithLinkAccountCard";
pub const RESPONSE_READY: &str = ":responseReady";
pub const SAVE_STATE: &str = ":saveState";
pub const SAVE_STATE_ERROR: &str = ":saveStateError";

/// Returns the group of built-in listeners.
pub fn builtin_group() -> HandlerGroup {
    HandlerGroup::new()
        .on(TELL, tell)
        .on(ASK, ask)
        .on(TELL_WITH_CARD, tell_with_card)
        .on(ASK_WITH_CARD, ask_with_card)
        .on(TELL_WITH_LINK_ACCOUNT_CARD, tell_with_link_account_card)
        .on(ASK_WITH_LINK_ACCOUNT_CARD, ask_with_link_account_card)
        .on(RESPONSE_READY, response_ready)
        .on(SAVE_STATE, save_state)
        .on(SAVE_STATE_ERROR, save_state_error)
}

fn text(ctx: &HandlerContext, index: usize) -> String {
    ctx.arg_str(index).unwrap_or_default().to_string()
}

fn image(ctx: &HandlerContext, index: usize) -> Option<Image> {
    match ctx.arg(index) {
        None | Some(Value::Null) => None,
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed card image");
                None
            }
        },
    }
}

async fn respond(ctx: &HandlerContext, builder: ResponseBuilder) -> HandlerResult {
    ctx.set_response(builder.build(ctx.attributes()));
    ctx.emit(RESPONSE_READY).await
}

async fn tell(ctx: HandlerContext) -> HandlerResult {
    if ctx.is_overridden() {
        return Ok(());
    }
    let builder = ResponseBuilder::new().speech(&text(&ctx, 0));
    respond(&ctx, builder).await
}

async fn ask(ctx: HandlerContext) -> HandlerResult {
    if ctx.is_overridden() {
        return Ok(());
    }
    let builder = ResponseBuilder::new()
        .speech(&text(&ctx, 0))
        .reprompt(&text(&ctx, 1))
        .end_session(false);
    respond(&ctx, builder).await
}

async fn tell_with_card(ctx: HandlerContext) -> HandlerResult {
    if ctx.is_overridden() {
        return Ok(());
    }
    let card = Card::new(text(&ctx, 1), text(&ctx, 2), image(&ctx, 3));
    let builder = ResponseBuilder::new().speech(&text(&ctx, 0)).card(card);
    respond(&ctx, builder).await
}

async fn ask_with_card(ctx: HandlerContext) -> HandlerResult {
    if ctx.is_overridden() {
        return Ok(());
    }
    let card = Card::new(text(&ctx, 2), text(&ctx, 3), image(&ctx, 4));
    let builder = ResponseBuilder::new()
        .speech(&text(&ctx, 0))
        .reprompt(&text(&ctx, 1))
        .card(card)
        .end_session(false);
    respond(&ctx, builder).await
}

async fn tell_with_link_account_card(ctx: HandlerContext) -> HandlerResult {
    if ctx.is_overridden() {
        return Ok(());
    }
    let builder = ResponseBuilder::new()
        .speech(&text(&ctx, 0))
        .card(Card::LinkAccount);
    respond(&ctx, builder).await
}

async fn ask_with_link_account_card(ctx: HandlerContext) -> HandlerResult {
    if ctx.is_overridden() {
        return Ok(());
    }
    let builder = ResponseBuilder::new()
        .speech(&text(&ctx, 0))
        .reprompt(&text(&ctx, 1))
        .card(Card::LinkAccount)
        .end_session(false);
    respond(&ctx, builder).await
}

/// Stamps the pending state onto the buffered response, then persists or
/// completes.
async fn response_ready(ctx: HandlerContext) -> HandlerResult {
    if ctx.is_overridden() {
        return Ok(());
    }
    let Some(mut response) = ctx.response() else {
        warn!("Response ready emitted without a buffered response");
        return Ok(());
    };

    ctx.with_attributes(|attrs| ctx.apply_pending_state(attrs));
    response.session_attributes = ctx.attributes();
    ctx.set_response(response.clone());

    if ctx.config().attributes_table.is_some() {
        return ctx.emit(SAVE_STATE).await;
    }
    ctx.succeed(response);
    Ok(())
}

async fn save_state(ctx: HandlerContext) -> HandlerResult {
    if ctx.is_overridden() {
        return Ok(());
    }
    let force = ctx.arg(0).and_then(Value::as_bool).unwrap_or(false);
    if force {
        ctx.with_attributes(|attrs| ctx.apply_pending_state(attrs));
    }

    let response = ctx.response().unwrap_or_else(|| {
        let mut attributes = ctx.attributes();
        ctx.apply_pending_state(&mut attributes);
        ResponseBuilder::new().build(attributes)
    });

    let should_save =
        response.response.should_end_session || force || ctx.config().save_before_response;
    if should_save {
        let Some(table) = ctx.config().attributes_table.clone() else {
            warn!("Saving state requested but no attribute table is configured");
            ctx.succeed(response);
            return Ok(());
        };
        let Some(store) = ctx.store().cloned() else {
            return ctx
                .emit_with(SAVE_STATE_ERROR, vec!["no attribute store configured".into()])
                .await;
        };

        let attributes = ctx.attributes();
        debug!(table = %table, keys = attributes.len(), "Persisting attributes");
        if let Err(e) = store.put(&table, &ctx.user().user_id, &attributes).await {
            return ctx
                .emit_with(SAVE_STATE_ERROR, vec![e.to_string().into()])
                .await;
        }
    }

    ctx.succeed(response);
    Ok(())
}

async fn save_state_error(ctx: HandlerContext) -> HandlerResult {
    if ctx.is_overridden() {
        return Ok(());
    }
    let message = text(&ctx, 0);
    error!(error = %message, "Error saving state");
    ctx.fail(format!("error saving state: {message}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use skillkit_core::{DispatchError, MemoryStore, OutputSpeech, STATE_KEY};

    use super::*;
    use crate::dispatcher::{DispatchConfig, SkillDispatcher};
    use crate::testing::*;

    fn config(table: Option<&str>) -> DispatchConfig {
        DispatchConfig {
            app_id: Some(APP_ID.into()),
            attributes_table: table.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_tell_ends_session_with_ssml() {
        let d = SkillDispatcher::new(envelope(true, launch(), json!({})), config(None));
        d.on("NewSession", |ctx: HandlerContext| async move {
            ctx.set_attribute("greeted", true);
            ctx.tell("Hello").await
        });

        let response = d.execute().await.unwrap().unwrap();
        assert!(response.response.should_end_session);
        assert_eq!(
            response.response.output_speech,
            Some(OutputSpeech::Ssml {
                ssml: "<speak> Hello </speak>".into()
            })
        );
        assert_eq!(response.session_attributes.get("greeted"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_ask_keeps_session_and_stamps_state() {
        let d = SkillDispatcher::new(envelope(true, launch(), json!({})), config(None));
        d.on("NewSession", |ctx: HandlerContext| async move {
            ctx.set_state("Playing");
            ctx.ask("Guess a number", "Any number").await
        });

        let response = d.execute().await.unwrap().unwrap();
        assert!(!response.response.should_end_session);
        assert!(response.response.reprompt.is_some());
        assert_eq!(response.session_attributes.get(STATE_KEY), Some(&json!("Playing")));
    }

    #[tokio::test]
    async fn test_clear_state_drops_state_key() {
        let d = SkillDispatcher::new(
            envelope(false, intent("Stop"), json!({ "STATE": "Playing", "score": 2 })),
            config(None),
        );
        d.register([HandlerGroup::for_state("Playing").on("Stop", |ctx: HandlerContext| async move {
            ctx.clear_state();
            ctx.tell("Bye").await
        })])
        .unwrap();

        let response = d.execute().await.unwrap().unwrap();
        assert!(!response.session_attributes.contains_key(STATE_KEY));
        assert_eq!(response.session_attributes.get("score"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_cards() {
        let d = SkillDispatcher::new(envelope(false, intent("Show"), json!({})), config(None));
        d.on("Show", |ctx: HandlerContext| async move {
            let image = json!({ "smallImageUrl": "https://example.com/s.png" });
            ctx.ask_with_card("Here", "Still there?", "Title", "Body", Some(image))
                .await
        });
        let response = d.execute().await.unwrap().unwrap();
        assert!(matches!(
            response.response.card,
            Some(Card::Standard { ref title, ref text, .. }) if title == "Title" && text == "Body"
        ));

        let d = SkillDispatcher::new(envelope(false, intent("Link"), json!({})), config(None));
        d.on("Link", |ctx: HandlerContext| async move {
            ctx.tell_with_link_account_card("Please link your account").await
        });
        let response = d.execute().await.unwrap().unwrap();
        assert_eq!(response.response.card, Some(Card::LinkAccount));
    }

    #[tokio::test]
    async fn test_overriding_response_ready() {
        let d = SkillDispatcher::new(envelope(true, launch(), json!({})), config(None));
        d.on("NewSession", |ctx: HandlerContext| async move { ctx.tell("Hello").await });
        d.on(RESPONSE_READY, |ctx: HandlerContext| async move {
            assert!(ctx.is_overridden());
            let mut response = ctx.response().expect("buffered response");
            response.response.should_end_session = false;
            ctx.succeed(response);
        });

        let response = d.execute().await.unwrap().unwrap();
        assert!(!response.response.should_end_session);
    }

    #[tokio::test]
    async fn test_session_end_persists_attributes() {
        let store = Arc::new(MemoryStore::new());
        let d = SkillDispatcher::builder(envelope(
            false,
            intent("Stop"),
            json!({ "STATE": "Playing", "games": 3 }),
        ))
        .config(config(Some("games")))
        .store(store.clone())
        .build();
        d.register([HandlerGroup::for_state("Playing").on("Stop", |ctx: HandlerContext| async move {
            ctx.set_attribute("games", 4);
            ctx.tell("Goodbye").await
        })])
        .unwrap();

        d.execute().await.unwrap().unwrap();
        let saved = store.snapshot("games", USER_ID).expect("attributes saved");
        assert_eq!(saved.get("games"), Some(&json!(4)));
    }

    #[tokio::test]
    async fn test_new_state_reaches_response_and_store() {
        let store = Arc::new(MemoryStore::new());
        let d = SkillDispatcher::builder(envelope(
            false,
            intent("Restart"),
            json!({ "STATE": "Playing" }),
        ))
        .config(config(Some("games")))
        .store(store.clone())
        .build();
        d.register([HandlerGroup::for_state("Playing").on("Restart", |ctx: HandlerContext| async move {
            ctx.set_state("Start");
            ctx.tell("Starting over").await
        })])
        .unwrap();

        let response = d.execute().await.unwrap().unwrap();
        assert_eq!(response.session_attributes.get(STATE_KEY), Some(&json!("Start")));
        let saved = store.snapshot("games", USER_ID).expect("attributes saved");
        assert_eq!(saved.get(STATE_KEY), Some(&json!("Start")));
    }

    #[tokio::test]
    async fn test_restored_state_survives_new_session() {
        let store = Arc::new(MemoryStore::new());
        store.insert("games", USER_ID, attrs(json!({ "STATE": "Playing", "score": 5 })));
        let d = SkillDispatcher::builder(envelope(true, launch(), json!({})))
            .config(config(Some("games")))
            .store(store.clone())
            .build();
        d.on("NewSession", |ctx: HandlerContext| async move {
            assert_eq!(ctx.state(), None);
            assert_eq!(ctx.pending_state().as_deref(), Some("Playing"));
            ctx.ask("Welcome back", "Guess a number").await
        });

        let response = d.execute().await.unwrap().unwrap();
        assert_eq!(response.session_attributes.get(STATE_KEY), Some(&json!("Playing")));
        assert_eq!(response.session_attributes.get("score"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_open_session_is_not_persisted() {
        let store = Arc::new(MemoryStore::new());
        let d = SkillDispatcher::builder(envelope(false, intent("Guess"), json!({})))
            .config(config(Some("games")))
            .store(store.clone())
            .build();
        d.on("Guess", |ctx: HandlerContext| async move { ctx.ask("Higher", "Guess again").await });

        let response = d.execute().await.unwrap().unwrap();
        assert!(!response.response.should_end_session);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_before_response() {
        let store = Arc::new(MemoryStore::new());
        let d = SkillDispatcher::builder(envelope(false, intent("Guess"), json!({})))
            .config(DispatchConfig {
                save_before_response: true,
                ..config(Some("games"))
            })
            .store(store.clone())
            .build();
        d.on("Guess", |ctx: HandlerContext| async move {
            ctx.set_attribute("guesses", 1);
            ctx.ask("Higher", "Guess again").await
        });

        d.execute().await.unwrap().unwrap();
        assert_eq!(
            store.snapshot("games", USER_ID).and_then(|a| a.get("guesses").cloned()),
            Some(json!(1))
        );
    }

    #[tokio::test]
    async fn test_forced_save_writes_pending_state() {
        let store = Arc::new(MemoryStore::new());
        let d = SkillDispatcher::builder(envelope(false, session_ended(), json!({})))
            .config(config(Some("games")))
            .store(store.clone())
            .build();
        d.on("SessionEndedRequest", |ctx: HandlerContext| async move {
            ctx.set_state("Paused");
            ctx.save_state(true).await
        });

        let response = d.execute().await.unwrap().unwrap();
        assert!(response.response.output_speech.is_none());
        let saved = store.snapshot("games", USER_ID).unwrap();
        assert_eq!(saved.get(STATE_KEY), Some(&json!("Paused")));
    }

    #[tokio::test]
    async fn test_save_failure_fails_dispatch() {
        let d = SkillDispatcher::builder(envelope(false, intent("Stop"), json!({})))
            .config(config(Some("games")))
            .store(Arc::new(BrokenStore))
            .build();
        d.on("Stop", |ctx: HandlerContext| async move { ctx.tell("Bye").await });

        let err = d.execute().await.unwrap_err();
        assert!(matches!(err, DispatchError::Failed(ref m) if m.contains("throughput exceeded")));
    }
}
