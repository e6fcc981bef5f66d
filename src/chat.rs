//! Chat turn orchestration.
//!
//! One turn: persist the user message, assemble context from the
//! top-ranked records, relay the prompt to the generation service, and
//! persist whatever comes back. Relay faults degrade to a stored
//! assistant message; they never fail the turn.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::{ChatMessage, ROLE_ASSISTANT, ROLE_USER};
use crate::relay::{build_prompt, GenerationClient, OllamaClient};
use crate::store;

/// Run one chat turn for an upload and session token, returning the
/// stored assistant message.
pub async fn run_turn(
    pool: &SqlitePool,
    config: &Config,
    client: &dyn GenerationClient,
    upload_id: &str,
    session_token: &str,
    user_message: &str,
) -> Result<ChatMessage> {
    let user_message = user_message.trim();
    if user_message.is_empty() {
        bail!("message must not be empty");
    }

    if store::get_upload(pool, upload_id).await?.is_none() {
        bail!("upload not found: {}", upload_id);
    }

    let session = store::get_or_create_session(pool, upload_id, session_token).await?;
    store::append_message(pool, &session.id, ROLE_USER, user_message).await?;

    let top = store::top_records(pool, upload_id, config.llm.context_records).await?;
    let total = store::count_records(pool, upload_id).await?;
    let prompt = build_prompt(&top, total, user_message);

    let reply = match client.generate(&prompt).await {
        Ok(text) => text,
        Err(err) => {
            warn!(upload_id, "relay failed: {}", err);
            err.into_reply()
        }
    };

    let message = store::append_message(pool, &session.id, ROLE_ASSISTANT, &reply).await?;
    Ok(message)
}

/// CLI entry point: one chat turn against an upload's data.
pub async fn run_chat(
    config: &Config,
    upload_id: &str,
    message: &str,
    session_token: Option<String>,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let client = OllamaClient::new(&config.llm).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let token = session_token.unwrap_or_else(|| Uuid::new_v4().to_string());
    let reply = run_turn(&pool, config, &client, upload_id, &token, message).await?;

    println!("session: {}", token);
    println!();
    println!("{}", reply.content);

    pool.close().await;
    Ok(())
}
