//! CLI listing of uploads, newest first.

use anyhow::Result;
use chrono::{TimeZone, Utc};

use crate::config::Config;
use crate::db;
use crate::store;

pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let uploads = store::list_uploads(&pool, 50).await?;

    if uploads.is_empty() {
        println!("no uploads");
        pool.close().await;
        return Ok(());
    }

    println!("{} upload(s):", uploads.len());
    for (upload, record_count) in &uploads {
        let when = Utc
            .timestamp_opt(upload.uploaded_at, 0)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| upload.uploaded_at.to_string());
        let state = if upload.processed { "processed" } else { "pending" };
        println!(
            "  {}  {}  {} records  {}  ({})",
            upload.id, upload.name, record_count, when, state
        );
    }

    pool.close().await;
    Ok(())
}
