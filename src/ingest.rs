//! CSV ingestion: parse, score, rank, persist.
//!
//! Parsing and scoring happen before anything touches the database, and
//! the upload + record batch is written in one transaction, so a
//! malformed file leaves no partial upload behind.

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::Upload;
use crate::scoring::compute_rankings;
use crate::store;

/// Result of a successful ingestion.
pub struct IngestOutcome {
    pub upload_id: String,
    pub record_count: usize,
}

/// Reject anything that does not look like a CSV upload. Checked before
/// any parsing or persistence.
pub fn validate_csv_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("No file selected");
    }
    if !name.to_lowercase().ends_with(".csv") {
        bail!("File must be a CSV file");
    }
    Ok(())
}

/// Parse CSV bytes into rows of header→cell mappings.
///
/// Empty cells become JSON null; everything else stays a string until
/// the scoring transform decides which columns are numeric. Ragged rows
/// or invalid UTF-8 fail the whole parse.
pub fn parse_csv_rows(bytes: &[u8]) -> Result<Vec<Map<String, Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .context("failed to parse CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.context("failed to parse CSV row")?;
        let mut row = Map::new();
        for (header, cell) in headers.iter().zip(record.iter()) {
            let value = if cell.trim().is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            row.insert(header.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Ingest one CSV: validate the name, parse, rank, and persist the
/// upload with its records as an atomic batch.
pub async fn ingest_csv(
    pool: &SqlitePool,
    config: &Config,
    name: &str,
    file_path: Option<String>,
    uploaded_by: Option<String>,
    bytes: &[u8],
) -> Result<IngestOutcome> {
    validate_csv_name(name)?;

    let rows = parse_csv_rows(bytes)?;
    let ranked = compute_rankings(rows, config.scoring.random_seed);

    let upload = Upload {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        file_path,
        uploaded_by,
        uploaded_at: chrono::Utc::now().timestamp(),
        processed: false,
    };

    store::create_upload_with_records(pool, &upload, &ranked).await?;
    info!(upload_id = %upload.id, records = ranked.len(), "ingested {}", name);

    Ok(IngestOutcome {
        upload_id: upload.id,
        record_count: ranked.len(),
    })
}

/// CLI entry point for `rankchat upload`.
pub async fn run_upload(config: &Config, path: &Path, name: Option<String>) -> Result<()> {
    let file_name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let pool = db::connect(config).await?;
    let outcome = ingest_csv(
        &pool,
        config,
        &file_name,
        Some(path.display().to_string()),
        None,
        &bytes,
    )
    .await?;

    println!("upload {}", file_name);
    println!("  upload id: {}", outcome.upload_id);
    println!("  records ranked: {}", outcome.record_count);
    println!("ok");

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_csv_name() {
        assert!(validate_csv_name("people.csv").is_ok());
        assert!(validate_csv_name("People.CSV").is_ok());
        assert!(validate_csv_name("people.txt").is_err());
        assert!(validate_csv_name("").is_err());
        assert!(validate_csv_name("   ").is_err());
    }

    #[test]
    fn test_parse_basic_csv() {
        let bytes = b"name,points\nalice,3\nbob,9\n";
        let rows = parse_csv_rows(bytes).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], Value::String("alice".to_string()));
        assert_eq!(rows[1]["points"], Value::String("9".to_string()));
    }

    #[test]
    fn test_parse_empty_cell_is_null() {
        let bytes = b"name,points\nalice,\n";
        let rows = parse_csv_rows(bytes).unwrap();
        assert_eq!(rows[0]["points"], Value::Null);
    }

    #[test]
    fn test_parse_quoted_cells() {
        let bytes = b"name,notes\nalice,\"likes, commas\"\n";
        let rows = parse_csv_rows(bytes).unwrap();
        assert_eq!(rows[0]["notes"], Value::String("likes, commas".to_string()));
    }

    #[test]
    fn test_parse_ragged_row_fails() {
        let bytes = b"a,b\n1,2,3\n";
        assert!(parse_csv_rows(bytes).is_err());
    }

    #[test]
    fn test_parse_header_only() {
        let bytes = b"a,b\n";
        let rows = parse_csv_rows(bytes).unwrap();
        assert!(rows.is_empty());
    }
}
