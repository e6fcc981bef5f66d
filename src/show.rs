//! CLI view of an upload's ranked records.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::store;

/// Print the top-ranked window for an upload plus aggregate counts.
pub async fn run_show(config: &Config, upload_id: &str, limit: Option<i64>) -> Result<()> {
    let pool = db::connect(config).await?;

    let Some(upload) = store::get_upload(&pool, upload_id).await? else {
        bail!("upload not found: {}", upload_id);
    };

    let limit = limit.unwrap_or(config.ranking.display_limit);
    let records = store::top_records(&pool, upload_id, limit).await?;
    let total = store::count_records(&pool, upload_id).await?;

    println!("{}", upload.name);
    println!("  upload id: {}", upload.id);
    println!("  total records: {}", total);

    if let (Some(first), Some(last)) = (records.first(), records.last()) {
        println!("  score range (shown): {} .. {}", first.score, last.score);
    }
    println!();

    let columns = display_columns(&records);
    if !columns.is_empty() {
        println!("  columns: {}", columns.join(", "));
    }

    for record in &records {
        let data = serde_json::to_string(&record.data).unwrap_or_else(|_| "{}".to_string());
        println!("  rank {:>4}  score {:>12.4}  {}", record.rank, record.score, data);
    }

    println!("ok");
    pool.close().await;
    Ok(())
}

/// Column names from the first record, in stored key order.
pub fn display_columns(records: &[crate::models::Record]) -> Vec<String> {
    records
        .first()
        .map(|r| r.data.keys().cloned().collect())
        .unwrap_or_default()
}

/// Highest and lowest score within a displayed window.
pub fn score_range(records: &[crate::models::Record]) -> (f64, f64) {
    let highest = records.first().map(|r| r.score).unwrap_or(0.0);
    let lowest = records.last().map(|r| r.score).unwrap_or(highest);
    (highest, lowest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use serde_json::json;

    fn record(rank: i64, score: f64) -> Record {
        Record {
            id: format!("r{}", rank),
            upload_id: "u1".to_string(),
            data: json!({"name": "x", "points": score}).as_object().unwrap().clone(),
            score,
            rank,
            created_at: 0,
        }
    }

    #[test]
    fn test_display_columns_from_first_record() {
        let records = vec![record(1, 9.0)];
        assert_eq!(display_columns(&records), vec!["name", "points"]);
        assert!(display_columns(&[]).is_empty());
    }

    #[test]
    fn test_score_range() {
        let records = vec![record(1, 9.0), record(2, 3.0)];
        assert_eq!(score_range(&records), (9.0, 3.0));
        assert_eq!(score_range(&[record(1, 5.0)]), (5.0, 5.0));
        assert_eq!(score_range(&[]), (0.0, 0.0));
    }
}
