//! SQLite repository for uploads, records, and chat state.
//!
//! All ranking and relay logic goes through these narrow functions so it
//! can be tested against a throwaway database file. The record batch for
//! an upload is written in one transaction: readers never observe a
//! partially ranked upload.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ChatMessage, ChatSession, RankedRow, Record, Upload};

/// Insert an upload and its ranked records as one atomic batch and mark
/// the upload processed. On error nothing is persisted.
pub async fn create_upload_with_records(
    pool: &SqlitePool,
    upload: &Upload,
    ranked: &[RankedRow],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO uploads (id, name, file_path, uploaded_by, uploaded_at, processed)
        VALUES (?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(&upload.id)
    .bind(&upload.name)
    .bind(&upload.file_path)
    .bind(&upload.uploaded_by)
    .bind(upload.uploaded_at)
    .execute(&mut *tx)
    .await?;

    let now = chrono::Utc::now().timestamp();
    for row in ranked {
        let data_json = serde_json::to_string(&row.data)?;
        sqlx::query(
            r#"
            INSERT INTO records (id, upload_id, data_json, score, rank, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&upload.id)
        .bind(data_json)
        .bind(row.score)
        .bind(row.rank)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_upload(pool: &SqlitePool, upload_id: &str) -> Result<Option<Upload>> {
    let row = sqlx::query(
        "SELECT id, name, file_path, uploaded_by, uploaded_at, processed FROM uploads WHERE id = ?",
    )
    .bind(upload_id)
    .fetch_optional(pool)
    .await?;

    row.map(upload_from_row).transpose()
}

/// All uploads, newest first, with their record counts.
pub async fn list_uploads(pool: &SqlitePool, limit: i64) -> Result<Vec<(Upload, i64)>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.name, u.file_path, u.uploaded_by, u.uploaded_at, u.processed,
               (SELECT COUNT(*) FROM records r WHERE r.upload_id = u.id) AS record_count
        FROM uploads u
        ORDER BY u.uploaded_at DESC, u.id
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let count: i64 = row.get("record_count");
            Ok((upload_from_row(row)?, count))
        })
        .collect()
}

/// The top-ranked window for an upload, in rank order.
pub async fn top_records(pool: &SqlitePool, upload_id: &str, limit: i64) -> Result<Vec<Record>> {
    let rows = sqlx::query(
        r#"
        SELECT id, upload_id, data_json, score, rank, created_at
        FROM records
        WHERE upload_id = ?
        ORDER BY rank ASC
        LIMIT ?
        "#,
    )
    .bind(upload_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(record_from_row).collect()
}

pub async fn count_records(pool: &SqlitePool, upload_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE upload_id = ?")
        .bind(upload_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Delete an upload and everything hanging off it (records, sessions,
/// messages). Returns false if the upload does not exist.
///
/// Deletes are explicit rather than relying on the FK cascade alone, so
/// the batch stays correct even against a connection without the
/// foreign_keys pragma.
pub async fn delete_upload(pool: &SqlitePool, upload_id: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM uploads WHERE id = ?")
        .bind(upload_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM chat_messages WHERE session_id IN (SELECT id FROM chat_sessions WHERE upload_id = ?)",
    )
    .bind(upload_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM chat_sessions WHERE upload_id = ?")
        .bind(upload_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM records WHERE upload_id = ?")
        .bind(upload_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM uploads WHERE id = ?")
        .bind(upload_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

/// Session for an upload + client token, created lazily on first access.
pub async fn get_or_create_session(
    pool: &SqlitePool,
    upload_id: &str,
    session_token: &str,
) -> Result<ChatSession> {
    if let Some(session) = find_session(pool, upload_id, session_token).await? {
        return Ok(session);
    }

    let session = ChatSession {
        id: Uuid::new_v4().to_string(),
        upload_id: upload_id.to_string(),
        session_token: session_token.to_string(),
        created_at: chrono::Utc::now().timestamp(),
    };

    sqlx::query(
        r#"
        INSERT INTO chat_sessions (id, upload_id, session_token, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(upload_id, session_token) DO NOTHING
        "#,
    )
    .bind(&session.id)
    .bind(&session.upload_id)
    .bind(&session.session_token)
    .bind(session.created_at)
    .execute(pool)
    .await?;

    // Re-read in case a concurrent insert won the conflict
    find_session(pool, upload_id, session_token)
        .await?
        .context("chat session vanished after insert")
}

pub async fn find_session(
    pool: &SqlitePool,
    upload_id: &str,
    session_token: &str,
) -> Result<Option<ChatSession>> {
    let row = sqlx::query(
        "SELECT id, upload_id, session_token, created_at FROM chat_sessions WHERE upload_id = ? AND session_token = ?",
    )
    .bind(upload_id)
    .bind(session_token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| ChatSession {
        id: row.get("id"),
        upload_id: row.get("upload_id"),
        session_token: row.get("session_token"),
        created_at: row.get("created_at"),
    }))
}

/// Append a message to a session. Messages are never mutated or removed
/// individually.
pub async fn append_message(
    pool: &SqlitePool,
    session_id: &str,
    role: &str,
    content: &str,
) -> Result<ChatMessage> {
    let message = ChatMessage {
        id: Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        role: role.to_string(),
        content: content.to_string(),
        created_at: chrono::Utc::now().timestamp(),
    };

    sqlx::query(
        r#"
        INSERT INTO chat_messages (id, session_id, role, content, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.id)
    .bind(&message.session_id)
    .bind(&message.role)
    .bind(&message.content)
    .bind(message.created_at)
    .execute(pool)
    .await?;

    Ok(message)
}

/// Full message history for a session, oldest first.
pub async fn session_messages(pool: &SqlitePool, session_id: &str) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT id, session_id, role, content, created_at
        FROM chat_messages
        WHERE session_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ChatMessage {
            id: row.get("id"),
            session_id: row.get("session_id"),
            role: row.get("role"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
        .collect())
}

fn upload_from_row(row: SqliteRow) -> Result<Upload> {
    Ok(Upload {
        id: row.get("id"),
        name: row.get("name"),
        file_path: row.get("file_path"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_at: row.get("uploaded_at"),
        processed: row.get::<i64, _>("processed") != 0,
    })
}

fn record_from_row(row: SqliteRow) -> Result<Record> {
    let data_json: String = row.get("data_json");
    let data = serde_json::from_str(&data_json).context("invalid record data_json")?;
    Ok(Record {
        id: row.get("id"),
        upload_id: row.get("upload_id"),
        data,
        score: row.get("score"),
        rank: row.get("rank"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig, ServerConfig};
    use crate::models::{ROLE_ASSISTANT, ROLE_USER};
    use crate::{db, migrate};
    use serde_json::json;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            db: DbConfig {
                path: tmp.path().join("rankchat.sqlite"),
            },
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
            },
            llm: Default::default(),
            ranking: Default::default(),
            scoring: Default::default(),
        };
        migrate::run_migrations(&config).await.unwrap();
        let pool = db::connect(&config).await.unwrap();
        (tmp, pool)
    }

    fn sample_upload(id: &str) -> Upload {
        Upload {
            id: id.to_string(),
            name: "people.csv".to_string(),
            file_path: None,
            uploaded_by: None,
            uploaded_at: chrono::Utc::now().timestamp(),
            processed: false,
        }
    }

    fn sample_rows() -> Vec<RankedRow> {
        vec![
            RankedRow {
                data: json!({"name": "b", "points": 9.0}).as_object().unwrap().clone(),
                score: 9.0,
                rank: 1,
            },
            RankedRow {
                data: json!({"name": "a", "points": 3.0}).as_object().unwrap().clone(),
                score: 3.0,
                rank: 2,
            },
        ]
    }

    #[tokio::test]
    async fn test_upload_batch_and_window() {
        let (_tmp, pool) = test_pool().await;
        let upload = sample_upload("u1");
        create_upload_with_records(&pool, &upload, &sample_rows())
            .await
            .unwrap();

        let stored = get_upload(&pool, "u1").await.unwrap().unwrap();
        assert!(stored.processed);

        let top = top_records(&pool, "u1", 20).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[0].score, 9.0);
        assert_eq!(top[0].data["name"], json!("b"));
        assert_eq!(count_records(&pool, "u1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_session_lazy_creation_is_stable() {
        let (_tmp, pool) = test_pool().await;
        create_upload_with_records(&pool, &sample_upload("u1"), &sample_rows())
            .await
            .unwrap();

        let first = get_or_create_session(&pool, "u1", "tok").await.unwrap();
        let second = get_or_create_session(&pool, "u1", "tok").await.unwrap();
        assert_eq!(first.id, second.id);

        let other = get_or_create_session(&pool, "u1", "tok2").await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_messages_ordered() {
        let (_tmp, pool) = test_pool().await;
        create_upload_with_records(&pool, &sample_upload("u1"), &sample_rows())
            .await
            .unwrap();
        let session = get_or_create_session(&pool, "u1", "tok").await.unwrap();

        append_message(&pool, &session.id, ROLE_USER, "hello").await.unwrap();
        append_message(&pool, &session.id, ROLE_ASSISTANT, "hi").await.unwrap();

        let messages = session_messages(&pool, &session.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ROLE_USER);
        assert_eq!(messages[1].role, ROLE_ASSISTANT);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_everything() {
        let (_tmp, pool) = test_pool().await;
        create_upload_with_records(&pool, &sample_upload("u1"), &sample_rows())
            .await
            .unwrap();
        let session = get_or_create_session(&pool, "u1", "tok").await.unwrap();
        append_message(&pool, &session.id, ROLE_USER, "hello").await.unwrap();

        assert!(delete_upload(&pool, "u1").await.unwrap());

        assert!(get_upload(&pool, "u1").await.unwrap().is_none());
        assert_eq!(count_records(&pool, "u1").await.unwrap(), 0);
        assert!(find_session(&pool, "u1", "tok").await.unwrap().is_none());
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_delete_missing_upload() {
        let (_tmp, pool) = test_pool().await;
        assert!(!delete_upload(&pool, "nope").await.unwrap());
    }
}
