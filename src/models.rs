//! Core data models used throughout rankchat.
//!
//! These types represent the uploads, ranked records, and chat state that
//! flow through the ingestion and relay pipeline.

use serde::Serialize;

/// One ingested CSV file, stored in SQLite.
#[derive(Debug, Clone, Serialize)]
pub struct Upload {
    pub id: String,
    pub name: String,
    pub file_path: Option<String>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: i64,
    pub processed: bool,
}

/// One row of an upload plus its computed score and 1-based rank.
///
/// Rank is dense and unique within an upload, assigned by descending
/// score at ingestion time and never recomputed afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: String,
    pub upload_id: String,
    pub data: serde_json::Map<String, serde_json::Value>,
    pub score: f64,
    pub rank: i64,
    pub created_at: i64,
}

/// Output of the scoring transform before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub data: serde_json::Map<String, serde_json::Value>,
    pub score: f64,
    pub rank: i64,
}

/// A persisted conversation tied to one upload.
///
/// `session_token` is the client-supplied handle; `id` is the unique
/// external session identifier.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub id: String,
    pub upload_id: String,
    pub session_token: String,
    pub created_at: i64,
}

/// Message roles within a chat session.
pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// One message in a chat session. Messages are append-only; `created_at`
/// (with insertion order as tie-break) defines the total order.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: i64,
}
