//! Chat relay: prompt assembly and the generation-service client.
//!
//! The relay turns a user question plus a slice of ranked data into a
//! single prompt, sends it to a local Ollama-compatible endpoint
//! (`POST /api/generate`, non-streaming), and maps every failure mode of
//! that call to a displayable chat message. The chat UI always shows
//! something; a relay fault never aborts a chat turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;
use crate::models::Record;

/// Shown when the model replies without a `response` field.
pub const FALLBACK_REPLY: &str = "Sorry, I could not generate a response.";

/// Shown when the endpoint cannot be reached at all.
pub const UNREACHABLE_REPLY: &str = "Could not connect to the model service. \
Please make sure Ollama is installed and running on your system. \
You can start it with 'ollama serve'.";

/// Shown when the request exceeds the configured timeout.
pub const TIMEOUT_REPLY: &str = "Request to the model service timed out. Please try again.";

/// Build the prompt for one chat turn.
///
/// Deterministic byte-for-byte for the same inputs: each record renders
/// as `Rank {r}: {data}` in rank order with the row object serialized as
/// compact JSON (keys sorted), followed by the total record count and
/// the literal user question.
pub fn build_prompt(top_records: &[Record], total_count: i64, user_message: &str) -> String {
    let mut context_lines = String::new();
    for record in top_records {
        let data = serde_json::to_string(&record.data).unwrap_or_else(|_| "{}".to_string());
        context_lines.push_str(&format!("Rank {}: {}\n", record.rank, data));
    }

    format!(
        "You are an AI assistant helping to analyze ranked CSV data.\n\
         Here are the top {count} ranked records from the uploaded CSV:\n\
         \n\
         {context}\n\
         Total records: {total}\n\
         \n\
         User question: {question}\n\
         \n\
         Please answer the user's question about this data. Be helpful and \
         provide specific insights based on the data shown.",
        count = top_records.len(),
        context = context_lines,
        total = total_count,
        question = user_message,
    )
}

/// Errors that can occur while talking to the generation service.
#[derive(Debug)]
pub enum RelayError {
    /// The endpoint refused the connection or is otherwise unreachable.
    Unreachable(String),
    /// The request exceeded the configured timeout.
    Timeout,
    /// The endpoint answered with an error status.
    Status(u16),
    /// Anything else (bad response body, request build failure, ...).
    Other(String),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Unreachable(msg) => write!(f, "service unreachable: {}", msg),
            RelayError::Timeout => write!(f, "request timed out"),
            RelayError::Status(code) => write!(f, "service returned status {}", code),
            RelayError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

impl RelayError {
    /// The displayable chat message this fault degrades to. Every
    /// variant maps to text the user can act on; none of them surface
    /// as a hard error.
    pub fn into_reply(self) -> String {
        match self {
            RelayError::Unreachable(_) => UNREACHABLE_REPLY.to_string(),
            RelayError::Timeout => TIMEOUT_REPLY.to_string(),
            RelayError::Status(code) => format!(
                "Error connecting to the model service (status {}). \
                 Please make sure Ollama is running locally.",
                code
            ),
            RelayError::Other(msg) => format!("Error querying the model service: {}", msg),
        }
    }
}

/// Narrow seam over the external text-generation service, so chat logic
/// can be tested without a live model server.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RelayError>;
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: Option<String>,
}

/// Client for a local Ollama-compatible generation endpoint.
pub struct OllamaClient {
    endpoint: String,
    model: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Other(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    /// One synchronous request, no retries. A timeout or connection
    /// failure is terminal for this turn; the user may resubmit.
    async fn generate(&self, prompt: &str) -> Result<String, RelayError> {
        let url = format!("{}/api/generate", self.endpoint);
        debug!(model = %self.model, "sending prompt to {}", url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }

        let body: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Other(e.to_string()))?;

        Ok(body.response.unwrap_or_else(|| FALLBACK_REPLY.to_string()))
    }
}

fn classify_transport_error(err: reqwest::Error) -> RelayError {
    if err.is_timeout() {
        RelayError::Timeout
    } else if err.is_connect() {
        RelayError::Unreachable(err.to_string())
    } else {
        RelayError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(rank: i64, data: serde_json::Value) -> Record {
        Record {
            id: format!("r{}", rank),
            upload_id: "u1".to_string(),
            data: data.as_object().unwrap().clone(),
            score: 0.0,
            rank,
            created_at: 0,
        }
    }

    #[test]
    fn test_build_prompt_golden() {
        let records = vec![
            record(1, json!({"name": "b", "points": 9.0})),
            record(2, json!({"name": "a", "points": 3.0})),
        ];
        let prompt = build_prompt(&records, 5, "who is on top?");

        let expected = "You are an AI assistant helping to analyze ranked CSV data.\n\
Here are the top 2 ranked records from the uploaded CSV:\n\
\n\
Rank 1: {\"name\":\"b\",\"points\":9.0}\n\
Rank 2: {\"name\":\"a\",\"points\":3.0}\n\
\n\
Total records: 5\n\
\n\
User question: who is on top?\n\
\n\
Please answer the user's question about this data. Be helpful and provide specific insights based on the data shown.";
        assert_eq!(prompt, expected);
    }

    #[test]
    fn test_build_prompt_deterministic() {
        let records = vec![record(1, json!({"b": 1.0, "a": 2.0}))];
        let first = build_prompt(&records, 1, "q");
        let second = build_prompt(&records, 1, "q");
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_prompt_no_records() {
        let prompt = build_prompt(&[], 0, "anything there?");
        assert!(prompt.contains("Total records: 0"));
        assert!(prompt.contains("User question: anything there?"));
    }

    #[test]
    fn test_error_replies_are_fixed() {
        assert_eq!(
            RelayError::Unreachable("refused".into()).into_reply(),
            UNREACHABLE_REPLY
        );
        assert_eq!(RelayError::Timeout.into_reply(), TIMEOUT_REPLY);
        assert!(RelayError::Status(503).into_reply().contains("503"));
        assert!(RelayError::Other("boom".into()).into_reply().contains("boom"));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_unreachable() {
        // Nothing listens on this port; the send must fail with a
        // connect error, not a panic or a different variant.
        let config = LlmConfig {
            endpoint: "http://127.0.0.1:9".to_string(),
            model: "test".to_string(),
            timeout_secs: 5,
            context_records: 10,
        };
        let client = OllamaClient::new(&config).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        let reply = err.into_reply();
        assert_eq!(reply, UNREACHABLE_REPLY);
    }
}
