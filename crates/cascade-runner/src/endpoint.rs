//! OpenAI-compatible inference endpoints as cascade capabilities.
//!
//! - [`EndpointExecutor`]: one chat completion per attempt, routed by tier rank
//! - [`EndpointReviewer`]: asks the reviewer tier's endpoint for a JSON verdict
//!
//! Failure mapping for the executor:
//!
//! | Condition                         | Result                 |
//! |-----------------------------------|------------------------|
//! | connect/read error, 429, 5xx      | `Infra` (micro-retried)|
//! | undecodable body                  | `Infra` (micro-retried)|
//! | other non-2xx, no/empty content   | `Logic`                |
//! | reply starts with `ESCALATE:`     | `EscalateRequired`     |

use async_trait::async_trait;
use coordination::{
    ExecutionFailure, Executor, FeedbackEntry, InfraFault, ReviewDecision, ReviewGate, Task, Tier,
};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::prompts;

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for one tier
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Endpoint {
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.url.trim_end_matches('/'))
    }
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },

    #[error("no completion content from {url} (finish_reason: {})", .finish_reason.as_deref().unwrap_or("none"))]
    NoContent {
        url: String,
        finish_reason: Option<String>,
    },

    #[error("no endpoint configured for tier rank {0}")]
    UnknownTier(u32),
}

impl EndpointError {
    /// Worth retrying unchanged: transport faults, undecodable bodies,
    /// rate limits, server errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Malformed { .. } => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::NoContent { .. } | Self::UnknownTier(_) => false,
        }
    }
}

impl From<EndpointError> for ExecutionFailure {
    fn from(err: EndpointError) -> Self {
        if err.is_transient() {
            ExecutionFailure::infra(err.to_string())
        } else {
            ExecutionFailure::logic(err.to_string())
        }
    }
}

/// Thin chat-completions client shared by executor and reviewer
#[derive(Debug, Clone, Default)]
pub struct ChatClient {
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// One chat completion; returns the first choice's content
    pub async fn complete(
        &self,
        endpoint: &Endpoint,
        system: &str,
        user: &str,
    ) -> Result<String, EndpointError> {
        let url = endpoint.completions_url();
        let body = serde_json::json!({
            "model": endpoint.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "max_tokens": endpoint.max_tokens,
            "temperature": endpoint.temperature,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &endpoint.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| EndpointError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(EndpointError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value =
            response.json().await.map_err(|e| EndpointError::Malformed {
                url: url.clone(),
                message: e.to_string(),
            })?;
        completion_content(url, &json)
    }
}

/// First choice's content from a decoded completion body. A body that
/// decoded but carries no content (refusal, content filter) is the
/// model's answer, not a transport fault.
pub fn completion_content(url: String, json: &serde_json::Value) -> Result<String, EndpointError> {
    let choice = &json["choices"][0];
    match choice["message"]["content"].as_str() {
        Some(content) => Ok(content.to_string()),
        None => Err(EndpointError::NoContent {
            url,
            finish_reason: choice["finish_reason"].as_str().map(str::to_string),
        }),
    }
}

/// Classify an executor reply
pub fn interpret_reply(reply: String) -> Result<String, ExecutionFailure> {
    let trimmed = reply.trim_start();
    if let Some(reason) = trimmed.strip_prefix(prompts::ESCALATE_MARKER) {
        return Err(ExecutionFailure::escalate(reason.trim()));
    }
    if trimmed.is_empty() {
        return Err(ExecutionFailure::logic("endpoint returned an empty completion"));
    }
    Ok(reply)
}

/// Executor backed by one endpoint per tier rank
pub struct EndpointExecutor {
    client: ChatClient,
    endpoints: HashMap<u32, Endpoint>,
}

impl EndpointExecutor {
    pub fn new(client: ChatClient, endpoints: HashMap<u32, Endpoint>) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl Executor for EndpointExecutor {
    async fn execute(
        &self,
        task: &Task,
        tier: &Tier,
        feedback: &[FeedbackEntry],
    ) -> Result<String, ExecutionFailure> {
        let endpoint = self
            .endpoints
            .get(&tier.rank)
            .ok_or(EndpointError::UnknownTier(tier.rank))?;
        let prompt = prompts::build_attempt_prompt(task, tier, feedback);
        debug!(
            tier = %tier,
            model = %endpoint.model,
            prompt_chars = prompt.len(),
            prompt_version = prompts::PROMPT_VERSION,
            "Requesting completion"
        );
        let reply = self
            .client
            .complete(endpoint, prompts::EXECUTOR_PREAMBLE, &prompt)
            .await?;
        interpret_reply(reply)
    }
}

#[derive(Debug, Deserialize)]
struct Verdict {
    decision: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    items: Vec<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reason: Option<String>,
}

/// Parse a reviewer reply. Anything unparseable is treated as a change
/// request so unreviewed output is never accepted.
pub fn parse_verdict(reply: &str) -> ReviewDecision {
    let json = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return unparseable(reply),
    };
    let Ok(verdict) = serde_json::from_str::<Verdict>(json) else {
        return unparseable(reply);
    };

    match verdict.decision.trim().to_ascii_lowercase().as_str() {
        "approve" | "approved" => ReviewDecision::Approve,
        "request_changes" => ReviewDecision::request_changes(
            verdict
                .summary
                .unwrap_or_else(|| "reviewer requested changes".to_string()),
            verdict.items,
        ),
        "reject" | "rejected" => ReviewDecision::reject(
            verdict.confidence.unwrap_or(0.5),
            verdict
                .reason
                .or(verdict.summary)
                .unwrap_or_else(|| "no reason given".to_string()),
        ),
        _ => unparseable(reply),
    }
}

fn unparseable(reply: &str) -> ReviewDecision {
    let excerpt: String = reply.chars().take(200).collect();
    ReviewDecision::request_changes(
        "reviewer verdict could not be parsed",
        vec![excerpt],
    )
}

/// Review gate backed by the reviewer tier's endpoint
pub struct EndpointReviewer {
    client: ChatClient,
    endpoints: HashMap<u32, Endpoint>,
}

impl EndpointReviewer {
    pub fn new(client: ChatClient, endpoints: HashMap<u32, Endpoint>) -> Self {
        Self { client, endpoints }
    }
}

#[async_trait]
impl ReviewGate for EndpointReviewer {
    async fn review(
        &self,
        reviewer: &Tier,
        output: &str,
        feedback: &[FeedbackEntry],
    ) -> Result<ReviewDecision, InfraFault> {
        let endpoint = self
            .endpoints
            .get(&reviewer.rank)
            .ok_or_else(|| InfraFault::new(EndpointError::UnknownTier(reviewer.rank).to_string()))?;
        let prompt = prompts::build_review_prompt(output, feedback);
        let reply = self
            .client
            .complete(endpoint, prompts::REVIEWER_PREAMBLE, &prompt)
            .await
            .map_err(|e| InfraFault::new(e.to_string()))?;
        Ok(parse_verdict(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url() {
        let endpoint = Endpoint {
            url: "http://localhost:8080/v1/".to_string(),
            model: "m".to_string(),
            api_key: None,
            max_tokens: 16,
            temperature: 0.0,
        };
        assert_eq!(
            endpoint.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_error_classification() {
        let status = |status| EndpointError::Status {
            url: "u".to_string(),
            status,
            body: String::new(),
        };
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!EndpointError::UnknownTier(3).is_transient());

        assert!(matches!(
            ExecutionFailure::from(status(502)),
            ExecutionFailure::Infra(_)
        ));
        assert!(matches!(
            ExecutionFailure::from(status(404)),
            ExecutionFailure::Logic(_)
        ));
    }

    #[test]
    fn test_decoded_body_without_content_is_logic() {
        let filtered = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "content_filter"}]
        });
        let err = completion_content("u".to_string(), &filtered).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("content_filter"));
        match ExecutionFailure::from(err) {
            ExecutionFailure::Logic(message) => assert!(message.contains("no completion content")),
            other => panic!("unexpected: {other:?}"),
        }

        let empty = serde_json::json!({"choices": []});
        let err = completion_content("u".to_string(), &empty).unwrap_err();
        assert!(matches!(err, EndpointError::NoContent { finish_reason: None, .. }));

        let ok = serde_json::json!({"choices": [{"message": {"content": "fn f() {}"}}]});
        assert_eq!(completion_content("u".to_string(), &ok).unwrap(), "fn f() {}");

        let undecodable = EndpointError::Malformed {
            url: "u".to_string(),
            message: "expected value at line 1".to_string(),
        };
        assert!(undecodable.is_transient());
    }

    #[test]
    fn test_interpret_reply() {
        assert_eq!(interpret_reply("fn main() {}".to_string()).unwrap(), "fn main() {}");
        match interpret_reply("  ESCALATE: needs unsafe FFI work".to_string()) {
            Err(ExecutionFailure::EscalateRequired(reason)) => {
                assert_eq!(reason, "needs unsafe FFI work")
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            interpret_reply("   \n".to_string()),
            Err(ExecutionFailure::Logic(_))
        ));
    }

    #[test]
    fn test_parse_verdicts() {
        assert!(parse_verdict(r#"{"decision": "approve"}"#).is_approved());

        let changes = parse_verdict(
            "Here you go:\n{\"decision\":\"request_changes\",\"summary\":\"no tests\",\"items\":[\"add a test\"]}",
        );
        assert_eq!(
            changes,
            ReviewDecision::request_changes("no tests", vec!["add a test".to_string()])
        );

        match parse_verdict(r#"{"decision":"reject","confidence":0.8,"reason":"wrong algorithm"}"#) {
            ReviewDecision::Reject { confidence, reason } => {
                assert!((confidence - 0.8).abs() < f32::EPSILON);
                assert_eq!(reason, "wrong algorithm");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_unparseable_verdict_fails_closed() {
        for reply in ["LGTM!", "{not json}", r#"{"decision":"maybe"}"#] {
            match parse_verdict(reply) {
                ReviewDecision::RequestChanges { feedback } => {
                    assert_eq!(feedback.summary, "reviewer verdict could not be parsed")
                }
                other => panic!("{reply}: unexpected {other}"),
            }
        }
    }
}
