//! End-to-end runner pipeline: endpoint executor + command gate + controller.
//!
//! Each tier is served by a tiny scripted HTTP server on localhost that
//! replays canned chat-completion responses and records request bodies.

use cascade_runner::config::RunnerConfig;
use cascade_runner::endpoint::{ChatClient, EndpointExecutor, EndpointReviewer};
use cascade_runner::gate::CommandGate;
use cascade_runner::telemetry;
use coordination::{CascadeController, FailureCategory, FeedbackSource, Outcome, Task};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Scripted chat endpoint. Replies are replayed in order; the last one repeats.
struct StubEndpoint {
    url: String,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl StubEndpoint {
    async fn start(replies: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let body = read_request_body(&mut stream).await;
                recorded
                    .lock()
                    .unwrap()
                    .push(serde_json::from_slice(&body).unwrap_or_default());

                let (status, content) = replies[served.min(replies.len() - 1)];
                served += 1;
                let payload = if status == 200 {
                    serde_json::json!({
                        "choices": [{"message": {"role": "assistant", "content": content}}]
                    })
                    .to_string()
                } else {
                    content.to_string()
                };
                let response = format!(
                    "HTTP/1.1 {status} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                    payload.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            url: format!("http://{addr}/v1"),
            requests,
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r["messages"][1]["content"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

async fn read_request_body(stream: &mut tokio::net::TcpStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return Vec::new();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let start = pos + 4;
            while buf.len() < start + length {
                let n = stream.read(&mut chunk).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            return buf[start..].to_vec();
        }
    }
}

fn config_toml(fast_url: &str, strong_url: &str, review: bool) -> String {
    let reviewer = if review { "reviewer_rank = 1\n" } else { "" };
    format!(
        r#"
check_timeout_ms = 10000

[retry]
micro_retries = 1
backoff_base_ms = 1
backoff_max_ms = 5

[timeouts]
executor_ms = 10000
gate_ms = 20000
review_ms = 10000

[[tiers]]
name = "fast"
rank = 0
max_attempts = 2
unit_cost = 1
{reviewer}url = "{fast_url}"
model = "small"

[[tiers]]
name = "strong"
rank = 1
max_attempts = 1
unit_cost = 10
url = "{strong_url}"
model = "large"

[[checks]]
name = "no_todo"
command = "sh -c '! grep -q todo'"
hint = "remove every todo"
"#
    )
}

fn controller(config: &RunnerConfig, review: bool) -> CascadeController {
    let endpoints = config.endpoints().unwrap();
    let client = ChatClient::new();
    let executor = Arc::new(EndpointExecutor::new(client.clone(), endpoints.clone()));
    let gate = Arc::new(CommandGate::from_config(config).unwrap());
    let controller = CascadeController::new(config.cascade_config(), executor, gate).unwrap();
    if review {
        controller.with_review_gate(Arc::new(EndpointReviewer::new(client, endpoints)))
    } else {
        controller
    }
}

#[tokio::test]
async fn escalates_to_strong_tier_with_feedback() {
    let fast = StubEndpoint::start(vec![(200, "fn f() { todo!() }")]).await;
    let strong = StubEndpoint::start(vec![
        (503, r#"{"error":"overloaded"}"#),
        (200, "fn f() -> u32 { 4 }"),
    ])
    .await;
    let config = RunnerConfig::from_toml_str(&config_toml(&fast.url, &strong.url, false)).unwrap();
    let ladder = config.ladder().unwrap();

    let outcome = controller(&config, false)
        .run(Task::new("implement f"), &ladder, &CancellationToken::new())
        .await
        .unwrap();

    match &outcome {
        Outcome::Success(report) => {
            assert_eq!(report.tier, "strong");
            assert_eq!(report.output, "fn f() -> u32 { 4 }");
        }
        other => panic!("expected success, got {}", other.summary()),
    }
    assert_eq!(outcome.total_attempts(), 3);
    // 2 fast calls, the 503 and the retry on strong
    assert_eq!(outcome.total_cost(), 1 + 1 + 10 + 10);

    let history = outcome.feedback_history();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .all(|e| e.category == FailureCategory::Logic && e.hint.as_deref() == Some("remove every todo")));

    let fast_prompts = fast.prompts();
    assert_eq!(fast_prompts.len(), 2);
    assert!(!fast_prompts[0].contains("Previous attempts"));
    assert!(fast_prompts[1].contains("Previous attempts (1 failed)"));
    let strong_prompts = strong.prompts();
    assert_eq!(strong_prompts.len(), 2);
    assert!(strong_prompts[1].contains("Previous attempts (2 failed)"));
}

#[tokio::test]
async fn escalate_marker_skips_fast_tier() {
    let fast = StubEndpoint::start(vec![(200, "ESCALATE: requires a new crate")]).await;
    let strong = StubEndpoint::start(vec![(200, "fn f() {}")]).await;
    let config = RunnerConfig::from_toml_str(&config_toml(&fast.url, &strong.url, false)).unwrap();
    let ladder = config.ladder().unwrap();

    let outcome = controller(&config, false)
        .run(Task::new("implement f"), &ladder, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(fast.prompts().len(), 1);
    assert_eq!(outcome.total_attempts(), 2);
    let entry = &outcome.feedback_history()[0];
    assert_eq!(entry.category, FailureCategory::EscalateRequired);
    assert!(entry.description.summary.contains("requires a new crate"));
}

#[tokio::test]
async fn reviewer_endpoint_requests_changes() {
    let fast = StubEndpoint::start(vec![(200, "fn f() {}")]).await;
    let strong = StubEndpoint::start(vec![
        (
            200,
            r#"{"decision":"request_changes","summary":"missing docs","items":["document f"]}"#,
        ),
        (200, r#"{"decision":"approve"}"#),
    ])
    .await;
    let config = RunnerConfig::from_toml_str(&config_toml(&fast.url, &strong.url, true)).unwrap();
    let ladder = config.ladder().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let sink = dir.path().join("outcomes.jsonl");
    let outcome = controller(&config, true)
        .run(Task::new("implement f"), &ladder, &CancellationToken::new())
        .await
        .unwrap();
    telemetry::append_outcome(&outcome, &sink);

    match &outcome {
        Outcome::Success(report) => assert_eq!(report.tier, "fast"),
        other => panic!("expected success, got {}", other.summary()),
    }
    assert_eq!(outcome.total_attempts(), 2);
    let entry = &outcome.feedback_history()[0];
    assert_eq!(entry.source, FeedbackSource::Review);
    assert!(entry.description.summary.contains("missing docs"));
    assert_eq!(strong.prompts().len(), 2);

    let recorded = telemetry::read_outcomes(&sink).unwrap();
    assert_eq!(recorded, vec![outcome]);
}
