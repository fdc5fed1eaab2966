// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kiln::chat::engine::{ExchangeOutcome, NoopObserver, Orchestrator, UserInput, EXHAUSTED_MESSAGE};
use kiln::chat::ExchangeObserver;
use kiln::llm::credentials::CredentialRotator;
use kiln::llm::message::Role;
use kiln::llm::providers::gemini::GeminiProvider;
use kiln::llm::rate_limit::RateLimiter;
use kiln::store::MemoryStore;
use kiln::tools::editor::InMemoryEditor;
use kiln::tools::project::FsProjectTree;
use kiln::tools::runner::LocalCommandRunner;
use kiln::tools::{ToolContext, ToolExecutor, ToolRegistry};

const STREAM_PATH: &str = "/v1beta/models/gemini-2.5-flash:streamGenerateContent";

fn sse(events: &[serde_json::Value]) -> ResponseTemplate {
    let body: String = events
        .iter()
        .map(|e| format!("data: {}\r\n\r\n", e))
        .collect();
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream")
}

fn text_event(text: &str) -> serde_json::Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

fn orchestrator(server: &MockServer, project: &TempDir, keys: &[&str]) -> Orchestrator {
    let context = ToolContext::new(
        Arc::new(InMemoryEditor::new()),
        Arc::new(LocalCommandRunner::new()),
        Arc::new(MemoryStore::new()),
    );
    context.bind_project(Arc::new(FsProjectTree::open(project.path()).unwrap()));
    Orchestrator::new(
        Arc::new(GeminiProvider::with_base_url(format!("{}/v1beta", server.uri()))),
        ToolExecutor::new(ToolRegistry::with_builtins(), context),
        CredentialRotator::new(keys.iter().map(|k| k.to_string()).collect()),
        RateLimiter::from_secs(0),
        "gemini-2.5-flash",
    )
}

#[derive(Default)]
struct Messages(Vec<String>);

impl ExchangeObserver for Messages {
    fn on_message(&mut self, text: &str) {
        self.0.push(text.to_string());
    }
}

#[tokio::test]
async fn test_gemini_tool_round_trip() {
    let server = MockServer::start().await;
    let project = TempDir::new().unwrap();
    std::fs::write(project.path().join("hello.txt"), "hi there").unwrap();

    // Second round: the request carries the tool result.
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(body_string_contains("functionResponse"))
        .respond_with(sse(&[
            text_event("The file says "),
            json!({"candidates": [{"content": {"role": "model", "parts": [{"text": "hi there."}]}, "finishReason": "STOP"}]}),
        ]))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(header("x-goog-api-key", "good-key"))
        .respond_with(sse(&[json!({"candidates": [{"content": {"role": "model", "parts": [
            {"functionCall": {"name": "read_file", "args": {"filename": "hello.txt"}}}
        ]}}]})]))
        .expect(1)
        .mount(&server)
        .await;

    let mut orch = orchestrator(&server, &project, &["good-key"]);
    let outcome = orch
        .submit(UserInput::text("what does hello.txt say?"), &mut NoopObserver)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ExchangeOutcome::Completed {
            text: "The file says hi there.".to_string(),
            rounds: 2
        }
    );

    let history = orch.sessions().history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2].role, Role::Tool);
    assert_eq!(
        history[2].function_responses()[0].response,
        json!({"content": "hi there"})
    );

    let requests = server.received_requests().await.unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(second["contents"][2]["role"], "user");
    assert_eq!(
        second["contents"][2]["parts"][0]["functionResponse"]["name"],
        "read_file"
    );
    assert!(second["systemInstruction"]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Kiln"));
}

#[tokio::test]
async fn test_gemini_rejected_key_rotates_to_next() {
    let server = MockServer::start().await;
    let project = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(header("x-goog-api-key", "bad-key"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(header("x-goog-api-key", "good-key"))
        .respond_with(sse(&[text_event("Hello!")]))
        .expect(1)
        .mount(&server)
        .await;

    let mut orch = orchestrator(&server, &project, &["bad-key", "good-key"]);
    let mut messages = Messages::default();
    let outcome = orch.submit(UserInput::text("hi"), &mut messages).await.unwrap();

    assert!(matches!(outcome, ExchangeOutcome::Completed { .. }));
    assert_eq!(
        messages.0,
        vec!["API key failed. Waiting for 0s before retrying...".to_string()]
    );
    assert_eq!(orch.sessions().history().len(), 2);
}

#[tokio::test]
async fn test_gemini_all_keys_rejected() {
    let server = MockServer::start().await;
    let project = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&server)
        .await;

    let mut orch = orchestrator(&server, &project, &["k1", "k2", "k3"]);
    let mut messages = Messages::default();
    let outcome = orch.submit(UserInput::text("hi"), &mut messages).await.unwrap();

    assert_eq!(outcome, ExchangeOutcome::CredentialsExhausted);
    assert_eq!(messages.0.iter().filter(|m| *m == EXHAUSTED_MESSAGE).count(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
    assert!(orch.sessions().history().is_empty());
}
