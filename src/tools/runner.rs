// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Terminal command runners
//!
//! `run_terminal_command` and `get_file_history` delegate to a
//! [`CommandRunner`]. The HTTP runner talks to a command endpoint using the
//! `{toolName, parameters}` request shape; the local runner spawns `sh -c`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{KilnError, Result};

const MAX_OUTPUT_BYTES: usize = 30_000;

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a shell command. A failure carries the runner's message verbatim.
    async fn run(&self, command: &str, cwd: Option<&Path>) -> Result<String>;
}

/// Runner that forwards commands to a remote execution endpoint
pub struct HttpCommandRunner {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteToolRequest<'a> {
    tool_name: &'a str,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ExecuteToolResponse {
    status: Option<String>,
    output: Option<String>,
    message: Option<String>,
}

impl HttpCommandRunner {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for HttpCommandRunner {
    async fn run(&self, command: &str, _cwd: Option<&Path>) -> Result<String> {
        let body = ExecuteToolRequest {
            tool_name: "run_terminal_command",
            parameters: json!({ "command": command }),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| KilnError::ToolEffect(format!("Command endpoint unreachable: {}", e)))?;

        let http_status = response.status();
        let parsed: ExecuteToolResponse = response.json().await.map_err(|e| {
            KilnError::ToolEffect(format!(
                "Command endpoint returned an unreadable response ({}): {}",
                http_status, e
            ))
        })?;

        if parsed.status.as_deref() == Some("Success") {
            Ok(parsed.output.unwrap_or_default())
        } else {
            Err(KilnError::ToolEffect(parsed.message.unwrap_or_else(|| {
                format!("Command failed with HTTP status {}", http_status)
            })))
        }
    }
}

/// Runner that executes commands on this machine
#[derive(Debug, Default, Clone)]
pub struct LocalCommandRunner;

impl LocalCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for LocalCommandRunner {
    async fn run(&self, command: &str, cwd: Option<&Path>) -> Result<String> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let output = cmd
            .output()
            .await
            .map_err(|e| KilnError::ToolEffect(format!("Failed to spawn command: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let mut text = stdout.to_string();
            if !stderr.is_empty() {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&stderr);
            }
            Ok(truncate_output(text))
        } else {
            let code = output.status.code().unwrap_or(-1);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            let message = if detail.is_empty() {
                format!("Command failed with exit code {}", code)
            } else {
                format!("Command failed with exit code {}: {}", code, detail)
            };
            Err(KilnError::ToolEffect(truncate_output(message)))
        }
    }
}

fn truncate_output(mut text: String) -> String {
    if text.len() <= MAX_OUTPUT_BYTES {
        return text;
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("\n... (output truncated)");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_local_runner_success() {
        let runner = LocalCommandRunner::new();
        let out = runner.run("echo hello", None).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_local_runner_uses_cwd() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("marker.txt"), "").unwrap();
        let runner = LocalCommandRunner::new();
        let out = runner.run("ls", Some(temp_dir.path())).await.unwrap();
        assert!(out.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_local_runner_failure_carries_stderr() {
        let runner = LocalCommandRunner::new();
        let err = runner.run("echo broken >&2; exit 3", None).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit code 3"));
        assert!(msg.contains("broken"));
    }

    #[tokio::test]
    async fn test_http_runner_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/execute-tool"))
            .and(body_json(json!({
                "toolName": "run_terminal_command",
                "parameters": {"command": "ls"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "Success", "output": "a.txt\n"})),
            )
            .mount(&server)
            .await;

        let runner = HttpCommandRunner::new(format!("{}/api/execute-tool", server.uri()));
        assert_eq!(runner.run("ls", None).await.unwrap(), "a.txt\n");
    }

    #[tokio::test]
    async fn test_http_runner_failure_message_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"status": "Error", "message": "command not found: foo"})),
            )
            .mount(&server)
            .await;

        let runner = HttpCommandRunner::new(server.uri());
        let err = runner.run("foo", None).await.unwrap_err();
        assert_eq!(err.to_string(), "command not found: foo");
    }

    #[test]
    fn test_truncate_output_char_boundary() {
        let text = "é".repeat(MAX_OUTPUT_BYTES);
        let out = truncate_output(text);
        assert!(out.ends_with("(output truncated)"));
    }
}
