// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Google Gemini API provider implementation
//!
//! Streams `models/{model}:streamGenerateContent` over server-sent events.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ApiError, KilnError, Result};
use crate::llm::message::{FunctionCall, Part, Role, Turn};
use crate::llm::provider::{
    ChunkStream, FinishReason, GenerateRequest, LlmProvider, StreamChunk, ToolDefinition,
};

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini provider. The credential travels with each request.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self::with_base_url(GEMINI_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    /// Build the request body
    fn build_request(&self, request: &GenerateRequest) -> GeminiRequest {
        let mut tools = Vec::new();
        if !request.tools.is_empty() {
            tools.push(json!({ "functionDeclarations": convert_tools(&request.tools) }));
        }
        if request.web_search {
            tools.push(json!({ "googleSearch": {} }));
        }

        GeminiRequest {
            contents: request.contents.iter().map(convert_turn).collect(),
            system_instruction: request.system.as_ref().map(|text| GeminiContent {
                role: None,
                parts: vec![Part::text(text.clone())],
            }),
            tools,
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: "BLOCK_MEDIUM_AND_ABOVE".to_string(),
                })
                .collect(),
        }
    }

    /// Parse an error response
    fn parse_error(&self, status: u16, body: &str) -> KilnError {
        let Ok(parsed) = serde_json::from_str::<GeminiErrorBody>(body) else {
            return KilnError::Api(ApiError::ServerError {
                status,
                message: body.to_string(),
            });
        };
        let message = parsed.error.message;
        let error = match (status, parsed.error.status.as_deref()) {
            (401 | 403, _) | (_, Some("PERMISSION_DENIED" | "UNAUTHENTICATED")) => {
                ApiError::AuthenticationFailed
            }
            (400, _) if message.contains("API key") => ApiError::AuthenticationFailed,
            (429, _) | (_, Some("RESOURCE_EXHAUSTED")) => ApiError::RateLimited(message),
            (404, _) | (_, Some("NOT_FOUND")) => ApiError::ModelNotFound(message),
            _ => ApiError::ServerError { status, message },
        };
        KilnError::Api(error)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream_generate(&self, request: GenerateRequest) -> Result<ChunkStream> {
        let body = self.build_request(&request);

        tracing::debug!(
            target: "kiln.llm.gemini",
            model = %request.model,
            turns = request.contents.len(),
            tools = request.tools.len(),
            web_search = request.web_search,
            "starting streamed generation"
        );

        let response = self
            .client
            .post(self.stream_url(&request.model))
            .header("x-goog-api-key", &request.credential)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| KilnError::Api(ApiError::Network(e.to_string())))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status, &body));
        }

        let chunk_stream = response
            .bytes_stream()
            .map(|result| result.map_err(|e| KilnError::Api(ApiError::StreamError(e.to_string()))))
            .scan(Vec::<u8>::new(), |buffer, result| {
                let bytes = match result {
                    Ok(bytes) => bytes,
                    Err(e) => return futures::future::ready(Some(vec![Err(e)])),
                };

                buffer.extend_from_slice(&bytes);
                let chunks = drain_sse_events(buffer)
                    .iter()
                    .filter_map(|event| parse_sse_event(event))
                    .collect::<Vec<_>>();

                futures::future::ready(Some(chunks))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(chunk_stream))
    }
}

/// Tool turns go over the wire as user turns carrying function responses.
fn convert_turn(turn: &Turn) -> GeminiContent {
    let role = match turn.role {
        Role::User | Role::Tool => "user",
        Role::Model => "model",
    };
    GeminiContent {
        role: Some(role.to_string()),
        parts: turn.parts.clone(),
    }
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            let mut decl = json!({
                "name": t.name,
                "description": t.description,
            });
            let has_properties = t
                .input_schema
                .properties
                .as_object()
                .is_some_and(|p| !p.is_empty());
            if has_properties {
                decl["parameters"] = uppercase_types(json!({
                    "type": t.input_schema.schema_type,
                    "properties": t.input_schema.properties,
                    "required": t.input_schema.required,
                }));
            }
            decl
        })
        .collect()
}

/// Gemini schemas spell types as OpenAPI enum names (`STRING`, `OBJECT`).
fn uppercase_types(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if k == "type" {
                        let v = match v {
                            Value::String(s) => Value::String(s.to_uppercase()),
                            other => other,
                        };
                        (k, v)
                    } else {
                        (k, uppercase_types(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(uppercase_types).collect()),
        other => other,
    }
}

/// Split complete events off the front of `buffer`. Bytes are only decoded
/// once an event is whole, so multi-byte characters split across network
/// chunks survive.
fn drain_sse_events(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut events = Vec::new();
    while let Some((pos, len)) = event_boundary(buffer) {
        let event: Vec<u8> = buffer.drain(..pos + len).take(pos).collect();
        events.push(String::from_utf8_lossy(&event).replace("\r\n", "\n"));
    }
    events
}

fn event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let find = |needle: &[u8]| buffer.windows(needle.len()).position(|w| w == needle);
    match (find(b"\n\n"), find(b"\r\n\r\n")) {
        (Some(lf), Some(crlf)) if crlf < lf => Some((crlf, 4)),
        (Some(lf), _) => Some((lf, 2)),
        (None, Some(crlf)) => Some((crlf, 4)),
        (None, None) => None,
    }
}

/// Parse one server-sent event into a chunk
fn parse_sse_event(event_str: &str) -> Option<Result<StreamChunk>> {
    let data: String = event_str
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");
    if data.is_empty() {
        return None;
    }

    let parsed: GeminiStreamResponse = match serde_json::from_str(&data) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Some(Err(KilnError::Api(ApiError::InvalidResponse(e.to_string()))));
        }
    };

    if let Some(error) = parsed.error {
        return Some(Err(KilnError::Api(ApiError::StreamError(error.message))));
    }

    let candidate = parsed.candidates.into_iter().next();
    let Some(candidate) = candidate else {
        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Some(Err(KilnError::Api(ApiError::Blocked(reason))));
        }
        return None;
    };

    let mut chunk = StreamChunk::default();
    if let Some(content) = candidate.content {
        for part in content.parts {
            if let Some(text) = part.text {
                if !part.thought {
                    chunk.text.push_str(&text);
                }
            }
            if let Some(call) = part.function_call {
                chunk.function_calls.push(FunctionCall {
                    name: call.name,
                    args: call.args.unwrap_or_else(|| json!({})),
                    id: call.id,
                });
            }
        }
    }
    chunk.finish_reason = candidate.finish_reason.as_deref().map(FinishReason::from_wire);

    Some(Ok(chunk))
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

/// Response parts may carry extra fields (thought signatures), so they are
/// read leniently rather than through [`Part`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Option<Value>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::FunctionResponse;
    use crate::llm::provider::ToolInputSchema;

    fn tool(name: &str, properties: Value) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: format!("{} tool", name),
            input_schema: ToolInputSchema {
                schema_type: "object".to_string(),
                properties,
                required: vec![],
            },
        }
    }

    #[test]
    fn test_drain_keeps_split_multibyte_characters() {
        let event = "data: {\"text\":\"你好\"}\n\n".as_bytes();
        let split = event.iter().position(|&b| b >= 0x80).unwrap() + 1;

        let mut buffer = event[..split].to_vec();
        assert!(drain_sse_events(&mut buffer).is_empty());
        buffer.extend_from_slice(&event[split..]);
        assert_eq!(drain_sse_events(&mut buffer), vec!["data: {\"text\":\"你好\"}".to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_handles_crlf_and_leftovers() {
        let mut buffer = b"data: a\r\n\r\ndata: b\n\ndata: c".to_vec();
        assert_eq!(drain_sse_events(&mut buffer), vec!["data: a", "data: b"]);
        assert_eq!(buffer, b"data: c");
    }

    #[test]
    fn test_stream_url() {
        let provider = GeminiProvider::with_base_url("http://localhost:9/v1beta/");
        assert_eq!(
            provider.stream_url("gemini-2.5-pro"),
            "http://localhost:9/v1beta/models/gemini-2.5-pro:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_build_request_maps_roles_and_tools() {
        let provider = GeminiProvider::new();
        let contents = vec![
            Turn::user("hi"),
            Turn::model("hello"),
            Turn::tool_responses(vec![FunctionResponse {
                name: "read_file".to_string(),
                response: json!({"content": "x"}),
                id: None,
            }]),
        ];
        let request = GenerateRequest::new("k", "m", contents)
            .with_system("sys")
            .with_tools(vec![
                tool("read_file", json!({"filename": {"type": "string"}})),
                tool("get_project_structure", json!({})),
            ])
            .with_web_search(true);

        let body = serde_json::to_value(provider.build_request(&request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["role"], "user");
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"]["name"],
            "read_file"
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");

        let decls = &body["tools"][0]["functionDeclarations"];
        assert_eq!(decls[0]["parameters"]["type"], "OBJECT");
        assert_eq!(
            decls[0]["parameters"]["properties"]["filename"]["type"],
            "STRING"
        );
        assert!(decls[1].get("parameters").is_none());
        assert!(body["tools"][1].get("googleSearch").is_some());
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_build_request_without_tools_or_search() {
        let provider = GeminiProvider::new();
        let request = GenerateRequest::new("k", "m", vec![Turn::user("hi")]);
        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_parse_sse_text_chunk() {
        let event = r#"data: {"candidates":[{"content":{"parts":[{"text":"Hel"}],"role":"model"}}]}"#;
        let chunk = parse_sse_event(event).unwrap().unwrap();
        assert_eq!(chunk.text, "Hel");
        assert!(chunk.finish_reason.is_none());
    }

    #[test]
    fn test_parse_sse_function_call_with_signature() {
        let event = r#"data: {"candidates":[{"content":{"parts":[{"functionCall":{"name":"read_file","args":{"filename":"a.js"}},"thoughtSignature":"abc"}],"role":"model"},"finishReason":"STOP"}]}"#;
        let chunk = parse_sse_event(event).unwrap().unwrap();
        assert_eq!(chunk.function_calls.len(), 1);
        assert_eq!(chunk.function_calls[0].args["filename"], "a.js");
        assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_parse_sse_skips_thoughts() {
        let event = r#"data: {"candidates":[{"content":{"parts":[{"text":"thinking","thought":true},{"text":"answer"}]}}]}"#;
        let chunk = parse_sse_event(event).unwrap().unwrap();
        assert_eq!(chunk.text, "answer");
    }

    #[test]
    fn test_parse_sse_blocked_prompt() {
        let event = r#"data: {"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = parse_sse_event(event).unwrap().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_parse_sse_ignores_non_data_lines() {
        assert!(parse_sse_event(": keep-alive").is_none());
    }

    #[test]
    fn test_parse_sse_invalid_json() {
        let err = parse_sse_event("data: {nope").unwrap().unwrap_err();
        assert!(err.to_string().contains("Invalid API response"));
    }

    #[test]
    fn test_parse_error_invalid_key() {
        let provider = GeminiProvider::new();
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let err = provider.parse_error(400, body);
        assert!(matches!(err, KilnError::Api(ApiError::AuthenticationFailed)));
    }

    #[test]
    fn test_parse_error_quota() {
        let provider = GeminiProvider::new();
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = provider.parse_error(429, body);
        assert!(matches!(err, KilnError::Api(ApiError::RateLimited(_))));
    }

    #[test]
    fn test_parse_error_not_json() {
        let provider = GeminiProvider::new();
        let err = provider.parse_error(502, "bad gateway");
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("bad gateway"));
    }
}
