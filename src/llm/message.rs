// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation turn types
//!
//! A session history is an append-only list of [`Turn`]s. The part encoding
//! mirrors the model API's content parts so a history snapshot can be sent
//! back verbatim when a session is rebuilt.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User text and attachments
    User,
    /// Model output: text and function calls
    Model,
    /// Function responses fed back to the model
    Tool,
}

/// Base64 image payload attached to a user turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// A function call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// The result of one function call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One content part of a turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(InlineData),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData(InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        })
    }
}

/// A single turn in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    /// A user turn holding a single text part
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// A model turn holding a single text part
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    /// A tool turn carrying one function response per call, in call order
    pub fn tool_responses(responses: Vec<FunctionResponse>) -> Self {
        Self::new(
            Role::Tool,
            responses.into_iter().map(Part::FunctionResponse).collect(),
        )
    }

    /// Concatenated text of every text part
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionCall(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn function_responses(&self) -> Vec<&FunctionResponse> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::FunctionResponse(resp) => Some(resp),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, Part::Text(t) if t.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_part_wire_encoding() {
        let part = Part::text("hi");
        assert_eq!(serde_json::to_value(&part).unwrap(), json!({"text": "hi"}));

        let part = Part::image("image/png", "AAAA");
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({"inlineData": {"mimeType": "image/png", "data": "AAAA"}})
        );

        let part = Part::FunctionCall(FunctionCall {
            name: "read_file".to_string(),
            args: json!({"filename": "a.js"}),
            id: None,
        });
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({"functionCall": {"name": "read_file", "args": {"filename": "a.js"}}})
        );
    }

    #[test]
    fn test_turn_roundtrip_with_function_response() {
        let turn = Turn::tool_responses(vec![FunctionResponse {
            name: "read_file".to_string(),
            response: json!({"content": "x"}),
            id: Some("call-1".to_string()),
        }]);
        let text = serde_json::to_string(&turn).unwrap();
        assert!(text.contains("\"role\":\"tool\""));
        let back: Turn = serde_json::from_str(&text).unwrap();
        assert_eq!(back, turn);
    }

    #[test]
    fn test_turn_accessors() {
        let turn = Turn::new(
            Role::Model,
            vec![
                Part::text("Let me "),
                Part::text("look."),
                Part::FunctionCall(FunctionCall {
                    name: "get_project_structure".to_string(),
                    args: json!({}),
                    id: None,
                }),
            ],
        );
        assert_eq!(turn.text(), "Let me look.");
        assert_eq!(turn.function_calls().len(), 1);
        assert!(turn.function_responses().is_empty());
        assert!(!turn.is_empty());
    }

    #[test]
    fn test_empty_turn() {
        assert!(Turn::new(Role::User, vec![]).is_empty());
        assert!(Turn::user("").is_empty());
        assert!(!Turn::new(Role::User, vec![Part::image("image/png", "")]).is_empty());
    }
}
