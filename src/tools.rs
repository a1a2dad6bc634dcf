//! The fixed set of UI tools the model may invoke, and the parsing of its
//! function calls back into invocations.

use serde_json::{Value, json};
use thiserror::Error;

use crate::gemini::{FunctionCall, FunctionDeclaration};

/// Reason recorded when the model omits one.
pub const DEFAULT_REASON: &str = "No reason provided.";

/// Closed enumeration of the known tools. Anything else the model names maps
/// to `Unrecognized` so new tools are a compile-checked extension point
/// rather than a stringly-typed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    FollowLink,
    FillInput,
    PressButton,
    Unrecognized,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "follow_link" => Self::FollowLink,
            "fill_input" => Self::FillInput,
            "press_button" => Self::PressButton,
            _ => Self::Unrecognized,
        }
    }

    /// Function declaration sent to the model, for the known kinds.
    pub fn declaration(self) -> Option<FunctionDeclaration> {
        let declaration = match self {
            Self::FollowLink => FunctionDeclaration {
                name: "follow_link".into(),
                description: "Navigate to a link from the provided context.".into(),
                parameters: json!({
                    "type": "OBJECT",
                    "properties": {
                        "mcp_id": {
                            "type": "STRING",
                            "description": "The mcp_id of the link to follow, e.g., 'mcp-id-5'."
                        },
                        "reason": {
                            "type": "STRING",
                            "description": "Why you are following this link."
                        }
                    },
                    "required": ["mcp_id", "reason"]
                }),
            },
            Self::FillInput => FunctionDeclaration {
                name: "fill_input".into(),
                description: "Fill a text input, textarea, or select field.".into(),
                parameters: json!({
                    "type": "OBJECT",
                    "properties": {
                        "mcp_id": {
                            "type": "STRING",
                            "description": "The mcp_id of the input field to fill, e.g., 'mcp-id-12'."
                        },
                        "value": {
                            "type": "STRING",
                            "description": "The text to fill into the input field."
                        },
                        "reason": {
                            "type": "STRING",
                            "description": "Why you are filling this input."
                        }
                    },
                    "required": ["mcp_id", "value", "reason"]
                }),
            },
            Self::PressButton => FunctionDeclaration {
                name: "press_button".into(),
                description: "Press a button on the page.".into(),
                parameters: json!({
                    "type": "OBJECT",
                    "properties": {
                        "mcp_id": {
                            "type": "STRING",
                            "description": "The mcp_id of the button to press, e.g., 'mcp-id-3'."
                        },
                        "reason": {
                            "type": "STRING",
                            "description": "Why you are pressing this button."
                        }
                    },
                    "required": ["mcp_id", "reason"]
                }),
            },
            Self::Unrecognized => return None,
        };
        Some(declaration)
    }
}

/// Declarations for the client-enabled tool names, skipping names that match
/// no known tool.
pub fn declarations_for(enabled: &[String]) -> Vec<FunctionDeclaration> {
    enabled
        .iter()
        .filter_map(|name| ToolKind::from_name(name).declaration())
        .collect()
}

/// A model function call, decoded. The kind may be `Unrecognized`; the target
/// identifier is mandatory either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub kind: ToolKind,
    pub mcp_id: String,
    pub reason: String,
    pub value: Option<String>,
}

#[derive(Debug, Error)]
#[error("function call '{name}' carries no usable mcp_id")]
pub struct MalformedCall {
    pub name: String,
}

impl ToolInvocation {
    pub fn from_call(call: &FunctionCall) -> Result<Self, MalformedCall> {
        let mcp_id = call
            .args
            .get("mcp_id")
            .and_then(Value::as_str)
            .ok_or_else(|| MalformedCall {
                name: call.name.clone(),
            })?;
        let reason = call
            .args
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_REASON);
        let value = call
            .args
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            kind: ToolKind::from_name(&call.name),
            mcp_id: mcp_id.to_string(),
            reason: reason.to_string(),
            value,
        })
    }
}
