//! Turns a model reply into something the extension client can execute.

use serde::Serialize;
use tracing::warn;

use crate::content::{ContentBlock, HREF_ATTR, find_by_mcp_id};
use crate::gemini::{GenerateContentResponse, Part};
use crate::tools::{ToolInvocation, ToolKind};

/// A normalized, client-executable action. The serialized shape is part of
/// the extension protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Navigate {
        url: String,
        reason: String,
        mcp_id: String,
    },
    FillInput {
        value: Option<String>,
        reason: String,
        mcp_id: String,
    },
    PressButton {
        reason: String,
        mcp_id: String,
    },
}

/// Outcome of interpreting one model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The model answered in plain text before proposing any action.
    Text(String),
    /// Executable actions, in the order the model emitted them.
    Actions(Vec<Action>),
    /// Nothing actionable and no text came back.
    NoAction,
    /// A tool call referenced an identifier missing from the forest.
    InvalidTarget { mcp_id: String },
    /// The reply did not match the declared tool schemas.
    Malformed,
}

/// Walk the first candidate's parts in order. A single unresolvable target
/// invalidates the whole reply; accumulated actions take precedence over any
/// trailing narration.
pub fn dispatch(reply: &GenerateContentResponse, blocks: &[ContentBlock]) -> Dispatch {
    let Some(parts) = reply.parts() else {
        warn!("model reply carried no candidate content");
        return Dispatch::Malformed;
    };

    let mut actions = Vec::new();
    for part in parts {
        match part {
            Part::FunctionCall { function_call } => {
                let invocation = match ToolInvocation::from_call(function_call) {
                    Ok(invocation) => invocation,
                    Err(err) => {
                        warn!("discarding model reply: {err}");
                        return Dispatch::Malformed;
                    }
                };

                // The target is resolved before the tool name is even looked
                // at, so a bad reference fails fast for unknown tools too.
                let Some(node) = find_by_mcp_id(blocks, &invocation.mcp_id) else {
                    return Dispatch::InvalidTarget {
                        mcp_id: invocation.mcp_id,
                    };
                };

                match invocation.kind {
                    ToolKind::FollowLink => match node.attributes.get(HREF_ATTR) {
                        Some(url) => actions.push(Action::Navigate {
                            url: url.clone(),
                            reason: invocation.reason,
                            mcp_id: invocation.mcp_id,
                        }),
                        // A link node without a destination: the action is
                        // dropped rather than surfaced as an error.
                        None => warn!(
                            mcp_id = %invocation.mcp_id,
                            "follow_link target has no href; dropping the action"
                        ),
                    },
                    ToolKind::FillInput => actions.push(Action::FillInput {
                        value: invocation.value,
                        reason: invocation.reason,
                        mcp_id: invocation.mcp_id,
                    }),
                    ToolKind::PressButton => actions.push(Action::PressButton {
                        reason: invocation.reason,
                        mcp_id: invocation.mcp_id,
                    }),
                    ToolKind::Unrecognized => {
                        warn!(tool = %function_call.name, "model invoked an unknown tool");
                    }
                }
            }
            Part::Text { text } => {
                if !text.is_empty() && actions.is_empty() {
                    return Dispatch::Text(text.clone());
                }
                // Narration after an action is dropped; execution wins.
            }
            Part::Other(_) => {}
        }
    }

    if actions.is_empty() {
        Dispatch::NoAction
    } else {
        Dispatch::Actions(actions)
    }
}
