use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute key the extension stamps onto interactive elements.
pub const MCP_ID_ATTR: &str = "mcp_id";
/// Attribute key carrying a link's destination URL.
pub const HREF_ATTR: &str = "href";

/// One node of the `detailed` tree the extension extracts from the page.
///
/// Only `attributes` and `children` matter server-side. Everything else the
/// extension puts on a node (`role`, `name`, `value`, ...) is kept in `extra`
/// so blocks echo back unchanged as `context_full`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentNode {
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub children: Vec<ContentNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A top-level entry of the content forest: the `detailed` tree is the lookup
/// target for tool calls, the `simplified` string is prompt material.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub simplified: String,
    #[serde(default)]
    pub detailed: Option<ContentNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Find the first node tagged with `mcp_id`, searching each block's detailed
/// tree in pre-order (node before children, children left to right), blocks
/// in request order. Identifiers are unique per request, but ties still
/// resolve deterministically to the first match.
pub fn find_by_mcp_id<'a>(blocks: &'a [ContentBlock], mcp_id: &str) -> Option<&'a ContentNode> {
    blocks
        .iter()
        .filter_map(|block| block.detailed.as_ref())
        .find_map(|root| find_in_tree(root, mcp_id))
}

fn find_in_tree<'a>(node: &'a ContentNode, mcp_id: &str) -> Option<&'a ContentNode> {
    if node
        .attributes
        .get(MCP_ID_ATTR)
        .is_some_and(|id| id == mcp_id)
    {
        return Some(node);
    }
    node.children
        .iter()
        .find_map(|child| find_in_tree(child, mcp_id))
}

/// The context section of the prompt: every block's simplified string joined
/// by blank lines, in request order.
pub fn simplified_context(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(|block| block.simplified.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
