//! Parsed input graph payload
//!
//! The payload is the boundary between whatever produced the graph file and
//! [`GraphModel::build`](super::GraphModel::build). It mirrors the JSON shape
//! `{ "nodes": [...], "edges": [...] }` where each node is tagged with `kind`.

use serde::{Deserialize, Serialize};

/// A node as it arrives from the input payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RawNode {
    /// Grouping node (channel, category)
    Hub {
        id: String,
        label: String,
        /// Approximate scale hint; falls back to the hub's degree
        #[serde(default)]
        size: Option<f32>,
    },
    /// Content node
    Leaf {
        id: String,
        #[serde(default)]
        class: String,
        /// Creation timestamp (seconds since epoch)
        #[serde(default)]
        created_at: Option<i64>,
    },
}

impl RawNode {
    /// Convenience constructor for a hub
    pub fn hub(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Hub {
            id: id.into(),
            label: label.into(),
            size: None,
        }
    }

    /// Convenience constructor for a leaf
    pub fn leaf(id: impl Into<String>, class: impl Into<String>) -> Self {
        Self::Leaf {
            id: id.into(),
            class: class.into(),
            created_at: None,
        }
    }

    /// Node id regardless of kind
    pub fn id(&self) -> &str {
        match self {
            Self::Hub { id, .. } | Self::Leaf { id, .. } => id,
        }
    }
}

/// An edge as it arrives from the input payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEdge {
    pub source: String,
    pub target: String,
}

impl RawEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Complete parsed graph payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

impl GraphPayload {
    /// Parse a payload from JSON text
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagged_nodes() {
        let payload = GraphPayload::from_json(
            r#"{
                "nodes": [
                    {"kind": "hub", "id": "h1", "label": "Physics", "size": 12.0},
                    {"kind": "leaf", "id": "l1", "class": "video", "created_at": 1700000000},
                    {"kind": "leaf", "id": "l2"}
                ],
                "edges": [{"source": "h1", "target": "l1"}]
            }"#,
        )
        .unwrap();

        assert_eq!(payload.nodes.len(), 3);
        assert_eq!(
            payload.nodes[0],
            RawNode::Hub {
                id: "h1".into(),
                label: "Physics".into(),
                size: Some(12.0)
            }
        );
        assert_eq!(payload.nodes[2], RawNode::leaf("l2", ""));
        assert_eq!(payload.edges, vec![RawEdge::new("h1", "l1")]);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = GraphPayload::from_json(r#"{"nodes": [{"kind": "planet", "id": "x"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let payload = GraphPayload::from_json("{}").unwrap();
        assert!(payload.nodes.is_empty());
        assert!(payload.edges.is_empty());
    }
}
