//! Hub/leaf relationship graph
//!
//! [`GraphModel`] is built once from a parsed payload and is immutable
//! afterwards. Hubs and leaves live in two separate arrays; a leaf's position
//! in the leaf array is its instance slot in every GPU buffer, so leaf indices
//! are stable for the lifetime of a scene and never compacted.
//!
//! The leaf array is the single source of truth for slot → leaf. The id → slot
//! direction is derived from it once during [`GraphModel::build`].

mod palette;
mod payload;

use std::collections::HashMap;

use thiserror::Error;

pub use palette::{HUB_PALETTE, NEUTRAL_GRAY, Rgb, hub_color, hue_to_rgb};
pub use payload::{GraphPayload, RawEdge, RawNode};

/// Errors raised while building a [`GraphModel`]. All of them are fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// An edge names a node id that is not in the node list
    #[error("malformed graph: edge {edge} references unknown node id `{id}`")]
    UnknownNode { edge: usize, id: String },

    /// Two nodes share the same id
    #[error("malformed graph: duplicate node id `{0}`")]
    DuplicateNode(String),
}

/// Reference to a node by kind and index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    Hub(u32),
    Leaf(u32),
}

impl NodeRef {
    /// Leaf index, if this is a leaf
    pub fn leaf(self) -> Option<u32> {
        match self {
            Self::Leaf(i) => Some(i),
            Self::Hub(_) => None,
        }
    }

    /// Hub index, if this is a hub
    pub fn hub(self) -> Option<u32> {
        match self {
            Self::Hub(i) => Some(i),
            Self::Leaf(_) => None,
        }
    }
}

/// A grouping node.
#[derive(Debug, Clone, PartialEq)]
pub struct Hub {
    pub id: String,
    pub label: String,
    /// Scale hint used for the hub mesh radius
    pub size: f32,
    pub index: u32,
    pub color: Rgb,
}

/// A content node. `index` is its instance slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub id: String,
    pub class: String,
    pub created_at: Option<i64>,
    pub color: Rgb,
    pub index: u32,
}

/// An undirected edge. Hub–leaf edges always carry the hub as `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: NodeRef,
    pub target: NodeRef,
}

impl Edge {
    /// Leaf whose visibility decides whether this edge is drawn
    pub fn target_leaf(&self) -> Option<u32> {
        self.target.leaf().or_else(|| self.source.leaf())
    }
}

/// Summary counts, mostly for logging and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct GraphStats {
    pub hubs: usize,
    pub leaves: usize,
    pub edges: usize,
    /// Leaves with no hub
    pub orphan_leaves: usize,
    /// Leaves with more than one hub
    pub cross_linked_leaves: usize,
}

/// Immutable hub/leaf graph.
#[derive(Debug, Clone)]
pub struct GraphModel {
    hubs: Vec<Hub>,
    leaves: Vec<Leaf>,
    edges: Vec<Edge>,
    ids: HashMap<String, NodeRef>,
    hub_adjacency: Vec<Vec<NodeRef>>,
    leaf_adjacency: Vec<Vec<NodeRef>>,
    /// Hub indices per leaf, deduplicated, first-seen order
    leaf_hubs: Vec<Vec<u32>>,
    /// Leaf indices per hub, deduplicated, connection order
    hub_leaves: Vec<Vec<u32>>,
}

impl GraphModel {
    /// Build a graph from parsed nodes and edges.
    ///
    /// Fails if two nodes share an id or an edge references an unknown id.
    pub fn build(nodes: &[RawNode], edges: &[RawEdge]) -> Result<Self, GraphError> {
        let mut hubs = Vec::new();
        let mut leaves = Vec::new();
        let mut ids = HashMap::with_capacity(nodes.len());
        let mut hub_sizes = Vec::new();

        for node in nodes {
            let node_ref = match node {
                RawNode::Hub { id, label, size } => {
                    let index = hubs.len() as u32;
                    hubs.push(Hub {
                        id: id.clone(),
                        label: label.clone(),
                        size: 0.0,
                        index,
                        color: hub_color(index),
                    });
                    hub_sizes.push(*size);
                    NodeRef::Hub(index)
                }
                RawNode::Leaf {
                    id,
                    class,
                    created_at,
                } => {
                    let index = leaves.len() as u32;
                    leaves.push(Leaf {
                        id: id.clone(),
                        class: class.clone(),
                        created_at: *created_at,
                        color: NEUTRAL_GRAY,
                        index,
                    });
                    NodeRef::Leaf(index)
                }
            };
            if ids.insert(node.id().to_string(), node_ref).is_some() {
                return Err(GraphError::DuplicateNode(node.id().to_string()));
            }
        }

        let mut resolved = Vec::with_capacity(edges.len());
        for (edge_index, edge) in edges.iter().enumerate() {
            let lookup = |id: &str| {
                ids.get(id).copied().ok_or_else(|| GraphError::UnknownNode {
                    edge: edge_index,
                    id: id.to_string(),
                })
            };
            let source = lookup(&edge.source)?;
            let target = lookup(&edge.target)?;
            // Hub first so `target` is the leaf end of hub–leaf edges
            let resolved_edge = match (source, target) {
                (NodeRef::Leaf(_), NodeRef::Hub(_)) => Edge {
                    source: target,
                    target: source,
                },
                _ => Edge { source, target },
            };
            resolved.push(resolved_edge);
        }

        let mut hub_adjacency = vec![Vec::new(); hubs.len()];
        let mut leaf_adjacency = vec![Vec::new(); leaves.len()];
        let mut leaf_hubs: Vec<Vec<u32>> = vec![Vec::new(); leaves.len()];
        let mut hub_leaves: Vec<Vec<u32>> = vec![Vec::new(); hubs.len()];

        for edge in &resolved {
            for (from, to) in [(edge.source, edge.target), (edge.target, edge.source)] {
                match from {
                    NodeRef::Hub(h) => hub_adjacency[h as usize].push(to),
                    NodeRef::Leaf(l) => leaf_adjacency[l as usize].push(to),
                }
            }
            if let (NodeRef::Hub(h), NodeRef::Leaf(l)) = (edge.source, edge.target) {
                if !leaf_hubs[l as usize].contains(&h) {
                    leaf_hubs[l as usize].push(h);
                    hub_leaves[h as usize].push(l);
                }
            }
        }

        for hub in &mut hubs {
            let degree = hub_leaves[hub.index as usize].len();
            hub.size = hub_sizes[hub.index as usize].unwrap_or(degree as f32);
        }
        for leaf in &mut leaves {
            if let Some(&first) = leaf_hubs[leaf.index as usize].first() {
                leaf.color = hubs[first as usize].color;
            }
        }

        let model = Self {
            hubs,
            leaves,
            edges: resolved,
            ids,
            hub_adjacency,
            leaf_adjacency,
            leaf_hubs,
            hub_leaves,
        };
        tracing::info!(
            hubs = model.hub_count(),
            leaves = model.leaf_count(),
            edges = model.edge_count(),
            "graph model built"
        );
        Ok(model)
    }

    /// Build a graph from a parsed payload
    pub fn from_payload(payload: &GraphPayload) -> Result<Self, GraphError> {
        Self::build(&payload.nodes, &payload.edges)
    }

    pub fn hub_count(&self) -> usize {
        self.hubs.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn hubs(&self) -> &[Hub] {
        &self.hubs
    }

    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn hub(&self, index: u32) -> &Hub {
        &self.hubs[index as usize]
    }

    pub fn leaf(&self, index: u32) -> &Leaf {
        &self.leaves[index as usize]
    }

    /// Resolve a node id
    pub fn lookup(&self, id: &str) -> Option<NodeRef> {
        self.ids.get(id).copied()
    }

    /// Id of a node reference
    pub fn id_of(&self, node: NodeRef) -> &str {
        match node {
            NodeRef::Hub(h) => &self.hubs[h as usize].id,
            NodeRef::Leaf(l) => &self.leaves[l as usize].id,
        }
    }

    /// Neighbours of a node id, empty for unknown ids
    pub fn adjacency_of(&self, id: &str) -> &[NodeRef] {
        match self.lookup(id) {
            Some(node) => self.neighbors(node),
            None => &[],
        }
    }

    /// Neighbours of a node reference
    pub fn neighbors(&self, node: NodeRef) -> &[NodeRef] {
        match node {
            NodeRef::Hub(h) => &self.hub_adjacency[h as usize],
            NodeRef::Leaf(l) => &self.leaf_adjacency[l as usize],
        }
    }

    /// Natural colour of a leaf
    pub fn color_of(&self, leaf: u32) -> Rgb {
        self.leaves[leaf as usize].color
    }

    /// Colour of a hub
    pub fn hub_color(&self, hub: u32) -> Rgb {
        self.hubs[hub as usize].color
    }

    /// Colour of any node
    pub fn node_color(&self, node: NodeRef) -> Rgb {
        match node {
            NodeRef::Hub(h) => self.hub_color(h),
            NodeRef::Leaf(l) => self.color_of(l),
        }
    }

    /// Hub indices a leaf belongs to, first association first
    pub fn hubs_of_leaf(&self, leaf: u32) -> &[u32] {
        &self.leaf_hubs[leaf as usize]
    }

    /// Hub ids a leaf belongs to
    pub fn hub_ids_of_leaf(&self, leaf: u32) -> Vec<&str> {
        self.hubs_of_leaf(leaf)
            .iter()
            .map(|&h| self.hubs[h as usize].id.as_str())
            .collect()
    }

    /// Leaves of a hub in connection order
    pub fn leaves_of_hub(&self, hub: u32) -> &[u32] {
        &self.hub_leaves[hub as usize]
    }

    /// Number of distinct leaves linked to a hub
    pub fn hub_degree(&self, hub: u32) -> usize {
        self.hub_leaves[hub as usize].len()
    }

    /// Hub indices ordered by degree (descending), ties by insertion order
    pub fn hubs_by_popularity(&self) -> Vec<u32> {
        let mut order: Vec<u32> = (0..self.hubs.len() as u32).collect();
        order.sort_by(|&a, &b| {
            self.hub_degree(b)
                .cmp(&self.hub_degree(a))
                .then_with(|| a.cmp(&b))
        });
        order
    }

    /// Summary counts
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            hubs: self.hub_count(),
            leaves: self.leaf_count(),
            edges: self.edge_count(),
            orphan_leaves: self.leaf_hubs.iter().filter(|h| h.is_empty()).count(),
            cross_linked_leaves: self.leaf_hubs.iter().filter(|h| h.len() > 1).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GraphModel {
        let nodes = vec![
            RawNode::hub("physics", "Physics"),
            RawNode::hub("music", "Music"),
            RawNode::leaf("a", "video"),
            RawNode::leaf("b", "article"),
            RawNode::leaf("c", "video"),
            RawNode::leaf("orphan", "note"),
        ];
        let edges = vec![
            RawEdge::new("physics", "a"),
            RawEdge::new("b", "music"),
            RawEdge::new("physics", "b"),
            RawEdge::new("music", "b"),
            RawEdge::new("a", "c"),
        ];
        GraphModel::build(&nodes, &edges).unwrap()
    }

    #[test]
    fn test_counts_and_indices() {
        let model = sample();
        assert_eq!(model.hub_count(), 2);
        assert_eq!(model.leaf_count(), 4);
        assert_eq!(model.edge_count(), 5);
        assert_eq!(model.lookup("c"), Some(NodeRef::Leaf(2)));
        assert_eq!(model.lookup("music"), Some(NodeRef::Hub(1)));
        assert_eq!(model.leaf(3).id, "orphan");
    }

    #[test]
    fn test_unknown_node_is_rejected() {
        let nodes = vec![RawNode::hub("h", "H"), RawNode::leaf("a", "x")];
        let edges = vec![RawEdge::new("h", "a"), RawEdge::new("h", "ghost")];
        let err = GraphModel::build(&nodes, &edges).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownNode {
                edge: 1,
                id: "ghost".into()
            }
        );
    }

    #[test]
    fn test_duplicate_node_is_rejected() {
        let nodes = vec![RawNode::hub("x", "X"), RawNode::leaf("x", "dup")];
        let err = GraphModel::build(&nodes, &[]).unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode("x".into()));
    }

    #[test]
    fn test_hub_leaf_edges_normalised() {
        let model = sample();
        // "b" -> "music" was given leaf first
        assert_eq!(
            model.edges()[1],
            Edge {
                source: NodeRef::Hub(1),
                target: NodeRef::Leaf(1)
            }
        );
        assert_eq!(model.edges()[4].target_leaf(), Some(2));
    }

    #[test]
    fn test_hubs_of_leaf_dedup_and_order() {
        let model = sample();
        assert_eq!(model.hubs_of_leaf(0), &[0]);
        // music first (edge 1), physics second, duplicate music edge ignored
        assert_eq!(model.hubs_of_leaf(1), &[1, 0]);
        assert!(model.hubs_of_leaf(3).is_empty());
        assert_eq!(model.hub_ids_of_leaf(1), vec!["music", "physics"]);
    }

    #[test]
    fn test_color_inherits_first_hub() {
        let model = sample();
        assert_eq!(model.color_of(0), HUB_PALETTE[0]);
        assert_eq!(model.color_of(1), HUB_PALETTE[1]);
        // "c" only links to a leaf
        assert_eq!(model.color_of(2), NEUTRAL_GRAY);
        assert_eq!(model.color_of(3), NEUTRAL_GRAY);
    }

    #[test]
    fn test_colors_reproducible() {
        let a = sample();
        let b = sample();
        for i in 0..a.leaf_count() as u32 {
            assert_eq!(a.color_of(i), b.color_of(i));
        }
    }

    #[test]
    fn test_adjacency_is_undirected() {
        let model = sample();
        assert!(model.adjacency_of("a").contains(&NodeRef::Hub(0)));
        assert!(model.adjacency_of("a").contains(&NodeRef::Leaf(2)));
        assert!(model.adjacency_of("c").contains(&NodeRef::Leaf(0)));
        assert!(model.adjacency_of("physics").contains(&NodeRef::Leaf(1)));
        assert!(model.adjacency_of("nobody").is_empty());
    }

    #[test]
    fn test_popularity_and_size() {
        let model = sample();
        // physics: a, b; music: b
        assert_eq!(model.hubs_by_popularity(), vec![0, 1]);
        assert_eq!(model.hub(0).size, 2.0);
        assert_eq!(model.leaves_of_hub(1), &[1]);
    }

    #[test]
    fn test_stats() {
        let stats = sample().stats();
        assert_eq!(stats.orphan_leaves, 2);
        assert_eq!(stats.cross_linked_leaves, 1);
    }

    #[test]
    fn test_error_message() {
        let err = GraphError::UnknownNode {
            edge: 3,
            id: "ghost".into(),
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"malformed graph: edge 3 references unknown node id `ghost`"
        );
    }
}
