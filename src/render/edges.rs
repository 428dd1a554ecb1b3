//! Edge line segments
//!
//! All edges share one line-list vertex buffer (two vertices per edge) and a
//! parallel colour buffer. Hiding an edge zeroes its colour; the edge program
//! blends additively, so a black segment contributes nothing to the frame.

use std::collections::HashSet;

use glam::Vec3;

use super::backend::{
    BackendError, BufferDesc, BufferId, BufferUsage, DrawPass, RenderBackend, write_rows,
};
use super::hubs::HubMeshes;
use super::nodes::NodeRenderer;
use super::types::EDGE_COLOR_FACTOR;
use crate::graph::{Edge, GraphModel, NodeRef, Rgb};

/// Line segments for every graph edge.
#[derive(Debug)]
pub struct EdgeRenderer {
    edges: Vec<Edge>,
    positions: Vec<[f32; 3]>,
    colors: Vec<[f32; 3]>,
    original_colors: Vec<Rgb>,
    position_buffer: BufferId,
    color_buffer: BufferId,
}

impl EdgeRenderer {
    /// Allocate the edge buffers and draw every edge in its original colour.
    ///
    /// Endpoints start at the origin; call [`update_positions`](Self::update_positions)
    /// once nodes and hubs are placed.
    pub fn new(backend: &mut dyn RenderBackend, model: &GraphModel) -> Result<Self, BackendError> {
        let edges = model.edges().to_vec();
        let original_colors: Vec<Rgb> = edges
            .iter()
            .map(|e| model.node_color(e.target).map(|c| c * EDGE_COLOR_FACTOR))
            .collect();
        let colors: Vec<[f32; 3]> = original_colors.iter().flat_map(|&c| [c, c]).collect();
        let positions = vec![[0.0; 3]; edges.len() * 2];

        let position_buffer = backend.create_buffer(&BufferDesc::rows::<[f32; 3]>(
            "edge-positions",
            BufferUsage::Vertex,
            positions.len(),
        ))?;
        let color_buffer = backend.create_buffer(&BufferDesc::rows::<[f32; 3]>(
            "edge-colors",
            BufferUsage::Vertex,
            colors.len(),
        ))?;

        let renderer = Self {
            edges,
            positions,
            colors,
            original_colors,
            position_buffer,
            color_buffer,
        };
        renderer.upload_colors(backend)?;
        Ok(renderer)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Both endpoints of edge `e` as last written
    pub fn endpoints(&self, e: u32) -> (Vec3, Vec3) {
        let i = e as usize * 2;
        (Vec3::from(self.positions[i]), Vec3::from(self.positions[i + 1]))
    }

    /// Current colour of edge `e`
    pub fn color(&self, e: u32) -> Rgb {
        self.colors[e as usize * 2]
    }

    pub fn original_color(&self, e: u32) -> Rgb {
        self.original_colors[e as usize]
    }

    pub fn position_buffer(&self) -> BufferId {
        self.position_buffer
    }

    pub fn color_buffer(&self) -> BufferId {
        self.color_buffer
    }

    /// Rewrite every endpoint from the current node and hub positions
    pub fn update_positions(
        &mut self,
        nodes: &NodeRenderer,
        hubs: &HubMeshes,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        let locate = |node: NodeRef| match node {
            NodeRef::Hub(h) => hubs.hub_position(h),
            NodeRef::Leaf(l) => nodes.position(l),
        };
        for (i, edge) in self.edges.iter().enumerate() {
            self.positions[i * 2] = locate(edge.source).to_array();
            self.positions[i * 2 + 1] = locate(edge.target).to_array();
        }
        if self.positions.is_empty() {
            return Ok(());
        }
        write_rows(backend, self.position_buffer, 0, &self.positions)
    }

    /// Zero the colour of edges whose leaf is outside `visible` and restore
    /// the rest. Edges without a leaf endpoint keep their colour.
    pub fn fade_edges_except(
        &mut self,
        visible: &HashSet<u32>,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        for (i, edge) in self.edges.iter().enumerate() {
            let Some(leaf) = edge.target_leaf() else {
                continue;
            };
            let color = if visible.contains(&leaf) {
                self.original_colors[i]
            } else {
                [0.0; 3]
            };
            self.colors[i * 2] = color;
            self.colors[i * 2 + 1] = color;
        }
        self.upload_colors(backend)
    }

    /// Paint the given edges with `color`, leaving every other edge alone
    pub fn highlight_edges(
        &mut self,
        edges: &[u32],
        color: Rgb,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        for &e in edges {
            let i = e as usize;
            assert!(
                i < self.edges.len(),
                "edge index {e} out of bounds for {} edges",
                self.edges.len()
            );
            self.colors[i * 2] = color;
            self.colors[i * 2 + 1] = color;
        }
        self.upload_colors(backend)
    }

    pub fn reset_colors(&mut self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        for (i, &c) in self.original_colors.iter().enumerate() {
            self.colors[i * 2] = c;
            self.colors[i * 2 + 1] = c;
        }
        self.upload_colors(backend)
    }

    /// Zero every edge colour
    pub fn hide_all(&mut self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        self.colors.fill([0.0; 3]);
        self.upload_colors(backend)
    }

    /// Current per-vertex colours, for later [`restore_colors`](Self::restore_colors)
    pub fn snapshot_colors(&self) -> Vec<[f32; 3]> {
        self.colors.clone()
    }

    pub fn restore_colors(
        &mut self,
        colors: &[[f32; 3]],
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        self.colors.copy_from_slice(colors);
        self.upload_colors(backend)
    }

    fn upload_colors(&self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        if self.colors.is_empty() {
            return Ok(());
        }
        write_rows(backend, self.color_buffer, 0, &self.colors)
    }

    pub fn draw_pass(&self) -> DrawPass {
        DrawPass::Edges {
            positions: self.position_buffer,
            colors: self.color_buffer,
            vertices: self.positions.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RawEdge, RawNode};
    use crate::layout::LayoutShape;
    use crate::render::HeadlessBackend;
    use crate::render::nodes::HighlightConfig;
    use crate::render::types::RenderConfig;

    struct Fixture {
        backend: HeadlessBackend,
        model: GraphModel,
        nodes: NodeRenderer,
        hubs: HubMeshes,
        edges: EdgeRenderer,
    }

    fn fixture() -> Fixture {
        let model = GraphModel::build(
            &[
                RawNode::hub("h1", "One"),
                RawNode::hub("h2", "Two"),
                RawNode::leaf("a", "item"),
                RawNode::leaf("b", "item"),
                RawNode::leaf("c", "item"),
            ],
            &[
                RawEdge::new("h1", "a"),
                RawEdge::new("b", "h1"),
                RawEdge::new("h2", "c"),
                RawEdge::new("h1", "h2"),
                RawEdge::new("a", "c"),
            ],
        )
        .unwrap();
        let layout = LayoutShape::Galaxy.compute(&model);
        let mut backend = HeadlessBackend::new();
        let config = RenderConfig::default();
        let nodes = NodeRenderer::new(
            &mut backend,
            &model,
            &layout,
            &config,
            &HighlightConfig::default(),
        )
        .unwrap();
        let hubs = HubMeshes::new(&mut backend, &model, &layout, &config).unwrap();
        let mut edges = EdgeRenderer::new(&mut backend, &model).unwrap();
        edges.update_positions(&nodes, &hubs, &mut backend).unwrap();
        Fixture {
            backend,
            model,
            nodes,
            hubs,
            edges,
        }
    }

    fn endpoint(f: &Fixture, node: NodeRef) -> Vec3 {
        match node {
            NodeRef::Hub(h) => f.hubs.hub_position(h),
            NodeRef::Leaf(l) => f.nodes.position(l),
        }
    }

    #[test]
    fn test_endpoints_match_nodes() {
        let mut f = fixture();
        f.nodes.set_position(0, Vec3::new(1.0, 2.0, 3.0));
        f.hubs.set_hub_position(1, Vec3::new(-5.0, 0.0, 5.0));
        f.edges
            .update_positions(&f.nodes, &f.hubs, &mut f.backend)
            .unwrap();
        for (e, edge) in f.model.edges().iter().enumerate() {
            let (a, b) = f.edges.endpoints(e as u32);
            assert_eq!(a, endpoint(&f, edge.source));
            assert_eq!(b, endpoint(&f, edge.target));
        }
        let uploaded: Vec<[f32; 3]> = f.backend.buffer_rows(f.edges.position_buffer()).unwrap();
        assert_eq!(uploaded.len(), f.model.edge_count() * 2);
    }

    #[test]
    fn test_original_color_follows_target() {
        let f = fixture();
        let leaf_color = f.model.color_of(0);
        assert_eq!(
            f.edges.original_color(0),
            leaf_color.map(|c| c * EDGE_COLOR_FACTOR)
        );
    }

    #[test]
    fn test_fade_zeroes_hidden_edges_only() {
        let mut f = fixture();
        let visible: HashSet<u32> = [0].into_iter().collect();
        f.edges.fade_edges_except(&visible, &mut f.backend).unwrap();

        for (e, edge) in f.model.edges().iter().enumerate() {
            let color = f.edges.color(e as u32);
            match edge.target_leaf() {
                None => assert_eq!(color, f.edges.original_color(e as u32)),
                Some(0) => assert_eq!(color, f.edges.original_color(e as u32)),
                Some(_) => assert_eq!(color, [0.0; 3]),
            }
        }
    }

    #[test]
    fn test_highlight_then_reset() {
        let mut f = fixture();
        f.edges
            .highlight_edges(&[1, 2], [1.0, 1.0, 0.0], &mut f.backend)
            .unwrap();
        assert_eq!(f.edges.color(1), [1.0, 1.0, 0.0]);
        assert_eq!(f.edges.color(0), f.edges.original_color(0));
        f.edges.reset_colors(&mut f.backend).unwrap();
        for e in 0..f.edges.edge_count() as u32 {
            assert_eq!(f.edges.color(e), f.edges.original_color(e));
        }
        let uploaded: Vec<[f32; 3]> = f.backend.buffer_rows(f.edges.color_buffer()).unwrap();
        assert_eq!(uploaded[2], f.edges.original_color(1));
    }
}
