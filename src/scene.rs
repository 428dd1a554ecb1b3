//! The scene: one owner for the graph, its layout and every GPU component
//!
//! [`Scene`] is the surface a UI layer calls into. It owns the backend and
//! all components, so every mutation goes through `&mut self` and only one
//! writer can touch GPU state at a time.

use std::collections::HashSet;

use glam::Vec2;
use thiserror::Error;

use crate::animation::LayoutTransitionAnimator;
use crate::config::SceneConfig;
use crate::flow::{FlowError, FlowFieldMode};
use crate::graph::{GraphModel, NodeRef, Rgb};
use crate::layout::{LayoutResult, LayoutShape};
use crate::render::{
    BackendError, Camera3D, DrawPass, EdgeRenderer, HubMeshes, NodeRenderer, PickingSystem,
    RenderBackend, TargetId, TargetKind,
};

/// Errors raised by scene operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// A rendered hub/leaf graph.
#[derive(Debug)]
pub struct Scene<B: RenderBackend> {
    backend: B,
    model: GraphModel,
    config: SceneConfig,
    shape: LayoutShape,
    layout: LayoutResult,
    nodes: NodeRenderer,
    hubs: HubMeshes,
    edges: EdgeRenderer,
    picking: PickingSystem,
    animator: LayoutTransitionAnimator,
    flow: FlowFieldMode,
    camera: Camera3D,
    viewport: (u32, u32),
    frame_target: TargetId,
}

impl<B: RenderBackend> Scene<B> {
    /// Lay out `model` with the configured initial shape and upload it.
    pub fn new(mut backend: B, model: GraphModel, config: SceneConfig) -> Result<Self, SceneError> {
        let shape = config.initial_shape;
        let layout = shape.compute(&model);
        let viewport = (config.render.width.max(1), config.render.height.max(1));

        let nodes = NodeRenderer::new(
            &mut backend,
            &model,
            &layout,
            &config.render,
            &config.highlight,
        )?;
        let hubs = HubMeshes::new(&mut backend, &model, &layout, &config.render)?;
        let mut edges = EdgeRenderer::new(&mut backend, &model)?;
        edges.update_positions(&nodes, &hubs, &mut backend)?;
        let picking = PickingSystem::new(&mut backend, &nodes)?;
        let frame_target = backend.create_target(viewport.0, viewport.1, TargetKind::Color)?;

        let mut camera = Camera3D::new(viewport.0 as f32 / viewport.1 as f32);
        if let Some((lo, hi)) = layout.bounds() {
            camera.frame_bounds(lo, hi);
        }

        tracing::info!(
            shape = %shape,
            leaves = model.leaf_count(),
            hubs = model.hub_count(),
            edges = model.edge_count(),
            "scene ready"
        );

        Ok(Self {
            animator: LayoutTransitionAnimator::new(&config.transition),
            flow: FlowFieldMode::new(&config.flow),
            backend,
            model,
            config,
            shape,
            layout,
            nodes,
            hubs,
            edges,
            picking,
            camera,
            viewport,
            frame_target,
        })
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Shape most recently applied or transitioned to
    pub fn shape(&self) -> LayoutShape {
        self.shape
    }

    /// Layout most recently applied or transitioned to
    pub fn layout(&self) -> &LayoutResult {
        &self.layout
    }

    pub fn nodes(&self) -> &NodeRenderer {
        &self.nodes
    }

    pub fn hubs(&self) -> &HubMeshes {
        &self.hubs
    }

    pub fn edges(&self) -> &EdgeRenderer {
        &self.edges
    }

    pub fn flow(&self) -> &FlowFieldMode {
        &self.flow
    }

    pub fn camera(&self) -> &Camera3D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera3D {
        &mut self.camera
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn frame_target(&self) -> TargetId {
        self.frame_target
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_animating()
    }

    /// Reallocate the frame target for a new viewport size
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), SceneError> {
        let viewport = (width.max(1), height.max(1));
        let target = self
            .backend
            .create_target(viewport.0, viewport.1, TargetKind::Color)?;
        let old = std::mem::replace(&mut self.frame_target, target);
        self.backend.destroy_target(old)?;
        self.viewport = viewport;
        self.camera
            .set_aspect(viewport.0 as f32 / viewport.1 as f32);
        Ok(())
    }

    /// Frame the camera on the current layout
    pub fn frame_layout(&mut self) {
        if let Some((lo, hi)) = self.layout.bounds() {
            self.camera.frame_bounds(lo, hi);
        }
    }

    // ---------------------------------------------------------------------
    // Layout
    // ---------------------------------------------------------------------

    /// Jump straight to `shape`, cancelling any transition
    pub fn apply_layout(&mut self, shape: LayoutShape) -> Result<(), SceneError> {
        self.animator.cancel();
        let layout = shape.compute(&self.model);
        for (i, &p) in layout.leaf_positions.iter().enumerate() {
            self.nodes.set_position(i as u32, p);
        }
        for (h, &p) in layout.hub_positions.iter().enumerate() {
            self.hubs.set_hub_position(h as u32, p);
        }
        self.nodes.commit_transforms(&mut self.backend)?;
        self.hubs.commit(&mut self.backend)?;
        self.edges
            .update_positions(&self.nodes, &self.hubs, &mut self.backend)?;
        self.shape = shape;
        self.layout = layout;
        Ok(())
    }

    /// Start an eased transition to `shape` from whatever is on screen
    pub fn transition_to(&mut self, shape: LayoutShape, now: f64) {
        let layout = shape.compute(&self.model);
        self.animator
            .start(layout.clone(), now, &self.nodes, &self.hubs);
        tracing::debug!(from = %self.shape, to = %shape, "layout transition");
        self.shape = shape;
        self.layout = layout;
    }

    /// Advance animations to `now`. Returns whether anything moved.
    pub fn frame(&mut self, now: f64) -> Result<bool, SceneError> {
        let moved = self.animator.update(
            now,
            &mut self.nodes,
            &mut self.hubs,
            &mut self.edges,
            &mut self.backend,
        )?;
        self.flow.update(now, &mut self.backend)?;
        Ok(moved || self.flow.is_active())
    }

    /// Draw passes for the current mode, in order
    pub fn draw_passes(&self) -> Vec<DrawPass> {
        if let Some(particles) = self.flow.draw_pass() {
            return vec![particles];
        }
        let mut passes = vec![self.edges.draw_pass(), self.nodes.draw_pass()];
        passes.extend(self.hubs.draw_passes());
        passes
    }

    /// Render one frame into the frame target
    pub fn render(&mut self) -> Result<(), SceneError> {
        let passes = self.draw_passes();
        self.backend.render_to_target(
            self.frame_target,
            &self.camera.uniforms(),
            self.config.render.clear_color,
            &passes,
        )?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Picking
    // ---------------------------------------------------------------------

    /// Leaf under `cursor_ndc`, or `-1`
    pub fn pick(&mut self, cursor_ndc: Vec2) -> Result<i64, SceneError> {
        if self.flow.is_active() {
            return Ok(-1);
        }
        Ok(self.picking.pick(
            &mut self.backend,
            &self.camera,
            self.viewport,
            cursor_ndc,
            &self.nodes,
        )?)
    }

    // ---------------------------------------------------------------------
    // Highlighting
    // ---------------------------------------------------------------------

    /// Dim every leaf and edge outside `visible`
    pub fn highlight(&mut self, visible: &HashSet<u32>) -> Result<(), SceneError> {
        if self.flow.is_active() {
            tracing::debug!("highlight ignored while flow mode is on");
            return Ok(());
        }
        self.nodes.fade_all_except(visible);
        self.nodes.commit(&mut self.backend)?;
        self.edges.fade_edges_except(visible, &mut self.backend)?;
        Ok(())
    }

    /// Highlight a leaf, its neighbouring leaves and the edges between them
    pub fn focus_leaf(&mut self, leaf: u32, edge_color: Rgb) -> Result<(), SceneError> {
        let mut visible: HashSet<u32> = self
            .model
            .neighbors(NodeRef::Leaf(leaf))
            .iter()
            .filter_map(|n| n.leaf())
            .collect();
        visible.insert(leaf);
        self.highlight(&visible)?;

        let incident: Vec<u32> = self
            .model
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.source == NodeRef::Leaf(leaf) || e.target == NodeRef::Leaf(leaf))
            .map(|(i, _)| i as u32)
            .collect();
        self.highlight_edges(&incident, edge_color)
    }

    /// Paint specific edges, e.g. a path
    pub fn highlight_edges(&mut self, edges: &[u32], color: Rgb) -> Result<(), SceneError> {
        if self.flow.is_active() {
            return Ok(());
        }
        self.edges
            .highlight_edges(edges, color, &mut self.backend)?;
        Ok(())
    }

    /// Undo every highlight
    pub fn clear_highlight(&mut self) -> Result<(), SceneError> {
        if self.flow.is_active() {
            return Ok(());
        }
        self.nodes.reset_attributes();
        self.nodes.commit(&mut self.backend)?;
        self.edges.reset_colors(&mut self.backend)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Flow mode
    // ---------------------------------------------------------------------

    /// Switch flow mode. Returns whether flow mode is now on.
    ///
    /// If flow mode cannot start, the node-link view stays up and this
    /// returns `Ok(false)`.
    pub fn set_flow_mode(&mut self, enabled: bool, now: f64) -> Result<bool, SceneError> {
        if enabled {
            let activated = self
                .flow
                .activate(
                    now,
                    &self.model,
                    &mut self.nodes,
                    &mut self.hubs,
                    &mut self.edges,
                    &mut self.backend,
                )
                .is_ok();
            return Ok(activated);
        }
        self.flow.deactivate(
            &mut self.nodes,
            &mut self.hubs,
            &mut self.edges,
            &mut self.backend,
        )?;
        Ok(false)
    }

    pub fn set_waves(&mut self, enabled: bool) {
        self.flow.set_waves_enabled(enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::test_graphs::synthetic;
    use crate::render::HeadlessBackend;

    fn scene() -> Scene<HeadlessBackend> {
        let config = SceneConfig {
            flow: crate::flow::FlowConfig {
                ambient_particles: 100,
                ..Default::default()
            },
            ..Default::default()
        };
        Scene::new(HeadlessBackend::new(), synthetic(5, 120), config).unwrap()
    }

    #[test]
    fn test_render_records_node_link_passes() {
        let mut scene = scene();
        scene.render().unwrap();
        let frame = scene.backend().frames().last().unwrap();
        assert_eq!(frame.target, scene.frame_target());
        // edges + leaves + one per hub
        assert_eq!(frame.passes.len(), 2 + 5);
        assert!(matches!(frame.passes[0], DrawPass::Edges { .. }));
    }

    #[test]
    fn test_render_in_flow_mode_draws_particles_only() {
        let mut scene = scene();
        assert!(scene.set_flow_mode(true, 0.0).unwrap());
        scene.render().unwrap();
        let frame = scene.backend().frames().last().unwrap();
        assert_eq!(frame.passes.len(), 1);
        assert!(matches!(frame.passes[0], DrawPass::Particles { count: 220, .. }));
        assert_eq!(scene.pick(Vec2::ZERO).unwrap(), -1);
    }

    #[test]
    fn test_apply_layout_moves_everything() {
        let mut scene = scene();
        scene.apply_layout(LayoutShape::Sphere).unwrap();
        let expected = LayoutShape::Sphere.compute(scene.model());
        assert_eq!(scene.nodes().positions(), expected.leaf_positions);
        assert_eq!(scene.hubs().positions(), expected.hub_positions);
        assert_eq!(scene.shape(), LayoutShape::Sphere);
    }

    #[test]
    fn test_frame_reports_motion() {
        let mut scene = scene();
        assert!(!scene.frame(0.0).unwrap());
        scene.transition_to(LayoutShape::Galaxy, 0.0);
        assert!(scene.frame(0.5).unwrap());
        assert!(scene.frame(100.0).unwrap());
        assert!(!scene.is_animating());
        assert!(!scene.frame(101.0).unwrap());
    }

    #[test]
    fn test_focus_leaf_highlights_incident_edges() {
        let mut scene = scene();
        scene.focus_leaf(0, [1.0, 1.0, 1.0]).unwrap();
        let edges: Vec<usize> = scene
            .model()
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.target == NodeRef::Leaf(0))
            .map(|(i, _)| i)
            .collect();
        assert!(!edges.is_empty());
        for e in edges {
            assert_eq!(scene.edges().color(e as u32), [1.0, 1.0, 1.0]);
        }
        assert_eq!(scene.nodes().opacity(0), 1.0);
    }

    #[test]
    fn test_resize_releases_old_target() {
        let mut scene = scene();
        let live = scene.backend().live_targets();
        let old = scene.frame_target();

        scene.resize(320, 200).unwrap();
        scene.resize(640, 480).unwrap();

        assert_eq!(scene.backend().live_targets(), live);
        assert_eq!(scene.viewport(), (640, 480));
        assert!(scene.backend_mut().read_pixels(old, 0, 0, 1, 1).is_err());
        scene.render().unwrap();
        let frame = scene.backend().frames().last().unwrap();
        assert_eq!(frame.target, scene.frame_target());
    }
}
