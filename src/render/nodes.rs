//! Instanced leaf rendering
//!
//! Every leaf is one row in three GPU streams: a transform (position and
//! scale), an appearance row (colour and opacity) and a pick id. The CPU keeps
//! a mirror of each stream; setters only touch the mirror and widen a dirty
//! row range, and a commit uploads that range with a single write. Buffers are
//! allocated once for the leaf count and never resized.
//!
//! Out-of-range row indices are programming errors and panic.

use std::collections::HashSet;
use std::ops::Range;

use glam::Vec3;
use serde::Deserialize;

use super::backend::{
    BackendError, BufferDesc, BufferId, BufferUsage, DrawPass, MeshKind, RenderBackend, write_rows,
};
use super::types::{
    DEFAULT_DIMMED_OPACITY, DEFAULT_DIMMED_SCALE, InstanceAttributes, InstanceTransform,
    RenderConfig,
};
use crate::graph::{GraphModel, Rgb};
use crate::layout::LayoutResult;

/// How leaves outside a highlight are drawn
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub dimmed_opacity: f32,
    pub dimmed_scale: f32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            dimmed_opacity: DEFAULT_DIMMED_OPACITY,
            dimmed_scale: DEFAULT_DIMMED_SCALE,
        }
    }
}

/// Contiguous span of rows changed since the last commit
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DirtyRange(Option<Range<u32>>);

impl DirtyRange {
    pub(crate) fn mark(&mut self, row: u32) {
        self.0 = Some(match self.0.take() {
            Some(r) => r.start.min(row)..r.end.max(row + 1),
            None => row..row + 1,
        });
    }

    pub(crate) fn mark_all(&mut self, rows: u32) {
        if rows > 0 {
            self.0 = Some(0..rows);
        }
    }

    pub(crate) fn take(&mut self) -> Option<Range<u32>> {
        self.0.take()
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.0.is_none()
    }
}

/// Saved leaf appearance, restorable bit for bit.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSnapshot {
    attributes: Vec<InstanceAttributes>,
    base_colors: Vec<Rgb>,
    scales: Vec<f32>,
}

/// GPU-resident leaf instances.
#[derive(Debug)]
pub struct NodeRenderer {
    transforms: Vec<InstanceTransform>,
    attributes: Vec<InstanceAttributes>,
    base_colors: Vec<Rgb>,
    pick_ids: Vec<u32>,

    original_colors: Vec<Rgb>,
    original_opacity: Vec<f32>,
    original_scale: Vec<f32>,

    transform_buffer: BufferId,
    attribute_buffer: BufferId,
    pick_buffer: BufferId,

    dirty_transforms: DirtyRange,
    dirty_attributes: DirtyRange,

    highlight: HighlightConfig,
}

impl NodeRenderer {
    /// Allocate the leaf streams and upload the initial rows.
    ///
    /// Leaves start at `layout` positions with their graph colour, full
    /// opacity and a radius that grows slowly with their hub count.
    pub fn new(
        backend: &mut dyn RenderBackend,
        model: &GraphModel,
        layout: &LayoutResult,
        config: &RenderConfig,
        highlight: &HighlightConfig,
    ) -> Result<Self, BackendError> {
        let count = model.leaf_count();
        assert_eq!(
            layout.leaf_positions.len(),
            count,
            "layout has {} leaf positions for {} leaves",
            layout.leaf_positions.len(),
            count
        );

        let original_colors: Vec<Rgb> = (0..count as u32).map(|i| model.color_of(i)).collect();
        let original_scale: Vec<f32> = (0..count as u32)
            .map(|i| {
                let hubs = model.hubs_of_leaf(i).len() as f32;
                config.leaf_radius * (1.0 + 0.25 * hubs.ln_1p())
            })
            .collect();
        let original_opacity = vec![1.0; count];

        let transforms: Vec<InstanceTransform> = layout
            .leaf_positions
            .iter()
            .zip(&original_scale)
            .map(|(p, &s)| InstanceTransform::new(p.to_array(), s))
            .collect();
        let attributes: Vec<InstanceAttributes> = original_colors
            .iter()
            .zip(&original_opacity)
            .map(|(&c, &a)| InstanceAttributes::new(c, a))
            .collect();
        let pick_ids: Vec<u32> = (1..=count as u32).collect();

        let transform_buffer = backend.create_buffer(&BufferDesc::rows::<InstanceTransform>(
            "leaf-transforms",
            BufferUsage::Instance,
            count,
        ))?;
        let attribute_buffer = backend.create_buffer(&BufferDesc::rows::<InstanceAttributes>(
            "leaf-attributes",
            BufferUsage::Instance,
            count,
        ))?;
        let pick_buffer = backend.create_buffer(&BufferDesc::rows::<u32>(
            "leaf-pick-ids",
            BufferUsage::Instance,
            count,
        ))?;

        if count > 0 {
            write_rows(backend, transform_buffer, 0, &transforms)?;
            write_rows(backend, attribute_buffer, 0, &attributes)?;
            write_rows(backend, pick_buffer, 0, &pick_ids)?;
        }

        Ok(Self {
            transforms,
            attributes,
            base_colors: original_colors.clone(),
            pick_ids,
            original_colors,
            original_opacity,
            original_scale,
            transform_buffer,
            attribute_buffer,
            pick_buffer,
            dirty_transforms: DirtyRange::default(),
            dirty_attributes: DirtyRange::default(),
            highlight: highlight.clone(),
        })
    }

    pub fn leaf_count(&self) -> usize {
        self.transforms.len()
    }

    fn check(&self, index: u32) -> usize {
        let i = index as usize;
        assert!(
            i < self.transforms.len(),
            "leaf index {index} out of bounds for {} leaf instances",
            self.transforms.len()
        );
        i
    }

    // ---------------------------------------------------------------------
    // Setters (CPU mirror only)
    // ---------------------------------------------------------------------

    pub fn set_position(&mut self, index: u32, position: Vec3) {
        let i = self.check(index);
        self.transforms[i].position = position.to_array();
        self.dirty_transforms.mark(index);
    }

    pub fn set_scale(&mut self, index: u32, scale: f32) {
        let i = self.check(index);
        self.transforms[i].scale = scale.max(0.0);
        self.dirty_transforms.mark(index);
    }

    /// Set the displayed colour, leaving the base colour alone
    pub fn set_color(&mut self, index: u32, color: Rgb) {
        let i = self.check(index);
        self.attributes[i].color = color;
        self.dirty_attributes.mark(index);
    }

    /// Set the colour a leaf returns to after a highlight
    pub fn set_base_color(&mut self, index: u32, color: Rgb) {
        let i = self.check(index);
        self.base_colors[i] = color;
    }

    pub fn set_opacity(&mut self, index: u32, opacity: f32) {
        let i = self.check(index);
        self.attributes[i].opacity = opacity.clamp(0.0, 1.0);
        self.dirty_attributes.mark(index);
    }

    // ---------------------------------------------------------------------
    // Getters
    // ---------------------------------------------------------------------

    pub fn position(&self, index: u32) -> Vec3 {
        Vec3::from(self.transforms[self.check(index)].position)
    }

    pub fn scale(&self, index: u32) -> f32 {
        self.transforms[self.check(index)].scale
    }

    pub fn color(&self, index: u32) -> Rgb {
        self.attributes[self.check(index)].color
    }

    pub fn base_color(&self, index: u32) -> Rgb {
        self.base_colors[self.check(index)]
    }

    pub fn opacity(&self, index: u32) -> f32 {
        self.attributes[self.check(index)].opacity
    }

    pub fn pick_id(&self, index: u32) -> u32 {
        self.pick_ids[self.check(index)]
    }

    /// Every leaf position in index order
    pub fn positions(&self) -> Vec<Vec3> {
        self.transforms.iter().map(|t| Vec3::from(t.position)).collect()
    }

    pub fn transforms(&self) -> &[InstanceTransform] {
        &self.transforms
    }

    pub fn attributes(&self) -> &[InstanceAttributes] {
        &self.attributes
    }

    pub fn transform_buffer(&self) -> BufferId {
        self.transform_buffer
    }

    pub fn attribute_buffer(&self) -> BufferId {
        self.attribute_buffer
    }

    pub fn pick_buffer(&self) -> BufferId {
        self.pick_buffer
    }

    /// True when no setter has run since the last commits
    pub fn is_clean(&self) -> bool {
        self.dirty_transforms.is_clean() && self.dirty_attributes.is_clean()
    }

    // ---------------------------------------------------------------------
    // Commits
    // ---------------------------------------------------------------------

    /// Upload changed transform rows, one write at most
    pub fn commit_transforms(&mut self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        if let Some(rows) = self.dirty_transforms.take() {
            let span = &self.transforms[rows.start as usize..rows.end as usize];
            write_rows(backend, self.transform_buffer, rows.start, span)?;
        }
        Ok(())
    }

    /// Upload changed appearance rows, one write at most
    pub fn commit_attributes(&mut self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        if let Some(rows) = self.dirty_attributes.take() {
            let span = &self.attributes[rows.start as usize..rows.end as usize];
            write_rows(backend, self.attribute_buffer, rows.start, span)?;
        }
        Ok(())
    }

    pub fn commit(&mut self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        self.commit_transforms(backend)?;
        self.commit_attributes(backend)
    }

    // ---------------------------------------------------------------------
    // Highlighting
    // ---------------------------------------------------------------------

    /// Dim every leaf not in `visible` and restore every leaf that is.
    ///
    /// Each call fully determines the result, so repeating it is a no-op and
    /// a later call reverses an earlier one.
    pub fn fade_all_except(&mut self, visible: &HashSet<u32>) {
        for i in 0..self.transforms.len() {
            if visible.contains(&(i as u32)) {
                self.attributes[i] =
                    InstanceAttributes::new(self.base_colors[i], self.original_opacity[i]);
                self.transforms[i].scale = self.original_scale[i];
            } else {
                self.attributes[i] =
                    InstanceAttributes::new(self.base_colors[i], self.highlight.dimmed_opacity);
                self.transforms[i].scale = self.highlight.dimmed_scale;
            }
        }
        self.mark_all();
    }

    /// Return every leaf to its original colour, opacity and scale
    pub fn reset_attributes(&mut self) {
        self.base_colors.clone_from(&self.original_colors);
        for i in 0..self.transforms.len() {
            self.attributes[i] =
                InstanceAttributes::new(self.original_colors[i], self.original_opacity[i]);
            self.transforms[i].scale = self.original_scale[i];
        }
        self.mark_all();
    }

    /// Zero every leaf's opacity and scale
    pub fn hide_all(&mut self) {
        for i in 0..self.transforms.len() {
            self.attributes[i].opacity = 0.0;
            self.transforms[i].scale = 0.0;
        }
        self.mark_all();
    }

    pub fn snapshot_attributes(&self) -> AttributeSnapshot {
        AttributeSnapshot {
            attributes: self.attributes.clone(),
            base_colors: self.base_colors.clone(),
            scales: self.transforms.iter().map(|t| t.scale).collect(),
        }
    }

    pub fn restore_attributes(&mut self, snapshot: &AttributeSnapshot) {
        assert_eq!(
            snapshot.attributes.len(),
            self.attributes.len(),
            "snapshot of {} leaves restored into {} leaf instances",
            snapshot.attributes.len(),
            self.attributes.len()
        );
        self.attributes.clone_from(&snapshot.attributes);
        self.base_colors.clone_from(&snapshot.base_colors);
        for (t, &s) in self.transforms.iter_mut().zip(&snapshot.scales) {
            t.scale = s;
        }
        self.mark_all();
    }

    fn mark_all(&mut self) {
        let rows = self.transforms.len() as u32;
        self.dirty_transforms.mark_all(rows);
        self.dirty_attributes.mark_all(rows);
    }

    /// The single instanced draw covering every leaf
    pub fn draw_pass(&self) -> DrawPass {
        DrawPass::Nodes {
            mesh: MeshKind::Leaf,
            transforms: self.transform_buffer,
            attributes: self.attribute_buffer,
            instances: 0..self.transforms.len() as u32,
        }
    }

    /// The instanced pick-id draw over the same transforms
    pub fn picking_pass(&self) -> DrawPass {
        DrawPass::Picking {
            transforms: self.transform_buffer,
            pick_ids: self.pick_buffer,
            instances: self.transforms.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutShape;
    use crate::layout::test_graphs::synthetic;
    use crate::render::HeadlessBackend;

    fn setup(leaves: usize) -> (HeadlessBackend, NodeRenderer) {
        let model = synthetic(3, leaves);
        let layout = LayoutShape::Spiral.compute(&model);
        let mut backend = HeadlessBackend::new();
        let nodes = NodeRenderer::new(
            &mut backend,
            &model,
            &layout,
            &RenderConfig::default(),
            &HighlightConfig::default(),
        )
        .unwrap();
        (backend, nodes)
    }

    #[test]
    fn test_initial_upload() {
        let (backend, nodes) = setup(20);
        let rows: Vec<InstanceTransform> = backend.buffer_rows(nodes.transform_buffer()).unwrap();
        assert_eq!(rows, nodes.transforms());
        let ids: Vec<u32> = backend.buffer_rows(nodes.pick_buffer()).unwrap();
        assert_eq!(ids, (1..=20).collect::<Vec<u32>>());
        assert!(nodes.is_clean());
    }

    #[test]
    fn test_commit_uploads_dirty_span_once() {
        let (mut backend, mut nodes) = setup(50);
        let before = backend.write_count(nodes.transform_buffer());

        nodes.set_position(30, Vec3::new(1.0, 2.0, 3.0));
        nodes.set_position(12, Vec3::new(4.0, 5.0, 6.0));
        nodes.set_scale(20, 2.5);
        nodes.commit_transforms(&mut backend).unwrap();

        assert_eq!(backend.write_count(nodes.transform_buffer()), before + 1);
        let rows: Vec<InstanceTransform> = backend.buffer_rows(nodes.transform_buffer()).unwrap();
        assert_eq!(rows[30].position, [1.0, 2.0, 3.0]);
        assert_eq!(rows[12].position, [4.0, 5.0, 6.0]);
        assert_eq!(rows[20].scale, 2.5);

        // Nothing dirty: no write
        nodes.commit_transforms(&mut backend).unwrap();
        assert_eq!(backend.write_count(nodes.transform_buffer()), before + 1);
    }

    #[test]
    fn test_setters_do_not_upload() {
        let (mut backend, mut nodes) = setup(10);
        let before = backend.write_count(nodes.attribute_buffer());
        nodes.set_color(3, [1.0, 0.0, 0.0]);
        nodes.set_opacity(3, 0.5);
        assert_eq!(backend.write_count(nodes.attribute_buffer()), before);
        nodes.commit_attributes(&mut backend).unwrap();
        let rows: Vec<InstanceAttributes> = backend.buffer_rows(nodes.attribute_buffer()).unwrap();
        assert_eq!(rows[3], InstanceAttributes::new([1.0, 0.0, 0.0], 0.5));
    }

    #[test]
    #[should_panic(expected = "leaf index 10 out of bounds for 10 leaf instances")]
    fn test_out_of_bounds_panics() {
        let (_, mut nodes) = setup(10);
        nodes.set_opacity(10, 0.5);
    }

    #[test]
    fn test_fade_is_idempotent() {
        let (_, mut nodes) = setup(40);
        let visible: HashSet<u32> = [1, 5, 9].into_iter().collect();
        nodes.fade_all_except(&visible);
        let once = nodes.snapshot_attributes();
        nodes.fade_all_except(&visible);
        assert_eq!(nodes.snapshot_attributes(), once);

        assert_eq!(nodes.opacity(5), 1.0);
        assert_eq!(nodes.opacity(6), DEFAULT_DIMMED_OPACITY);
        assert_eq!(nodes.scale(6), DEFAULT_DIMMED_SCALE);
    }

    #[test]
    fn test_later_fade_reverses_earlier() {
        let (_, mut nodes) = setup(40);
        let original = nodes.snapshot_attributes();
        nodes.fade_all_except(&[2].into_iter().collect());
        nodes.fade_all_except(&(0..40).collect());
        assert_eq!(nodes.snapshot_attributes(), original);
    }

    #[test]
    fn test_reset_is_bit_exact() {
        let (_, mut nodes) = setup(40);
        let original = nodes.snapshot_attributes();
        nodes.set_base_color(4, [0.1, 0.2, 0.3]);
        nodes.set_color(7, [0.9, 0.9, 0.9]);
        nodes.set_scale(8, 11.0);
        nodes.fade_all_except(&[1].into_iter().collect());
        nodes.reset_attributes();
        assert_eq!(nodes.snapshot_attributes(), original);
    }

    #[test]
    fn test_hide_and_restore() {
        let (_, mut nodes) = setup(15);
        let saved = nodes.snapshot_attributes();
        nodes.hide_all();
        assert!(nodes.attributes().iter().all(|a| a.opacity == 0.0));
        assert!(nodes.transforms().iter().all(|t| t.scale == 0.0));
        nodes.restore_attributes(&saved);
        assert_eq!(nodes.snapshot_attributes(), saved);
    }

    #[test]
    fn test_dirty_range_merges() {
        let mut range = DirtyRange::default();
        range.mark(7);
        range.mark(3);
        range.mark(5);
        assert_eq!(range.take(), Some(3..8));
        assert!(range.is_clean());
    }
}
