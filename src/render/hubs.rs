//! Hub meshes
//!
//! Hubs are few, so each is drawn as its own mesh (one draw call per hub)
//! rather than as part of the leaf instancing. Their rows still live in one
//! small buffer pair so a whole-hub commit is a single write per stream.

use glam::Vec3;

use super::backend::{
    BackendError, BufferDesc, BufferId, BufferUsage, DrawPass, MeshKind, RenderBackend, write_rows,
};
use super::types::{InstanceAttributes, InstanceTransform, RenderConfig};
use crate::graph::{GraphModel, Rgb};
use crate::layout::LayoutResult;

/// One hub's mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct HubMesh {
    pub label: String,
    pub position: Vec3,
    pub color: Rgb,
    pub radius: f32,
    pub visible: bool,
}

impl HubMesh {
    fn transform(&self) -> InstanceTransform {
        let scale = if self.visible { self.radius } else { 0.0 };
        InstanceTransform::new(self.position.to_array(), scale)
    }

    fn attributes(&self) -> InstanceAttributes {
        let opacity = if self.visible { 1.0 } else { 0.0 };
        InstanceAttributes::new(self.color, opacity)
    }
}

/// Per-hub discrete meshes.
#[derive(Debug)]
pub struct HubMeshes {
    meshes: Vec<HubMesh>,
    transform_buffer: BufferId,
    attribute_buffer: BufferId,
    dirty: bool,
}

impl HubMeshes {
    pub fn new(
        backend: &mut dyn RenderBackend,
        model: &GraphModel,
        layout: &LayoutResult,
        config: &RenderConfig,
    ) -> Result<Self, BackendError> {
        let meshes: Vec<HubMesh> = model
            .hubs()
            .iter()
            .zip(&layout.hub_positions)
            .map(|(hub, &position)| HubMesh {
                label: hub.label.clone(),
                position,
                color: hub.color,
                radius: config.hub_radius * (1.0 + 0.35 * hub.size.max(0.0).ln_1p()),
                visible: true,
            })
            .collect();

        let transform_buffer = backend.create_buffer(&BufferDesc::rows::<InstanceTransform>(
            "hub-transforms",
            BufferUsage::Instance,
            meshes.len(),
        ))?;
        let attribute_buffer = backend.create_buffer(&BufferDesc::rows::<InstanceAttributes>(
            "hub-attributes",
            BufferUsage::Instance,
            meshes.len(),
        ))?;

        let mut hubs = Self {
            meshes,
            transform_buffer,
            attribute_buffer,
            dirty: true,
        };
        hubs.commit(backend)?;
        Ok(hubs)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn mesh(&self, hub: u32) -> &HubMesh {
        &self.meshes[hub as usize]
    }

    pub fn hub_position(&self, hub: u32) -> Vec3 {
        self.meshes[hub as usize].position
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.meshes.iter().map(|m| m.position).collect()
    }

    pub fn set_hub_position(&mut self, hub: u32, position: Vec3) {
        self.meshes[hub as usize].position = position;
        self.dirty = true;
    }

    /// Show or hide every hub mesh
    pub fn set_visible(&mut self, visible: bool) {
        for mesh in &mut self.meshes {
            mesh.visible = visible;
        }
        self.dirty = true;
    }

    pub fn visibility(&self) -> Vec<bool> {
        self.meshes.iter().map(|m| m.visible).collect()
    }

    pub fn restore_visibility(&mut self, visibility: &[bool]) {
        for (mesh, &visible) in self.meshes.iter_mut().zip(visibility) {
            mesh.visible = visible;
        }
        self.dirty = true;
    }

    /// Upload every hub row if anything changed
    pub fn commit(&mut self, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        if !self.dirty || self.meshes.is_empty() {
            self.dirty = false;
            return Ok(());
        }
        let transforms: Vec<InstanceTransform> =
            self.meshes.iter().map(HubMesh::transform).collect();
        let attributes: Vec<InstanceAttributes> =
            self.meshes.iter().map(HubMesh::attributes).collect();
        write_rows(backend, self.transform_buffer, 0, &transforms)?;
        write_rows(backend, self.attribute_buffer, 0, &attributes)?;
        self.dirty = false;
        Ok(())
    }

    /// One draw per visible hub
    pub fn draw_passes(&self) -> impl Iterator<Item = DrawPass> + '_ {
        self.meshes
            .iter()
            .enumerate()
            .filter(|(_, mesh)| mesh.visible)
            .map(|(h, _)| DrawPass::Nodes {
                mesh: MeshKind::Hub,
                transforms: self.transform_buffer,
                attributes: self.attribute_buffer,
                instances: h as u32..h as u32 + 1,
            })
    }
}
