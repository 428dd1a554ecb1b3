//! GPU picking
//!
//! A second instanced draw over the leaf transforms writes each instance's
//! 1-based id as its colour, packed big-endian into the R, G and B bytes.
//! Only the pixel under the cursor is rasterized: the draw goes to a 1x1
//! target through a projection that maps that one pixel onto the whole
//! target. Zero is the cleared background.

use glam::Vec2;

use super::backend::{BackendError, RenderBackend, TargetId, TargetKind};
use super::camera::Camera3D;
use super::nodes::NodeRenderer;

/// Largest id three 8-bit channels can carry
pub const MAX_PICK_ID: u32 = (1 << 24) - 1;

/// Packed colour for the instance at `index`
pub fn encode_pick_id(index: u32) -> [u8; 3] {
    let id = index + 1;
    debug_assert!(id <= MAX_PICK_ID, "pick id {id} exceeds {MAX_PICK_ID}");
    let [_, r, g, b] = id.to_be_bytes();
    [r, g, b]
}

/// Instance index for a read-back colour, `-1` for background
pub fn decode_pick_color(rgb: [u8; 3]) -> i64 {
    let id = u32::from_be_bytes([0, rgb[0], rgb[1], rgb[2]]);
    i64::from(id) - 1
}

/// Resolves the leaf under a cursor position.
#[derive(Debug)]
pub struct PickingSystem {
    target: TargetId,
}

impl PickingSystem {
    /// Allocate the 1x1 pick target.
    ///
    /// # Panics
    ///
    /// If `nodes` holds more leaves than pick ids can address.
    pub fn new(backend: &mut dyn RenderBackend, nodes: &NodeRenderer) -> Result<Self, BackendError> {
        assert!(
            nodes.leaf_count() as u64 <= u64::from(MAX_PICK_ID),
            "{} leaf instances exceed the {MAX_PICK_ID} addressable pick ids",
            nodes.leaf_count()
        );
        let target = backend.create_target(1, 1, TargetKind::Picking)?;
        Ok(Self { target })
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Leaf index under `cursor_ndc`, or `-1` when the cursor is over
    /// background.
    ///
    /// Reads the transform buffer as last committed.
    pub fn pick(
        &self,
        backend: &mut dyn RenderBackend,
        camera: &Camera3D,
        viewport: (u32, u32),
        cursor_ndc: Vec2,
        nodes: &NodeRenderer,
    ) -> Result<i64, BackendError> {
        if nodes.leaf_count() == 0 {
            return Ok(-1);
        }
        let uniforms = camera.pick_uniforms(cursor_ndc, viewport);
        backend.render_to_target(self.target, &uniforms, [0.0; 4], &[nodes.picking_pass()])?;
        let pixel = backend.read_pixels(self.target, 0, 0, 1, 1)?;
        let &[r, g, b, ..] = pixel.as_slice() else {
            return Err(BackendError::Readback(format!(
                "expected one RGBA pixel, got {} bytes",
                pixel.len()
            )));
        };
        let index = decode_pick_color([r, g, b]);
        tracing::trace!(?cursor_ndc, index, "pick");
        Ok(index)
    }
}
