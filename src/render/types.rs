//! GPU row types for instanced rendering
//!
//! These types are uploaded directly to GPU buffers by every backend.
//! All use f32 for GPU compatibility and are repr(C) for predictable layout.

use bytemuck::{Pod, Zeroable};
use serde::Deserialize;

// =============================================================================
// Default Constants
// =============================================================================

/// Default leaf mesh radius in world units
pub const DEFAULT_LEAF_RADIUS: f32 = 1.6;

/// Default hub mesh radius in world units (before the size bonus)
pub const DEFAULT_HUB_RADIUS: f32 = 6.0;

/// Opacity of leaves outside the highlighted set
pub const DEFAULT_DIMMED_OPACITY: f32 = 0.06;

/// Scale of leaves outside the highlighted set
pub const DEFAULT_DIMMED_SCALE: f32 = 0.5;

/// Edge colour relative to its target node colour
pub const EDGE_COLOR_FACTOR: f32 = 0.35;

/// Per-instance transform row: where the unit mesh goes and how large it is.
///
/// Layout matches WGSL struct for instanced rendering.
/// Used as vertex buffer with per-instance step mode.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    /// World position
    pub position: [f32; 3],
    /// Radius of the unit mesh in world units
    pub scale: f32,
}

impl InstanceTransform {
    pub fn new(position: [f32; 3], scale: f32) -> Self {
        Self { position, scale }
    }
}

/// Per-instance appearance row.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceAttributes {
    /// Displayed RGB colour
    pub color: [f32; 3],
    /// Opacity in [0, 1]
    pub opacity: f32,
}

impl InstanceAttributes {
    pub fn new(color: [f32; 3], opacity: f32) -> Self {
        Self { color, opacity }
    }
}

/// One flow-field particle.
///
/// The GPU program displaces the particle from `origin` every frame; the row
/// itself never changes while the mode is active.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Seed position
    pub origin: [f32; 3],
    /// Random phase in [0, 2π)
    pub phase: f32,
    /// Base RGB colour
    pub color: [f32; 3],
    /// Per-particle speed multiplier
    pub speed: f32,
    /// Base point size in world units
    pub size: f32,
    /// Padding for 16-byte alignment
    pub _padding: [f32; 3],
}

/// Camera matrices passed to GPU for 3D rendering.
///
/// Layout matches WGSL struct for uniform binding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniforms {
    /// View matrix (world -> camera space)
    pub view: [[f32; 4]; 4],
    /// Projection matrix (camera -> clip space)
    pub projection: [[f32; 4]; 4],
    /// Camera position in world space (for lighting)
    pub camera_pos: [f32; 3],
    /// Padding for 16-byte alignment
    pub _padding: f32,
}

impl Default for CameraUniforms {
    fn default() -> Self {
        let identity = glam::Mat4::IDENTITY.to_cols_array_2d();
        Self {
            view: identity,
            projection: identity,
            camera_pos: [0.0, 0.0, 0.0],
            _padding: 0.0,
        }
    }
}

/// Configuration for the renderer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render target width in pixels
    pub width: u32,
    /// Render target height in pixels
    pub height: u32,
    /// Background clear color (RGBA)
    pub clear_color: [f32; 4],
    /// Leaf mesh radius before the degree bonus
    pub leaf_radius: f32,
    /// Hub mesh radius before the size bonus
    pub hub_radius: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            clear_color: [0.02, 0.02, 0.05, 1.0], // Near-black background
            leaf_radius: DEFAULT_LEAF_RADIUS,
            hub_radius: DEFAULT_HUB_RADIUS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_transform_size() {
        // 3 floats (position) + 1 float (scale) = 16 bytes
        assert_eq!(std::mem::size_of::<InstanceTransform>(), 16);
    }

    #[test]
    fn test_instance_attributes_size() {
        // 3 floats (color) + 1 float (opacity) = 16 bytes
        assert_eq!(std::mem::size_of::<InstanceAttributes>(), 16);
    }

    #[test]
    fn test_particle_size() {
        // origin + phase + color + speed + size + 3 padding = 12 floats = 48 bytes
        assert_eq!(std::mem::size_of::<Particle>(), 48);
    }

    #[test]
    fn test_camera_uniforms_size() {
        // 16 floats (view) + 16 floats (projection) + 3 floats (camera_pos) + 1 float (padding)
        // = 36 floats = 144 bytes
        let size = std::mem::size_of::<CameraUniforms>();
        assert_eq!(size, 144);
        assert_eq!(
            size % 16,
            0,
            "CameraUniforms size {} is not 16-byte aligned",
            size
        );
    }

    #[test]
    fn test_camera_uniforms_default() {
        let uniforms = CameraUniforms::default();

        let identity = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        assert_eq!(uniforms.view, identity);
        assert_eq!(uniforms.projection, identity);
        assert_eq!(uniforms.camera_pos, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_render_config_partial_json() {
        let config: RenderConfig = serde_json::from_str(r#"{"width": 1920}"#).unwrap();
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 600);
        assert_eq!(config.leaf_radius, DEFAULT_LEAF_RADIUS);
    }
}
