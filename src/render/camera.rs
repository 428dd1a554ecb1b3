//! 3D camera for the graph scene
//!
//! The camera is parameterised in spherical coordinates around a target
//! point. Interactive orbit/zoom/pan controls live outside this crate; the
//! scene only needs matrices, framing and the single-pixel pick projection.

use std::f32::consts::PI;

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::types::CameraUniforms;

/// Default field of view in radians (45 degrees)
pub const DEFAULT_FOV: f32 = PI / 4.0;

/// Default near clip plane
pub const DEFAULT_NEAR: f32 = 0.1;

/// Default far clip plane
pub const DEFAULT_FAR: f32 = 10000.0;

/// Default camera distance from target
pub const DEFAULT_DISTANCE: f32 = 500.0;

/// Extra room around framed bounds
const FRAME_MARGIN: f32 = 1.15;

/// 3D camera using spherical coordinates.
///
/// The camera looks at a target point from a position defined by:
/// - `distance`: how far from the target
/// - `azimuth`: horizontal angle around the target (radians)
/// - `elevation`: vertical angle above/below the target (radians)
///
/// # Example
///
/// ```
/// use graphscape::render::Camera3D;
/// use glam::Vec3;
///
/// let mut camera = Camera3D::new(800.0 / 600.0);
/// camera.frame_bounds(Vec3::splat(-100.0), Vec3::splat(100.0));
///
/// let uniforms = camera.uniforms();
/// assert!(camera.distance > 100.0);
/// # let _ = uniforms;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Camera3D {
    /// Distance from target (spherical radius)
    pub distance: f32,
    /// Horizontal angle in radians (0 = looking along -Z from +Z)
    pub azimuth: f32,
    /// Vertical angle in radians (0 = level, positive = looking down)
    pub elevation: f32,
    /// Target point the camera looks at
    pub target: Vec3,
    /// Field of view in radians
    pub fov: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    /// Near clip plane distance
    pub near: f32,
    /// Far clip plane distance
    pub far: f32,
}

impl Camera3D {
    /// Create a new camera with the given aspect ratio
    pub fn new(aspect: f32) -> Self {
        Self {
            distance: DEFAULT_DISTANCE,
            azimuth: 0.0,
            elevation: 0.3, // Slightly above level for better initial view
            target: Vec3::ZERO,
            fov: DEFAULT_FOV,
            aspect,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    /// Compute camera position in world space from spherical coordinates
    pub fn position(&self) -> Vec3 {
        let (sin_elev, cos_elev) = self.elevation.sin_cos();
        let (sin_azim, cos_azim) = self.azimuth.sin_cos();
        self.target
            + Vec3::new(cos_elev * sin_azim, sin_elev, cos_elev * cos_azim) * self.distance
    }

    /// View matrix (world -> camera space)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Perspective projection (camera -> clip space), depth in [0, 1]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    /// Get combined camera uniforms for GPU upload
    pub fn uniforms(&self) -> CameraUniforms {
        self.uniforms_with_projection(self.projection_matrix())
    }

    /// Uniforms whose projection maps the single viewport pixel under
    /// `cursor_ndc` onto the whole of a 1x1 target.
    ///
    /// The view-offset matrix scales clip space by half the viewport size and
    /// shifts the cursor to the origin, so the cursor pixel covers NDC
    /// `[-1, 1]²` and everything else falls outside and is clipped.
    pub fn pick_uniforms(&self, cursor_ndc: Vec2, viewport: (u32, u32)) -> CameraUniforms {
        let sx = viewport.0 as f32 / 2.0;
        let sy = viewport.1 as f32 / 2.0;
        let offset = Mat4::from_cols(
            Vec4::new(sx, 0.0, 0.0, 0.0),
            Vec4::new(0.0, sy, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(-cursor_ndc.x * sx, -cursor_ndc.y * sy, 0.0, 1.0),
        );
        self.uniforms_with_projection(offset * self.projection_matrix())
    }

    fn uniforms_with_projection(&self, projection: Mat4) -> CameraUniforms {
        CameraUniforms {
            view: self.view_matrix().to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            camera_pos: self.position().to_array(),
            _padding: 0.0,
        }
    }

    /// Project a world point to NDC, `None` if it is behind the camera
    pub fn project(&self, point: Vec3) -> Option<Vec2> {
        let clip = self.projection_matrix() * self.view_matrix() * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        Some(Vec2::new(clip.x / clip.w, clip.y / clip.w))
    }

    /// Aim at the centre of `lo..hi` from far enough away to see all of it
    pub fn frame_bounds(&mut self, lo: Vec3, hi: Vec3) {
        self.target = (lo + hi) * 0.5;
        let radius = ((hi - lo) * 0.5).length().max(1.0);
        let half_fov = (self.fov * 0.5).min(self.fov * 0.5 * self.aspect);
        self.distance = radius * FRAME_MARGIN / half_fov.sin();
        self.far = self.far.max(self.distance + radius * 2.0);
    }

    /// Set aspect ratio (call when the viewport resizes)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }
}

impl Default for Camera3D {
    fn default() -> Self {
        Self::new(4.0 / 3.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_position_at_origin() {
        let mut camera = Camera3D::new(1.0);
        camera.azimuth = 0.0;
        camera.elevation = 0.0;
        camera.distance = 100.0;

        let pos = camera.position();
        // At azimuth=0, elevation=0, camera should be on +Z axis
        assert!(pos.x.abs() < 0.001);
        assert!(pos.y.abs() < 0.001);
        assert!((pos.z - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_target_projects_to_center() {
        let mut camera = Camera3D::new(1.5);
        camera.target = Vec3::new(10.0, -4.0, 3.0);
        let ndc = camera.project(camera.target).unwrap();
        assert!(ndc.length() < 1e-4);
    }

    #[test]
    fn test_point_behind_camera() {
        let mut camera = Camera3D::new(1.0);
        camera.elevation = 0.0;
        assert!(camera.project(Vec3::new(0.0, 0.0, 1000.0)).is_none());
    }

    #[test]
    fn test_pick_projection_centers_cursor() {
        let mut camera = Camera3D::new(800.0 / 600.0);
        camera.elevation = 0.0;
        let point = Vec3::new(40.0, 25.0, 0.0);
        let cursor = camera.project(point).unwrap();

        let uniforms = camera.pick_uniforms(cursor, (800, 600));
        let view = Mat4::from_cols_array_2d(&uniforms.view);
        let proj = Mat4::from_cols_array_2d(&uniforms.projection);
        let clip = proj * view * point.extend(1.0);
        assert!((clip.x / clip.w).abs() < 1e-3);
        assert!((clip.y / clip.w).abs() < 1e-3);
    }

    #[test]
    fn test_pick_projection_scales_one_pixel_to_ndc() {
        let camera = Camera3D::new(1.0);
        let uniforms = camera.pick_uniforms(Vec2::ZERO, (100, 100));
        let base = camera.projection_matrix();
        let proj = Mat4::from_cols_array_2d(&uniforms.projection);
        assert!((proj.x_axis.x - base.x_axis.x * 50.0).abs() < 1e-3);
        assert!((proj.y_axis.y - base.y_axis.y * 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_frame_bounds_sees_corners() {
        let mut camera = Camera3D::new(16.0 / 9.0);
        let lo = Vec3::new(-300.0, -50.0, -200.0);
        let hi = Vec3::new(250.0, 80.0, 220.0);
        camera.frame_bounds(lo, hi);
        for corner in [lo, hi, Vec3::new(lo.x, hi.y, lo.z), Vec3::new(hi.x, lo.y, hi.z)] {
            let ndc = camera.project(corner).unwrap();
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{corner} -> {ndc}");
        }
    }

    #[test]
    fn test_camera_uniforms() {
        let camera = Camera3D::new(1.0);
        let uniforms = camera.uniforms();
        assert_eq!(uniforms.camera_pos, camera.position().to_array());
        assert_eq!(uniforms.view, camera.view_matrix().to_cols_array_2d());
    }

    #[test]
    fn test_camera_default() {
        let camera = Camera3D::default();
        assert!((camera.aspect - 4.0 / 3.0).abs() < 0.001);
        assert_eq!(camera.distance, DEFAULT_DISTANCE);
        assert_eq!(camera.target, Vec3::ZERO);
    }
}
