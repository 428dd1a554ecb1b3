//! wgpu implementation of the render backend
//!
//! Enabled with the `gpu` feature. [`WgpuBackend`] draws the same
//! [`DrawPass`](crate::render::DrawPass) lists the headless backend records,
//! into off-screen textures that can be read back as RGBA8.
//!
//! ```rust,ignore
//! use graphscape::gpu::WgpuBackend;
//! use graphscape::scene::Scene;
//!
//! let backend = WgpuBackend::new()?;
//! let mut scene = Scene::new(backend, model, config)?;
//! scene.render()?;
//! ```

mod backend;
pub mod geometry;
pub mod shaders;

pub use backend::{WgpuBackend, create_render_device};
