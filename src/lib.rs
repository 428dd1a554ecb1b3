//! graphscape - layout and instanced rendering for large hub/leaf graphs.
//!
//! A [`GraphModel`] is built once from a parsed payload. One of four layout
//! shapes places every hub and leaf, and a [`Scene`] uploads the result into
//! instanced node, hub and edge buffers behind a [`RenderBackend`]. The scene
//! supports GPU colour picking, highlight fading, animated layout transitions
//! and a flow-field particle mode.
//!
//! ```
//! use graphscape::config::SceneConfig;
//! use graphscape::graph::{GraphModel, RawEdge, RawNode};
//! use graphscape::layout::LayoutShape;
//! use graphscape::render::HeadlessBackend;
//! use graphscape::scene::Scene;
//!
//! let model = GraphModel::build(
//!     &[RawNode::hub("h", "Physics"), RawNode::leaf("a", "video")],
//!     &[RawEdge::new("h", "a")],
//! ).unwrap();
//!
//! let mut scene = Scene::new(HeadlessBackend::new(), model, SceneConfig::default()).unwrap();
//! scene.transition_to(LayoutShape::Sphere, 0.0);
//! while scene.frame(10.0).unwrap() {}
//! assert_eq!(scene.shape(), LayoutShape::Sphere);
//! ```
//!
//! The `gpu` feature adds [`gpu::WgpuBackend`].

pub mod animation;
pub mod config;
pub mod flow;
pub mod graph;
pub mod layout;
pub mod render;
pub mod scene;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use config::SceneConfig;
pub use graph::{GraphError, GraphModel, NodeRef};
pub use layout::{LayoutResult, LayoutShape};
pub use render::{BackendError, HeadlessBackend, RenderBackend};
pub use scene::{Scene, SceneError};
