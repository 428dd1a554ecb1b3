//! GPU-resident scene components
//!
//! - [`backend`]: the [`RenderBackend`] boundary every component draws through
//! - [`headless`]: in-memory backend with a software picking rasterizer
//! - [`types`]: `#[repr(C)]` rows shared with the GPU programs
//! - [`nodes`], [`hubs`], [`edges`]: leaf instances, hub meshes, edge lines
//! - [`picking`]: cursor → leaf index through an id-colour pass

pub mod backend;
pub mod camera;
pub mod edges;
pub mod headless;
pub mod hubs;
pub mod nodes;
pub mod picking;
pub mod types;

pub use backend::{
    BackendError, BufferDesc, BufferId, BufferUsage, DrawPass, MeshKind, RenderBackend, TargetId,
    TargetKind, write_rows,
};
pub use camera::Camera3D;
pub use edges::EdgeRenderer;
pub use headless::{FRAME_HISTORY, HeadlessBackend, RecordedFrame};
pub use hubs::{HubMesh, HubMeshes};
pub use nodes::{AttributeSnapshot, HighlightConfig, NodeRenderer};
pub use picking::{MAX_PICK_ID, PickingSystem, decode_pick_color, encode_pick_id};
pub use types::{
    CameraUniforms, InstanceAttributes, InstanceTransform, Particle, RenderConfig,
};
