//! [`RenderBackend`] on top of wgpu
//!
//! Renders off-screen: every target is a colour texture plus a depth texture,
//! and frames are read back through a padded staging buffer. Each target kind
//! has its own pipelines, so a pass that does not belong on a target (a
//! picking pass on a colour target, say) is skipped.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::geometry::{HUB_SUBDIVISIONS, LEAF_SUBDIVISIONS, MeshVertex, icosphere};
use super::shaders::{edge_shader, node_shader, particle_shader, pick_shader};
use crate::flow::FlowUniformsRaw;
use crate::render::{
    BackendError, BufferDesc, BufferId, BufferUsage, CameraUniforms, DrawPass, InstanceAttributes,
    InstanceTransform, MeshKind, Particle, RenderBackend, TargetId, TargetKind,
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const PICK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];
const TRANSFORM_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![2 => Float32x3, 3 => Float32];
const APPEARANCE_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![4 => Float32x3, 5 => Float32];
const PICK_ID_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![4 => Uint32];
const EDGE_POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] =
    wgpu::vertex_attr_array![0 => Float32x3];
const EDGE_COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const PARTICLE_ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Float32,
    2 => Float32x3,
    3 => Float32,
    4 => Float32,
];

/// Additive blending: `dst += src`
const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

fn vertex_layout<T>(
    step_mode: wgpu::VertexStepMode,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<T>() as u64,
        step_mode,
        attributes,
    }
}

struct PipelineSpec<'a> {
    label: &'static str,
    shader: &'a wgpu::ShaderModule,
    vs_entry: &'static str,
    fs_entry: &'static str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    depth_write: bool,
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    spec: PipelineSpec<'_>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: spec.shader,
            entry_point: Some(spec.vs_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: spec.buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: spec.shader,
            entry_point: Some(spec.fs_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: spec.format,
                blend: spec.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: spec.cull_mode,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: spec.depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

struct Pipelines {
    nodes: wgpu::RenderPipeline,
    edges: wgpu::RenderPipeline,
    picking: wgpu::RenderPipeline,
    particles: wgpu::RenderPipeline,
}

impl Pipelines {
    fn new(
        device: &wgpu::Device,
        camera_layout: &wgpu::BindGroupLayout,
        flow_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let shader = |label, source: String| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let node_module = shader("Node Shader", node_shader());
        let edge_module = shader("Edge Shader", edge_shader());
        let pick_module = shader("Pick Shader", pick_shader());
        let particle_module = shader("Particle Shader", particle_shader());

        let camera_only = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Camera Pipeline Layout"),
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });
        let with_flow = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pipeline Layout"),
            bind_group_layouts: &[camera_layout, flow_layout],
            push_constant_ranges: &[],
        });

        let mesh = vertex_layout::<MeshVertex>(wgpu::VertexStepMode::Vertex, &MESH_ATTRIBUTES);
        let transforms = vertex_layout::<InstanceTransform>(
            wgpu::VertexStepMode::Instance,
            &TRANSFORM_ATTRIBUTES,
        );

        let nodes = create_pipeline(
            device,
            &camera_only,
            PipelineSpec {
                label: "Node Pipeline",
                shader: &node_module,
                vs_entry: "vs_node",
                fs_entry: "fs_node",
                buffers: &[
                    mesh.clone(),
                    transforms.clone(),
                    vertex_layout::<InstanceAttributes>(
                        wgpu::VertexStepMode::Instance,
                        &APPEARANCE_ATTRIBUTES,
                    ),
                ],
                format: COLOR_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                depth_write: true,
            },
        );

        let edges = create_pipeline(
            device,
            &camera_only,
            PipelineSpec {
                label: "Edge Pipeline",
                shader: &edge_module,
                vs_entry: "vs_edge",
                fs_entry: "fs_edge",
                buffers: &[
                    vertex_layout::<[f32; 3]>(
                        wgpu::VertexStepMode::Vertex,
                        &EDGE_POSITION_ATTRIBUTES,
                    ),
                    vertex_layout::<[f32; 3]>(wgpu::VertexStepMode::Vertex, &EDGE_COLOR_ATTRIBUTES),
                ],
                format: COLOR_FORMAT,
                blend: Some(ADDITIVE),
                topology: wgpu::PrimitiveTopology::LineList,
                cull_mode: None,
                depth_write: false,
            },
        );

        let picking = create_pipeline(
            device,
            &camera_only,
            PipelineSpec {
                label: "Pick Pipeline",
                shader: &pick_module,
                vs_entry: "vs_pick",
                fs_entry: "fs_pick",
                buffers: &[
                    mesh,
                    transforms,
                    vertex_layout::<u32>(wgpu::VertexStepMode::Instance, &PICK_ID_ATTRIBUTES),
                ],
                format: PICK_FORMAT,
                blend: None,
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                depth_write: true,
            },
        );

        let particles = create_pipeline(
            device,
            &with_flow,
            PipelineSpec {
                label: "Particle Pipeline",
                shader: &particle_module,
                vs_entry: "vs_particle",
                fs_entry: "fs_particle",
                buffers: &[vertex_layout::<Particle>(
                    wgpu::VertexStepMode::Instance,
                    &PARTICLE_ATTRIBUTES,
                )],
                format: COLOR_FORMAT,
                blend: Some(ADDITIVE),
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                depth_write: false,
            },
        );

        Self {
            nodes,
            edges,
            picking,
            particles,
        }
    }
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn icosphere(device: &wgpu::Device, label: &str, subdivisions: u32) -> Self {
        let mesh = icosphere(subdivisions);
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Vertex Buffer")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Index Buffer")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices,
            indices,
            index_count: mesh.index_count(),
        }
    }
}

struct GpuBuffer {
    label: &'static str,
    usage: BufferUsage,
    size: u64,
    buffer: wgpu::Buffer,
}

struct GpuTarget {
    width: u32,
    height: u32,
    kind: TargetKind,
    color: wgpu::Texture,
    depth: wgpu::Texture,
}

/// Off-screen wgpu renderer.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: Pipelines,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    flow_layout: wgpu::BindGroupLayout,
    flow_bind_groups: HashMap<BufferId, wgpu::BindGroup>,
    leaf_mesh: GpuMesh,
    hub_mesh: GpuMesh,
    buffers: Vec<GpuBuffer>,
    targets: Vec<Option<GpuTarget>>,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("buffers", &self.buffers.len())
            .field("targets", &self.targets.iter().flatten().count())
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Open the default adapter and build every pipeline.
    ///
    /// Blocks on device creation.
    pub fn new() -> Result<Self, BackendError> {
        let (device, queue) = pollster::block_on(create_render_device())?;
        Ok(Self::from_device(device, queue))
    }

    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let uniform_entry = |visibility| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[uniform_entry(
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let flow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Flow Bind Group Layout"),
            entries: &[uniform_entry(wgpu::ShaderStages::VERTEX)],
        });

        let pipelines = Pipelines::new(&device, &camera_layout, &flow_layout);

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform Buffer"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let leaf_mesh = GpuMesh::icosphere(&device, "Leaf Mesh", LEAF_SUBDIVISIONS);
        let hub_mesh = GpuMesh::icosphere(&device, "Hub Mesh", HUB_SUBDIVISIONS);

        Self {
            device,
            queue,
            pipelines,
            camera_buffer,
            camera_bind_group,
            flow_layout,
            flow_bind_groups: HashMap::new(),
            leaf_mesh,
            hub_mesh,
            buffers: Vec::new(),
            targets: Vec::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn buffer(&self, id: BufferId) -> Result<&GpuBuffer, BackendError> {
        self.buffers.get(id.0).ok_or(BackendError::UnknownBuffer(id))
    }

    fn mesh(&self, kind: MeshKind) -> &GpuMesh {
        match kind {
            MeshKind::Leaf => &self.leaf_mesh,
            MeshKind::Hub => &self.hub_mesh,
        }
    }

    fn ensure_flow_bind_group(&mut self, uniforms: BufferId) -> Result<(), BackendError> {
        if self.flow_bind_groups.contains_key(&uniforms) {
            return Ok(());
        }
        let buffer = self.buffer(uniforms)?;
        if buffer.usage != BufferUsage::Uniform
            || buffer.size < std::mem::size_of::<FlowUniformsRaw>() as u64
        {
            return Err(BackendError::Allocation {
                label: buffer.label,
                reason: "not a flow uniform buffer".into(),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Flow Bind Group"),
            layout: &self.flow_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.buffer.as_entire_binding(),
            }],
        });
        self.flow_bind_groups.insert(uniforms, bind_group);
        Ok(())
    }

    fn record(&self, pass: &mut wgpu::RenderPass<'_>, draw: &DrawPass) -> Result<(), BackendError> {
        match draw {
            DrawPass::Edges {
                positions,
                colors,
                vertices,
            } => {
                let positions = self.buffer(*positions)?;
                let colors = self.buffer(*colors)?;
                if *vertices == 0 {
                    return Ok(());
                }
                pass.set_pipeline(&self.pipelines.edges);
                pass.set_bind_group(0, &self.camera_bind_group, &[]);
                pass.set_vertex_buffer(0, positions.buffer.slice(..));
                pass.set_vertex_buffer(1, colors.buffer.slice(..));
                pass.draw(0..*vertices, 0..1);
            }
            DrawPass::Nodes {
                mesh,
                transforms,
                attributes,
                instances,
            } => {
                let transforms = self.buffer(*transforms)?;
                let attributes = self.buffer(*attributes)?;
                if instances.is_empty() {
                    return Ok(());
                }
                let mesh = self.mesh(*mesh);
                pass.set_pipeline(&self.pipelines.nodes);
                pass.set_bind_group(0, &self.camera_bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                pass.set_vertex_buffer(1, transforms.buffer.slice(..));
                pass.set_vertex_buffer(2, attributes.buffer.slice(..));
                pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, instances.clone());
            }
            DrawPass::Picking {
                transforms,
                pick_ids,
                instances,
            } => {
                let transforms = self.buffer(*transforms)?;
                let pick_ids = self.buffer(*pick_ids)?;
                if *instances == 0 {
                    return Ok(());
                }
                let mesh = &self.leaf_mesh;
                pass.set_pipeline(&self.pipelines.picking);
                pass.set_bind_group(0, &self.camera_bind_group, &[]);
                pass.set_vertex_buffer(0, mesh.vertices.slice(..));
                pass.set_vertex_buffer(1, transforms.buffer.slice(..));
                pass.set_vertex_buffer(2, pick_ids.buffer.slice(..));
                pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..*instances);
            }
            DrawPass::Particles {
                particles,
                uniforms,
                count,
            } => {
                let particles = self.buffer(*particles)?;
                let flow = self
                    .flow_bind_groups
                    .get(uniforms)
                    .ok_or(BackendError::UnknownBuffer(*uniforms))?;
                if *count == 0 {
                    return Ok(());
                }
                pass.set_pipeline(&self.pipelines.particles);
                pass.set_bind_group(0, &self.camera_bind_group, &[]);
                pass.set_bind_group(1, flow, &[]);
                pass.set_vertex_buffer(0, particles.buffer.slice(..));
                pass.draw(0..6, 0..*count);
            }
        }
        Ok(())
    }
}

fn draws_on(pass: &DrawPass, kind: TargetKind) -> bool {
    match pass {
        DrawPass::Picking { .. } => kind == TargetKind::Picking,
        _ => kind == TargetKind::Color,
    }
}

impl RenderBackend for WgpuBackend {
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferId, BackendError> {
        let usage = match desc.usage {
            BufferUsage::Instance | BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM,
        } | wgpu::BufferUsages::COPY_DST;

        let align = wgpu::COPY_BUFFER_ALIGNMENT;
        let allocated = desc.size.max(align).next_multiple_of(align);
        if allocated > self.device.limits().max_buffer_size {
            return Err(BackendError::Allocation {
                label: desc.label,
                reason: format!("{} bytes exceeds the device buffer limit", desc.size),
            });
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: allocated,
            usage,
            mapped_at_creation: false,
        });
        tracing::debug!(label = desc.label, size = desc.size, "buffer created");
        self.buffers.push(GpuBuffer {
            label: desc.label,
            usage: desc.usage,
            size: desc.size,
            buffer,
        });
        Ok(BufferId(self.buffers.len() - 1))
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let target = self.buffer(buffer)?;
        if offset + data.len() as u64 > target.size {
            return Err(BackendError::WriteOutOfRange {
                label: target.label,
                offset,
                len: data.len(),
                size: target.size,
            });
        }
        if !data.is_empty() {
            self.queue.write_buffer(&target.buffer, offset, data);
        }
        Ok(())
    }

    fn create_target(
        &mut self,
        width: u32,
        height: u32,
        kind: TargetKind,
    ) -> Result<TargetId, BackendError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(BackendError::Allocation {
                label: "render-target",
                reason: format!("{width}x{height} is outside 1..={max}"),
            });
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = |label, format, usage| {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };
        let format = match kind {
            TargetKind::Color => COLOR_FORMAT,
            TargetKind::Picking => PICK_FORMAT,
        };
        let color = texture(
            "Color Texture",
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let depth = texture(
            "Depth Texture",
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        self.targets.push(Some(GpuTarget {
            width,
            height,
            kind,
            color,
            depth,
        }));
        Ok(TargetId(self.targets.len() - 1))
    }

    fn destroy_target(&mut self, target: TargetId) -> Result<(), BackendError> {
        let surface = self
            .targets
            .get_mut(target.0)
            .and_then(Option::take)
            .ok_or(BackendError::UnknownTarget(target))?;
        surface.color.destroy();
        surface.depth.destroy();
        Ok(())
    }

    fn render_to_target(
        &mut self,
        target: TargetId,
        camera: &CameraUniforms,
        clear: [f32; 4],
        passes: &[DrawPass],
    ) -> Result<(), BackendError> {
        for pass in passes {
            if let DrawPass::Particles { uniforms, .. } = pass {
                self.ensure_flow_bind_group(*uniforms)?;
            }
        }
        let surface = self
            .targets
            .get(target.0)
            .and_then(Option::as_ref)
            .ok_or(BackendError::UnknownTarget(target))?;

        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(camera));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        let color_view = surface
            .color
            .create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = surface
            .depth
            .create_view(&wgpu::TextureViewDescriptor::default());

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0] as f64,
                            g: clear[1] as f64,
                            b: clear[2] as f64,
                            a: clear[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for pass in passes.iter().filter(|p| draws_on(p, surface.kind)) {
                self.record(&mut render_pass, pass)?;
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(target = target.0, passes = passes.len(), "gpu frame");
        Ok(())
    }

    fn read_pixels(
        &mut self,
        target: TargetId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, BackendError> {
        let surface = self
            .targets
            .get(target.0)
            .and_then(Option::as_ref)
            .ok_or(BackendError::UnknownTarget(target))?;
        if x + width > surface.width || y + height > surface.height {
            return Err(BackendError::ReadOutOfRange {
                x,
                y,
                width,
                height,
                target_width: surface.width,
                target_height: surface.height,
            });
        }
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        // Rows in the staging buffer must be multiples of COPY_BYTES_PER_ROW_ALIGNMENT (256)
        let unpadded_bytes_per_row = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &surface.color,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| BackendError::Readback(e.to_string()))?
            .map_err(|e| BackendError::Readback(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in data.chunks(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(data);
        staging.unmap();

        Ok(pixels)
    }
}

/// Request a device and queue from the highest-performance adapter.
pub async fn create_render_device() -> Result<(wgpu::Device, wgpu::Queue), BackendError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| BackendError::Device("no compatible adapter".into()))?;

    let info = adapter.get_info();
    tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU adapter selected");

    adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .map_err(|e| BackendError::Device(e.to_string()))
}
