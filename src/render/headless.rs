//! CPU implementation of [`RenderBackend`]
//!
//! Buffers are plain byte vectors and every write is counted, so tests can
//! assert exactly what the components uploaded. The picking pass is software
//! rasterized (each instance becomes a screen-space disc of its projected
//! radius, depth tested against the others), which is enough for pick results
//! to agree with what the GPU program would return. Other passes are recorded
//! but not shaded.

use glam::{Mat4, Vec3, Vec4};

use super::backend::{
    BackendError, BufferDesc, BufferId, BufferUsage, DrawPass, RenderBackend, TargetId, TargetKind,
};
use super::types::{CameraUniforms, InstanceTransform};

#[derive(Debug)]
struct HeadlessBuffer {
    label: &'static str,
    usage: BufferUsage,
    data: Vec<u8>,
    writes: usize,
}

#[derive(Debug)]
struct HeadlessTarget {
    width: u32,
    height: u32,
    kind: TargetKind,
    pixels: Vec<u8>,
    depth: Vec<f32>,
}

/// A finished `render_to_target` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub target: TargetId,
    pub passes: Vec<DrawPass>,
}

/// Frames kept by [`HeadlessBackend::frames`]; older ones are dropped
pub const FRAME_HISTORY: usize = 16;

/// Backend that keeps everything in memory.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    buffers: Vec<HeadlessBuffer>,
    // Destroyed targets leave `None` so stale ids stay unknown
    targets: Vec<Option<HeadlessTarget>>,
    frames: Vec<RecordedFrame>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents of a buffer
    pub fn buffer_bytes(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers.get(buffer.0).map(|b| b.data.as_slice())
    }

    /// Buffer contents reinterpreted as rows of `T`
    pub fn buffer_rows<T: bytemuck::Pod>(&self, buffer: BufferId) -> Option<Vec<T>> {
        self.buffer_bytes(buffer)
            .map(|bytes| bytemuck::pod_collect_to_vec::<u8, T>(bytes))
    }

    /// Number of `write_buffer` calls that hit `buffer`
    pub fn write_count(&self, buffer: BufferId) -> usize {
        self.buffers.get(buffer.0).map_or(0, |b| b.writes)
    }

    /// Label and usage a buffer was created with
    pub fn buffer_info(&self, buffer: BufferId) -> Option<(&'static str, BufferUsage)> {
        self.buffers.get(buffer.0).map(|b| (b.label, b.usage))
    }

    /// The last [`FRAME_HISTORY`] frames, oldest first
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    /// Drain the recorded frames
    pub fn take_frames(&mut self) -> Vec<RecordedFrame> {
        std::mem::take(&mut self.frames)
    }

    /// Number of targets created and not yet destroyed
    pub fn live_targets(&self) -> usize {
        self.targets.iter().filter(|t| t.is_some()).count()
    }

    fn buffer(&self, id: BufferId) -> Result<&HeadlessBuffer, BackendError> {
        self.buffers.get(id.0).ok_or(BackendError::UnknownBuffer(id))
    }

    fn check_pass(&self, pass: &DrawPass) -> Result<(), BackendError> {
        let ids: [BufferId; 2] = match pass {
            DrawPass::Edges {
                positions, colors, ..
            } => [*positions, *colors],
            DrawPass::Nodes {
                transforms,
                attributes,
                ..
            } => [*transforms, *attributes],
            DrawPass::Picking {
                transforms,
                pick_ids,
                ..
            } => [*transforms, *pick_ids],
            DrawPass::Particles {
                particles,
                uniforms,
                ..
            } => [*particles, *uniforms],
        };
        for id in ids {
            self.buffer(id)?;
        }
        Ok(())
    }

    fn rasterize_picking(
        &self,
        target: &mut HeadlessTarget,
        camera: &CameraUniforms,
        transforms: BufferId,
        pick_ids: BufferId,
        instances: u32,
    ) -> Result<(), BackendError> {
        let view = Mat4::from_cols_array_2d(&camera.view);
        let projection = Mat4::from_cols_array_2d(&camera.projection);
        let transforms = &self.buffer(transforms)?.data;
        let ids = &self.buffer(pick_ids)?.data;

        let row = std::mem::size_of::<InstanceTransform>();
        let (w, h) = (target.width as f32, target.height as f32);

        for i in 0..instances as usize {
            let (Some(t_bytes), Some(id_bytes)) = (
                transforms.get(i * row..(i + 1) * row),
                ids.get(i * 4..(i + 1) * 4),
            ) else {
                break;
            };
            let instance: InstanceTransform = bytemuck::pod_read_unaligned(t_bytes);
            let id: u32 = bytemuck::pod_read_unaligned(id_bytes);
            if instance.scale <= 0.0 {
                continue;
            }

            let eye = view * Vec3::from(instance.position).extend(1.0);
            let Some(center) = to_ndc(projection * eye) else {
                continue;
            };
            if !(0.0..=1.0).contains(&center.z) {
                continue;
            }
            let edge_x = to_ndc(projection * (eye + Vec4::new(instance.scale, 0.0, 0.0, 0.0)));
            let edge_y = to_ndc(projection * (eye + Vec4::new(0.0, instance.scale, 0.0, 0.0)));
            let (Some(edge_x), Some(edge_y)) = (edge_x, edge_y) else {
                continue;
            };

            let px = (center.x * 0.5 + 0.5) * w;
            let py = (0.5 - center.y * 0.5) * h;
            let rx = (edge_x.x - center.x).abs() * 0.5 * w;
            let ry = (edge_y.y - center.y).abs() * 0.5 * h;
            if rx <= 0.0 || ry <= 0.0 {
                continue;
            }

            let x0 = (px - rx).floor().max(0.0) as u32;
            let x1 = ((px + rx).ceil().max(0.0) as u32).min(target.width);
            let y0 = (py - ry).floor().max(0.0) as u32;
            let y1 = ((py + ry).ceil().max(0.0) as u32).min(target.height);
            let color = id.to_be_bytes();

            for y in y0..y1 {
                for x in x0..x1 {
                    let dx = (x as f32 + 0.5 - px) / rx;
                    let dy = (y as f32 + 0.5 - py) / ry;
                    if dx * dx + dy * dy > 1.0 {
                        continue;
                    }
                    let pixel = (y * target.width + x) as usize;
                    if center.z >= target.depth[pixel] {
                        continue;
                    }
                    target.depth[pixel] = center.z;
                    target.pixels[pixel * 4..pixel * 4 + 4]
                        .copy_from_slice(&[color[1], color[2], color[3], 255]);
                }
            }
        }
        Ok(())
    }
}

fn to_ndc(clip: Vec4) -> Option<Vec3> {
    (clip.w > 0.0).then(|| clip.truncate() / clip.w)
}

fn clear_bytes(clear: [f32; 4]) -> [u8; 4] {
    clear.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

impl RenderBackend for HeadlessBackend {
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferId, BackendError> {
        let size = usize::try_from(desc.size).map_err(|_| BackendError::Allocation {
            label: desc.label,
            reason: format!("{} bytes does not fit in memory", desc.size),
        })?;
        self.buffers.push(HeadlessBuffer {
            label: desc.label,
            usage: desc.usage,
            data: vec![0; size],
            writes: 0,
        });
        Ok(BufferId(self.buffers.len() - 1))
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let target = self
            .buffers
            .get_mut(buffer.0)
            .ok_or(BackendError::UnknownBuffer(buffer))?;
        let start = offset as usize;
        let Some(dest) = target.data.get_mut(start..start + data.len()) else {
            return Err(BackendError::WriteOutOfRange {
                label: target.label,
                offset,
                len: data.len(),
                size: target.data.len() as u64,
            });
        };
        dest.copy_from_slice(data);
        target.writes += 1;
        Ok(())
    }

    fn create_target(
        &mut self,
        width: u32,
        height: u32,
        kind: TargetKind,
    ) -> Result<TargetId, BackendError> {
        let pixels = (width as usize) * (height as usize);
        self.targets.push(Some(HeadlessTarget {
            width,
            height,
            kind,
            pixels: vec![0; pixels * 4],
            depth: vec![1.0; pixels],
        }));
        Ok(TargetId(self.targets.len() - 1))
    }

    fn destroy_target(&mut self, target: TargetId) -> Result<(), BackendError> {
        let slot = self
            .targets
            .get_mut(target.0)
            .filter(|slot| slot.is_some())
            .ok_or(BackendError::UnknownTarget(target))?;
        *slot = None;
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
            self.check_pass(pass)?;
        }

        // Detach the target so passes can borrow buffers while drawing into it
        let mut surface = self
            .targets
            .get_mut(target.0)
            .and_then(Option::take)
            .ok_or(BackendError::UnknownTarget(target))?;

        let fill = clear_bytes(clear);
        for pixel in surface.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&fill);
        }
        surface.depth.fill(1.0);

        let mut result = Ok(());
        for pass in passes {
            if let DrawPass::Picking {
                transforms,
                pick_ids,
                instances,
            } = pass
            {
                if surface.kind == TargetKind::Picking {
                    result = self.rasterize_picking(
                        &mut surface,
                        camera,
                        *transforms,
                        *pick_ids,
                        *instances,
                    );
                    if result.is_err() {
                        break;
                    }
                }
            }
        }

        self.targets[target.0] = Some(surface);
        tracing::trace!(target = target.0, passes = passes.len(), "headless frame");
        if self.frames.len() == FRAME_HISTORY {
            self.frames.remove(0);
        }
        self.frames.push(RecordedFrame {
            target,
            passes: passes.to_vec(),
        });
        result
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

        let mut out = Vec::with_capacity((width * height * 4) as usize);
        for row in y..y + height {
            let start = ((row * surface.width + x) * 4) as usize;
            out.extend_from_slice(&surface.pixels[start..start + (width * 4) as usize]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::write_rows;
    use crate::render::camera::Camera3D;

    fn pick_buffers(
        backend: &mut HeadlessBackend,
        rows: &[InstanceTransform],
    ) -> (BufferId, BufferId) {
        let transforms = backend
            .create_buffer(&BufferDesc::rows::<InstanceTransform>(
                "t",
                BufferUsage::Instance,
                rows.len(),
            ))
            .unwrap();
        let ids = backend
            .create_buffer(&BufferDesc::rows::<u32>("ids", BufferUsage::Instance, rows.len()))
            .unwrap();
        write_rows(backend, transforms, 0, rows).unwrap();
        let pick_ids: Vec<u32> = (1..=rows.len() as u32).collect();
        write_rows(backend, ids, 0, &pick_ids).unwrap();
        (transforms, ids)
    }

    #[test]
    fn test_write_counts_and_bytes() {
        let mut backend = HeadlessBackend::new();
        let id = backend
            .create_buffer(&BufferDesc::rows::<u32>("ids", BufferUsage::Instance, 4))
            .unwrap();
        write_rows(&mut backend, id, 2, &[7u32, 9]).unwrap();
        assert_eq!(backend.write_count(id), 1);
        assert_eq!(backend.buffer_rows::<u32>(id).unwrap(), vec![0, 0, 7, 9]);
    }

    #[test]
    fn test_write_out_of_range() {
        let mut backend = HeadlessBackend::new();
        let id = backend
            .create_buffer(&BufferDesc::rows::<u32>("ids", BufferUsage::Instance, 2))
            .unwrap();
        let err = write_rows(&mut backend, id, 1, &[1u32, 2]).unwrap_err();
        assert!(matches!(err, BackendError::WriteOutOfRange { size: 8, .. }));
        assert_eq!(backend.write_count(id), 0);
    }

    #[test]
    fn test_clear_fills_target() {
        let mut backend = HeadlessBackend::new();
        let target = backend.create_target(2, 2, TargetKind::Color).unwrap();
        backend
            .render_to_target(target, &CameraUniforms::default(), [1.0, 0.0, 0.0, 1.0], &[])
            .unwrap();
        let pixels = backend.read_pixels(target, 0, 0, 2, 2).unwrap();
        assert_eq!(pixels, [255, 0, 0, 255].repeat(4));
        assert!(backend.read_pixels(target, 1, 1, 2, 1).is_err());
    }

    #[test]
    fn test_picking_nearest_wins() {
        let mut backend = HeadlessBackend::new();
        let mut camera = Camera3D::new(1.0);
        camera.elevation = 0.0;
        // Camera on +Z looking at the origin: instance 2 is closer
        let (transforms, ids) = pick_buffers(
            &mut backend,
            &[
                InstanceTransform::new([0.0, 0.0, 0.0], 5.0),
                InstanceTransform::new([0.0, 0.0, 50.0], 5.0),
                InstanceTransform::new([200.0, 0.0, 0.0], 5.0),
            ],
        );
        let target = backend.create_target(1, 1, TargetKind::Picking).unwrap();
        let uniforms = camera.pick_uniforms(glam::Vec2::ZERO, (400, 400));
        backend
            .render_to_target(
                target,
                &uniforms,
                [0.0; 4],
                &[DrawPass::Picking {
                    transforms,
                    pick_ids: ids,
                    instances: 3,
                }],
            )
            .unwrap();
        let pixel = backend.read_pixels(target, 0, 0, 1, 1).unwrap();
        assert_eq!(&pixel[..3], &[0, 0, 2]);
    }

    #[test]
    fn test_picking_ignores_hidden_instances() {
        let mut backend = HeadlessBackend::new();
        let mut camera = Camera3D::new(1.0);
        camera.elevation = 0.0;
        let (transforms, ids) =
            pick_buffers(&mut backend, &[InstanceTransform::new([0.0, 0.0, 0.0], 0.0)]);
        let target = backend.create_target(1, 1, TargetKind::Picking).unwrap();
        backend
            .render_to_target(
                target,
                &camera.pick_uniforms(glam::Vec2::ZERO, (400, 400)),
                [0.0; 4],
                &[DrawPass::Picking {
                    transforms,
                    pick_ids: ids,
                    instances: 1,
                }],
            )
            .unwrap();
        assert_eq!(backend.read_pixels(target, 0, 0, 1, 1).unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_unknown_buffer_rejected() {
        let mut backend = HeadlessBackend::new();
        let target = backend.create_target(1, 1, TargetKind::Color).unwrap();
        let err = backend
            .render_to_target(
                target,
                &CameraUniforms::default(),
                [0.0; 4],
                &[DrawPass::Edges {
                    positions: BufferId(3),
                    colors: BufferId(4),
                    vertices: 2,
                }],
            )
            .unwrap_err();
        assert_eq!(err, BackendError::UnknownBuffer(BufferId(3)));
        assert!(backend.frames().is_empty());
    }

    #[test]
    fn test_frame_history_is_bounded() {
        let mut backend = HeadlessBackend::new();
        let target = backend.create_target(2, 2, TargetKind::Color).unwrap();
        for _ in 0..FRAME_HISTORY * 3 {
            backend
                .render_to_target(target, &CameraUniforms::default(), [0.0; 4], &[])
                .unwrap();
        }
        assert_eq!(backend.frames().len(), FRAME_HISTORY);

        assert_eq!(backend.take_frames().len(), FRAME_HISTORY);
        assert!(backend.frames().is_empty());
    }

    #[test]
    fn test_destroyed_target_is_unknown() {
        let mut backend = HeadlessBackend::new();
        let first = backend.create_target(2, 2, TargetKind::Color).unwrap();
        let second = backend.create_target(1, 1, TargetKind::Picking).unwrap();
        backend.destroy_target(first).unwrap();

        assert_eq!(backend.live_targets(), 1);
        assert_eq!(
            backend.read_pixels(first, 0, 0, 1, 1).unwrap_err(),
            BackendError::UnknownTarget(first)
        );
        assert_eq!(
            backend.destroy_target(first).unwrap_err(),
            BackendError::UnknownTarget(first)
        );
        assert_eq!(backend.read_pixels(second, 0, 0, 1, 1).unwrap(), [0, 0, 0, 0]);
    }
}
