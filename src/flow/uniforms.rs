//! Typed flow-mode uniforms and their GPU packing
//!
//! Every value the particle program reads lives in [`FlowUniforms`]. Code
//! mutates the typed struct and calls [`FlowUniforms::sync_to_program`] once
//! per frame; the byte layout exists only in [`FlowUniformsRaw`].

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::render::{BackendError, BufferId, RenderBackend, write_rows};

/// Number of colour waves sweeping through the particles
pub const WAVE_COUNT: usize = 5;

/// A planar band of colour moving along `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wave {
    /// Unit travel direction
    pub direction: Vec3,
    /// World units per second
    pub speed: f32,
    /// Half-period of the band in world units
    pub width: f32,
    /// Hue in `[0, 1)`
    pub hue: f32,
    /// Front position at time zero
    pub offset: f32,
}

/// The built-in wave set
pub fn default_waves() -> [Wave; WAVE_COUNT] {
    let wave = |x: f32, y: f32, z: f32, speed, width, hue, offset| Wave {
        direction: Vec3::new(x, y, z).normalize(),
        speed,
        width,
        hue,
        offset,
    };
    [
        wave(1.0, 0.0, 0.0, 42.0, 90.0, 0.55, 0.0),
        wave(0.0, 0.0, 1.0, 31.0, 120.0, 0.08, -150.0),
        wave(0.6, 0.8, 0.0, 55.0, 70.0, 0.83, 80.0),
        wave(-0.5, 0.2, 0.8, 24.0, 150.0, 0.33, 300.0),
        wave(0.3, -0.9, -0.3, 37.0, 100.0, 0.68, -60.0),
    ]
}

/// Everything the particle program reads, as typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowUniforms {
    /// Seconds since activation
    pub time: f32,
    /// Eased ramp-in in `[0, 1]`
    pub progress: f32,
    pub noise_scale: f32,
    pub flow_speed: f32,
    pub amplitude: f32,
    pub point_size: f32,
    pub waves_enabled: bool,
    pub waves: [Wave; WAVE_COUNT],
}

/// GPU layout of [`FlowUniforms`].
///
/// Layout matches the WGSL `FlowUniforms` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FlowUniformsRaw {
    /// time, progress, noise_scale, flow_speed
    pub params: [f32; 4],
    /// amplitude, point_size, waves_enabled (0 or 1), wave count
    pub shape: [f32; 4],
    /// Per wave: direction xyz, speed
    pub wave_motion: [[f32; 4]; WAVE_COUNT],
    /// Per wave: width, hue, offset, unused
    pub wave_band: [[f32; 4]; WAVE_COUNT],
}

impl FlowUniforms {
    pub fn pack(&self) -> FlowUniformsRaw {
        let mut raw = FlowUniformsRaw {
            params: [self.time, self.progress, self.noise_scale, self.flow_speed],
            shape: [
                self.amplitude,
                self.point_size,
                if self.waves_enabled { 1.0 } else { 0.0 },
                WAVE_COUNT as f32,
            ],
            ..FlowUniformsRaw::zeroed()
        };
        for (i, wave) in self.waves.iter().enumerate() {
            raw.wave_motion[i] = wave.direction.extend(wave.speed).to_array();
            raw.wave_band[i] = [wave.width, wave.hue, wave.offset, 0.0];
        }
        raw
    }

    /// Write every field to the program's uniform buffer in one upload
    pub fn sync_to_program(
        &self,
        backend: &mut dyn RenderBackend,
        buffer: BufferId,
    ) -> Result<(), BackendError> {
        write_rows(backend, buffer, 0, &[self.pack()])
    }
}
