//! Flow-field particle mode
//!
//! An alternate presentation that hides the node-link view and replaces it
//! with particles drifting along a divergence-free curl-noise field: one
//! particle per leaf (seeded at the leaf, in its hub colour) plus an ambient
//! cloud filling the graph's bounding box. Positions are never stored per
//! frame; the particle program displaces every particle from its seed using
//! the per-frame [`FlowUniforms`].
//!
//! Activation builds and uploads the particle buffer before touching the
//! scene. If that fails the node-link view is left exactly as it was.

pub mod noise;
pub mod uniforms;

use std::f32::consts::TAU;

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;

use crate::animation::ease_out_cubic;
use crate::graph::{GraphModel, NEUTRAL_GRAY, Rgb};
use crate::render::{
    AttributeSnapshot, BackendError, BufferDesc, BufferId, BufferUsage, DrawPass, EdgeRenderer,
    HubMeshes, NodeRenderer, Particle, RenderBackend, write_rows,
};

pub use noise::{curl_noise, flow_displacement, gradient_noise, wave_color, wave_intensity};
pub use uniforms::{FlowUniforms, FlowUniformsRaw, WAVE_COUNT, Wave, default_waves};

/// Flow mode settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Particles added on top of the one-per-leaf set
    pub ambient_particles: usize,
    /// How far the ambient cloud extends past the graph bounds
    pub margin: f32,
    /// World → noise space
    pub noise_scale: f32,
    /// Noise-space drift per second
    pub speed: f32,
    /// World-space displacement at full strength
    pub amplitude: f32,
    /// Seconds for the displacement to ease in
    pub ramp: f32,
    /// Global particle size multiplier
    pub point_size: f32,
    pub waves_enabled: bool,
    /// Seed for particle placement
    pub seed: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            ambient_particles: 6000,
            margin: 40.0,
            noise_scale: 0.008,
            speed: 0.15,
            amplitude: 60.0,
            ramp: 2.0,
            point_size: 1.0,
            waves_enabled: true,
            seed: 0x5eed,
        }
    }
}

/// Base size of a leaf particle
const LEAF_PARTICLE_SIZE: f32 = 1.4;

/// Base size of an ambient particle
const AMBIENT_PARTICLE_SIZE: f32 = 0.7;

/// Errors raised while switching flow mode on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error("flow mode has no particles to draw")]
    NoParticles,

    #[error("flow mode backend failure: {0}")]
    Backend(#[from] BackendError),
}

/// Where a particle is and how it looks at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleState {
    pub position: Vec3,
    pub color: Rgb,
    pub size: f32,
}

/// Evaluate one particle exactly as the particle program does
pub fn evaluate_particle(particle: &Particle, uniforms: &FlowUniforms) -> ParticleState {
    let origin = Vec3::from(particle.origin);
    let drift = uniforms.time * uniforms.flow_speed * particle.speed;
    let displacement =
        flow_displacement(origin, drift, uniforms.noise_scale, uniforms.amplitude);
    let position = origin + displacement * uniforms.progress;

    let color = if uniforms.waves_enabled {
        wave_color(particle.color, position, &uniforms.waves, uniforms.time)
    } else {
        particle.color
    };
    let twinkle = 0.85 + 0.15 * (uniforms.time * 3.0 + particle.phase).sin();

    ParticleState {
        position,
        color,
        size: particle.size * uniforms.point_size * twinkle,
    }
}

#[derive(Debug)]
struct SavedScene {
    nodes: AttributeSnapshot,
    hub_visibility: Vec<bool>,
    edge_colors: Vec<[f32; 3]>,
}

#[derive(Debug)]
struct ActiveFlow {
    particles: Vec<Particle>,
    activated_at: f64,
    saved: SavedScene,
}

/// Flow-field particle mode state.
#[derive(Debug)]
pub struct FlowFieldMode {
    config: FlowConfig,
    uniforms: FlowUniforms,
    particle_buffer: Option<(BufferId, usize)>,
    uniform_buffer: Option<BufferId>,
    active: Option<ActiveFlow>,
}

impl FlowFieldMode {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            config: config.clone(),
            uniforms: FlowUniforms {
                time: 0.0,
                progress: 0.0,
                noise_scale: config.noise_scale,
                flow_speed: config.speed,
                amplitude: config.amplitude,
                point_size: config.point_size,
                waves_enabled: config.waves_enabled,
                waves: default_waves(),
            },
            particle_buffer: None,
            uniform_buffer: None,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn uniforms(&self) -> &FlowUniforms {
        &self.uniforms
    }

    pub fn particle_count(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.particles.len())
    }

    pub fn set_waves_enabled(&mut self, enabled: bool) {
        self.uniforms.waves_enabled = enabled;
    }

    /// Seed particles from the current scene: one per leaf, then the ambient
    /// cloud.
    pub fn seed_particles(
        &self,
        model: &GraphModel,
        nodes: &NodeRenderer,
        hubs: &HubMeshes,
    ) -> Vec<Particle> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut particles = Vec::with_capacity(nodes.leaf_count() + self.config.ambient_particles);

        let particle = |rng: &mut StdRng, origin: Vec3, color: Rgb, size: f32| Particle {
            origin: origin.to_array(),
            phase: rng.random_range(0.0..TAU),
            color,
            speed: rng.random_range(0.6..1.4),
            size,
            _padding: [0.0; 3],
        };

        let mut lo = Vec3::splat(f32::INFINITY);
        let mut hi = Vec3::splat(f32::NEG_INFINITY);
        for leaf in 0..nodes.leaf_count() as u32 {
            let origin = nodes.position(leaf);
            lo = lo.min(origin);
            hi = hi.max(origin);
            particles.push(particle(&mut rng, origin, model.color_of(leaf), LEAF_PARTICLE_SIZE));
        }
        for position in hubs.positions() {
            lo = lo.min(position);
            hi = hi.max(position);
        }
        if lo.x > hi.x {
            lo = Vec3::ZERO;
            hi = Vec3::ZERO;
        }
        lo -= Vec3::splat(self.config.margin);
        hi += Vec3::splat(self.config.margin);

        for _ in 0..self.config.ambient_particles {
            let t = Vec3::new(rng.random(), rng.random(), rng.random());
            let origin = lo + (hi - lo) * t;
            let color = if model.hub_count() == 0 {
                NEUTRAL_GRAY
            } else {
                model.hub_color(rng.random_range(0..model.hub_count() as u32))
            };
            particles.push(particle(&mut rng, origin, color, AMBIENT_PARTICLE_SIZE));
        }
        particles
    }

    /// Hide the node-link view and start drawing particles.
    ///
    /// Does nothing if already active. On error the scene is unchanged.
    pub fn activate(
        &mut self,
        now: f64,
        model: &GraphModel,
        nodes: &mut NodeRenderer,
        hubs: &mut HubMeshes,
        edges: &mut EdgeRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), FlowError> {
        if self.active.is_some() {
            return Ok(());
        }
        let result = self.try_activate(now, model, nodes, hubs, edges, backend);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "flow mode unavailable, keeping node-link view");
        }
        result
    }

    fn try_activate(
        &mut self,
        now: f64,
        model: &GraphModel,
        nodes: &mut NodeRenderer,
        hubs: &mut HubMeshes,
        edges: &mut EdgeRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), FlowError> {
        let particles = self.seed_particles(model, nodes, hubs);
        if particles.is_empty() {
            return Err(FlowError::NoParticles);
        }

        let particle_buffer = match self.particle_buffer {
            Some((buffer, capacity)) if capacity >= particles.len() => buffer,
            _ => {
                let buffer = backend.create_buffer(&BufferDesc::rows::<Particle>(
                    "flow-particles",
                    BufferUsage::Instance,
                    particles.len(),
                ))?;
                self.particle_buffer = Some((buffer, particles.len()));
                buffer
            }
        };
        let uniform_buffer = match self.uniform_buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = backend.create_buffer(&BufferDesc::rows::<FlowUniformsRaw>(
                    "flow-uniforms",
                    BufferUsage::Uniform,
                    1,
                ))?;
                self.uniform_buffer = Some(buffer);
                buffer
            }
        };
        write_rows(backend, particle_buffer, 0, &particles)?;
        self.uniforms.time = 0.0;
        self.uniforms.progress = 0.0;
        self.uniforms.sync_to_program(backend, uniform_buffer)?;

        // Particles are ready: only now touch the node-link view
        let saved = SavedScene {
            nodes: nodes.snapshot_attributes(),
            hub_visibility: hubs.visibility(),
            edge_colors: edges.snapshot_colors(),
        };
        if let Err(err) = hide_scene(nodes, hubs, edges, backend) {
            restore_scene(&saved, nodes, hubs, edges, backend)?;
            return Err(err.into());
        }

        tracing::info!(particles = particles.len(), "flow mode on");
        self.active = Some(ActiveFlow {
            particles,
            activated_at: now,
            saved,
        });
        Ok(())
    }

    /// Advance the uniforms to `now` and upload them
    pub fn update(&mut self, now: f64, backend: &mut dyn RenderBackend) -> Result<(), FlowError> {
        let (Some(active), Some(buffer)) = (&self.active, self.uniform_buffer) else {
            return Ok(());
        };
        let elapsed = (now - active.activated_at).max(0.0) as f32;
        let t = if self.config.ramp > 0.0 {
            (elapsed / self.config.ramp).min(1.0)
        } else {
            1.0
        };
        self.uniforms.time = elapsed;
        self.uniforms.progress = ease_out_cubic(t);
        self.uniforms.sync_to_program(backend, buffer)?;
        Ok(())
    }

    /// Bring the node-link view back exactly as it was before activation.
    ///
    /// Returns whether the mode was active.
    pub fn deactivate(
        &mut self,
        nodes: &mut NodeRenderer,
        hubs: &mut HubMeshes,
        edges: &mut EdgeRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<bool, FlowError> {
        let Some(active) = self.active.take() else {
            return Ok(false);
        };
        restore_scene(&active.saved, nodes, hubs, edges, backend)?;
        tracing::info!("flow mode off");
        Ok(true)
    }

    /// CPU evaluation of particle `index` under the current uniforms
    pub fn particle_state(&self, index: usize) -> Option<ParticleState> {
        let active = self.active.as_ref()?;
        let particle = active.particles.get(index)?;
        Some(evaluate_particle(particle, &self.uniforms))
    }

    pub fn draw_pass(&self) -> Option<DrawPass> {
        let active = self.active.as_ref()?;
        let (particles, _) = self.particle_buffer?;
        Some(DrawPass::Particles {
            particles,
            uniforms: self.uniform_buffer?,
            count: active.particles.len() as u32,
        })
    }
}

fn hide_scene(
    nodes: &mut NodeRenderer,
    hubs: &mut HubMeshes,
    edges: &mut EdgeRenderer,
    backend: &mut dyn RenderBackend,
) -> Result<(), BackendError> {
    nodes.hide_all();
    nodes.commit(backend)?;
    hubs.set_visible(false);
    hubs.commit(backend)?;
    edges.hide_all(backend)
}

fn restore_scene(
    saved: &SavedScene,
    nodes: &mut NodeRenderer,
    hubs: &mut HubMeshes,
    edges: &mut EdgeRenderer,
    backend: &mut dyn RenderBackend,
) -> Result<(), BackendError> {
    nodes.restore_attributes(&saved.nodes);
    nodes.commit(backend)?;
    hubs.restore_visibility(&saved.hub_visibility);
    hubs.commit(backend)?;
    edges.restore_colors(&saved.edge_colors, backend)
}
