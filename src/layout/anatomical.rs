//! Leaves packed inside a lobed, brain-like analytic surface
//!
//! The surface is `r(θ, φ)` in spherical angles (θ polar from +Y, φ azimuth
//! in the XZ plane) with a few sine/cosine lobes and a longitudinal fissure
//! along the top midline, then stretched front to back. Leaves take Fibonacci
//! angles and a `cbrt(rank / n)` radial fill, so density rises toward the
//! surface. Hubs are pinned to named landmarks on the same surface.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec3;

use super::{GOLDEN_ANGLE, LayoutResult};
use crate::graph::GraphModel;

/// Mean radius of the surface
const BASE_RADIUS: f32 = 200.0;

/// Axis stretch: narrow left-right, flattened top-bottom, long front-back
const STRETCH: Vec3 = Vec3::new(0.85, 0.8, 1.15);

/// Hubs hover slightly above their landmark
const HUB_LIFT: f32 = 1.08;

/// Extra lift for every full cycle through the landmark list
const HUB_LIFT_STEP: f32 = 0.1;

/// Named landmarks as `(name, θ, φ)`; +Z is the front.
pub const LANDMARKS: [(&str, f32, f32); 8] = [
    ("frontal", 0.9, FRAC_PI_2),
    ("prefrontal", 1.35, FRAC_PI_2),
    ("parietal", 0.35, -FRAC_PI_2),
    ("occipital", 1.4, -FRAC_PI_2),
    ("temporal-left", 1.75, PI),
    ("temporal-right", 1.75, 0.0),
    ("cerebellum", 2.3, -FRAC_PI_2),
    ("brainstem", 2.85, 0.0),
];

/// Surface radius before stretching, for polar angle `theta` and azimuth `phi`.
pub fn surface_radius(theta: f32, phi: f32) -> f32 {
    let lobes = 1.0
        + 0.12 * (3.0 * theta).sin() * (2.0 * phi).cos()
        + 0.08 * (2.0 * theta).sin() * (5.0 * phi).cos()
        + 0.05 * (4.0 * theta).sin() * (3.0 * phi).sin();

    // Fissure between hemispheres: dip near x = 0 on the upper half
    let lateral = theta.sin() * phi.cos();
    let upper = theta.cos().max(0.0);
    let fissure = 1.0 - 0.15 * upper * (-(lateral / 0.15).powi(2)).exp();

    BASE_RADIUS * lobes * fissure
}

fn direction(theta: f32, phi: f32) -> Vec3 {
    Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin())
}

fn surface_point(theta: f32, phi: f32) -> Vec3 {
    direction(theta, phi) * surface_radius(theta, phi) * STRETCH
}

pub(super) fn compute(model: &GraphModel) -> LayoutResult {
    let n = model.leaf_count();
    let mut leaf_positions = vec![Vec3::ZERO; n];

    // Hub-less leaves take the innermost ranks, then each hub's leaves in
    // popularity order, grouped under their first hub
    let mut ranked: Vec<u32> = (0..n as u32)
        .filter(|&leaf| model.hubs_of_leaf(leaf).is_empty())
        .collect();
    let popularity = model.hubs_by_popularity();
    for &hub in &popularity {
        ranked.extend(
            model
                .leaves_of_hub(hub)
                .iter()
                .copied()
                .filter(|&leaf| model.hubs_of_leaf(leaf)[0] == hub),
        );
    }
    debug_assert_eq!(ranked.len(), n);

    for (rank, &leaf) in ranked.iter().enumerate() {
        let y = 1.0 - 2.0 * (rank as f32 + 0.5) / n as f32;
        let theta = y.clamp(-1.0, 1.0).acos();
        let phi = rank as f32 * GOLDEN_ANGLE;
        let fill = ((rank + 1) as f32 / n as f32).cbrt();
        leaf_positions[leaf as usize] = surface_point(theta, phi) * fill;
    }

    let mut hub_positions = vec![Vec3::ZERO; model.hub_count()];
    for (rank, &hub) in popularity.iter().enumerate() {
        let (_, theta, phi) = LANDMARKS[rank % LANDMARKS.len()];
        let lift = HUB_LIFT + HUB_LIFT_STEP * (rank / LANDMARKS.len()) as f32;
        hub_positions[hub as usize] = surface_point(theta, phi) * lift;
    }

    LayoutResult {
        hub_positions,
        leaf_positions,
    }
}
