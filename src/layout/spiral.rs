//! Concentric hub rings with golden-angle leaf spirals

use std::f32::consts::TAU;

use glam::Vec3;

use super::{LayoutResult, fibonacci_ball, fibonacci_direction, fibonacci_shell};
use crate::graph::GraphModel;

/// Radius step between hub rings
const RING_SPACING: f32 = 160.0;

/// Hubs on ring `k` (0-based) is `RING_GROWTH * (k + 1)`
const RING_GROWTH: usize = 6;

/// Distance of a hub's first leaf from the hub
const LEAF_BASE: f32 = 12.0;

/// Outward growth per `sqrt(connection order)`
const LEAF_STEP: f32 = 6.0;

/// Spread of cross-linked leaves around their hubs' centroid
const CROSS_LINK_SPREAD: f32 = 4.0;

/// Outer radius of the core holding leaves without a hub. The core is hollow
/// inside `LEAF_BASE` so a hub sitting on the centroid stays clear.
const CORE_RADIUS: f32 = 45.0;

pub(super) fn compute(model: &GraphModel) -> LayoutResult {
    let order = model.hubs_by_popularity();
    let mut hub_positions = vec![Vec3::ZERO; model.hub_count()];

    // Innermost ring starts with the most connected hub
    let mut rank = 0;
    let mut ring = 0;
    while rank < order.len() {
        let on_ring = (RING_GROWTH * (ring + 1)).min(order.len() - rank);
        let radius = RING_SPACING * (ring + 1) as f32;
        let step = TAU / on_ring as f32;
        // Stagger rings so spokes do not line up
        let stagger = ring as f32 * 0.5;
        for slot in 0..on_ring {
            let angle = slot as f32 * step + stagger;
            hub_positions[order[rank + slot] as usize] =
                Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin());
        }
        rank += on_ring;
        ring += 1;
    }

    let centroid = if hub_positions.is_empty() {
        Vec3::ZERO
    } else {
        hub_positions.iter().sum::<Vec3>() / hub_positions.len() as f32
    };

    let mut leaf_positions = vec![Vec3::ZERO; model.leaf_count()];

    for hub in 0..model.hub_count() as u32 {
        let own: Vec<u32> = model
            .leaves_of_hub(hub)
            .iter()
            .copied()
            .filter(|&leaf| model.hubs_of_leaf(leaf).len() == 1)
            .collect();
        let origin = hub_positions[hub as usize];
        for (k, &leaf) in own.iter().enumerate() {
            let distance = LEAF_BASE + LEAF_STEP * (k as f32).sqrt();
            leaf_positions[leaf as usize] = origin + fibonacci_direction(k, own.len()) * distance;
        }
    }

    let (cross_linked, orphans): (Vec<u32>, Vec<u32>) = (0..model.leaf_count() as u32)
        .filter(|&leaf| model.hubs_of_leaf(leaf).len() != 1)
        .partition(|&leaf| model.hubs_of_leaf(leaf).len() > 1);

    let spread = CROSS_LINK_SPREAD * (cross_linked.len() as f32).cbrt();
    for (j, &leaf) in cross_linked.iter().enumerate() {
        let hubs = model.hubs_of_leaf(leaf);
        let hub_centroid = hubs
            .iter()
            .map(|&h| hub_positions[h as usize])
            .sum::<Vec3>()
            / hubs.len() as f32;
        leaf_positions[leaf as usize] =
            hub_centroid + fibonacci_ball(j, cross_linked.len(), spread);
    }

    for (j, &leaf) in orphans.iter().enumerate() {
        leaf_positions[leaf as usize] =
            centroid + fibonacci_shell(j, orphans.len(), LEAF_BASE, CORE_RADIUS);
    }

    LayoutResult {
        hub_positions,
        leaf_positions,
    }
}
