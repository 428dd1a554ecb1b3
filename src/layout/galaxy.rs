//! Logarithmic spiral arms around a Fibonacci core

use std::f32::consts::TAU;

use glam::Vec3;

use super::{GOLDEN_ANGLE, LayoutResult, fibonacci_ball, partition_leaves};
use crate::graph::GraphModel;

/// Radius of the core holding cross-linked and hub-less leaves
const CORE_RADIUS: f32 = 60.0;

/// Radius where every arm begins (must stay outside the core)
const ARM_START: f32 = 90.0;

/// Radial length of the most popular hub's arm
const ARM_LENGTH: f32 = 420.0;

/// Angular growth per unit of `ln(radius / ARM_START)`
const ARM_TWIST: f32 = 2.2;

/// Maximum in-plane offset across an arm
const ARM_SCATTER: f32 = 7.0;

/// Maximum vertical offset at the start of an arm
const DISC_THICKNESS: f32 = 10.0;

/// Hubs sit between the core and the arm starts
const HUB_RADIUS: f32 = 78.0;

pub(super) fn compute(model: &GraphModel) -> LayoutResult {
    let partition = partition_leaves(model);
    let mut hub_positions = vec![Vec3::ZERO; model.hub_count()];
    let mut leaf_positions = vec![Vec3::ZERO; model.leaf_count()];

    // Core first so arm leaves never land on it
    for (j, &leaf) in partition.core.iter().enumerate() {
        leaf_positions[leaf as usize] = fibonacci_ball(j, partition.core.len(), CORE_RADIUS);
    }

    let arm_count = partition.arms.len().max(1) as f32;
    let longest = partition
        .arms
        .iter()
        .map(|(_, leaves)| leaves.len())
        .max()
        .unwrap_or(0)
        .max(1) as f32;

    for (rank, (hub, leaves)) in partition.arms.iter().enumerate() {
        let base = TAU * rank as f32 / arm_count;
        hub_positions[*hub as usize] =
            Vec3::new(HUB_RADIUS * base.cos(), 0.0, HUB_RADIUS * base.sin());

        for (k, &leaf) in leaves.iter().enumerate() {
            let along = (k + 1) as f32 / longest;
            let radius = ARM_START + ARM_LENGTH * along;
            let angle = base + ARM_TWIST * (radius / ARM_START).ln();

            let radial = Vec3::new(angle.cos(), 0.0, angle.sin());
            let across = Vec3::new(-angle.sin(), 0.0, angle.cos());
            let swirl = k as f32 * GOLDEN_ANGLE;
            let spread = ((k % 7) + 1) as f32 / 7.0;
            let lateral = swirl.cos() * ARM_SCATTER * spread;
            // Disc thins toward the rim
            let lift = swirl.sin() * DISC_THICKNESS * (1.0 - 0.5 * along.min(1.0));

            leaf_positions[leaf as usize] =
                radial * radius + across * lateral + Vec3::Y * lift;
        }
    }

    LayoutResult {
        hub_positions,
        leaf_positions,
    }
}
