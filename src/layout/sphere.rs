//! Latitude/longitude shell with a two-hemisphere Fibonacci core

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use super::{GOLDEN_ANGLE, LayoutResult, fibonacci_direction, partition_leaves};
use crate::graph::GraphModel;

/// Radius of the shell holding single-hub leaves
const SHELL_RADIUS: f32 = 220.0;

/// Radius of the core holding cross-linked and hub-less leaves
const CORE_RADIUS: f32 = 70.0;

/// Hubs float just outside the shell
const HUB_LIFT: f32 = 1.18;

pub(super) fn compute(model: &GraphModel) -> LayoutResult {
    let partition = partition_leaves(model);
    let mut leaf_positions = vec![Vec3::ZERO; model.leaf_count()];
    let mut hub_positions = vec![Vec3::ZERO; model.hub_count()];

    let shell_count: usize = partition.arms.iter().map(|(_, l)| l.len()).sum();
    let rows = ((shell_count as f32 / 2.0).sqrt().ceil() as usize).max(1);
    let cols = shell_count.div_ceil(rows).max(1);

    let mut slot = 0;
    for (rank, (hub, leaves)) in partition.arms.iter().enumerate() {
        let mut direction_sum = Vec3::ZERO;
        for &leaf in leaves {
            let row = slot / cols;
            let col = slot % cols;
            let lat = PI * (row as f32 + 0.5) / rows as f32 - PI / 2.0;
            // Odd rows shifted half a cell
            let lon = TAU * (col as f32 + 0.5 * (row % 2) as f32) / cols as f32;
            let direction = Vec3::new(lat.cos() * lon.cos(), lat.sin(), lat.cos() * lon.sin());
            leaf_positions[leaf as usize] = direction * SHELL_RADIUS;
            direction_sum += direction;
            slot += 1;
        }

        let direction = direction_sum
            .try_normalize()
            .unwrap_or_else(|| fibonacci_direction(rank, partition.arms.len()));
        hub_positions[*hub as usize] = direction * SHELL_RADIUS * HUB_LIFT;
    }

    // Core split between hemispheres by insertion parity
    let upper = partition.core.len().div_ceil(2);
    let lower = partition.core.len() / 2;
    for (j, &leaf) in partition.core.iter().enumerate() {
        let (q, half, sign) = if j % 2 == 0 {
            (j / 2, upper, 1.0)
        } else {
            (j / 2, lower, -1.0)
        };
        let h = half as f32;
        let y = 1.0 - (q as f32 + 0.5) / h;
        let ring = (1.0 - y * y).max(0.0).sqrt();
        let theta = q as f32 * GOLDEN_ANGLE;
        let fill = ((q + 1) as f32 / h).cbrt();
        leaf_positions[leaf as usize] =
            Vec3::new(ring * theta.cos(), sign * y, ring * theta.sin()) * CORE_RADIUS * fill;
    }

    LayoutResult {
        hub_positions,
        leaf_positions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::test_graphs::synthetic;

    #[test]
    fn test_single_hub_leaves_on_shell() {
        let model = synthetic(7, 900);
        let layout = compute(&model);
        for leaf in 0..model.leaf_count() as u32 {
            let r = layout.leaf_positions[leaf as usize].length();
            if model.hubs_of_leaf(leaf).len() == 1 {
                assert!((r - SHELL_RADIUS).abs() < 1e-2, "leaf {leaf} radius {r}");
            } else {
                assert!(r <= CORE_RADIUS + 1e-3, "core leaf {leaf} radius {r}");
            }
        }
    }

    #[test]
    fn test_core_hemispheres_by_parity() {
        let model = synthetic(3, 330);
        let layout = compute(&model);
        let core = partition_leaves(&model).core;
        assert!(core.len() > 4);
        for (j, &leaf) in core.iter().enumerate() {
            let y = layout.leaf_positions[leaf as usize].y;
            if j % 2 == 0 {
                assert!(y > 0.0, "even core leaf {leaf} below equator");
            } else {
                assert!(y < 0.0, "odd core leaf {leaf} above equator");
            }
        }
    }

    #[test]
    fn test_hubs_outside_shell() {
        let model = synthetic(5, 300);
        let layout = compute(&model);
        for p in &layout.hub_positions {
            assert!((p.length() - SHELL_RADIUS * HUB_LIFT).abs() < 1e-2);
        }
    }
}
