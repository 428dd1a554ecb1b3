//! Deterministic 3D layouts derived from graph topology
//!
//! Every layout is a pure function of the [`GraphModel`]: no randomness, no
//! state carried between calls, and every leaf (including leaves with no hub)
//! receives a finite position. Results are plain snapshots that are never
//! mutated after creation.
//!
//! # Example
//!
//! ```
//! use graphscape::graph::{GraphModel, RawEdge, RawNode};
//! use graphscape::layout::LayoutShape;
//!
//! let model = GraphModel::build(
//!     &[RawNode::hub("h", "Hub"), RawNode::leaf("a", "video")],
//!     &[RawEdge::new("h", "a")],
//! )
//! .unwrap();
//!
//! let layout = LayoutShape::Galaxy.compute(&model);
//! assert_eq!(layout.leaf_positions.len(), 1);
//! ```

mod anatomical;
mod galaxy;
mod sphere;
mod spiral;

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::graph::GraphModel;

pub use anatomical::{LANDMARKS, surface_radius};

/// `π(3 − √5)`, the angle between successive points of a sunflower spiral
pub const GOLDEN_ANGLE: f32 = std::f32::consts::PI * (3.0 - 2.236_068);

/// Immutable per-node positions produced by one layout run.
///
/// Index `i` of `hub_positions` / `leaf_positions` is hub / leaf index `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub hub_positions: Vec<Vec3>,
    pub leaf_positions: Vec<Vec3>,
}

impl LayoutResult {
    /// Axis-aligned bounds over every hub and leaf position
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut points = self.hub_positions.iter().chain(&self.leaf_positions);
        let first = *points.next()?;
        Some(points.fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))))
    }
}

/// The available layout strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutShape {
    /// Concentric hub rings with golden-angle leaf spirals
    #[default]
    Spiral,
    /// Logarithmic spiral arms around a Fibonacci core
    Galaxy,
    /// Lat/long shell with a split Fibonacci core
    Sphere,
    /// Lobed analytic surface with hubs on anatomical landmarks
    Anatomical,
}

impl LayoutShape {
    pub const ALL: [LayoutShape; 4] = [
        LayoutShape::Spiral,
        LayoutShape::Galaxy,
        LayoutShape::Sphere,
        LayoutShape::Anatomical,
    ];

    /// Compute positions for every hub and leaf of `model`
    pub fn compute(self, model: &GraphModel) -> LayoutResult {
        let started = Instant::now();
        let result = match self {
            LayoutShape::Spiral => spiral::compute(model),
            LayoutShape::Galaxy => galaxy::compute(model),
            LayoutShape::Sphere => sphere::compute(model),
            LayoutShape::Anatomical => anatomical::compute(model),
        };
        debug_assert_eq!(result.hub_positions.len(), model.hub_count());
        debug_assert_eq!(result.leaf_positions.len(), model.leaf_count());
        tracing::debug!(
            shape = %self,
            leaves = model.leaf_count(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "layout computed"
        );
        result
    }

    pub fn name(self) -> &'static str {
        match self {
            LayoutShape::Spiral => "spiral",
            LayoutShape::Galaxy => "galaxy",
            LayoutShape::Sphere => "sphere",
            LayoutShape::Anatomical => "anatomical",
        }
    }
}

impl fmt::Display for LayoutShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised layout name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown layout shape `{0}` (expected spiral, galaxy, sphere or anatomical)")]
pub struct UnknownShape(pub String);

impl FromStr for LayoutShape {
    type Err = UnknownShape;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayoutShape::ALL
            .into_iter()
            .find(|shape| shape.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownShape(s.to_string()))
    }
}

/// Unit direction of point `i` out of `n` on a Fibonacci sphere.
pub(crate) fn fibonacci_direction(i: usize, n: usize) -> Vec3 {
    let n = n.max(1) as f32;
    let y = 1.0 - 2.0 * (i as f32 + 0.5) / n;
    let ring = (1.0 - y * y).max(0.0).sqrt();
    let theta = i as f32 * GOLDEN_ANGLE;
    Vec3::new(ring * theta.cos(), y, ring * theta.sin())
}

/// Point `i` of `n` filling a ball of `radius`, never exactly at the centre.
pub(crate) fn fibonacci_ball(i: usize, n: usize, radius: f32) -> Vec3 {
    fibonacci_shell(i, n, 0.0, radius)
}

/// Point `i` of `n` filling the shell between `inner` and `outer` at uniform density.
pub(crate) fn fibonacci_shell(i: usize, n: usize, inner: f32, outer: f32) -> Vec3 {
    let fill = (i + 1) as f32 / n.max(1) as f32;
    let inner3 = inner.powi(3);
    let radius = (inner3 + (outer.powi(3) - inner3) * fill).cbrt();
    fibonacci_direction(i, n) * radius
}

/// Leaves split into the single-hub groups and the core (zero or many hubs).
pub(crate) struct LeafPartition {
    /// Per hub, in popularity order: (hub, leaves whose only hub it is)
    pub arms: Vec<(u32, Vec<u32>)>,
    /// Leaves with zero or several hubs, in insertion order
    pub core: Vec<u32>,
}

pub(crate) fn partition_leaves(model: &GraphModel) -> LeafPartition {
    let arms = model
        .hubs_by_popularity()
        .into_iter()
        .map(|hub| {
            let own = model
                .leaves_of_hub(hub)
                .iter()
                .copied()
                .filter(|&leaf| model.hubs_of_leaf(leaf).len() == 1)
                .collect();
            (hub, own)
        })
        .collect();
    let core = (0..model.leaf_count() as u32)
        .filter(|&leaf| model.hubs_of_leaf(leaf).len() != 1)
        .collect();
    LeafPartition { arms, core }
}


#[cfg(test)]
mod tests {
    use super::test_graphs::{synthetic, tiny};
    use super::*;

    #[test]
    fn test_every_leaf_finite_for_every_shape() {
        for model in [synthetic(9, 1500), synthetic(1, 40), synthetic(0, 25), tiny()] {
            for shape in LayoutShape::ALL {
                let layout = shape.compute(&model);
                assert_eq!(layout.leaf_positions.len(), model.leaf_count());
                assert_eq!(layout.hub_positions.len(), model.hub_count());
                for (i, p) in layout.leaf_positions.iter().enumerate() {
                    assert!(p.is_finite(), "{shape}: leaf {i} at {p:?}");
                }
                for (i, p) in layout.hub_positions.iter().enumerate() {
                    assert!(p.is_finite(), "{shape}: hub {i} at {p:?}");
                }
            }
        }
    }

    #[test]
    fn test_layouts_are_deterministic() {
        let model = synthetic(6, 800);
        for shape in LayoutShape::ALL {
            let a = shape.compute(&model);
            let b = shape.compute(&model);
            let bits = |r: &LayoutResult| -> Vec<u32> {
                r.hub_positions
                    .iter()
                    .chain(&r.leaf_positions)
                    .flat_map(|p| p.to_array().map(f32::to_bits))
                    .collect()
            };
            assert_eq!(bits(&a), bits(&b), "{shape} is not deterministic");
        }
    }

    #[test]
    fn test_tiny_graph_leaves_distinct() {
        let model = tiny();
        for shape in LayoutShape::ALL {
            let layout = shape.compute(&model);
            let p = &layout.leaf_positions;
            assert!(p[0].distance(p[1]) > 1e-3, "{shape}");
            assert!(p[0].distance(p[2]) > 1e-3, "{shape}");
            assert!(p[1].distance(p[2]) > 1e-3, "{shape}");
            assert!(
                p[2].distance(layout.hub_positions[0]) > 1e-3,
                "{shape}: orphan collides with hub"
            );
        }
    }

    #[test]
    fn test_shape_names_round_trip() {
        for shape in LayoutShape::ALL {
            assert_eq!(shape.to_string().parse::<LayoutShape>(), Ok(shape));
        }
        assert_eq!("GALAXY".parse::<LayoutShape>(), Ok(LayoutShape::Galaxy));
        assert!("torus".parse::<LayoutShape>().is_err());
    }

    #[test]
    fn test_fibonacci_ball_avoids_centre() {
        for i in 0..50 {
            let p = fibonacci_ball(i, 50, 10.0);
            assert!(p.length() > 0.0);
            assert!(p.length() <= 10.0 + 1e-4);
        }
    }

    #[test]
    fn test_bounds() {
        let layout = LayoutResult {
            hub_positions: vec![Vec3::new(-1.0, 2.0, 0.0)],
            leaf_positions: vec![Vec3::new(3.0, -4.0, 5.0)],
        };
        assert_eq!(
            layout.bounds(),
            Some((Vec3::new(-1.0, -4.0, 0.0), Vec3::new(3.0, 2.0, 5.0)))
        );
        let empty = LayoutResult {
            hub_positions: vec![],
            leaf_positions: vec![],
        };
        assert_eq!(empty.bounds(), None);
    }
}
