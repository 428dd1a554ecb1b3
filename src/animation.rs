//! Eased transitions between layouts
//!
//! A transition snapshots the positions currently on screen, then every frame
//! interpolates hubs and leaves toward the target layout with a cubic
//! ease-out and writes the result through to the renderers. Starting a new
//! transition mid-flight snapshots from wherever things are at that moment,
//! so switching layouts rapidly never makes anything jump.

use glam::Vec3;
use serde::Deserialize;

use crate::layout::LayoutResult;
use crate::render::{BackendError, EdgeRenderer, HubMeshes, NodeRenderer, RenderBackend};

/// Default transition length in seconds
pub const DEFAULT_TRANSITION_SECONDS: f32 = 1.5;

/// Transition timing
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Seconds from start to target; zero or less snaps immediately
    pub duration: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_TRANSITION_SECONDS,
        }
    }
}

/// `1 − (1 − t)³`, fast start and gentle landing
pub fn ease_out_cubic(t: f32) -> f32 {
    let inv = 1.0 - t.clamp(0.0, 1.0);
    1.0 - inv * inv * inv
}

#[derive(Debug, Clone, PartialEq)]
enum TransitionState {
    Idle,
    Animating {
        started_at: f64,
        from: LayoutResult,
        to: LayoutResult,
    },
}

/// Drives hub and leaf positions from one layout to the next.
#[derive(Debug)]
pub struct LayoutTransitionAnimator {
    duration: f32,
    state: TransitionState,
}

impl LayoutTransitionAnimator {
    pub fn new(config: &TransitionConfig) -> Self {
        Self {
            duration: config.duration,
            state: TransitionState::Idle,
        }
    }

    pub fn is_animating(&self) -> bool {
        matches!(self.state, TransitionState::Animating { .. })
    }

    /// Eased-in fraction at `now`, `None` when idle
    pub fn progress(&self, now: f64) -> Option<f32> {
        match &self.state {
            TransitionState::Idle => None,
            TransitionState::Animating { started_at, .. } => {
                Some(self.raw_progress(*started_at, now))
            }
        }
    }

    fn raw_progress(&self, started_at: f64, now: f64) -> f32 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (((now - started_at) / f64::from(self.duration)) as f32).clamp(0.0, 1.0)
    }

    /// Begin moving toward `target` from the positions currently rendered.
    ///
    /// Supersedes a transition already in flight.
    pub fn start(&mut self, target: LayoutResult, now: f64, nodes: &NodeRenderer, hubs: &HubMeshes) {
        if let TransitionState::Animating { started_at, .. } = &self.state {
            tracing::debug!(
                progress = self.raw_progress(*started_at, now),
                "superseding layout transition in flight"
            );
        }
        let from = LayoutResult {
            hub_positions: hubs.positions(),
            leaf_positions: nodes.positions(),
        };
        assert_eq!(
            from.leaf_positions.len(),
            target.leaf_positions.len(),
            "target layout has {} leaf positions for {} leaves",
            target.leaf_positions.len(),
            from.leaf_positions.len()
        );
        self.state = TransitionState::Animating {
            started_at: now,
            from,
            to: target,
        };
    }

    /// Stop where things are, without snapping to the target
    pub fn cancel(&mut self) {
        self.state = TransitionState::Idle;
    }

    /// Advance to `now`, write positions through and commit once.
    ///
    /// Returns `true` when a frame was written. The frame that reaches the
    /// target places every node exactly on it and returns to idle.
    pub fn update(
        &mut self,
        now: f64,
        nodes: &mut NodeRenderer,
        hubs: &mut HubMeshes,
        edges: &mut EdgeRenderer,
        backend: &mut dyn RenderBackend,
    ) -> Result<bool, BackendError> {
        let TransitionState::Animating {
            started_at,
            from,
            to,
        } = &self.state
        else {
            return Ok(false);
        };

        let t = self.raw_progress(*started_at, now);
        let done = t >= 1.0;
        let eased = ease_out_cubic(t);
        let place = |a: Vec3, b: Vec3| if done { b } else { a.lerp(b, eased) };

        for (i, (&a, &b)) in from.leaf_positions.iter().zip(&to.leaf_positions).enumerate() {
            nodes.set_position(i as u32, place(a, b));
        }
        for (h, (&a, &b)) in from.hub_positions.iter().zip(&to.hub_positions).enumerate() {
            hubs.set_hub_position(h as u32, place(a, b));
        }

        nodes.commit_transforms(backend)?;
        hubs.commit(backend)?;
        edges.update_positions(nodes, hubs, backend)?;

        if done {
            tracing::debug!("layout transition finished");
            self.state = TransitionState::Idle;
        }
        Ok(true)
    }
}
