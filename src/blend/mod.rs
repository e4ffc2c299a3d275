//! Corner handling between consecutive segments.
//!
//! When a segment is queued behind one that ends in a parabolic blend, the
//! corner between them is examined here. Depending on the configured mode
//! the corner is crossed as a tangent kink, replaced by a circular arc or a
//! 9D Bezier curve, or left to the parabolic overlap at run time.

pub mod arc;
pub mod bezier;
pub mod geom3;
pub mod parabolic;
pub mod tangent;

pub use arc::{choose_best_blend, create_arc_blend, ArcBlendType, BlendProposal};
pub use bezier::{create_bezier_blend, size_blend9, trim_segment, Blend9Solution};
pub use parabolic::{compute_blend_velocity, estimate_parabolic_performance, BlendVelocity};
pub use tangent::{setup_tangent, TangentSetup};

use crate::config::{BlendMode, MachineBounds, PlannerConfig};
use crate::motion::FeedLimits;
use crate::segment::{ModalState, Segment};

use geom3::CartBounds;

/// Planner state the blend engine reads.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendContext {
    /// Servo period in seconds.
    pub cycle_time: f64,
    /// Feed override and velocity limit ceilings.
    pub limits: FeedLimits,
    /// Per-axis machine bounds.
    pub bounds: MachineBounds,
    /// Cycles below which a short previous line is consumed.
    pub gap_cycles: f64,
    /// Acceleration share a kink may use.
    pub tangent_kink_ratio: f64,
    /// Optimizer lookahead depth.
    pub optimization_depth: usize,
    /// Blend strategy.
    pub mode: BlendMode,
    /// Relative velocity shortfall accepted by Bezier sizing.
    pub vel_rel_tol: f64,
    /// Absolute velocity shortfall accepted by Bezier sizing.
    pub vel_abs_tol: f64,
    /// Modal state copied into new blend segments.
    pub modal: ModalState,
}

impl BlendContext {
    /// Context for a planner built from `config`.
    pub fn from_config(config: &PlannerConfig, modal: ModalState) -> Self {
        Self {
            cycle_time: config.planner.cycle_time.0,
            limits: FeedLimits {
                max_feed_scale: config.planner.max_feed_scale,
                vlimit: config.vlimit(),
            },
            bounds: config.bounds(),
            gap_cycles: config.blend.gap_cycles,
            tangent_kink_ratio: config.tangent_kink_ratio(),
            optimization_depth: config.blend.optimization_depth,
            mode: config.blend.mode,
            vel_rel_tol: config.blend.bezier_velocity_rel_tol,
            vel_abs_tol: config.blend.bezier_velocity_abs_tol,
            modal,
        }
    }

    /// XYZ bounds for the circular blend geometry.
    pub fn cart_bounds(&self) -> CartBounds {
        CartBounds {
            vel: self.bounds.xyz_vel(),
            acc: self.bounds.xyz_acc(),
        }
    }
}

/// How a corner is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlendKind {
    /// No blending; the previous segment stops or was left untouched.
    None,
    /// Parabolic overlap at run time.
    Parabolic,
    /// Tangent handoff at the kink velocity.
    Tangent,
    /// Circular blend arc inserted.
    Arc,
    /// 9D Bezier blend inserted.
    Bezier,
}

/// Result of [`handle_blend`].
#[derive(Debug, Clone, PartialEq)]
pub struct BlendOutcome {
    /// Chosen strategy.
    pub kind: BlendKind,
    /// Segment to queue between `prev` and `tc`.
    pub blend: Option<Segment>,
    /// `prev` was swallowed by the blend and must be dropped from the queue.
    pub consume_prev: bool,
}

impl BlendOutcome {
    fn kind(kind: BlendKind) -> Self {
        Self {
            kind,
            blend: None,
            consume_prev: false,
        }
    }
}

/// Examine the corner from `prev` into `tc` and set both up to cross it.
///
/// Both segments are modified only once a strategy is chosen; a failed
/// blend attempt leaves their geometry untouched.
pub fn handle_blend(prev: &mut Segment, tc: &mut Segment, ctx: &BlendContext) -> BlendOutcome {
    if ctx.mode == BlendMode::Parabolic {
        return BlendOutcome::kind(BlendKind::Parabolic);
    }
    // Too late to reshape a segment that is already mostly done
    if prev.progress > prev.target / 2.0 {
        tp_debug!("previous segment past halfway, no blend");
        return BlendOutcome::kind(BlendKind::None);
    }

    match (setup_tangent(prev, tc, ctx), ctx.mode) {
        (TangentSetup::Tangent, _) => BlendOutcome::kind(BlendKind::Tangent),
        (TangentSetup::Rejected, BlendMode::Arc) => BlendOutcome::kind(BlendKind::None),
        (_, BlendMode::Bezier) => handle_bezier(prev, tc, ctx),
        _ => handle_arc(prev, tc, ctx),
    }
}

fn handle_arc(prev: &mut Segment, tc: &mut Segment, ctx: &BlendContext) -> BlendOutcome {
    let proposal = match create_arc_blend(prev, tc, ctx) {
        Ok(p) => p,
        Err(e) => {
            tp_debug!("arc blend failed: {:?}", e);
            return BlendOutcome::kind(choose_best_blend(prev, tc, None, ctx));
        }
    };
    let kind = choose_best_blend(prev, tc, Some(&proposal.blend), ctx);
    if kind != BlendKind::Arc {
        return BlendOutcome::kind(kind);
    }
    let consume_prev = proposal.consume;
    let blend = proposal.commit(prev, tc);
    tp_debug!("arc blend inserted, max vel {}", blend.max_vel);
    BlendOutcome {
        kind,
        blend: Some(blend),
        consume_prev,
    }
}

fn handle_bezier(prev: &mut Segment, tc: &mut Segment, ctx: &BlendContext) -> BlendOutcome {
    match create_bezier_blend(prev, tc, ctx) {
        Ok(proposal) => {
            prev.remove_kink(tc);
            let blend = bezier::commit_bezier(proposal, prev, tc);
            tp_debug!("bezier blend inserted, max vel {}", blend.max_vel);
            BlendOutcome {
                kind: BlendKind::Bezier,
                blend: Some(blend),
                consume_prev: false,
            }
        }
        Err(e) => {
            tp_debug!("bezier blend failed: {:?}", e);
            BlendOutcome::kind(choose_best_blend(prev, tc, None, ctx))
        }
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> BlendContext {
    BlendContext {
        cycle_time: 0.001,
        limits: FeedLimits::default(),
        bounds: MachineBounds::uniform(100.0, 1000.0),
        gap_cycles: 4.0,
        tangent_kink_ratio: 0.1,
        optimization_depth: 50,
        mode: BlendMode::Arc,
        vel_rel_tol: 0.01,
        vel_abs_tol: 0.1,
        modal: ModalState::default(),
    }
}
