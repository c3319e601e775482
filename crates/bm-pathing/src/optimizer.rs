//! Path post-processing.
//!
//! # Pipeline
//!
//! | Level        | Stages (in order)                                                    |
//! |--------------|----------------------------------------------------------------------|
//! | `None`       | n/a                                                                  |
//! | `Basic`      | redundant-point removal                                              |
//! | `Full`       | redundant-point removal, corner cutting, smoothing                   |
//! | `Aggressive` | Douglas–Peucker, then everything `Full` does                         |
//!
//! Every stage leaves the first and last node alone and re-checks each
//! segment it creates through a [`SegmentCheck`].  After the pipeline the
//! result is compared with the input: if it grew beyond
//! `max_length_ratio × original` or an endpoint moved, the original nodes are
//! restored and the run reports [`OptimizeOutcome::Reverted`].
//!
//! Behaviour-specific tuning lives in [`PathPreset`] parameter sets rather
//! than in separate algorithms.

use bm_core::{BmError, BmResult, Position, angle_difference, segment_distance};
use tracing::trace;

use crate::path::{MovementPath, PathNode, polyline_length};

/// Endpoints may drift by at most this much before a run is reverted.
const ENDPOINT_EPSILON: f32 = 0.01;

/// "May an agent walk straight from `a` to `b`?"
///
/// Implemented for any `Fn(Position, Position) -> bool`, so tests can pass a
/// closure and the adapter can wrap the validator.
pub trait SegmentCheck {
    fn is_clear(&self, a: Position, b: Position) -> bool;
}

impl<F> SegmentCheck for F
where
    F: Fn(Position, Position) -> bool,
{
    #[inline]
    fn is_clear(&self, a: Position, b: Position) -> bool {
        self(a, b)
    }
}

// ── Parameters ────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OptimizationLevel {
    None,
    Basic,
    #[default]
    Full,
    Aggressive,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SmoothingMode {
    /// Pull each interior point toward its neighbours' midpoint.
    #[default]
    Weighted,
    /// Insert points along a Catmull–Rom spline through the waypoints.
    CatmullRom,
}

/// Named parameter sets, one per movement flavour.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathPreset {
    #[default]
    Standard,
    /// Cuts corners harder; pursuit cares about time, not the exact line.
    Chase,
    /// Simplifies aggressively.
    Flee,
    /// Minimal deviation so slots stay aligned with the leader's path.
    Formation,
    /// Spline-smoothed routes for patrols and wandering.
    Patrol,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OptimizerParams {
    pub level:                 OptimizationLevel,
    /// Redundant-point removal never creates a segment longer than this.
    pub max_waypoint_distance: f32,
    /// Turns sharper than this (degrees) are never removed.
    pub sharp_turn_limit_deg:  f32,
    /// Largest change in the neighbouring turn angle a removal may cause.
    pub curvature_jump_deg:    f32,
    /// Corners turning more than this are candidates for cutting.
    pub corner_threshold_deg:  f32,
    /// How far toward the neighbours' midpoint a corner is pulled.
    pub corner_cut_fraction:   f32,
    pub max_cut_distance:      f32,
    pub smoothing:             SmoothingMode,
    pub smoothing_factor:      f32,
    pub smoothing_passes:      u32,
    /// Sub-segments per waypoint gap in Catmull–Rom mode.
    pub spline_segments:       u32,
    pub dp_tolerance:          f32,
    pub max_length_ratio:      f32,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            level:                 OptimizationLevel::Full,
            max_waypoint_distance: 40.0,
            sharp_turn_limit_deg:  100.0,
            curvature_jump_deg:    60.0,
            corner_threshold_deg:  30.0,
            corner_cut_fraction:   0.5,
            max_cut_distance:      3.0,
            smoothing:             SmoothingMode::Weighted,
            smoothing_factor:      0.5,
            smoothing_passes:      2,
            spline_segments:       4,
            dp_tolerance:          0.75,
            max_length_ratio:      1.1,
        }
    }
}

impl OptimizerParams {
    pub fn preset(preset: PathPreset) -> Self {
        let base = Self::default();
        match preset {
            PathPreset::Standard => base,
            PathPreset::Chase => Self {
                corner_threshold_deg: 20.0,
                corner_cut_fraction: 0.7,
                max_cut_distance: 5.0,
                smoothing_passes: 1,
                ..base
            },
            PathPreset::Flee => Self {
                level: OptimizationLevel::Aggressive,
                dp_tolerance: 1.5,
                ..base
            },
            PathPreset::Formation => Self {
                level: OptimizationLevel::Basic,
                max_waypoint_distance: 20.0,
                max_cut_distance: 1.0,
                smoothing_factor: 0.25,
                smoothing_passes: 1,
                ..base
            },
            PathPreset::Patrol => Self { smoothing: SmoothingMode::CatmullRom, ..base },
        }
    }

    pub fn with_level(self, level: OptimizationLevel) -> Self {
        Self { level, ..self }
    }

    pub fn validate(&self) -> BmResult<()> {
        if !(self.max_waypoint_distance > 0.0) {
            return Err(BmError::config("max_waypoint_distance must be positive"));
        }
        if !(0.0..=1.0).contains(&self.corner_cut_fraction) || !(0.0..=1.0).contains(&self.smoothing_factor) {
            return Err(BmError::config("corner_cut_fraction and smoothing_factor must lie in [0, 1]"));
        }
        if self.max_cut_distance < 0.0 || self.dp_tolerance < 0.0 {
            return Err(BmError::config("cut distance and simplification tolerance must be non-negative"));
        }
        if self.spline_segments == 0 {
            return Err(BmError::config("spline_segments must be >= 1"));
        }
        if !(self.max_length_ratio >= 1.0) {
            return Err(BmError::config("max_length_ratio must be >= 1"));
        }
        Ok(())
    }
}

// ── Optimizer ─────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OptimizeOutcome {
    /// Level `None`, fewer than three nodes, or an invalid path.
    Skipped,
    Applied,
    /// The result broke the length or endpoint guard; the input is untouched.
    Reverted,
}

#[derive(Clone, Debug, Default)]
pub struct PathOptimizer {
    params: OptimizerParams,
}

impl PathOptimizer {
    pub fn new(params: OptimizerParams) -> Self {
        Self { params }
    }

    pub fn preset(preset: PathPreset) -> Self {
        Self::new(OptimizerParams::preset(preset))
    }

    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    /// Run the pipeline for the configured level over `path`.
    pub fn optimize<C: SegmentCheck + ?Sized>(&self, path: &mut MovementPath, check: &C) -> OptimizeOutcome {
        let p = &self.params;
        if p.level == OptimizationLevel::None || path.nodes.len() < 3 || !path.is_valid() {
            return OptimizeOutcome::Skipped;
        }

        let original_len = polyline_length(path.nodes.iter().map(|n| n.position));
        let mut nodes = path.nodes.clone();

        let simplified = if p.level == OptimizationLevel::Aggressive {
            douglas_peucker(&mut nodes, p.dp_tolerance, check)
        } else {
            0
        };
        let removed = remove_redundant(&mut nodes, p, check);
        let (cut, smoothed) = if matches!(p.level, OptimizationLevel::Full | OptimizationLevel::Aggressive) {
            let cut = cut_corners(&mut nodes, p, check);
            let smoothed = match p.smoothing {
                SmoothingMode::Weighted => smooth_weighted(&mut nodes, p, check),
                SmoothingMode::CatmullRom => smooth_catmull_rom(&mut nodes, p.spline_segments, check),
            };
            (cut, smoothed)
        } else {
            (0, 0)
        };

        let new_len = polyline_length(nodes.iter().map(|n| n.position));
        let endpoints_kept = endpoints_match(&path.nodes, &nodes);
        if new_len > original_len * p.max_length_ratio + 1e-4 || !endpoints_kept {
            trace!(original_len, new_len, endpoints_kept, "optimization reverted");
            return OptimizeOutcome::Reverted;
        }

        trace!(simplified, removed, cut, smoothed, original_len, new_len, "path optimized");
        path.nodes = nodes;
        path.recompute_length();
        path.is_optimized = true;
        OptimizeOutcome::Applied
    }
}

fn endpoints_match(before: &[PathNode], after: &[PathNode]) -> bool {
    match (before.first(), before.last(), after.first(), after.last()) {
        (Some(a0), Some(a1), Some(b0), Some(b1)) => {
            a0.position.approx_eq(b0.position, ENDPOINT_EPSILON)
                && a1.position.approx_eq(b1.position, ENDPOINT_EPSILON)
        }
        _ => false,
    }
}

/// Absolute horizontal turn at `b` when travelling `a → b → c`, in `[0, π]`.
fn turn(a: Position, b: Position, c: Position) -> f32 {
    angle_difference(a.angle_to(b), b.angle_to(c)).abs()
}

// ── Stages ────────────────────────────────────────────────────────────────────

/// Drop interior nodes whose neighbours can be joined directly.
///
/// A node stays if the joined segment would be too long or blocked, if the
/// node itself is a sharp turn, or if removing it would change the turn at
/// the previous kept node by more than the curvature-jump limit.  Returns the
/// number of nodes removed.
pub fn remove_redundant<C: SegmentCheck + ?Sized>(
    nodes:  &mut Vec<PathNode>,
    params: &OptimizerParams,
    check:  &C,
) -> usize {
    let n = nodes.len();
    if n < 3 {
        return 0;
    }
    let sharp = params.sharp_turn_limit_deg.to_radians();
    let jump = params.curvature_jump_deg.to_radians();

    let mut out: Vec<PathNode> = Vec::with_capacity(n);
    out.push(nodes[0]);
    for i in 1..n - 1 {
        let prev = out[out.len() - 1].position;
        let cur = nodes[i].position;
        let next = nodes[i + 1].position;

        let curvature_ok = match out.len() {
            1 => true,
            len => {
                let pp = out[len - 2].position;
                (turn(pp, prev, next) - turn(pp, prev, cur)).abs() <= jump
            }
        };
        let removable = prev.distance(next) <= params.max_waypoint_distance
            && turn(prev, cur, next) <= sharp
            && curvature_ok
            && check.is_clear(prev, next);
        if !removable {
            out.push(nodes[i]);
        }
    }
    out.push(nodes[n - 1]);

    let removed = n - out.len();
    *nodes = out;
    removed
}

/// Pull sharp corners toward the midpoint of their neighbours.
pub fn cut_corners<C: SegmentCheck + ?Sized>(
    nodes:  &mut [PathNode],
    params: &OptimizerParams,
    check:  &C,
) -> usize {
    let threshold = params.corner_threshold_deg.to_radians();
    let mut cut = 0;
    for i in 1..nodes.len().saturating_sub(1) {
        let (a, b, c) = (nodes[i - 1].position, nodes[i].position, nodes[i + 1].position);
        if turn(a, b, c) < threshold {
            continue;
        }
        let target = a.midpoint(c);
        let span = b.distance(target);
        if span <= f32::EPSILON {
            continue;
        }
        let pull = (span * params.corner_cut_fraction).min(params.max_cut_distance);
        if pull <= f32::EPSILON {
            continue;
        }
        let q = b.lerp(target, pull / span);
        if check.is_clear(a, q) && check.is_clear(q, c) {
            nodes[i] = PathNode::smoothed(q, &nodes[i]);
            cut += 1;
        }
    }
    cut
}

/// Iterative weighted averaging of interior points; each move is re-checked
/// and rejected moves keep the old point.
pub fn smooth_weighted<C: SegmentCheck + ?Sized>(
    nodes:  &mut [PathNode],
    params: &OptimizerParams,
    check:  &C,
) -> usize {
    let mut moved = 0;
    for _ in 0..params.smoothing_passes {
        for i in 1..nodes.len().saturating_sub(1) {
            let (a, b, c) = (nodes[i - 1].position, nodes[i].position, nodes[i + 1].position);
            let candidate = b.lerp(a.midpoint(c), params.smoothing_factor);
            if candidate.approx_eq(b, 1e-4) {
                continue;
            }
            if check.is_clear(a, candidate) && check.is_clear(candidate, c) {
                nodes[i] = PathNode::smoothed(candidate, &nodes[i]);
                moved += 1;
            }
        }
    }
    moved
}

/// Insert `segments - 1` spline points into every waypoint gap whose whole
/// sub-chain checks clear.  Returns the number of inserted nodes.
pub fn smooth_catmull_rom<C: SegmentCheck + ?Sized>(
    nodes:    &mut Vec<PathNode>,
    segments: u32,
    check:    &C,
) -> usize {
    let n = nodes.len();
    if n < 3 || segments < 2 {
        return 0;
    }
    let pts: Vec<Position> = nodes.iter().map(|nd| nd.position).collect();
    let mut out = Vec::with_capacity(n * segments as usize);
    let mut inserted = 0;

    out.push(nodes[0]);
    for i in 0..n - 1 {
        let (p0, p1, p2, p3) = (pts[i.saturating_sub(1)], pts[i], pts[i + 1], pts[(i + 2).min(n - 1)]);
        let mut chain = Vec::with_capacity(segments as usize - 1);
        let mut prev = p1;
        let mut clear = true;
        for k in 1..segments {
            let q = catmull_rom(p0, p1, p2, p3, k as f32 / segments as f32);
            if !check.is_clear(prev, q) {
                clear = false;
                break;
            }
            chain.push(q);
            prev = q;
        }
        if clear && check.is_clear(prev, p2) {
            inserted += chain.len();
            out.extend(chain.into_iter().map(|q| PathNode::smoothed(q, &nodes[i + 1])));
        }
        out.push(nodes[i + 1]);
    }
    *nodes = out;
    inserted
}

/// Uniform Catmull–Rom interpolation between `p1` and `p2`.
pub fn catmull_rom(p0: Position, p1: Position, p2: Position, p3: Position, t: f32) -> Position {
    let (t2, t3) = (t * t, t * t * t);
    let axis = |a: f32, b: f32, c: f32, d: f32| {
        0.5 * (2.0 * b + (c - a) * t + (2.0 * a - 5.0 * b + 4.0 * c - d) * t2 + (3.0 * b - a - 3.0 * c + d) * t3)
    };
    Position {
        x: axis(p0.x, p1.x, p2.x, p3.x),
        y: axis(p0.y, p1.y, p2.y, p3.y),
        z: axis(p0.z, p1.z, p2.z, p3.z),
        o: p1.o,
    }
}

/// Douglas–Peucker simplification.  A span is only collapsed when its
/// interior lies within `tolerance` of the chord *and* the chord checks
/// clear.  Returns the number of nodes removed.
pub fn douglas_peucker<C: SegmentCheck + ?Sized>(
    nodes:     &mut Vec<PathNode>,
    tolerance: f32,
    check:     &C,
) -> usize {
    let n = nodes.len();
    if n < 3 {
        return 0;
    }
    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut spans = vec![(0usize, n - 1)];
    while let Some((lo, hi)) = spans.pop() {
        if hi <= lo + 1 {
            continue;
        }
        let (a, b) = (nodes[lo].position, nodes[hi].position);
        let Some((idx, dmax)) = (lo + 1..hi)
            .map(|i| (i, segment_distance(nodes[i].position, a, b)))
            .max_by(|x, y| x.1.total_cmp(&y.1))
        else {
            continue;
        };
        if dmax > tolerance || !check.is_clear(a, b) {
            keep[idx] = true;
            spans.push((lo, idx));
            spans.push((idx, hi));
        }
    }

    let before = nodes.len();
    let mut flags = keep.into_iter();
    nodes.retain(|_| flags.next().unwrap_or(true));
    before - nodes.len()
}
