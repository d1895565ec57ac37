// SPDX-License-Identifier: MIT OR Apache-2.0
//! Filled regions between pairs of curves.
//!
//! Two curves sharing a `region_id` bound a filled area (for example the
//! min/max curves of a randomized property). The area is split into strips
//! at every crossing so each strip can be tinted by which curve is on top.

use crate::curve::{Curve, CurveId, CurveSet};
use indexmap::IndexMap;

/// Bisection iterations when locating a crossing
const CROSSING_ITERATIONS: usize = 32;

/// Two curves bounding a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionPair {
    /// Shared region ID
    pub region_id: u32,
    /// First curve of the pair
    pub first: CurveId,
    /// Second curve of the pair
    pub second: CurveId,
}

/// A strip of the region where one curve stays above the other
#[derive(Debug, Clone, PartialEq)]
pub struct RegionStrip {
    /// Whether the first curve is above the second in this strip
    pub first_above: bool,
    /// Closed outline in (time, value): along the first curve, back along the second
    pub outline: Vec<(f32, f32)>,
}

/// Pair up visible curves by region ID.
///
/// A region must have exactly two curves; other groups are logged and skipped.
pub fn region_pairs(curves: &CurveSet) -> Vec<RegionPair> {
    let mut groups: IndexMap<u32, Vec<CurveId>> = IndexMap::new();
    for wrapper in curves.values().filter(|c| !c.hidden) {
        if let Some(region) = wrapper.region_id {
            groups.entry(region).or_default().push(wrapper.id);
        }
    }

    groups
        .into_iter()
        .filter_map(|(region_id, ids)| match ids.as_slice() {
            [first, second] => Some(RegionPair {
                region_id,
                first: *first,
                second: *second,
            }),
            _ => {
                tracing::error!(region_id, count = ids.len(), "Region must contain exactly two curves");
                None
            }
        })
        .collect()
}

fn difference(a: &Curve, b: &Curve, time: f32) -> Option<f32> {
    Some(a.evaluate_float(time)? - b.evaluate_float(time)?)
}

/// Time in `[t0, t1]` where `a` and `b` cross, found by bisection.
///
/// Returns `None` (and logs) when the curves do not change order in the interval.
pub fn crossing(a: &Curve, b: &Curve, t0: f32, t1: f32) -> Option<f32> {
    let (mut lo, mut hi) = (t0, t1);
    let mut d_lo = difference(a, b, lo)?;
    let d_hi = difference(a, b, hi)?;
    if d_lo == 0.0 {
        return Some(lo);
    }
    if d_hi == 0.0 {
        return Some(hi);
    }
    if d_lo.signum() == d_hi.signum() {
        tracing::error!(t0, t1, "No curve intersection in region segment");
        return None;
    }

    for _ in 0..CROSSING_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        let d_mid = difference(a, b, mid)?;
        if d_mid == 0.0 {
            return Some(mid);
        }
        if d_mid.signum() == d_lo.signum() {
            lo = mid;
            d_lo = d_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Closed outline between `a` and `b` over `[start, end]` using `samples` steps
pub fn region_polygon(a: &Curve, b: &Curve, start: f32, end: f32, samples: usize) -> Vec<(f32, f32)> {
    let times = sample_times(start, end, samples);
    let forward = times.iter().filter_map(|&t| Some((t, a.evaluate_float(t)?)));
    let backward = times.iter().rev().filter_map(|&t| Some((t, b.evaluate_float(t)?)));
    forward.chain(backward).collect()
}

/// Split the region between `a` and `b` into strips at every crossing
pub fn region_strips(a: &Curve, b: &Curve, start: f32, end: f32, samples: usize) -> Vec<RegionStrip> {
    let times = sample_times(start, end, samples);
    let mut strips = Vec::new();
    let mut strip_start = start;
    let mut previous: Option<(f32, f32)> = None;

    for &t in &times {
        let Some(d) = difference(a, b, t) else {
            return Vec::new();
        };
        // Touching samples do not decide which curve is on top
        if d == 0.0 {
            continue;
        }
        if let Some((pt, pd)) = previous {
            if pd.signum() != d.signum() {
                let split = crossing(a, b, pt, t).unwrap_or(0.5 * (pt + t));
                strips.push(strip(a, b, strip_start, split, samples, pd > 0.0));
                strip_start = split;
            }
        }
        previous = Some((t, d));
    }

    if let Some((_, d)) = previous {
        strips.push(strip(a, b, strip_start, end, samples, d >= 0.0));
    }
    strips
}

fn strip(a: &Curve, b: &Curve, start: f32, end: f32, samples: usize, first_above: bool) -> RegionStrip {
    RegionStrip {
        first_above,
        outline: region_polygon(a, b, start, end, samples),
    }
}

fn sample_times(start: f32, end: f32, samples: usize) -> Vec<f32> {
    let samples = samples.max(1);
    (0..=samples)
        .map(|i| start + (end - start) * i as f32 / samples as f32)
        .collect()
}
