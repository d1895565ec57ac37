// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tangent resolution.
//!
//! Tangents are stored on the keyframes. Every mode except `Free` derives
//! its slope from the neighbouring keys, so any insert, removal or move must
//! be followed by [`TangentResolver::update_surrounding`]. Nothing is
//! recomputed lazily during evaluation.

use crate::keyframe::{Keyframe, TangentMode, TangentSide};

/// Segments shorter than this are treated as zero length
const MIN_SEGMENT: f32 = 1e-6;

/// Derives numeric slopes from symbolic tangent modes
pub struct TangentResolver;

impl TangentResolver {
    /// Chord slope between two keys, zero for degenerate or non-scalar segments
    pub fn slope(a: &Keyframe, b: &Keyframe) -> f32 {
        let dt = b.time - a.time;
        match (a.as_float(), b.as_float()) {
            (Some(va), Some(vb)) if dt.abs() > MIN_SEGMENT => (vb - va) / dt,
            _ => 0.0,
        }
    }

    /// Smooth slope: the mean of the slopes to both neighbours, or the
    /// one-sided slope at either end of the curve
    pub fn smooth_tangent(keys: &[Keyframe], index: usize) -> f32 {
        let Some(key) = keys.get(index) else {
            return 0.0;
        };
        let prev = index.checked_sub(1).and_then(|i| keys.get(i));
        let next = keys.get(index + 1);

        match (prev, next) {
            (Some(p), Some(n)) => 0.5 * (Self::slope(p, key) + Self::slope(key, n)),
            (Some(p), None) => Self::slope(p, key),
            (None, Some(n)) => Self::slope(key, n),
            (None, None) => 0.0,
        }
    }

    /// Linear incoming slope, zero for the first key
    pub fn linear_in(keys: &[Keyframe], index: usize) -> f32 {
        match index.checked_sub(1).and_then(|i| keys.get(i)) {
            Some(prev) => Self::slope(prev, &keys[index]),
            None => 0.0,
        }
    }

    /// Linear outgoing slope, zero for the last key
    pub fn linear_out(keys: &[Keyframe], index: usize) -> f32 {
        match (keys.get(index), keys.get(index + 1)) {
            (Some(key), Some(next)) => Self::slope(key, next),
            _ => 0.0,
        }
    }

    fn resolve_side(keys: &[Keyframe], index: usize, side: TangentSide) -> Option<f32> {
        let key = &keys[index];
        if key.as_float().is_none() {
            return Some(f32::INFINITY);
        }
        match key.side_mode(side) {
            TangentMode::Free => None,
            TangentMode::Stepped => Some(f32::INFINITY),
            TangentMode::Smooth => Some(Self::smooth_tangent(keys, index)),
            TangentMode::Linear => Some(match side {
                TangentSide::In => Self::linear_in(keys, index),
                TangentSide::Out => Self::linear_out(keys, index),
            }),
        }
    }

    /// Recompute the tangents of one key from its side modes
    pub fn resolve_key(keys: &mut [Keyframe], index: usize) {
        if index >= keys.len() {
            return;
        }
        let in_slope = Self::resolve_side(keys, index, TangentSide::In);
        let out_slope = Self::resolve_side(keys, index, TangentSide::Out);

        let key = &mut keys[index];
        if let Some(slope) = in_slope {
            key.in_tangent = slope;
        }
        if let Some(slope) = out_slope {
            key.out_tangent = slope;
        }
    }

    /// Recompute a key and its immediate neighbours after a mutation at `index`
    pub fn update_surrounding(keys: &mut [Keyframe], index: usize) {
        let start = index.saturating_sub(1);
        let end = (index + 1).min(keys.len().saturating_sub(1));
        for i in start..=end {
            Self::resolve_key(keys, i);
        }
    }

    /// Recompute every key
    pub fn recalculate_all(keys: &mut [Keyframe]) {
        for i in 0..keys.len() {
            Self::resolve_key(keys, i);
        }
    }

    /// Store a user-edited slope on one side.
    ///
    /// The edited side becomes `Free`. An unbroken key mirrors the slope to
    /// the opposite side unless that side is stepped, in which case the key
    /// is broken so the step survives.
    pub fn set_tangent(key: &mut Keyframe, side: TangentSide, slope: f32) {
        let opposite = side.opposite();
        let opposite_mode = key.side_mode(opposite);

        if key.broken {
            match side {
                TangentSide::In => key.in_mode = TangentMode::Free,
                TangentSide::Out => key.out_mode = TangentMode::Free,
            }
            *key.tangent_mut(side) = slope;
            return;
        }

        if opposite_mode == TangentMode::Stepped {
            Self::set_side_mode(key, side, TangentMode::Free);
            *key.tangent_mut(side) = slope;
            return;
        }

        key.set_mode(TangentMode::Free);
        key.in_tangent = slope;
        key.out_tangent = slope;
    }

    /// Set the mode of both sides. `Smooth` joins a broken key.
    pub fn set_mode(key: &mut Keyframe, mode: TangentMode) {
        key.set_mode(mode);
        if mode == TangentMode::Smooth {
            key.broken = false;
        }
    }

    /// Set the mode of one side, breaking the key.
    ///
    /// A smooth slope cannot be split, so `Smooth` applies to the whole key.
    pub fn set_side_mode(key: &mut Keyframe, side: TangentSide, mode: TangentMode) {
        if mode == TangentMode::Smooth {
            Self::set_mode(key, mode);
            return;
        }
        if !key.broken {
            key.in_mode = key.tangent_mode;
            key.out_mode = key.tangent_mode;
            key.broken = true;
        }
        match side {
            TangentSide::In => key.in_mode = mode,
            TangentSide::Out => key.out_mode = mode,
        }
        if key.in_mode == key.out_mode {
            key.tangent_mode = mode;
        }
    }

    /// Break or join the tangents of a key
    pub fn set_broken(key: &mut Keyframe, broken: bool) {
        if key.broken == broken {
            return;
        }
        if broken {
            key.in_mode = key.tangent_mode;
            key.out_mode = key.tangent_mode;
            key.broken = true;
            return;
        }

        key.broken = false;
        if key.in_mode == key.out_mode {
            key.tangent_mode = key.in_mode;
            return;
        }
        // Joining sides with different modes keeps the incoming slope
        key.set_mode(TangentMode::Free);
        if key.in_tangent.is_finite() {
            key.out_tangent = key.in_tangent;
        } else {
            key.in_tangent = key.out_tangent;
        }
    }

    /// Flatten both tangents
    pub fn flatten(key: &mut Keyframe) {
        key.set_mode(TangentMode::Free);
        key.broken = false;
        key.in_tangent = 0.0;
        key.out_tangent = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Vec<Keyframe> {
        vec![
            Keyframe::float(0.0, 0.0),
            Keyframe::float(1.0, 2.0),
            Keyframe::float(3.0, 3.0),
        ]
    }

    #[test]
    fn test_smooth_is_neighbour_average() {
        let mut keys = keys();
        TangentResolver::recalculate_all(&mut keys);

        // Slopes 2.0 (left) and 0.5 (right)
        assert!((keys[1].in_tangent - 1.25).abs() < 1e-6);
        assert!((keys[1].out_tangent - 1.25).abs() < 1e-6);
    }

    #[test]
    fn test_smooth_boundary_is_one_sided() {
        let mut keys = keys();
        TangentResolver::recalculate_all(&mut keys);

        assert!((keys[0].out_tangent - 2.0).abs() < 1e-6);
        assert!((keys[2].in_tangent - 0.5).abs() < 1e-6);

        let mut lone = vec![Keyframe::float(2.0, 7.0)];
        TangentResolver::recalculate_all(&mut lone);
        assert_eq!(lone[0].out_tangent, 0.0);
    }

    #[test]
    fn test_linear_uses_chords() {
        let mut keys: Vec<_> = keys()
            .into_iter()
            .map(|k| k.with_mode(TangentMode::Linear))
            .collect();
        TangentResolver::recalculate_all(&mut keys);

        assert_eq!(keys[0].in_tangent, 0.0);
        assert!((keys[1].in_tangent - 2.0).abs() < 1e-6);
        assert!((keys[1].out_tangent - 0.5).abs() < 1e-6);
        assert_eq!(keys[2].out_tangent, 0.0);
    }

    #[test]
    fn test_stepped_is_infinite_and_free_is_kept() {
        let mut keys = keys();
        keys[0] = keys[0].clone().with_mode(TangentMode::Stepped);
        keys[2] = keys[2].clone().with_tangents(-4.0, -4.0);
        TangentResolver::recalculate_all(&mut keys);

        assert_eq!(keys[0].out_tangent, f32::INFINITY);
        assert_eq!(keys[2].in_tangent, -4.0);
    }

    #[test]
    fn test_set_tangent_mirrors_unless_stepped() {
        let mut key = Keyframe::float(0.0, 1.0);
        TangentResolver::set_tangent(&mut key, TangentSide::Out, 3.0);
        assert_eq!(key.in_tangent, 3.0);
        assert_eq!(key.tangent_mode, TangentMode::Free);

        let mut key = Keyframe::float(0.0, 1.0);
        TangentResolver::set_side_mode(&mut key, TangentSide::In, TangentMode::Stepped);
        key.in_tangent = f32::INFINITY;
        TangentResolver::set_tangent(&mut key, TangentSide::Out, 3.0);
        assert_eq!(key.out_tangent, 3.0);
        assert!(key.in_tangent.is_infinite());
        assert_eq!(key.side_mode(TangentSide::In), TangentMode::Stepped);
    }

    #[test]
    fn test_broken_sides_are_independent() {
        let mut key = Keyframe::float(0.0, 1.0);
        TangentResolver::set_broken(&mut key, true);
        TangentResolver::set_tangent(&mut key, TangentSide::In, -1.0);
        TangentResolver::set_tangent(&mut key, TangentSide::Out, 5.0);
        assert_eq!(key.in_tangent, -1.0);
        assert_eq!(key.out_tangent, 5.0);

        TangentResolver::set_mode(&mut key, TangentMode::Smooth);
        assert!(!key.broken);
    }

    #[test]
    fn test_update_surrounding_only_touches_neighbours() {
        let mut keys = vec![
            Keyframe::float(0.0, 0.0),
            Keyframe::float(1.0, 0.0),
            Keyframe::float(2.0, 0.0),
            Keyframe::float(3.0, 0.0),
        ];
        keys[3].value = 6.0.into();
        TangentResolver::update_surrounding(&mut keys, 3);

        assert!((keys[2].out_tangent - 3.0).abs() < 1e-6);
        assert!((keys[3].in_tangent - 6.0).abs() < 1e-6);
        assert_eq!(keys[0].out_tangent, 0.0);
    }
}
