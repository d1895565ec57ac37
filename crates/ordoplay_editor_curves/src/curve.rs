// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curve definitions: ordered keyframes, wrap modes and evaluation.

use crate::binding::CurveBinding;
use crate::keyframe::{Interpolation, KeyValue, Keyframe};
use crate::tangent::TangentResolver;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Keys closer than this are considered to share the same time
pub const KEY_TIME_EPSILON: f32 = 1e-5;

/// Unique identifier for a curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurveId(pub Uuid);

impl CurveId {
    /// Create a new random curve ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CurveId {
    fn default() -> Self {
        Self::new()
    }
}

/// Behaviour of a curve outside its key range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WrapMode {
    /// Hold the edge value
    #[default]
    Clamp,
    /// Repeat the key range
    Loop,
    /// Repeat the key range, reversing every other cycle
    PingPong,
}

/// An ordered, time-sorted sequence of keyframes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "StoredCurve")]
pub struct Curve {
    keys: Vec<Keyframe>,
    /// Wrap mode before the first key
    pub pre_wrap: WrapMode,
    /// Wrap mode after the last key
    pub post_wrap: WrapMode,
}

/// Curve as persisted, before the key order is checked
#[derive(Deserialize)]
struct StoredCurve {
    keys: Vec<Keyframe>,
    #[serde(default)]
    pre_wrap: WrapMode,
    #[serde(default)]
    post_wrap: WrapMode,
}

impl From<StoredCurve> for Curve {
    fn from(stored: StoredCurve) -> Self {
        let sorted = stored
            .keys
            .windows(2)
            .all(|w| w[1].time - w[0].time > KEY_TIME_EPSILON);
        let curve = if sorted {
            Curve {
                keys: stored.keys,
                ..Curve::default()
            }
        } else {
            tracing::warn!(keys = stored.keys.len(), "Loaded curve keys out of order, re-sorting");
            Curve::from_keys(stored.keys)
        };
        curve.with_wrap(stored.pre_wrap, stored.post_wrap)
    }
}

impl Curve {
    /// Create an empty curve
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a curve from unsorted keys, resolving all tangents
    pub fn from_keys(keys: Vec<Keyframe>) -> Self {
        let mut curve = Self::new();
        let entries = keys.into_iter().map(|k| (k, None)).collect();
        curve.replace_keys_tracking(entries, KEY_TIME_EPSILON);
        curve
    }

    /// Set both wrap modes
    pub fn with_wrap(mut self, pre: WrapMode, post: WrapMode) -> Self {
        self.pre_wrap = pre;
        self.post_wrap = post;
        self
    }

    /// Get all keys
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Get a key by index
    pub fn key(&self, index: usize) -> Option<&Keyframe> {
        self.keys.get(index)
    }

    /// Get key count
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the curve has no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether the curve holds object references
    pub fn is_object_curve(&self) -> bool {
        matches!(self.keys.first().map(|k| &k.value), Some(KeyValue::Object(_)))
    }

    /// Time span covered by keys
    pub fn time_range(&self) -> Option<(f32, f32)> {
        Some((self.keys.first()?.time, self.keys.last()?.time))
    }

    /// Minimum and maximum key values of a scalar curve
    pub fn value_range(&self) -> Option<(f32, f32)> {
        self.keys
            .iter()
            .filter_map(Keyframe::as_float)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Index of a key within `tolerance` of `time`
    pub fn find_key(&self, time: f32, tolerance: f32) -> Option<usize> {
        let idx = self.keys.partition_point(|k| k.time < time - tolerance);
        self.keys
            .get(idx)
            .filter(|k| (k.time - time).abs() <= tolerance)
            .map(|_| idx)
    }

    /// Insert a key keeping the sort order. A key at the same time is replaced.
    pub fn add_key(&mut self, key: Keyframe) -> usize {
        let index = match self.find_key(key.time, KEY_TIME_EPSILON) {
            Some(existing) => {
                self.keys[existing] = key;
                existing
            }
            None => {
                let idx = self.keys.partition_point(|k| k.time < key.time);
                self.keys.insert(idx, key);
                idx
            }
        };
        TangentResolver::update_surrounding(&mut self.keys, index);
        index
    }

    /// Key a value at `time`.
    ///
    /// A key within half a frame of `time` has its value updated in place
    /// and keeps its tangents; otherwise a new key is inserted.
    pub fn add_key_at(&mut self, time: f32, value: KeyValue, frame_rate: f32) -> usize {
        let tolerance = half_frame(frame_rate);
        if let Some(index) = self.find_key(time, tolerance) {
            self.keys[index].value = value;
            TangentResolver::update_surrounding(&mut self.keys, index);
            return index;
        }
        self.add_key(Keyframe::new(time, value))
    }

    /// Remove a set of keys.
    ///
    /// When `allow_delete_last_key` is false and the removal would leave the
    /// curve empty, nothing is removed and `false` is returned.
    pub fn remove_keys(&mut self, indices: &[usize], allow_delete_last_key: bool) -> bool {
        let mut indices: Vec<usize> = indices.iter().copied().filter(|&i| i < self.keys.len()).collect();
        indices.sort_unstable();
        indices.dedup();

        if indices.is_empty() {
            return false;
        }
        if !allow_delete_last_key && indices.len() >= self.keys.len() {
            tracing::debug!("Refusing to delete the last key of a curve");
            return false;
        }

        for &index in indices.iter().rev() {
            self.keys.remove(index);
        }
        TangentResolver::recalculate_all(&mut self.keys);
        true
    }

    /// Apply `edit` to a key and restore the sort order. Returns the new index.
    pub fn update_key(&mut self, index: usize, edit: impl FnOnce(&mut Keyframe)) -> Option<usize> {
        let key = self.keys.get_mut(index)?;
        let old_time = key.time;
        edit(key);
        if key.time == old_time {
            TangentResolver::update_surrounding(&mut self.keys, index);
            return Some(index);
        }

        let key = self.keys.remove(index);
        TangentResolver::recalculate_all(&mut self.keys);
        Some(self.add_key(key))
    }

    /// Move a key in time and optionally change its value
    pub fn move_key(&mut self, index: usize, time: f32, value: Option<KeyValue>) -> Option<usize> {
        self.update_key(index, |key| {
            key.time = time;
            if let Some(value) = value {
                key.value = value;
            }
        })
    }

    /// Recompute every tangent
    pub fn recalculate_tangents(&mut self) {
        TangentResolver::recalculate_all(&mut self.keys);
    }

    /// Rebuild the key list from `(key, tag)` pairs.
    ///
    /// Keys are sorted by time. Keys within `tolerance` of each other
    /// collide and only one survives: a tagged key beats an untagged one,
    /// otherwise the entry later in the input wins. Returns
    /// `(tag, new_index)` for every surviving tagged key.
    pub fn replace_keys_tracking(
        &mut self,
        entries: Vec<(Keyframe, Option<usize>)>,
        tolerance: f32,
    ) -> Vec<(usize, usize)> {
        let tolerance = tolerance.max(KEY_TIME_EPSILON);
        let mut entries: Vec<(usize, Keyframe, Option<usize>)> = entries
            .into_iter()
            .enumerate()
            .map(|(order, (key, tag))| (order, key, tag))
            .collect();
        entries.sort_by(|a, b| a.1.time.total_cmp(&b.1.time).then(a.0.cmp(&b.0)));

        let mut kept: Vec<(usize, Keyframe, Option<usize>)> = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(last) = kept.last_mut() {
                if (entry.1.time - last.1.time).abs() <= tolerance {
                    let incoming_wins = match (last.2.is_some(), entry.2.is_some()) {
                        (false, true) => true,
                        (true, false) => false,
                        _ => entry.0 > last.0,
                    };
                    tracing::debug!(time = entry.1.time, incoming_wins, "Keyframe collision");
                    if incoming_wins {
                        *last = entry;
                    }
                    continue;
                }
            }
            kept.push(entry);
        }

        let mut mapping = Vec::new();
        self.keys = kept
            .into_iter()
            .enumerate()
            .map(|(index, (_, key, tag))| {
                if let Some(tag) = tag {
                    mapping.push((tag, index));
                }
                key
            })
            .collect();
        TangentResolver::recalculate_all(&mut self.keys);
        mapping
    }

    /// Map a time outside the key range according to the wrap modes
    pub fn wrap_time(&self, time: f32) -> f32 {
        let Some((start, end)) = self.time_range() else {
            return time;
        };
        let length = end - start;
        if length <= KEY_TIME_EPSILON {
            return start;
        }

        let mode = if time < start {
            self.pre_wrap
        } else if time > end {
            self.post_wrap
        } else {
            return time;
        };

        match mode {
            WrapMode::Clamp => time.clamp(start, end),
            WrapMode::Loop => start + (time - start).rem_euclid(length),
            WrapMode::PingPong => {
                let phase = (time - start).rem_euclid(2.0 * length);
                if phase > length {
                    start + 2.0 * length - phase
                } else {
                    start + phase
                }
            }
        }
    }

    /// Index of the key starting the segment that contains `time`
    fn segment_start(&self, time: f32) -> usize {
        self.keys.partition_point(|k| k.time <= time).saturating_sub(1)
    }

    /// Evaluate the curve at a given time
    pub fn evaluate(&self, time: f32) -> Option<KeyValue> {
        if self.keys.is_empty() {
            return None;
        }
        if self.is_object_curve() {
            let t = self.wrap_time(time);
            return Some(self.keys[self.segment_start(t)].value.clone());
        }
        self.evaluate_float(time).map(KeyValue::Float)
    }

    /// Evaluate a scalar curve at a given time
    pub fn evaluate_float(&self, time: f32) -> Option<f32> {
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        let t = self.wrap_time(time);

        if t <= first.time {
            return first.as_float();
        }
        if t >= last.time {
            return last.as_float();
        }

        let idx = self.segment_start(t);
        let a = &self.keys[idx];
        let b = self.keys.get(idx + 1)?;
        let va = a.as_float()?;
        let vb = b.as_float()?;

        if !a.out_tangent.is_finite() || !b.in_tangent.is_finite() {
            return Some(va);
        }

        let dt = b.time - a.time;
        if dt <= KEY_TIME_EPSILON {
            return Some(vb);
        }
        let s = (t - a.time) / dt;
        Some(Interpolation::hermite(va, a.out_tangent * dt, vb, b.in_tangent * dt, s))
    }
}

/// Half a frame at `frame_rate`, the tolerance for matching key times
pub fn half_frame(frame_rate: f32) -> f32 {
    if frame_rate > 0.0 {
        0.5 / frame_rate
    } else {
        KEY_TIME_EPSILON
    }
}

/// A curve as presented in the editor, together with its binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveWrapper {
    /// Unique curve ID
    pub id: CurveId,
    /// Property animated by this curve
    pub binding: CurveBinding,
    /// Curve data
    pub curve: Curve,
    /// Curves of the same vector or color property share a group
    pub group_id: Option<u32>,
    /// Curves sharing a region are drawn with a filled area between them
    pub region_id: Option<u32>,
    /// Display color
    pub color: [u8; 3],
    /// Hidden curves are neither drawn nor picked
    pub hidden: bool,
    /// Read-only curves are drawn but cannot be edited
    pub read_only: bool,
}

impl CurveWrapper {
    /// Wrap a curve for editing
    pub fn new(binding: CurveBinding, curve: Curve) -> Self {
        let color = binding.default_color();
        Self {
            id: CurveId::new(),
            binding,
            curve,
            group_id: None,
            region_id: None,
            color,
            hidden: false,
            read_only: false,
        }
    }

    /// Whether the curve can be picked and edited
    pub fn is_editable(&self) -> bool {
        !self.hidden && !self.read_only
    }
}

/// Curves of an editor session, in insertion order
pub type CurveSet = IndexMap<CurveId, CurveWrapper>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::AnimationClipData;
    use crate::keyframe::{ObjectRef, TangentMode};
    use crate::session::CurveEditorSession;
    use crate::settings::CurveEditorSettings;

    fn ramp() -> Curve {
        Curve::from_keys(vec![
            Keyframe::float(2.0, 10.0).with_mode(TangentMode::Linear),
            Keyframe::float(0.0, 0.0).with_mode(TangentMode::Linear),
        ])
    }

    fn assert_sorted(curve: &Curve) {
        assert!(curve.keys().windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn test_keys_stay_sorted() {
        let mut curve = ramp();
        curve.add_key(Keyframe::float(1.0, 3.0));
        curve.add_key(Keyframe::float(-1.0, 3.0));
        assert_sorted(&curve);

        let idx = curve.move_key(0, 5.0, None).unwrap();
        assert_eq!(idx, 3);
        assert_sorted(&curve);

        curve.remove_keys(&[1], false);
        assert_sorted(&curve);
    }

    #[test]
    fn test_add_key_within_half_frame_preserves_tangents() {
        let mut curve = Curve::from_keys(vec![
            Keyframe::float(0.0, 0.0),
            Keyframe::float(1.0, 1.0).with_tangents(4.0, 4.0),
        ]);

        // Half a frame at 30 fps is ~0.0167s
        let idx = curve.add_key_at(1.01, KeyValue::Float(5.0), 30.0);
        assert_eq!(idx, 1);
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.keys()[1].as_float(), Some(5.0));
        assert_eq!(curve.keys()[1].time, 1.0);
        assert_eq!(curve.keys()[1].in_tangent, 4.0);
        assert_eq!(curve.keys()[1].out_tangent, 4.0);

        let idx = curve.add_key_at(1.1, KeyValue::Float(2.0), 30.0);
        assert_eq!(idx, 2);
        assert_eq!(curve.len(), 3);
    }

    #[test]
    fn test_delete_last_key_is_rejected() {
        let mut curve = ramp();
        assert!(!curve.remove_keys(&[0, 1], false));
        assert_eq!(curve.len(), 2);

        assert!(curve.remove_keys(&[0, 1], true));
        assert!(curve.is_empty());
    }

    #[test]
    fn test_linear_evaluation() {
        let curve = ramp();
        assert!((curve.evaluate_float(1.0).unwrap() - 5.0).abs() < 1e-4);
        assert_eq!(curve.evaluate_float(-3.0), Some(0.0));
        assert_eq!(curve.evaluate_float(9.0), Some(10.0));
    }

    #[test]
    fn test_stepped_holds_value() {
        let curve = Curve::from_keys(vec![
            Keyframe::float(0.0, 1.0).with_mode(TangentMode::Stepped),
            Keyframe::float(1.0, 4.0),
        ]);
        assert_eq!(curve.evaluate_float(0.99), Some(1.0));
        assert_eq!(curve.evaluate_float(1.0), Some(4.0));
    }

    #[test]
    fn test_wrap_modes() {
        let looping = ramp().with_wrap(WrapMode::Loop, WrapMode::Loop);
        assert!((looping.evaluate_float(3.0).unwrap() - 5.0).abs() < 1e-4);
        assert!((looping.evaluate_float(-1.0).unwrap() - 5.0).abs() < 1e-4);

        let ping_pong = ramp().with_wrap(WrapMode::PingPong, WrapMode::PingPong);
        assert!((ping_pong.wrap_time(2.5) - 1.5).abs() < 1e-6);
        assert!((ping_pong.wrap_time(4.5) - 0.5).abs() < 1e-6);
        assert!((ping_pong.wrap_time(-0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_object_curve_holds_previous_key() {
        let a = ObjectRef::new("a.png");
        let b = ObjectRef::new("b.png");
        let curve = Curve::from_keys(vec![
            Keyframe::object(0.0, a.clone()),
            Keyframe::object(1.0, b.clone()),
        ]);
        assert_eq!(curve.evaluate(0.5), Some(KeyValue::Object(a)));
        assert_eq!(curve.evaluate(1.5), Some(KeyValue::Object(b)));
    }

    #[test]
    fn test_loaded_keys_are_sorted_and_merged() {
        let stored = Curve {
            keys: vec![
                Keyframe::float(2.0, 10.0).with_mode(TangentMode::Linear),
                Keyframe::float(0.0, 0.0).with_mode(TangentMode::Linear),
                Keyframe::float(2.0, 10.0).with_mode(TangentMode::Linear),
            ],
            ..Curve::default()
        }
        .with_wrap(WrapMode::Loop, WrapMode::Clamp);

        let ron = ron::to_string(&stored).unwrap();
        let mut curve: Curve = ron::from_str(&ron).unwrap();
        assert_eq!(curve.len(), 2);
        assert_sorted(&curve);
        assert_eq!(curve.pre_wrap, WrapMode::Loop);
        assert!((curve.evaluate_float(1.0).unwrap() - 5.0).abs() < 1e-4);

        curve.add_key(Keyframe::float(1.0, 9.0));
        assert_sorted(&curve);

        let bytes = bincode::serialize(&stored).unwrap();
        let curve: Curve = bincode::deserialize(&bytes).unwrap();
        assert_eq!(curve.len(), 2);
        assert_sorted(&curve);
    }

    #[test]
    fn test_session_over_unsorted_clip_keeps_order() {
        let mut clip = AnimationClipData::new("Fade", 30.0);
        clip.set_curve(
            CurveBinding::new("", "Light", "m_Intensity"),
            Curve {
                keys: vec![
                    Keyframe::float(2.0, 10.0).with_mode(TangentMode::Linear),
                    Keyframe::float(0.0, 0.0).with_mode(TangentMode::Linear),
                ],
                ..Curve::default()
            },
        );
        let clip = AnimationClipData::from_ron(&clip.to_ron().unwrap()).unwrap();

        let mut session = CurveEditorSession::with_clip(&clip, CurveEditorSettings::default());
        let id = *session.curves().keys().next().unwrap();
        assert_sorted(&session.curves()[&id].curve);
        let value = session.curves()[&id].curve.evaluate_float(0.5).unwrap();
        assert!((value - 2.5).abs() < 1e-4);

        session.add_key(id, 1.0, KeyValue::Float(9.0)).unwrap();
        let curve = &session.curves()[&id].curve;
        assert_sorted(curve);
        assert_eq!(curve.len(), 3);
    }

    #[test]
    fn test_sorted_keys_load_unchanged() {
        let curve = Curve::from_keys(vec![
            Keyframe::float(0.0, 0.0),
            Keyframe::float(1.0, 1.0).with_tangents(4.0, -2.0),
        ]);
        let loaded: Curve = ron::from_str(&ron::to_string(&curve).unwrap()).unwrap();
        assert_eq!(loaded, curve);
    }

    #[test]
    fn test_collision_prefers_tagged_key() {
        let mut curve = Curve::new();
        let mapping = curve.replace_keys_tracking(
            vec![
                (Keyframe::float(1.0, 0.0), None),
                (Keyframe::float(1.0, 9.0), Some(7)),
                (Keyframe::float(2.0, 0.0), None),
            ],
            KEY_TIME_EPSILON,
        );
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.keys()[0].as_float(), Some(9.0));
        assert_eq!(mapping, vec![(7, 0)]);
    }
}
