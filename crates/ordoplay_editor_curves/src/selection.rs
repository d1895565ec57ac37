// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe selection.
//!
//! Selection is transient editor state. Entries address keys by index, so
//! any operation that reorders or removes keys must remap or validate the
//! selection afterwards.
//!
//! Besides the primary selection, keys on sibling curves of a group (the
//! other channels of a vector or color) are *semi-selected*: they are drawn
//! as part of the selection and previewed during drags, but edits are never
//! committed to them.

use crate::curve::{CurveId, CurveSet};
use crate::view::ViewTransform;
use egui::Rect;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Which part of a keyframe is selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    /// The key itself
    Key,
    /// Incoming tangent handle
    InTangent,
    /// Outgoing tangent handle
    OutTangent,
}

/// A selected (curve, key, handle) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurveSelection {
    /// Curve containing the key
    pub curve_id: CurveId,
    /// Key index within the curve
    pub key: usize,
    /// Selected handle
    pub handle: HandleKind,
    /// Selected through a group sibling
    pub semi: bool,
}

impl CurveSelection {
    /// A fully selected key
    pub fn key(curve_id: CurveId, key: usize) -> Self {
        Self {
            curve_id,
            key,
            handle: HandleKind::Key,
            semi: false,
        }
    }

    /// A semi-selected key
    pub fn semi(curve_id: CurveId, key: usize) -> Self {
        Self {
            semi: true,
            ..Self::key(curve_id, key)
        }
    }

    /// A selected tangent handle
    pub fn handle(curve_id: CurveId, key: usize, handle: HandleKind) -> Self {
        Self {
            handle,
            ..Self::key(curve_id, key)
        }
    }

    fn slot(&self) -> (CurveId, usize, HandleKind) {
        (self.curve_id, self.key, self.handle)
    }
}

/// How a marquee combines with the selection it started from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarqueeMode {
    /// Replace the selection
    #[default]
    Replace,
    /// Add to the selection (shift)
    Add,
    /// Toggle keys inside the marquee (ctrl)
    Toggle,
}

/// Selection state of the curve editor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionModel {
    entries: Vec<CurveSelection>,
}

impl SelectionModel {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries
    pub fn entries(&self) -> &[CurveSelection] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the selection
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether a key is fully selected
    pub fn contains(&self, curve_id: CurveId, key: usize) -> bool {
        self.entries
            .iter()
            .any(|e| e.curve_id == curve_id && e.key == key && e.handle == HandleKind::Key && !e.semi)
    }

    /// Whether a key is only semi-selected
    pub fn is_semi_selected(&self, curve_id: CurveId, key: usize) -> bool {
        !self.contains(curve_id, key)
            && self
                .entries
                .iter()
                .any(|e| e.curve_id == curve_id && e.key == key && e.semi)
    }

    /// Whether any handle of a key is selected
    pub fn touches(&self, curve_id: CurveId, key: usize) -> bool {
        self.entries.iter().any(|e| e.curve_id == curve_id && e.key == key && !e.semi)
    }

    /// Replace the selection with a single entry
    pub fn select(&mut self, entry: CurveSelection) {
        self.entries.clear();
        self.entries.push(entry);
    }

    /// Add an entry, upgrading a semi entry to a full one
    pub fn add(&mut self, entry: CurveSelection) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.slot() == entry.slot()) {
            existing.semi &= entry.semi;
            return;
        }
        self.entries.push(entry);
    }

    /// Remove every entry of a key
    pub fn remove(&mut self, curve_id: CurveId, key: usize) {
        self.entries.retain(|e| !(e.curve_id == curve_id && e.key == key));
    }

    /// Toggle a fully selected key
    pub fn toggle(&mut self, curve_id: CurveId, key: usize) {
        if self.contains(curve_id, key) {
            self.remove(curve_id, key);
        } else {
            self.add(CurveSelection::key(curve_id, key));
        }
    }

    /// Fully selected keys
    pub fn selected_keys(&self) -> impl Iterator<Item = &CurveSelection> {
        self.entries
            .iter()
            .filter(|e| e.handle == HandleKind::Key && !e.semi)
    }

    /// Fully selected key indices of one curve, ascending
    pub fn keys_of(&self, curve_id: CurveId) -> Vec<usize> {
        let mut keys: Vec<usize> = self
            .selected_keys()
            .filter(|e| e.curve_id == curve_id)
            .map(|e| e.key)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Curves with at least one fully selected key, in selection order
    pub fn curves(&self) -> Vec<CurveId> {
        let mut ids: Vec<CurveId> = Vec::new();
        for entry in self.selected_keys() {
            if !ids.contains(&entry.curve_id) {
                ids.push(entry.curve_id);
            }
        }
        ids
    }

    /// Select every key of every editable curve
    pub fn select_all(&mut self, curves: &CurveSet) {
        self.entries = curves
            .values()
            .filter(|c| c.is_editable())
            .flat_map(|c| (0..c.curve.len()).map(move |k| CurveSelection::key(c.id, k)))
            .collect();
    }

    /// Select keys with `start <= time <= end`
    pub fn select_time_range(&mut self, curves: &CurveSet, start: f32, end: f32, additive: bool) {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        if !additive {
            self.entries.clear();
        }
        for wrapper in curves.values().filter(|c| c.is_editable()) {
            for (index, key) in wrapper.curve.keys().iter().enumerate() {
                if key.time >= start && key.time <= end {
                    self.add(CurveSelection::key(wrapper.id, index));
                }
            }
        }
        self.propagate_groups(curves);
    }

    /// Recompute the selection from a marquee rectangle.
    ///
    /// `base` is the selection when the marquee started, so calling this on
    /// every drag update always derives the same result for the same rect.
    pub fn marquee(
        &mut self,
        base: &SelectionModel,
        curves: &CurveSet,
        view: &ViewTransform,
        rect: Rect,
        mode: MarqueeMode,
    ) {
        let mut inside = Vec::new();
        for wrapper in curves.values().filter(|c| c.is_editable()) {
            for (index, key) in wrapper.curve.keys().iter().enumerate() {
                if view.key_position(key).is_some_and(|p| rect.contains(p)) {
                    inside.push(CurveSelection::key(wrapper.id, index));
                }
            }
        }

        self.entries = match mode {
            MarqueeMode::Replace => Vec::new(),
            MarqueeMode::Add | MarqueeMode::Toggle => {
                base.entries.iter().copied().filter(|e| !e.semi).collect()
            }
        };
        for entry in inside {
            if mode == MarqueeMode::Toggle && base.contains(entry.curve_id, entry.key) {
                self.remove(entry.curve_id, entry.key);
            } else {
                self.add(entry);
            }
        }
        self.propagate_groups(curves);
    }

    /// Semi-select key `k` on every other curve of the group of each fully
    /// selected key `k`, then collapse duplicates.
    pub fn propagate_groups(&mut self, curves: &CurveSet) {
        self.entries.retain(|e| !e.semi);

        let mut semi = Vec::new();
        for entry in self.selected_keys() {
            let Some(group) = curves.get(&entry.curve_id).and_then(|c| c.group_id) else {
                continue;
            };
            for sibling in curves.values() {
                if sibling.id != entry.curve_id
                    && sibling.group_id == Some(group)
                    && entry.key < sibling.curve.len()
                {
                    semi.push(CurveSelection::semi(sibling.id, entry.key));
                }
            }
        }
        self.entries.extend(semi);
        self.dedup();
    }

    /// Collapse duplicate (curve, key, handle) entries, preferring full selection over semi
    pub fn dedup(&mut self) {
        let mut unique: IndexMap<(CurveId, usize, HandleKind), CurveSelection> = IndexMap::new();
        for entry in self.entries.drain(..) {
            unique
                .entry(entry.slot())
                .and_modify(|e| e.semi &= entry.semi)
                .or_insert(entry);
        }
        self.entries = unique.into_values().collect();
    }

    /// Drop entries whose curve or key no longer exists. Returns the number dropped.
    pub fn prune(&mut self, curves: &CurveSet) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| curves.get(&e.curve_id).is_some_and(|c| e.key < c.curve.len()));
        before - self.entries.len()
    }

    /// Like [`Self::prune`], for callers that expect the selection to be valid already
    pub fn retain_valid(&mut self, curves: &CurveSet) -> usize {
        let dropped = self.prune(curves);
        if dropped > 0 {
            tracing::error!(dropped, "Selection referenced missing curves or keys");
        }
        dropped
    }

    /// Rewrite key indices of one curve. Entries whose key is not in the mapping are dropped.
    pub fn remap_keys(&mut self, curve_id: CurveId, mapping: &[(usize, usize)]) {
        self.entries.retain_mut(|e| {
            if e.curve_id != curve_id {
                return true;
            }
            match mapping.iter().find(|(old, _)| *old == e.key) {
                Some((_, new)) => {
                    e.key = *new;
                    true
                }
                None => false,
            }
        });
    }

    /// Drop every entry of a curve
    pub fn remove_curve(&mut self, curve_id: CurveId) {
        self.entries.retain(|e| e.curve_id != curve_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CurveBinding;
    use crate::curve::{Curve, CurveWrapper};
    use crate::keyframe::Keyframe;
    use egui::{Pos2, Vec2};

    fn curve(property: &str, group: Option<u32>, times: &[f32]) -> CurveWrapper {
        let keys = times.iter().map(|&t| Keyframe::float(t, 0.0)).collect();
        let mut wrapper = CurveWrapper::new(
            CurveBinding::new("", "Transform", property),
            Curve::from_keys(keys),
        );
        wrapper.group_id = group;
        wrapper
    }

    fn curve_set() -> (CurveSet, Vec<CurveId>) {
        let wrappers = vec![
            curve("m_LocalPosition.x", Some(0), &[0.0, 1.0, 2.0]),
            curve("m_LocalPosition.y", Some(0), &[0.0, 1.0, 2.0]),
            curve("m_LocalPosition.z", Some(0), &[0.0, 1.0]),
            curve("m_LocalScale.x", Some(1), &[0.0, 1.0, 2.0]),
            curve("m_Intensity", None, &[0.0, 1.0, 2.0]),
        ];
        let ids = wrappers.iter().map(|w| w.id).collect();
        (wrappers.into_iter().map(|w| (w.id, w)).collect(), ids)
    }

    #[test]
    fn test_group_propagation_semi_selects_siblings_only() {
        let (curves, ids) = curve_set();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::key(ids[1], 1));
        selection.propagate_groups(&curves);

        assert!(selection.contains(ids[1], 1));
        assert!(selection.is_semi_selected(ids[0], 1));
        assert!(selection.is_semi_selected(ids[2], 1));
        assert!(!selection.is_semi_selected(ids[3], 1));
        assert!(!selection.is_semi_selected(ids[4], 1));
        assert!(!selection.is_semi_selected(ids[0], 0));
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn test_propagation_skips_missing_key_index() {
        let (curves, ids) = curve_set();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::key(ids[0], 2));
        selection.propagate_groups(&curves);

        assert!(selection.is_semi_selected(ids[1], 2));
        // The z channel only has two keys
        assert!(!selection.is_semi_selected(ids[2], 2));
    }

    #[test]
    fn test_dedup_prefers_full_selection() {
        let (curves, ids) = curve_set();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::key(ids[0], 0));
        selection.add(CurveSelection::key(ids[1], 0));
        selection.propagate_groups(&curves);

        assert!(selection.contains(ids[0], 0));
        assert!(selection.contains(ids[1], 0));
        assert!(selection.is_semi_selected(ids[2], 0));
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn test_marquee_modes() {
        let (curves, ids) = curve_set();
        let view = ViewTransform::new(
            Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 100.0)),
            (-0.5, 2.5),
            (-1.0, 1.0),
        );
        // Covers t in [0.5, 1.5] for every curve (all values are 0)
        let rect = Rect::from_min_max(
            Pos2::new(view.time_to_x(0.5), 0.0),
            Pos2::new(view.time_to_x(1.5), 100.0),
        );

        let mut base = SelectionModel::new();
        base.select(CurveSelection::key(ids[4], 0));

        let mut selection = SelectionModel::new();
        selection.marquee(&base, &curves, &view, rect, MarqueeMode::Replace);
        assert_eq!(selection.selected_keys().count(), 5);
        assert!(!selection.contains(ids[4], 0));

        selection.marquee(&base, &curves, &view, rect, MarqueeMode::Add);
        assert!(selection.contains(ids[4], 0));
        assert!(selection.contains(ids[4], 1));

        let mut base = SelectionModel::new();
        base.select(CurveSelection::key(ids[4], 1));
        selection.marquee(&base, &curves, &view, rect, MarqueeMode::Toggle);
        assert!(!selection.contains(ids[4], 1));
        assert!(selection.contains(ids[3], 1));
    }

    #[test]
    fn test_retain_valid_and_remap() {
        let (mut curves, ids) = curve_set();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::key(ids[4], 2));
        selection.add(CurveSelection::key(ids[3], 0));

        curves.shift_remove(&ids[3]);
        assert_eq!(selection.retain_valid(&curves), 1);

        selection.remap_keys(ids[4], &[(2, 0)]);
        assert!(selection.contains(ids[4], 0));
        selection.remap_keys(ids[4], &[]);
        assert!(selection.is_empty());
    }
}
