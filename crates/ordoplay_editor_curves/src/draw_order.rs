// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curve z-ordering for rendering and picking.

use crate::curve::{CurveId, CurveSet};
use serde::{Deserialize, Serialize};

/// Curve draw order. Curves are drawn first to last, so the last entry is topmost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawOrder {
    order: Vec<CurveId>,
}

impl DrawOrder {
    /// Create an empty draw order
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw order following the insertion order of a curve set
    pub fn from_curves(curves: &CurveSet) -> Self {
        Self {
            order: curves.keys().copied().collect(),
        }
    }

    /// Curve IDs, bottom to top
    pub fn ids(&self) -> &[CurveId] {
        &self.order
    }

    /// Curve IDs, top to bottom
    pub fn topmost_first(&self) -> impl Iterator<Item = CurveId> + '_ {
        self.order.iter().rev().copied()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the draw order is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Draw-order index, higher is closer to the top
    pub fn index_of(&self, id: CurveId) -> Option<usize> {
        self.order.iter().position(|c| *c == id)
    }

    /// Add a curve on top
    pub fn push(&mut self, id: CurveId) {
        if !self.order.contains(&id) {
            self.order.push(id);
        }
    }

    /// Remove a curve
    pub fn remove(&mut self, id: CurveId) {
        self.order.retain(|c| *c != id);
    }

    /// Move a curve to the top
    pub fn bring_to_front(&mut self, id: CurveId) {
        if let Some(index) = self.index_of(id) {
            let id = self.order.remove(index);
            self.order.push(id);
        }
    }

    /// Move a curve and every curve of its group to the top, keeping their relative order
    pub fn bring_group_to_front(&mut self, curves: &CurveSet, id: CurveId) {
        let group = curves.get(&id).and_then(|c| c.group_id);
        let Some(group) = group else {
            self.bring_to_front(id);
            return;
        };

        let (mut raised, rest): (Vec<CurveId>, Vec<CurveId>) = self
            .order
            .iter()
            .copied()
            .partition(|c| curves.get(c).and_then(|w| w.group_id) == Some(group));
        // The clicked curve ends up on top of its siblings
        raised.retain(|c| *c != id);
        raised.push(id);

        self.order = rest;
        self.order.extend(raised);
    }

    /// Reconcile the draw order with the curve set.
    ///
    /// A mismatch is an internal inconsistency: it is logged and repaired by
    /// dropping stale IDs and appending missing curves on top. Returns true if
    /// a repair was needed.
    pub fn sync(&mut self, curves: &CurveSet) -> bool {
        let consistent = self.order.len() == curves.len()
            && self.order.iter().all(|id| curves.contains_key(id));
        if consistent {
            return false;
        }

        tracing::error!(
            draw_order = self.order.len(),
            curves = curves.len(),
            "Draw order and curve count mismatch"
        );
        self.order.retain(|id| curves.contains_key(id));
        self.order.dedup();
        for id in curves.keys() {
            if !self.order.contains(id) {
                self.order.push(*id);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CurveBinding;
    use crate::curve::{Curve, CurveWrapper};

    fn curve_set(groups: &[Option<u32>]) -> CurveSet {
        groups
            .iter()
            .enumerate()
            .map(|(i, group)| {
                let mut wrapper = CurveWrapper::new(
                    CurveBinding::new("", "Transform", format!("p{i}")),
                    Curve::new(),
                );
                wrapper.group_id = *group;
                (wrapper.id, wrapper)
            })
            .collect()
    }

    #[test]
    fn test_bring_to_front() {
        let curves = curve_set(&[None, None, None]);
        let ids: Vec<_> = curves.keys().copied().collect();
        let mut order = DrawOrder::from_curves(&curves);

        order.bring_to_front(ids[0]);
        assert_eq!(order.ids(), &[ids[1], ids[2], ids[0]]);
        assert_eq!(order.topmost_first().next(), Some(ids[0]));
    }

    #[test]
    fn test_bring_group_to_front() {
        let curves = curve_set(&[Some(1), None, Some(1), None]);
        let ids: Vec<_> = curves.keys().copied().collect();
        let mut order = DrawOrder::from_curves(&curves);

        order.bring_group_to_front(&curves, ids[0]);
        assert_eq!(order.ids(), &[ids[1], ids[3], ids[2], ids[0]]);
    }

    #[test]
    fn test_sync_repairs_mismatch() {
        let mut curves = curve_set(&[None, None]);
        let mut order = DrawOrder::from_curves(&curves);
        assert!(!order.sync(&curves));

        let extra = curve_set(&[None]);
        let (extra_id, extra_curve) = extra.into_iter().next().unwrap();
        curves.insert(extra_id, extra_curve);
        let first = *curves.keys().next().unwrap();
        curves.shift_remove(&first);

        assert!(order.sync(&curves));
        assert_eq!(order.len(), 2);
        assert_eq!(order.topmost_first().next(), Some(extra_id));
        assert_eq!(order.index_of(first), None);
    }
}
