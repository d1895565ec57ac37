// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pointer drag state machine.
//!
//! A drag starts from a snapshot of the affected curves and the selection.
//! Every update re-derives the working state from that snapshot and the
//! total pointer offset, so the same offset always yields the same curves.
//! Cancelling restores the snapshot.

use crate::curve::{Curve, CurveId, CurveSet, KEY_TIME_EPSILON};
use crate::keyframe::{KeyValue, Keyframe, TangentSide};
use crate::selection::{HandleKind, MarqueeMode, SelectionModel};
use crate::tangent::TangentResolver;
use crate::view::{snap_time, ViewTransform};
use egui::{Pos2, Rect};
use indexmap::IndexMap;

/// What a drag manipulates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragKind {
    /// Move the selected keys
    MoveKeys {
        /// Only time changes (dope sheet)
        value_locked: bool,
    },
    /// Drag one tangent handle
    MoveTangent {
        /// Curve containing the key
        curve_id: CurveId,
        /// Key index
        key: usize,
        /// Dragged side
        side: TangentSide,
    },
    /// Rubber-band selection
    Marquee {
        /// How the marquee combines with the previous selection
        mode: MarqueeMode,
    },
}

/// An active drag
#[derive(Debug, Clone)]
pub struct DragSession {
    kind: DragKind,
    origin: Pos2,
    current: Pos2,
    snapshot: IndexMap<CurveId, Curve>,
    selection_before: SelectionModel,
}

impl DragSession {
    /// Kind of drag
    pub fn kind(&self) -> DragKind {
        self.kind
    }

    /// Pointer position when the drag started
    pub fn origin(&self) -> Pos2 {
        self.origin
    }

    /// Latest pointer position
    pub fn current(&self) -> Pos2 {
        self.current
    }

    /// Marquee rectangle, for marquee drags
    pub fn marquee_rect(&self) -> Option<Rect> {
        matches!(self.kind, DragKind::Marquee { .. })
            .then(|| Rect::from_two_pos(self.origin, self.current))
    }

    /// Curves as they were when the drag started
    pub fn snapshot(&self) -> &IndexMap<CurveId, Curve> {
        &self.snapshot
    }
}

/// Drag lifecycle
#[derive(Debug, Clone, Default)]
pub enum DragState {
    /// No drag
    #[default]
    Idle,
    /// Pointer is down and moving
    Dragging(DragSession),
    /// Pointer released, the edit is being committed
    Committing,
    /// Drag aborted, snapshot restored
    Cancelled,
}

/// Result of a committed drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragOutcome {
    /// Kind of the finished drag
    pub kind: DragKind,
    /// Whether curves or selection differ from the drag start
    pub changed: bool,
}

/// Drives [`DragState`] transitions
#[derive(Debug, Clone, Default)]
pub struct DragMachine {
    state: DragState,
}

impl DragMachine {
    /// Create an idle machine
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// Active drag, if any
    pub fn session(&self) -> Option<&DragSession> {
        match &self.state {
            DragState::Dragging(session) => Some(session),
            _ => None,
        }
    }

    /// Whether a drag is in progress
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Start a drag, snapshotting the curves it may touch
    pub fn begin(&mut self, kind: DragKind, origin: Pos2, curves: &CurveSet, selection: &SelectionModel) {
        let affected: Vec<CurveId> = match kind {
            DragKind::MoveKeys { .. } => {
                let mut ids: Vec<CurveId> = Vec::new();
                for entry in selection.entries() {
                    if entry.handle == HandleKind::Key && !ids.contains(&entry.curve_id) {
                        ids.push(entry.curve_id);
                    }
                }
                ids
            }
            DragKind::MoveTangent { curve_id, .. } => vec![curve_id],
            DragKind::Marquee { .. } => Vec::new(),
        };

        let snapshot = affected
            .into_iter()
            .filter_map(|id| curves.get(&id).map(|c| (id, c.curve.clone())))
            .collect();

        tracing::debug!(?kind, "Drag started");
        self.state = DragState::Dragging(DragSession {
            kind,
            origin,
            current: origin,
            snapshot,
            selection_before: selection.clone(),
        });
    }

    /// Re-derive curves and selection for the pointer at `pos`.
    ///
    /// Returns false when no drag is active.
    pub fn update(
        &mut self,
        pos: Pos2,
        curves: &mut CurveSet,
        selection: &mut SelectionModel,
        view: &ViewTransform,
        snap_rate: Option<f32>,
    ) -> bool {
        let DragState::Dragging(session) = &mut self.state else {
            return false;
        };
        session.current = pos;
        apply(session, curves, selection, view, snap_rate, true);
        true
    }

    /// Finish the drag.
    ///
    /// Semi-selected keys were only previewed: the final edit is re-derived
    /// without them. The machine is left in `Committing` until [`Self::settle`].
    pub fn commit(
        &mut self,
        curves: &mut CurveSet,
        selection: &mut SelectionModel,
        view: &ViewTransform,
        snap_rate: Option<f32>,
    ) -> Option<DragOutcome> {
        let DragState::Dragging(session) = std::mem::replace(&mut self.state, DragState::Committing) else {
            self.state = DragState::Idle;
            return None;
        };

        apply(&session, curves, selection, view, snap_rate, false);
        let curves_changed = session
            .snapshot
            .iter()
            .any(|(id, before)| curves.get(id).is_some_and(|c| c.curve != *before));
        let changed = curves_changed || *selection != session.selection_before;

        tracing::debug!(kind = ?session.kind, changed, "Drag committed");
        Some(DragOutcome {
            kind: session.kind,
            changed,
        })
    }

    /// Abort the drag, restoring the snapshot. Returns false when no drag is active.
    pub fn cancel(&mut self, curves: &mut CurveSet, selection: &mut SelectionModel) -> bool {
        let DragState::Dragging(session) = std::mem::replace(&mut self.state, DragState::Cancelled) else {
            return false;
        };
        for (id, curve) in session.snapshot {
            if let Some(wrapper) = curves.get_mut(&id) {
                wrapper.curve = curve;
            }
        }
        *selection = session.selection_before;
        tracing::debug!("Drag cancelled");
        true
    }

    /// Return to `Idle` after a commit or cancel
    pub fn settle(&mut self) {
        if !self.is_dragging() {
            self.state = DragState::Idle;
        }
    }
}

/// Write the state for the session's current pointer position into `curves` and `selection`
fn apply(
    session: &DragSession,
    curves: &mut CurveSet,
    selection: &mut SelectionModel,
    view: &ViewTransform,
    snap_rate: Option<f32>,
    include_semi: bool,
) {
    match session.kind {
        DragKind::MoveKeys { value_locked } => {
            let (dt, dv) = view.delta_from_screen(session.current - session.origin);
            let dv = if value_locked { 0.0 } else { dv };
            *selection = session.selection_before.clone();

            for (id, original) in &session.snapshot {
                let Some(wrapper) = curves.get_mut(id) else {
                    continue;
                };
                let moved = |index: usize| {
                    session.selection_before.contains(*id, index)
                        || (include_semi && session.selection_before.is_semi_selected(*id, index))
                };

                let entries = original
                    .keys()
                    .iter()
                    .enumerate()
                    .map(|(index, key)| {
                        if moved(index) {
                            (offset_key(key, dt, dv, snap_rate), Some(index))
                        } else {
                            (key.clone(), None)
                        }
                    })
                    .collect();

                let mut curve = original.clone();
                let mapping = curve.replace_keys_tracking(entries, KEY_TIME_EPSILON);
                wrapper.curve = curve;
                selection.remap_keys(*id, &mapping);
            }
        }
        DragKind::MoveTangent { curve_id, key, side } => {
            let (Some(original), Some(wrapper)) = (session.snapshot.get(&curve_id), curves.get_mut(&curve_id)) else {
                return;
            };
            let Some(slope) = original
                .key(key)
                .and_then(|k| view.slope_from_handle(k, side, session.current))
            else {
                return;
            };
            let mut curve = original.clone();
            curve.update_key(key, |k| TangentResolver::set_tangent(k, side, slope));
            wrapper.curve = curve;
        }
        DragKind::Marquee { mode } => {
            let rect = Rect::from_two_pos(session.origin, session.current);
            selection.marquee(&session.selection_before, curves, view, rect, mode);
        }
    }
}

fn offset_key(key: &Keyframe, dt: f32, dv: f32, snap_rate: Option<f32>) -> Keyframe {
    let mut key = key.clone();
    key.time += dt;
    if let Some(rate) = snap_rate {
        key.time = snap_time(key.time, rate);
    }
    if let KeyValue::Float(value) = &mut key.value {
        *value += dv;
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CurveBinding;
    use crate::curve::CurveWrapper;
    use crate::keyframe::TangentMode;
    use crate::selection::CurveSelection;
    use egui::Vec2;

    fn view() -> ViewTransform {
        // 100 px per second, 100 px per unit
        ViewTransform::new(
            Rect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 200.0)),
            (0.0, 4.0),
            (-1.0, 1.0),
        )
    }

    fn wrapper(property: &str, group: Option<u32>) -> CurveWrapper {
        let mut wrapper = CurveWrapper::new(
            CurveBinding::new("", "Transform", property),
            Curve::from_keys(vec![
                Keyframe::float(0.0, 0.0).with_mode(TangentMode::Linear),
                Keyframe::float(1.0, 0.5).with_mode(TangentMode::Linear),
                Keyframe::float(2.0, 0.0).with_mode(TangentMode::Linear),
            ]),
        );
        wrapper.group_id = group;
        wrapper
    }

    fn setup() -> (CurveSet, Vec<CurveId>) {
        let wrappers = vec![
            wrapper("m_LocalPosition.x", Some(0)),
            wrapper("m_LocalPosition.y", Some(0)),
        ];
        let ids = wrappers.iter().map(|w| w.id).collect();
        (wrappers.into_iter().map(|w| (w.id, w)).collect(), ids)
    }

    fn times(curves: &CurveSet, id: CurveId) -> Vec<f32> {
        curves[&id].curve.keys().iter().map(|k| k.time).collect()
    }

    #[test]
    fn test_move_keys_is_derived_from_snapshot() {
        let (mut curves, ids) = setup();
        let view = view();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::key(ids[0], 1));

        let mut drag = DragMachine::new();
        let origin = Pos2::new(100.0, 100.0);
        drag.begin(DragKind::MoveKeys { value_locked: false }, origin, &curves, &selection);

        let target = origin + Vec2::new(20.0, -10.0);
        drag.update(target, &mut curves, &mut selection, &view, None);
        let first = curves[&ids[0]].curve.clone();
        drag.update(origin + Vec2::new(70.0, 40.0), &mut curves, &mut selection, &view, None);
        drag.update(target, &mut curves, &mut selection, &view, None);
        assert_eq!(curves[&ids[0]].curve, first);

        let key = &curves[&ids[0]].curve.keys()[1];
        assert!((key.time - 1.2).abs() < 1e-4);
        assert!((key.as_float().unwrap() - 0.6).abs() < 1e-4);
        assert!(selection.contains(ids[0], 1));
    }

    #[test]
    fn test_move_past_neighbour_keeps_order_and_selection() {
        let (mut curves, ids) = setup();
        let view = view();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::key(ids[0], 0));

        let mut drag = DragMachine::new();
        let origin = Pos2::new(0.0, 100.0);
        drag.begin(DragKind::MoveKeys { value_locked: true }, origin, &curves, &selection);
        drag.update(origin + Vec2::new(150.0, 0.0), &mut curves, &mut selection, &view, None);

        assert_eq!(times(&curves, ids[0]), vec![1.0, 1.5, 2.0]);
        assert!(selection.contains(ids[0], 1));
        assert_eq!(curves[&ids[0]].curve.keys()[1].as_float(), Some(0.0));
    }

    #[test]
    fn test_collision_deletes_unselected_key() {
        let (mut curves, ids) = setup();
        let view = view();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::key(ids[0], 0));

        let mut drag = DragMachine::new();
        let origin = Pos2::new(0.0, 100.0);
        drag.begin(DragKind::MoveKeys { value_locked: true }, origin, &curves, &selection);
        drag.update(origin + Vec2::new(101.0, 0.0), &mut curves, &mut selection, &view, Some(10.0));
        let outcome = drag.commit(&mut curves, &mut selection, &view, Some(10.0)).unwrap();

        assert!(outcome.changed);
        assert_eq!(times(&curves, ids[0]), vec![1.0, 2.0]);
        assert_eq!(curves[&ids[0]].curve.keys()[0].as_float(), Some(0.0));
        assert!(selection.contains(ids[0], 0));
    }

    #[test]
    fn test_semi_selection_is_previewed_not_committed() {
        let (mut curves, ids) = setup();
        let view = view();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::key(ids[0], 1));
        selection.propagate_groups(&curves);
        assert!(selection.is_semi_selected(ids[1], 1));

        let mut drag = DragMachine::new();
        let origin = Pos2::new(100.0, 100.0);
        drag.begin(DragKind::MoveKeys { value_locked: false }, origin, &curves, &selection);
        drag.update(origin + Vec2::new(0.0, -20.0), &mut curves, &mut selection, &view, None);
        assert!((curves[&ids[1]].curve.keys()[1].as_float().unwrap() - 0.7).abs() < 1e-4);

        drag.commit(&mut curves, &mut selection, &view, None);
        assert!((curves[&ids[0]].curve.keys()[1].as_float().unwrap() - 0.7).abs() < 1e-4);
        assert_eq!(curves[&ids[1]].curve.keys()[1].as_float(), Some(0.5));
        assert!(matches!(drag.state(), DragState::Committing));
        drag.settle();
        assert!(matches!(drag.state(), DragState::Idle));
    }

    #[test]
    fn test_cancel_restores_snapshot() {
        let (mut curves, ids) = setup();
        let before = curves.clone();
        let view = view();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::key(ids[0], 2));
        let selection_before = selection.clone();

        let mut drag = DragMachine::new();
        drag.begin(DragKind::MoveKeys { value_locked: false }, Pos2::ZERO, &curves, &selection);
        drag.update(Pos2::new(-250.0, 30.0), &mut curves, &mut selection, &view, None);
        assert_ne!(curves, before);

        assert!(drag.cancel(&mut curves, &mut selection));
        assert_eq!(curves, before);
        assert_eq!(selection, selection_before);
        assert!(matches!(drag.state(), DragState::Cancelled));
        assert!(!drag.cancel(&mut curves, &mut selection));
    }

    #[test]
    fn test_tangent_drag() {
        let (mut curves, ids) = setup();
        let view = view();
        let mut selection = SelectionModel::new();
        selection.select(CurveSelection::handle(ids[0], 1, HandleKind::OutTangent));

        let mut drag = DragMachine::new();
        let kind = DragKind::MoveTangent {
            curve_id: ids[0],
            key: 1,
            side: TangentSide::Out,
        };
        drag.begin(kind, Pos2::ZERO, &curves, &selection);
        // One second right and one unit up from the key at (1.0, 0.5)
        drag.update(view.to_screen(2.0, 1.5), &mut curves, &mut selection, &view, None);

        let key = &curves[&ids[0]].curve.keys()[1];
        assert!((key.out_tangent - 1.0).abs() < 1e-4);
        assert!((key.in_tangent - 1.0).abs() < 1e-4);
        assert_eq!(key.tangent_mode, TangentMode::Free);
    }

    #[test]
    fn test_marquee_drag() {
        let (mut curves, ids) = setup();
        let view = view();
        let mut selection = SelectionModel::new();

        let mut drag = DragMachine::new();
        let kind = DragKind::Marquee {
            mode: MarqueeMode::Replace,
        };
        drag.begin(kind, view.to_screen(0.5, 1.0), &curves, &selection);
        drag.update(view.to_screen(1.5, 0.0), &mut curves, &mut selection, &view, None);
        assert!(drag.session().unwrap().marquee_rect().is_some());

        let outcome = drag.commit(&mut curves, &mut selection, &view, None).unwrap();
        assert!(outcome.changed);
        assert!(selection.contains(ids[0], 1));
        assert!(selection.contains(ids[1], 1));
        assert!(!selection.contains(ids[0], 0));
    }

    #[test]
    fn test_update_without_drag() {
        let (mut curves, _) = setup();
        let mut selection = SelectionModel::new();
        let mut drag = DragMachine::new();
        assert!(!drag.update(Pos2::ZERO, &mut curves, &mut selection, &view(), None));
        assert!(drag.commit(&mut curves, &mut selection, &view(), None).is_none());
    }
}
