// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curve editor session.
//!
//! A session owns everything the editor works on for one clip: the curves,
//! their draw order, the selection, the active drag, undo history and view.
//! Every operation goes through the session so that tangents, selection and
//! draw order stay consistent with the curves after each edit.
//!
//! Edits are buffered. [`CurveEditorSession::apply`] hands the clip to a
//! [`ClipSink`] only when something changed since the last apply.

use crate::binding::{CurveBinding, PropertyDescriptor};
use crate::clip::{AnimationClipData, ClipError, ClipSink, CurveData, CLIP_FORMAT_VERSION};
use crate::curve::{Curve, CurveId, CurveSet, CurveWrapper};
use crate::draw_order::DrawOrder;
use crate::drag::{DragKind, DragMachine, DragState};
use crate::events::{AnimationEvent, EventError, EventTargetRegistry};
use crate::hierarchy::AnimationHierarchy;
use crate::hit_test::{PickHit, Picker};
use crate::history::{EditorSnapshot, History, HistoryError, HistoryStats, StateSnapshot};
use crate::keyframe::{KeyValue, Keyframe, TangentMode, TangentSide};
use crate::rotation::{self, RotationConversion, RotationError, RotationMode};
use crate::selection::{CurveSelection, HandleKind, MarqueeMode, SelectionModel};
use crate::settings::CurveEditorSettings;
use crate::tangent::TangentResolver;
use crate::view::{snap_time, ViewTransform};
use egui::{Modifiers, Pos2};
use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

/// Session errors
#[derive(Debug, Error)]
pub enum CurveError {
    /// No curve with this ID
    #[error("Unknown curve {0:?}")]
    UnknownCurve(CurveId),

    /// The curve has no key at this index
    #[error("Key index {index} out of range for curve {curve:?}")]
    KeyOutOfRange {
        /// Curve ID
        curve: CurveId,
        /// Requested index
        index: usize,
    },

    /// The curve cannot be edited
    #[error("Curve {0:?} is read-only")]
    ReadOnly(CurveId),

    /// The property cannot be animated
    #[error("Property {0} cannot be animated")]
    UnsupportedBinding(String),

    /// The property already has a curve
    #[error("Property {0} already has a curve")]
    AlreadyBound(String),

    /// The key value does not match the curve's value type
    #[error("Value type does not match curve {0:?}")]
    ValueTypeMismatch(CurveId),

    /// A drag operation was requested while no drag is active
    #[error("No drag in progress")]
    NoActiveDrag,

    /// Undo history failure
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Rotation conversion failure
    #[error(transparent)]
    Rotation(#[from] RotationError),

    /// Clip persistence failure
    #[error(transparent)]
    Clip(#[from] ClipError),

    /// Event validation failure
    #[error(transparent)]
    Event(#[from] EventError),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, CurveError>;

/// Editing state for one animation clip
#[derive(Debug)]
pub struct CurveEditorSession {
    clip_name: String,
    frame_rate: f32,
    curves: CurveSet,
    draw_order: DrawOrder,
    selection: SelectionModel,
    drag: DragMachine,
    events: Vec<AnimationEvent>,
    history: History,
    /// State before the active key or tangent drag
    pending_before: Option<StateSnapshot>,
    revision: u64,
    saved_revision: u64,
    /// Editor settings
    pub settings: CurveEditorSettings,
    /// Curve view transform
    pub view: ViewTransform,
}

impl CurveEditorSession {
    /// Create an empty session
    pub fn new(settings: CurveEditorSettings) -> Self {
        let history = History::with_max_depth(settings.history_depth);
        Self {
            clip_name: String::new(),
            frame_rate: settings.frame_rate,
            curves: CurveSet::new(),
            draw_order: DrawOrder::new(),
            selection: SelectionModel::new(),
            drag: DragMachine::new(),
            events: Vec::new(),
            history,
            pending_before: None,
            revision: 0,
            saved_revision: 0,
            settings,
            view: ViewTransform::default(),
        }
    }

    /// Create a session editing a clip
    pub fn with_clip(clip: &AnimationClipData, settings: CurveEditorSettings) -> Self {
        let mut session = Self::new(settings);
        session.refresh(clip);
        session.frame_all();
        session
    }

    // --- Accessors ---

    /// Clip name
    pub fn clip_name(&self) -> &str {
        &self.clip_name
    }

    /// Clip frame rate
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// All curves in insertion order
    pub fn curves(&self) -> &CurveSet {
        &self.curves
    }

    /// Get a curve
    pub fn curve(&self, id: CurveId) -> Option<&CurveWrapper> {
        self.curves.get(&id)
    }

    /// Curve bound to a property
    pub fn curve_for(&self, binding: &CurveBinding) -> Option<&CurveWrapper> {
        self.curves.values().find(|c| c.binding == *binding)
    }

    /// Whether a property has a curve
    pub fn is_bound(&self, binding: &CurveBinding) -> bool {
        self.curve_for(binding).is_some()
    }

    /// Draw order
    pub fn draw_order(&self) -> &DrawOrder {
        &self.draw_order
    }

    /// Current selection
    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    /// Drag state
    pub fn drag_state(&self) -> &DragState {
        self.drag.state()
    }

    /// Active drag machine
    pub fn drag(&self) -> &DragMachine {
        &self.drag
    }

    /// Clip events, sorted by time
    pub fn events(&self) -> &[AnimationEvent] {
        &self.events
    }

    /// Edit counter, bumped on every recorded change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether there are changes not yet applied
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// Undo history statistics
    pub fn history_stats(&self) -> HistoryStats {
        self.history.stats()
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Description of the next undo step
    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }

    /// Description of the next redo step
    pub fn redo_description(&self) -> Option<&str> {
        self.history.redo_description()
    }

    /// Properties of `hierarchy` that have no curve yet
    pub fn addable_properties<'h>(&self, hierarchy: &'h AnimationHierarchy) -> Vec<&'h PropertyDescriptor> {
        hierarchy.addable_properties(|b| self.is_bound(b))
    }

    /// Frame snapping rate in effect
    fn snap_rate(&self) -> Option<f32> {
        self.settings.snap_rate(self.frame_rate)
    }

    fn picker(&self) -> Picker<'_> {
        Picker::new(&self.curves, &self.draw_order, &self.view, &self.settings)
    }

    // --- Snapshots and history ---

    fn snapshot(&self) -> Result<StateSnapshot> {
        let state = EditorSnapshot::capture(&self.curves, &self.draw_order, &self.events);
        Ok(StateSnapshot::from_value(&state)?)
    }

    /// Record the change from `before` to the current state
    fn record(&mut self, description: &str, before: StateSnapshot) -> Result<bool> {
        let after = self.snapshot()?;
        let recorded = self.history.commit(description, before, after).is_some();
        if recorded {
            self.revision += 1;
        }
        Ok(recorded)
    }

    fn restore(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        let state: EditorSnapshot = snapshot.to_value()?;
        self.curves = state.curve_set();
        self.draw_order = state.draw_order;
        self.events = state.events;
        self.draw_order.sync(&self.curves);
        self.selection.prune(&self.curves);
        self.selection.propagate_groups(&self.curves);
        self.revision += 1;
        Ok(())
    }

    /// Undo the last edit
    pub fn undo(&mut self) -> Result<()> {
        self.abort_drag();
        let operation = self.history.undo()?;
        self.restore(&operation.before)?;
        tracing::info!("Undo: {}", operation.description);
        Ok(())
    }

    /// Redo the last undone edit
    pub fn redo(&mut self) -> Result<()> {
        self.abort_drag();
        let operation = self.history.redo()?;
        self.restore(&operation.after)?;
        tracing::info!("Redo: {}", operation.description);
        Ok(())
    }

    // --- Clip lifecycle ---

    /// Rebuild the curves from clip data.
    ///
    /// Curves whose binding survives keep their ID, so selection and draw
    /// order carry over. Undo history is cleared.
    pub fn refresh(&mut self, clip: &AnimationClipData) {
        self.abort_drag();
        let existing: IndexMap<CurveBinding, CurveWrapper> = self
            .curves
            .drain(..)
            .map(|(_, w)| (w.binding.clone(), w))
            .collect();

        for data in &clip.curves {
            let wrapper = match existing.get(&data.binding) {
                Some(old) => CurveWrapper {
                    curve: data.curve.clone(),
                    ..old.clone()
                },
                None => CurveWrapper::new(data.binding.clone(), data.curve.clone()),
            };
            self.curves.insert(wrapper.id, wrapper);
        }

        for old in existing.values() {
            if !self.curves.contains_key(&old.id) {
                self.draw_order.remove(old.id);
            }
        }
        for id in self.curves.keys() {
            self.draw_order.push(*id);
        }

        self.clip_name = clip.name.clone();
        self.frame_rate = clip.frame_rate;
        self.events = clip.events.clone();
        assign_groups(&mut self.curves);
        self.selection.prune(&self.curves);
        self.selection.propagate_groups(&self.curves);
        self.history.clear();
        self.pending_before = None;
        self.saved_revision = self.revision;
        tracing::debug!(clip = %self.clip_name, curves = self.curves.len(), "Refreshed curve editor");
    }

    /// Current state as clip data
    pub fn to_clip_data(&self) -> AnimationClipData {
        AnimationClipData {
            version: CLIP_FORMAT_VERSION,
            name: self.clip_name.clone(),
            frame_rate: self.frame_rate,
            curves: self
                .curves
                .values()
                .map(|w| CurveData {
                    binding: w.binding.clone(),
                    curve: w.curve.clone(),
                })
                .collect(),
            events: self.events.clone(),
        }
    }

    /// Flush edits to `sink`. Nothing is written when nothing changed since
    /// the last apply. Returns whether the sink was called.
    pub fn apply(&mut self, sink: &mut dyn ClipSink) -> Result<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        sink.save(&self.to_clip_data())?;
        self.saved_revision = self.revision;
        tracing::debug!(revision = self.revision, "Applied curve edits");
        Ok(true)
    }

    // --- Curves ---

    /// Add a curve for `descriptor` with a single key at time 0
    pub fn add_curve(&mut self, descriptor: &PropertyDescriptor, initial: KeyValue) -> Result<CurveId> {
        let name = descriptor.binding.display_name();
        if !descriptor.is_keyable() {
            return Err(CurveError::UnsupportedBinding(name));
        }
        if self.is_bound(&descriptor.binding) {
            return Err(CurveError::AlreadyBound(name));
        }

        let curve = Curve::from_keys(vec![Keyframe::new(0.0, initial)]);
        let wrapper = CurveWrapper::new(descriptor.binding.clone(), curve);
        let id = wrapper.id;
        if descriptor.value_type.is_object() != wrapper.curve.is_object_curve() {
            return Err(CurveError::ValueTypeMismatch(id));
        }

        let before = self.snapshot()?;
        self.curves.insert(id, wrapper);
        self.draw_order.push(id);
        assign_groups(&mut self.curves);
        self.record("Add Curve", before)?;
        tracing::info!("Added curve {}", name);
        Ok(id)
    }

    /// Remove a curve
    pub fn remove_curve(&mut self, id: CurveId) -> Result<()> {
        if !self.curves.contains_key(&id) {
            return Err(CurveError::UnknownCurve(id));
        }
        self.abort_drag();
        let before = self.snapshot()?;
        self.curves.shift_remove(&id);
        self.draw_order.remove(id);
        self.selection.remove_curve(id);
        assign_groups(&mut self.curves);
        self.selection.propagate_groups(&self.curves);
        self.record("Remove Curve", before)?;
        Ok(())
    }

    /// Show or hide a curve
    pub fn set_hidden(&mut self, id: CurveId, hidden: bool) -> Result<()> {
        let wrapper = self.curves.get_mut(&id).ok_or(CurveError::UnknownCurve(id))?;
        wrapper.hidden = hidden;
        if hidden {
            self.selection.remove_curve(id);
            self.selection.propagate_groups(&self.curves);
        }
        Ok(())
    }

    /// Draw a curve and its group on top
    pub fn bring_to_front(&mut self, id: CurveId) {
        self.draw_order.bring_group_to_front(&self.curves, id);
    }

    // --- Keys ---

    fn editable_curve(&self, id: CurveId) -> Result<&CurveWrapper> {
        let wrapper = self.curves.get(&id).ok_or(CurveError::UnknownCurve(id))?;
        if wrapper.read_only {
            return Err(CurveError::ReadOnly(id));
        }
        Ok(wrapper)
    }

    /// Key `value` at `time` on a curve and select the key.
    ///
    /// A key within half a frame is updated in place and keeps its tangents.
    pub fn add_key(&mut self, id: CurveId, time: f32, value: KeyValue) -> Result<usize> {
        let wrapper = self.editable_curve(id)?;
        if let Some(first) = wrapper.curve.key(0) {
            if !first.value.same_kind(&value) {
                return Err(CurveError::ValueTypeMismatch(id));
            }
        }

        let time = match self.snap_rate() {
            Some(rate) => snap_time(time, rate),
            None => time,
        };
        let before = self.snapshot()?;
        let frame_rate = self.frame_rate;
        let Some(wrapper) = self.curves.get_mut(&id) else {
            return Err(CurveError::UnknownCurve(id));
        };
        let index = wrapper.curve.add_key_at(time, value, frame_rate);

        self.selection.select(CurveSelection::key(id, index));
        self.selection.propagate_groups(&self.curves);
        self.record("Add Key", before)?;
        Ok(index)
    }

    /// Add a key on the curve under `pos`, at the curve's current value
    pub fn add_key_on_curve(&mut self, pos: Pos2) -> Result<Option<(CurveId, usize)>> {
        let Some(hit) = self.picker().curve_at(pos) else {
            return Ok(None);
        };
        self.bring_to_front(hit.curve_id);
        let index = self.add_key(hit.curve_id, hit.time, KeyValue::Float(hit.value))?;
        Ok(Some((hit.curve_id, index)))
    }

    /// Delete the selected keys.
    ///
    /// A curve whose every key is selected is left untouched unless
    /// `allow_delete_last_key_in_curve` is set. Returns the number of keys deleted.
    pub fn delete_selected_keys(&mut self) -> Result<usize> {
        self.abort_drag();
        self.selection.retain_valid(&self.curves);
        let before = self.snapshot()?;
        let allow = self.settings.allow_delete_last_key_in_curve;

        let mut deleted = 0;
        for id in self.selection.curves() {
            let keys = self.selection.keys_of(id);
            let Some(wrapper) = self.curves.get_mut(&id) else {
                continue;
            };
            if wrapper.read_only {
                continue;
            }
            if wrapper.curve.remove_keys(&keys, allow) {
                deleted += keys.len();
            } else {
                tracing::warn!(curve = %wrapper.binding.display_name(), "Cannot delete the last key of a curve");
            }
        }

        if deleted > 0 {
            self.selection.clear();
            self.record("Delete Keys", before)?;
        }
        Ok(deleted)
    }

    /// Keys with any fully selected handle, per curve
    fn edited_keys(&self) -> Vec<(CurveId, usize)> {
        let mut keys: Vec<(CurveId, usize)> = Vec::new();
        for entry in self.selection.entries().iter().filter(|e| !e.semi) {
            if !keys.contains(&(entry.curve_id, entry.key)) {
                keys.push((entry.curve_id, entry.key));
            }
        }
        keys
    }

    fn edit_selected_keys(&mut self, description: &str, edit: impl Fn(&mut Keyframe)) -> Result<usize> {
        self.abort_drag();
        self.selection.retain_valid(&self.curves);
        let before = self.snapshot()?;
        let mut edited = 0;
        for (id, index) in self.edited_keys() {
            let Some(wrapper) = self.curves.get_mut(&id) else {
                continue;
            };
            if wrapper.read_only || wrapper.curve.is_object_curve() {
                continue;
            }
            if wrapper.curve.update_key(index, &edit).is_some() {
                edited += 1;
            }
        }
        if edited > 0 {
            self.record(description, before)?;
        }
        Ok(edited)
    }

    /// Set the tangent mode of both sides of the selected keys
    pub fn set_selected_tangent_mode(&mut self, mode: TangentMode) -> Result<usize> {
        self.edit_selected_keys("Set Tangent Mode", |key| TangentResolver::set_mode(key, mode))
    }

    /// Set the tangent mode of one side of the selected keys
    pub fn set_selected_side_mode(&mut self, side: TangentSide, mode: TangentMode) -> Result<usize> {
        self.edit_selected_keys("Set Tangent Mode", |key| TangentResolver::set_side_mode(key, side, mode))
    }

    /// Break or join the tangents of the selected keys
    pub fn set_selected_broken(&mut self, broken: bool) -> Result<usize> {
        let description = if broken { "Break Tangents" } else { "Join Tangents" };
        self.edit_selected_keys(description, |key| TangentResolver::set_broken(key, broken))
    }

    /// Flatten the tangents of the selected keys
    pub fn flatten_selected(&mut self) -> Result<usize> {
        self.edit_selected_keys("Flatten Tangents", TangentResolver::flatten)
    }

    // --- Selection ---

    /// Select every key of every editable curve
    pub fn select_all(&mut self) {
        self.selection.select_all(&self.curves);
    }

    /// Clear the selection
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Select keys in a time range
    pub fn select_time_range(&mut self, start: f32, end: f32, additive: bool) {
        self.selection.select_time_range(&self.curves, start, end, additive);
    }

    /// Click-select a key: shift adds, ctrl/cmd toggles, a plain click on an
    /// unselected key replaces the selection. Returns whether the key ends up selected.
    pub fn select_key(&mut self, id: CurveId, key: usize, modifiers: Modifiers) -> Result<bool> {
        let wrapper = self.curves.get(&id).ok_or(CurveError::UnknownCurve(id))?;
        if key >= wrapper.curve.len() {
            return Err(CurveError::KeyOutOfRange { curve: id, index: key });
        }

        match marquee_mode(modifiers) {
            MarqueeMode::Toggle => self.selection.toggle(id, key),
            MarqueeMode::Add => self.selection.add(CurveSelection::key(id, key)),
            MarqueeMode::Replace if !self.selection.contains(id, key) => {
                self.selection.select(CurveSelection::key(id, key));
            }
            MarqueeMode::Replace => {}
        }
        self.selection.propagate_groups(&self.curves);
        Ok(self.selection.contains(id, key))
    }

    // --- Pointer interaction ---

    /// Pointer pressed in the curve view.
    ///
    /// Picks a key or tangent handle and starts moving it, or starts a
    /// marquee when nothing is hit.
    pub fn pointer_down(&mut self, pos: Pos2, modifiers: Modifiers) -> Result<Option<PickHit>> {
        self.abort_drag();
        let hit = self.picker().pick(pos, &self.selection);

        let Some(hit) = hit else {
            if let Some(curve_hit) = self.picker().curve_at(pos) {
                self.bring_to_front(curve_hit.curve_id);
            }
            let mode = marquee_mode(modifiers);
            self.drag.begin(DragKind::Marquee { mode }, pos, &self.curves, &self.selection);
            return Ok(None);
        };

        self.bring_to_front(hit.curve_id);
        match hit.handle {
            HandleKind::Key => {
                if self.select_key(hit.curve_id, hit.key, modifiers)? {
                    self.begin_key_drag(pos, false)?;
                }
            }
            HandleKind::InTangent | HandleKind::OutTangent => {
                let side = if hit.handle == HandleKind::InTangent {
                    TangentSide::In
                } else {
                    TangentSide::Out
                };
                self.selection.select(CurveSelection::handle(hit.curve_id, hit.key, hit.handle));
                self.pending_before = Some(self.snapshot()?);
                let kind = DragKind::MoveTangent {
                    curve_id: hit.curve_id,
                    key: hit.key,
                    side,
                };
                self.drag.begin(kind, pos, &self.curves, &self.selection);
            }
        }
        Ok(Some(hit))
    }

    /// Start moving the selected keys. With `value_locked` only time changes (dope sheet).
    pub fn begin_key_drag(&mut self, pos: Pos2, value_locked: bool) -> Result<bool> {
        if self.selection.selected_keys().next().is_none() {
            return Ok(false);
        }
        self.abort_drag();
        self.pending_before = Some(self.snapshot()?);
        self.drag
            .begin(DragKind::MoveKeys { value_locked }, pos, &self.curves, &self.selection);
        Ok(true)
    }

    /// Pointer moved while pressed
    pub fn pointer_drag(&mut self, pos: Pos2) -> Result<()> {
        let snap = self.snap_rate();
        if self
            .drag
            .update(pos, &mut self.curves, &mut self.selection, &self.view, snap)
        {
            Ok(())
        } else {
            Err(CurveError::NoActiveDrag)
        }
    }

    /// Pointer released: commit the drag. Returns whether an edit was recorded.
    pub fn pointer_up(&mut self, pos: Pos2) -> Result<bool> {
        let snap = self.snap_rate();
        self.drag
            .update(pos, &mut self.curves, &mut self.selection, &self.view, snap);
        let outcome = self
            .drag
            .commit(&mut self.curves, &mut self.selection, &self.view, snap);
        self.drag.settle();
        let before = self.pending_before.take();

        let Some(outcome) = outcome else {
            return Err(CurveError::NoActiveDrag);
        };
        self.selection.propagate_groups(&self.curves);

        let description = match outcome.kind {
            DragKind::MoveKeys { .. } => "Move Keys",
            DragKind::MoveTangent { .. } => "Edit Tangent",
            DragKind::Marquee { .. } => return Ok(false),
        };
        match before {
            Some(before) if outcome.changed => self.record(description, before),
            _ => Ok(false),
        }
    }

    /// Abort the active drag, restoring the state from its start
    pub fn cancel_drag(&mut self) -> Result<()> {
        if self.abort_drag() {
            Ok(())
        } else {
            Err(CurveError::NoActiveDrag)
        }
    }

    fn abort_drag(&mut self) -> bool {
        let cancelled = self.drag.cancel(&mut self.curves, &mut self.selection);
        self.drag.settle();
        self.pending_before = None;
        cancelled
    }

    // --- Rotation ---

    fn apply_conversion(&mut self, description: &str, before: StateSnapshot, conversion: RotationConversion) -> Result<()> {
        for id in &conversion.removed {
            self.draw_order.remove(*id);
            self.selection.remove_curve(*id);
        }
        for id in &conversion.added {
            self.draw_order.push(*id);
        }
        assign_groups(&mut self.curves);
        self.selection.propagate_groups(&self.curves);
        self.record(description, before)?;
        Ok(())
    }

    /// Switch the rotation curves of the object at `path` to another mode.
    ///
    /// Only Euler to Euler switches are possible; curves are unchanged on error.
    pub fn convert_rotation(&mut self, path: &str, mode: RotationMode) -> Result<()> {
        self.abort_drag();
        let before = self.snapshot()?;
        let conversion = rotation::convert_interpolation(&mut self.curves, path, mode)?;
        self.apply_conversion("Change Rotation Interpolation", before, conversion)
    }

    /// Replace the quaternion rotation curves of the object at `path` with baked Euler curves
    pub fn bake_quaternion_rotation(&mut self, path: &str) -> Result<()> {
        self.abort_drag();
        let before = self.snapshot()?;
        let conversion = rotation::bake_quaternion_rotation(&mut self.curves, path)?;
        self.apply_conversion("Bake Rotation", before, conversion)
    }

    // --- Events ---

    /// Add an event, optionally validated against a target type
    pub fn add_event(&mut self, event: AnimationEvent, target: Option<(&EventTargetRegistry, &str)>) -> Result<Uuid> {
        if let Some((registry, type_name)) = target {
            registry.validate(type_name, &event)?;
        }
        let before = self.snapshot()?;
        let id = event.id;
        let index = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(index, event);
        self.record("Add Event", before)?;
        Ok(id)
    }

    /// Remove an event
    pub fn remove_event(&mut self, id: Uuid) -> Result<bool> {
        let Some(index) = self.events.iter().position(|e| e.id == id) else {
            return Ok(false);
        };
        let before = self.snapshot()?;
        self.events.remove(index);
        self.record("Remove Event", before)
    }

    /// Events that do not match the functions of a target type
    pub fn invalid_events(&self, registry: &EventTargetRegistry, type_name: &str) -> Vec<(Uuid, EventError)> {
        self.events
            .iter()
            .filter_map(|e| registry.validate(type_name, e).err().map(|err| (e.id, err)))
            .collect()
    }

    // --- View ---

    /// Fit the view to all visible curves
    pub fn frame_all(&mut self) {
        self.view.frame_all(&self.curves);
    }

    /// Fit the view to the curves with selected keys
    pub fn frame_selected(&mut self) {
        let selected: CurveSet = self
            .selection
            .curves()
            .into_iter()
            .filter_map(|id| self.curves.get(&id).map(|c| (id, c.clone())))
            .collect();
        if selected.is_empty() {
            self.frame_all();
        } else {
            self.view.frame_all(&selected);
        }
    }
}

impl Default for CurveEditorSession {
    fn default() -> Self {
        Self::new(CurveEditorSettings::default())
    }
}

/// Marquee and click mode for the held modifiers
pub fn marquee_mode(modifiers: Modifiers) -> MarqueeMode {
    if modifiers.command || modifiers.ctrl {
        MarqueeMode::Toggle
    } else if modifiers.shift {
        MarqueeMode::Add
    } else {
        MarqueeMode::Replace
    }
}

/// Give curves of the same vector or color property a shared group ID
fn assign_groups(curves: &mut CurveSet) {
    let mut groups: IndexMap<String, u32> = IndexMap::new();
    for wrapper in curves.values_mut() {
        wrapper.group_id = wrapper.binding.group_key().map(|key| {
            let next = groups.len() as u32;
            *groups.entry(key).or_insert(next)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ValueType;
    use crate::clip::MemorySink;
    use crate::events::EventParameter;
    use crate::keyframe::ObjectRef;
    use egui::{Rect, Vec2};

    fn position_binding(axis: &str) -> CurveBinding {
        CurveBinding::new("Body", "Transform", format!("m_LocalPosition.{axis}"))
    }

    fn clip() -> AnimationClipData {
        let mut clip = AnimationClipData::new("Walk", 10.0);
        for axis in ["x", "y", "z"] {
            clip.set_curve(
                position_binding(axis),
                Curve::from_keys(vec![
                    Keyframe::float(0.0, 0.0).with_mode(TangentMode::Linear),
                    Keyframe::float(1.0, 0.5).with_mode(TangentMode::Linear),
                    Keyframe::float(2.0, 0.0).with_mode(TangentMode::Linear),
                ]),
            );
        }
        clip
    }

    fn session() -> CurveEditorSession {
        let mut session = CurveEditorSession::with_clip(&clip(), CurveEditorSettings::default());
        // 100 px per second, 100 px per unit
        session.view = ViewTransform::new(
            Rect::from_min_size(Pos2::ZERO, Vec2::new(400.0, 200.0)),
            (0.0, 4.0),
            (-1.0, 1.0),
        );
        session
    }

    fn id_of(session: &CurveEditorSession, axis: &str) -> CurveId {
        session.curve_for(&position_binding(axis)).unwrap().id
    }

    fn key_times(session: &CurveEditorSession, id: CurveId) -> Vec<f32> {
        session.curve(id).unwrap().curve.keys().iter().map(|k| k.time).collect()
    }

    #[test]
    fn test_refresh_assigns_groups_and_keeps_ids() {
        let mut session = session();
        let x = id_of(&session, "x");
        let group = session.curve(x).unwrap().group_id;
        assert!(group.is_some());
        assert!(session.curves().values().all(|c| c.group_id == group));

        let mut changed = clip();
        changed.curves.remove(2);
        session.refresh(&changed);
        assert_eq!(id_of(&session, "x"), x);
        assert_eq!(session.curves().len(), 2);
        assert_eq!(session.draw_order().len(), 2);
        assert!(!session.is_dirty());
    }

    #[test]
    fn test_add_curve_errors() {
        let mut session = session();
        let bound = PropertyDescriptor::float("Body", "Transform", "m_LocalPosition.x");
        assert!(matches!(
            session.add_curve(&bound, KeyValue::Float(0.0)),
            Err(CurveError::AlreadyBound(_))
        ));

        let unsupported = PropertyDescriptor::new(
            CurveBinding::new("Body", "Script", "m_Callbacks"),
            ValueType::Unsupported,
        );
        assert!(matches!(
            session.add_curve(&unsupported, KeyValue::Float(0.0)),
            Err(CurveError::UnsupportedBinding(_))
        ));

        let sprite = PropertyDescriptor::new(
            CurveBinding::new("Body", "SpriteRenderer", "m_Sprite"),
            ValueType::ObjectRef,
        );
        assert!(matches!(
            session.add_curve(&sprite, KeyValue::Float(1.0)),
            Err(CurveError::ValueTypeMismatch(_))
        ));
        let id = session
            .add_curve(&sprite, KeyValue::Object(ObjectRef::new("walk.png")))
            .unwrap();
        assert!(session.curve(id).unwrap().curve.is_object_curve());
        assert_eq!(session.draw_order().topmost_first().next(), Some(id));
        assert!(session.is_dirty());
    }

    #[test]
    fn test_add_key_snaps_and_selects() {
        let mut session = session();
        let x = id_of(&session, "x");
        session.select_key(x, 2, Modifiers::NONE).unwrap();

        let index = session.add_key(x, 1.52, KeyValue::Float(0.3)).unwrap();
        assert_eq!(index, 2);
        assert_eq!(key_times(&session, x), vec![0.0, 1.0, 1.5, 2.0]);
        assert!(session.selection().contains(x, 2));
        assert!(!session.selection().contains(x, 3));
        assert!(session.selection().is_semi_selected(id_of(&session, "y"), 2));

        assert!(matches!(
            session.add_key(x, 1.0, KeyValue::Object(ObjectRef::new("a.png"))),
            Err(CurveError::ValueTypeMismatch(_))
        ));
    }

    #[test]
    fn test_delete_all_keys_is_rejected_per_curve() {
        let mut session = session();
        let x = id_of(&session, "x");
        let y = id_of(&session, "y");
        for key in 0..3 {
            session.select_key(x, key, Modifiers::SHIFT).unwrap();
        }
        session.select_key(y, 0, Modifiers::SHIFT).unwrap();

        let deleted = session.delete_selected_keys().unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(session.curve(x).unwrap().curve.len(), 3);
        assert_eq!(key_times(&session, y), vec![1.0, 2.0]);

        session.settings.allow_delete_last_key_in_curve = true;
        session.select_all();
        session.delete_selected_keys().unwrap();
        assert!(session.curves().values().all(|c| c.curve.is_empty()));
    }

    #[test]
    fn test_drag_keys_then_undo_redo() {
        let mut session = session();
        let x = id_of(&session, "x");
        let y = id_of(&session, "y");
        session.bring_to_front(x);

        let key = session.view.to_screen(1.0, 0.5);
        let hit = session.pointer_down(key, Modifiers::NONE).unwrap().unwrap();
        assert_eq!((hit.curve_id, hit.key), (x, 1));
        assert!(session.selection().is_semi_selected(y, 1));

        session.pointer_drag(key + Vec2::new(30.0, 0.0)).unwrap();
        assert!(session.pointer_up(key + Vec2::new(52.0, 0.0)).unwrap());
        assert_eq!(key_times(&session, x), vec![0.0, 1.5, 2.0]);
        // Semi-selected siblings are not committed
        assert_eq!(key_times(&session, y), vec![0.0, 1.0, 2.0]);
        assert!(matches!(session.drag_state(), DragState::Idle));

        assert_eq!(session.undo_description(), Some("Move Keys"));
        session.undo().unwrap();
        assert_eq!(key_times(&session, x), vec![0.0, 1.0, 2.0]);
        session.redo().unwrap();
        assert_eq!(key_times(&session, x), vec![0.0, 1.5, 2.0]);
    }

    #[test]
    fn test_click_without_motion_records_nothing() {
        let mut session = session();
        let key = session.view.to_screen(2.0, 0.0);
        session.pointer_down(key, Modifiers::NONE).unwrap();
        assert!(!session.pointer_up(key).unwrap());
        assert!(!session.can_undo());
    }

    #[test]
    fn test_cancel_drag_restores_curves() {
        let mut session = session();
        let before = session.to_clip_data();
        let key = session.view.to_screen(1.0, 0.5);
        session.pointer_down(key, Modifiers::NONE).unwrap();
        session.pointer_drag(key + Vec2::new(80.0, 40.0)).unwrap();
        assert_ne!(session.to_clip_data(), before);

        session.cancel_drag().unwrap();
        assert_eq!(session.to_clip_data(), before);
        assert!(matches!(session.cancel_drag(), Err(CurveError::NoActiveDrag)));
        assert!(matches!(session.pointer_up(key), Err(CurveError::NoActiveDrag)));
    }

    #[test]
    fn test_marquee_selects_without_history() {
        let mut session = session();
        let start = session.view.to_screen(0.5, 1.0);
        assert!(session.pointer_down(start, Modifiers::NONE).unwrap().is_none());
        session.pointer_drag(session.view.to_screen(1.5, 0.0)).unwrap();
        assert!(!session.pointer_up(session.view.to_screen(1.5, 0.0)).unwrap());
        assert_eq!(session.selection().selected_keys().count(), 3);
        assert!(!session.can_undo());
    }

    #[test]
    fn test_tangent_mode_edits() {
        let mut session = session();
        let x = id_of(&session, "x");
        session.select_key(x, 1, Modifiers::NONE).unwrap();

        assert_eq!(session.flatten_selected().unwrap(), 1);
        let key = &session.curve(x).unwrap().curve.keys()[1];
        assert_eq!((key.in_tangent, key.out_tangent), (0.0, 0.0));

        session.set_selected_side_mode(TangentSide::Out, TangentMode::Stepped).unwrap();
        let key = &session.curve(x).unwrap().curve.keys()[1];
        assert!(key.broken);
        assert!(key.out_tangent.is_infinite());
        assert_eq!(key.in_tangent, 0.0);

        session.set_selected_tangent_mode(TangentMode::Smooth).unwrap();
        let key = &session.curve(x).unwrap().curve.keys()[1];
        assert!(!key.broken);
        assert_eq!(key.out_tangent, 0.0);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut session = session();
        let mut sink = MemorySink::new();
        assert!(!session.apply(&mut sink).unwrap());

        let x = id_of(&session, "x");
        session.add_key(x, 3.0, KeyValue::Float(1.0)).unwrap();
        assert!(session.apply(&mut sink).unwrap());
        assert!(!session.apply(&mut sink).unwrap());
        assert_eq!(sink.saved.len(), 1);
        assert_eq!(sink.last().unwrap().curves[0].curve.len(), 4);
    }

    #[test]
    fn test_rotation_conversion() {
        let mut data = clip();
        for (axis, value) in [("x", 0.0), ("y", 0.0), ("z", 0.0), ("w", 1.0)] {
            data.set_curve(
                CurveBinding::new("Head", "Transform", format!("m_LocalRotation.{axis}")),
                Curve::from_keys(vec![Keyframe::float(0.0, value)]),
            );
        }
        let mut session = CurveEditorSession::with_clip(&data, CurveEditorSettings::default());
        let before = session.to_clip_data();

        assert!(matches!(
            session.convert_rotation("Head", RotationMode::NonBakedEuler),
            Err(CurveError::Rotation(RotationError::FromQuaternion))
        ));
        assert_eq!(session.to_clip_data(), before);

        session.bake_quaternion_rotation("Head").unwrap();
        session
            .convert_rotation("Head", RotationMode::NonBakedEuler)
            .unwrap();
        let raw = CurveBinding::new("Head", "Transform", "localEulerAnglesRaw.y");
        assert!(session.is_bound(&raw));
        assert_eq!(session.curves().len(), 6);
        assert_eq!(session.draw_order().len(), 6);

        session.undo().unwrap();
        session.undo().unwrap();
        assert_eq!(session.to_clip_data(), before);
    }

    #[test]
    fn test_events() {
        let mut session = session();
        let late = session
            .add_event(AnimationEvent::new(1.0, "B", EventParameter::None), None)
            .unwrap();
        session
            .add_event(AnimationEvent::new(0.5, "A", EventParameter::None), None)
            .unwrap();
        let names: Vec<_> = session.events().iter().map(|e| e.function_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);

        assert!(session.remove_event(late).unwrap());
        session.undo().unwrap();
        assert_eq!(session.events().len(), 2);

        let registry = EventTargetRegistry::new();
        assert!(session
            .add_event(AnimationEvent::new(0.0, "C", EventParameter::None), Some((&registry, "Footsteps")))
            .is_err());
        assert_eq!(session.invalid_events(&registry, "Footsteps").len(), 2);
    }
}
