// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe curve editing for OrdoPlay Editor.
//!
//! This crate provides the editing core behind the animation curve editor
//! and dope sheet:
//! - Hermite keyframe curves with smooth, free, linear and stepped tangents
//! - Property bindings and the addable-property hierarchy
//! - Key and tangent handle selection with vector/color group propagation
//! - Picking, marquee selection and draw order
//! - Drag state machine for moving keys and tangents
//! - Rotation interpolation modes and quaternion baking
//! - Filled regions between curve pairs
//! - Animation events
//! - Undo/redo and buffered apply to a clip sink
//!
//! ## Architecture
//!
//! The editor is built on:
//! - [`CurveEditorSession`], which owns curves, selection, drag and history
//! - Pure data modules (`curve`, `keyframe`, `tangent`, `selection`) that the
//!   session keeps consistent
//! - [`CurveEditorPanel`], an egui front end mapping input to session operations

pub mod binding;
pub mod clip;
pub mod curve;
pub mod drag;
pub mod draw_order;
pub mod events;
pub mod hierarchy;
pub mod history;
pub mod keyframe;
pub mod region;
pub mod rotation;
pub mod selection;
pub mod session;
pub mod settings;
pub mod tangent;
pub mod ui;
pub mod view;

pub use binding::{CurveBinding, PropertyDescriptor, ValueType};
pub use clip::{AnimationClipData, ClipError, ClipSink, CurveData, MemorySink, RonFileSink};
pub use curve::{Curve, CurveId, CurveSet, CurveWrapper, WrapMode};
pub use drag::{DragKind, DragMachine, DragOutcome, DragState};
pub use draw_order::DrawOrder;
pub use events::{AnimationEvent, EventError, EventFunction, EventParameter, EventParameterKind, EventTarget, EventTargetRegistry};
pub use hierarchy::{AnimationHierarchy, HierarchyNode, PropertyGroup};
pub use history::{History, HistoryError, HistoryStats};
pub use hit_test::{CurveHit, PickHit, Picker};
pub use keyframe::{Interpolation, KeyValue, Keyframe, ObjectRef, TangentMode, TangentSide};
pub use region::{RegionPair, RegionStrip};
pub use rotation::{RotationConversion, RotationError, RotationMode};
pub use selection::{CurveSelection, HandleKind, MarqueeMode, SelectionModel};
pub use session::{CurveEditorSession, CurveError};
pub use settings::{CurveEditorSettings, SettingsError};
pub use tangent::TangentResolver;
pub use ui::{CurveEditorPanel, ViewMode};
pub use view::ViewTransform;
