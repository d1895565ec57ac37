// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation events.
//!
//! Events are stored on the clip and name a function on the animated object.
//! Instead of looking functions up by reflection, target types declare the
//! functions they accept through [`EventTarget`], and an
//! [`EventTargetRegistry`] validates events against those declarations.

use crate::keyframe::ObjectRef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Event errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    /// No target type with this name is registered
    #[error("Unknown event target type: {0}")]
    UnknownTarget(String),

    /// The target does not declare the function
    #[error("{target} has no event function named {function:?}")]
    UnknownFunction {
        /// Target type name
        target: String,
        /// Requested function
        function: String,
    },

    /// The event parameter does not match the declared signature
    #[error("{function} expects a {expected:?} parameter, got {found:?}")]
    ParameterMismatch {
        /// Function name
        function: String,
        /// Declared parameter kind
        expected: EventParameterKind,
        /// Parameter kind stored on the event
        found: EventParameterKind,
    },

    /// The target rejected the call
    #[error("Event {function} failed: {reason}")]
    Invocation {
        /// Function name
        function: String,
        /// Failure reason
        reason: String,
    },
}

/// Kind of the single parameter an event function takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EventParameterKind {
    /// No parameter
    #[default]
    None,
    /// Float parameter
    Float,
    /// Integer parameter
    Int,
    /// String parameter
    String,
    /// Asset reference parameter
    Object,
}

/// Parameter value stored on an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum EventParameter {
    /// No parameter
    #[default]
    None,
    /// Float value
    Float(f32),
    /// Integer value
    Int(i32),
    /// String value
    String(String),
    /// Asset reference
    Object(ObjectRef),
}

impl EventParameter {
    /// Kind of this value
    pub fn kind(&self) -> EventParameterKind {
        match self {
            EventParameter::None => EventParameterKind::None,
            EventParameter::Float(_) => EventParameterKind::Float,
            EventParameter::Int(_) => EventParameterKind::Int,
            EventParameter::String(_) => EventParameterKind::String,
            EventParameter::Object(_) => EventParameterKind::Object,
        }
    }
}

/// An event fired when playback crosses its time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationEvent {
    /// Event ID
    pub id: Uuid,
    /// Time in seconds
    pub time: f32,
    /// Function to call on the target
    pub function_name: String,
    /// Argument passed to the function
    #[serde(default)]
    pub parameter: EventParameter,
}

impl AnimationEvent {
    /// Create an event
    pub fn new(time: f32, function_name: impl Into<String>, parameter: EventParameter) -> Self {
        Self {
            id: Uuid::new_v4(),
            time,
            function_name: function_name.into(),
            parameter,
        }
    }
}

/// A function a target accepts as an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFunction {
    /// Function name
    pub name: &'static str,
    /// Parameter kind
    pub parameter: EventParameterKind,
}

impl EventFunction {
    /// Declare an event function
    pub const fn new(name: &'static str, parameter: EventParameterKind) -> Self {
        Self { name, parameter }
    }
}

/// A type that can receive animation events
pub trait EventTarget {
    /// Type name used to look the target up
    const TYPE_NAME: &'static str;
    /// Functions this type accepts
    const FUNCTIONS: &'static [EventFunction];

    /// Handle a validated event
    fn invoke(&mut self, function: &str, parameter: &EventParameter) -> Result<(), EventError>;
}

/// Check an event against a list of declared functions
fn check<'f>(target: &str, functions: &'f [EventFunction], event: &AnimationEvent) -> Result<&'f EventFunction, EventError> {
    let function = functions
        .iter()
        .find(|f| f.name == event.function_name)
        .ok_or_else(|| EventError::UnknownFunction {
            target: target.to_string(),
            function: event.function_name.clone(),
        })?;

    let found = event.parameter.kind();
    if found != function.parameter {
        return Err(EventError::ParameterMismatch {
            function: function.name.to_string(),
            expected: function.parameter,
            found,
        });
    }
    Ok(function)
}

/// Registered event target types
#[derive(Debug, Clone, Default)]
pub struct EventTargetRegistry {
    targets: IndexMap<&'static str, &'static [EventFunction]>,
}

impl EventTargetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target type
    pub fn register<T: EventTarget>(&mut self) {
        self.targets.insert(T::TYPE_NAME, T::FUNCTIONS);
    }

    /// Registered type names
    pub fn target_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.targets.keys().copied()
    }

    /// Functions declared by a target type
    pub fn functions(&self, target: &str) -> Result<&'static [EventFunction], EventError> {
        self.targets
            .get(target)
            .copied()
            .ok_or_else(|| EventError::UnknownTarget(target.to_string()))
    }

    /// Validate an event against a target type's declarations
    pub fn validate(&self, target: &str, event: &AnimationEvent) -> Result<EventFunction, EventError> {
        check(target, self.functions(target)?, event).copied()
    }
}

/// Fire the events with `from < time <= to` on `target`, in time order.
///
/// Returns the number of events fired.
pub fn dispatch<T: EventTarget>(target: &mut T, events: &[AnimationEvent], from: f32, to: f32) -> Result<usize, EventError> {
    let mut due: Vec<&AnimationEvent> = events.iter().filter(|e| e.time > from && e.time <= to).collect();
    due.sort_by(|a, b| a.time.total_cmp(&b.time));

    for event in &due {
        check(T::TYPE_NAME, T::FUNCTIONS, event)?;
        tracing::trace!(target_type = T::TYPE_NAME, function = %event.function_name, time = event.time, "Firing animation event");
        target.invoke(&event.function_name, &event.parameter)?;
    }
    Ok(due.len())
}
