// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions for animation curves.

use serde::{Deserialize, Serialize};

/// Reference to an asset animated by an object-reference curve
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Asset path
    pub path: String,
    /// Sub-asset name (sprite in an atlas, mesh in a model)
    pub sub_asset: Option<String>,
}

impl ObjectRef {
    /// Create a reference to an asset
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sub_asset: None,
        }
    }

    /// Create a reference to a sub-asset
    pub fn sub_asset(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sub_asset: Some(name.into()),
        }
    }
}

/// Value stored in a keyframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyValue {
    /// Scalar value
    Float(f32),
    /// Object reference, held until the next key
    Object(ObjectRef),
}

impl KeyValue {
    /// Get as float if possible
    pub fn as_float(&self) -> Option<f32> {
        match self {
            KeyValue::Float(v) => Some(*v),
            KeyValue::Object(_) => None,
        }
    }

    /// Whether both values are of the same kind
    pub fn same_kind(&self, other: &KeyValue) -> bool {
        matches!(
            (self, other),
            (KeyValue::Float(_), KeyValue::Float(_)) | (KeyValue::Object(_), KeyValue::Object(_))
        )
    }
}

impl From<f32> for KeyValue {
    fn from(value: f32) -> Self {
        KeyValue::Float(value)
    }
}

/// Symbolic policy deciding how a tangent slope is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TangentMode {
    /// Averaged from the neighbouring slopes
    #[default]
    Smooth,
    /// User-edited, stored verbatim
    Free,
    /// Chord slope to the neighbour
    Linear,
    /// Holds the value until the next key
    Stepped,
}

impl TangentMode {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Smooth => "Smooth",
            Self::Free => "Free",
            Self::Linear => "Linear",
            Self::Stepped => "Stepped",
        }
    }

    /// All modes, in menu order
    pub fn all() -> &'static [TangentMode] {
        &[
            TangentMode::Smooth,
            TangentMode::Free,
            TangentMode::Linear,
            TangentMode::Stepped,
        ]
    }
}

/// Which side of a keyframe a tangent belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TangentSide {
    /// Incoming tangent (left of the key)
    In,
    /// Outgoing tangent (right of the key)
    Out,
}

impl TangentSide {
    /// The other side
    pub fn opposite(self) -> Self {
        match self {
            TangentSide::In => TangentSide::Out,
            TangentSide::Out => TangentSide::In,
        }
    }
}

/// A single timestamped sample of an animated value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Time in seconds
    pub time: f32,
    /// Value at this keyframe
    pub value: KeyValue,
    /// Incoming slope (value per second)
    pub in_tangent: f32,
    /// Outgoing slope (value per second)
    pub out_tangent: f32,
    /// Mode shared by both sides while the key is not broken
    pub tangent_mode: TangentMode,
    /// In and out tangents may differ
    pub broken: bool,
    /// Incoming side mode, only diverges from `tangent_mode` when broken
    pub in_mode: TangentMode,
    /// Outgoing side mode, only diverges from `tangent_mode` when broken
    pub out_mode: TangentMode,
}

impl Keyframe {
    /// Create a new keyframe with flat smooth tangents
    pub fn new(time: f32, value: KeyValue) -> Self {
        let mode = match value {
            KeyValue::Float(_) => TangentMode::Smooth,
            KeyValue::Object(_) => TangentMode::Stepped,
        };
        let slope = if mode == TangentMode::Stepped { f32::INFINITY } else { 0.0 };
        Self {
            time,
            value,
            in_tangent: slope,
            out_tangent: slope,
            tangent_mode: mode,
            broken: false,
            in_mode: mode,
            out_mode: mode,
        }
    }

    /// Create a scalar keyframe
    pub fn float(time: f32, value: f32) -> Self {
        Self::new(time, KeyValue::Float(value))
    }

    /// Create an object-reference keyframe
    pub fn object(time: f32, value: ObjectRef) -> Self {
        Self::new(time, KeyValue::Object(value))
    }

    /// Set explicit tangents, switching the key to `Free`
    pub fn with_tangents(mut self, in_tangent: f32, out_tangent: f32) -> Self {
        self.in_tangent = in_tangent;
        self.out_tangent = out_tangent;
        self.set_mode(TangentMode::Free);
        self.broken = in_tangent != out_tangent;
        self
    }

    /// Set the tangent mode for both sides
    pub fn with_mode(mut self, mode: TangentMode) -> Self {
        self.set_mode(mode);
        self
    }

    pub(crate) fn set_mode(&mut self, mode: TangentMode) {
        self.tangent_mode = mode;
        self.in_mode = mode;
        self.out_mode = mode;
    }

    /// Effective mode of one side
    pub fn side_mode(&self, side: TangentSide) -> TangentMode {
        if !self.broken {
            return self.tangent_mode;
        }
        match side {
            TangentSide::In => self.in_mode,
            TangentSide::Out => self.out_mode,
        }
    }

    /// Slope of one side
    pub fn tangent(&self, side: TangentSide) -> f32 {
        match side {
            TangentSide::In => self.in_tangent,
            TangentSide::Out => self.out_tangent,
        }
    }

    pub(crate) fn tangent_mut(&mut self, side: TangentSide) -> &mut f32 {
        match side {
            TangentSide::In => &mut self.in_tangent,
            TangentSide::Out => &mut self.out_tangent,
        }
    }

    /// Scalar value, if this is a float key
    pub fn as_float(&self) -> Option<f32> {
        self.value.as_float()
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Cubic Hermite interpolation.
    ///
    /// `m0` and `m1` are tangents already scaled to the segment length.
    pub fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keys_are_stepped() {
        let key = Keyframe::object(1.0, ObjectRef::new("Sprites/walk_0.png"));
        assert_eq!(key.tangent_mode, TangentMode::Stepped);
        assert!(key.in_tangent.is_infinite());
        assert!(key.out_tangent.is_infinite());
    }

    #[test]
    fn test_with_tangents_breaks_when_sides_differ() {
        let key = Keyframe::float(0.0, 1.0).with_tangents(1.0, 2.0);
        assert!(key.broken);
        assert_eq!(key.side_mode(TangentSide::In), TangentMode::Free);

        let key = Keyframe::float(0.0, 1.0).with_tangents(2.0, 2.0);
        assert!(!key.broken);
    }

    #[test]
    fn test_hermite_endpoints() {
        assert_eq!(Interpolation::hermite(1.0, 5.0, 3.0, -2.0, 0.0), 1.0);
        assert_eq!(Interpolation::hermite(1.0, 5.0, 3.0, -2.0, 1.0), 3.0);
        // Tangents matching the chord give a straight line
        let mid = Interpolation::hermite(0.0, 2.0, 2.0, 2.0, 0.5);
        assert!((mid - 1.0).abs() < 1e-6);
    }
}
