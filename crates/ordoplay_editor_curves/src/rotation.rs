// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rotation interpolation modes.
//!
//! A transform's rotation is animated by one of three curve sets:
//! - Baked Euler (`localEulerAnglesBaked.x/y/z`), resampled on import
//! - Non-baked Euler (`localEulerAnglesRaw.x/y/z`), interpolated as authored
//! - Quaternion (`m_LocalRotation.x/y/z/w`)
//!
//! Switching between the two Euler modes renames the bindings and keeps the
//! keys. Quaternion curves cannot be switched in place in either direction;
//! [`euler_from_quaternion_curves`] is the explicit baking step.

use crate::curve::{Curve, CurveId, CurveSet, CurveWrapper, KEY_TIME_EPSILON};
use crate::keyframe::Keyframe;
use glam::{EulerRot, Quat};
use thiserror::Error;

/// Component type owning rotation properties
pub const TRANSFORM_COMPONENT: &str = "Transform";

/// Rotation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RotationError {
    /// Quaternion curves cannot be converted in place
    #[error("Cannot convert quaternion rotation curves to another interpolation mode")]
    FromQuaternion,

    /// Euler curves cannot be converted to quaternion curves
    #[error("Cannot convert rotation curves to quaternion interpolation")]
    ToQuaternion,

    /// No rotation curves are bound on the object
    #[error("No rotation curves bound on {0:?}")]
    NotFound(String),

    /// Curves of more than one rotation mode are bound on the object
    #[error("Rotation curves on {0:?} are bound in more than one interpolation mode")]
    MixedModes(String),

    /// Some components of the rotation are not bound
    #[error("Rotation curves on {path:?} are incomplete: expected {expected}, found {found}")]
    IncompleteComponents {
        /// Object path
        path: String,
        /// Expected component count
        expected: usize,
        /// Bound component count
        found: usize,
    },
}

/// How rotation curves are interpolated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationMode {
    /// Euler angles resampled on import
    BakedEuler,
    /// Euler angles interpolated as authored
    NonBakedEuler,
    /// Quaternion components
    Quaternion,
}

impl RotationMode {
    /// Property prefix of this mode's curves
    pub fn property_prefix(&self) -> &'static str {
        match self {
            RotationMode::BakedEuler => "localEulerAnglesBaked",
            RotationMode::NonBakedEuler => "localEulerAnglesRaw",
            RotationMode::Quaternion => "m_LocalRotation",
        }
    }

    /// Component suffixes, in order
    pub fn components(&self) -> &'static [&'static str] {
        match self {
            RotationMode::Quaternion => &["x", "y", "z", "w"],
            _ => &["x", "y", "z"],
        }
    }

    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            RotationMode::BakedEuler => "Euler Angles",
            RotationMode::NonBakedEuler => "Euler Angles (Quaternion)",
            RotationMode::Quaternion => "Quaternion",
        }
    }

    /// Mode and component suffix of a rotation property name
    pub fn parse_property(property_name: &str) -> Option<(Self, &str)> {
        let (prefix, suffix) = property_name.rsplit_once('.')?;
        let mode = [
            RotationMode::BakedEuler,
            RotationMode::NonBakedEuler,
            RotationMode::Quaternion,
        ]
        .into_iter()
        .find(|m| m.property_prefix() == prefix)?;
        mode.components().contains(&suffix).then_some((mode, suffix))
    }
}

/// Curves removed and added by a conversion, in component order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationConversion {
    /// Curves that were replaced
    pub removed: Vec<CurveId>,
    /// Curves that replace them
    pub added: Vec<CurveId>,
}

/// Rotation mode of the curves bound on `path`, with their IDs in component order
fn rotation_curves(curves: &CurveSet, path: &str) -> Result<(RotationMode, Vec<CurveId>), RotationError> {
    let mut found: Vec<(RotationMode, usize, CurveId)> = curves
        .values()
        .filter(|c| c.binding.path == path && c.binding.component_type == TRANSFORM_COMPONENT)
        .filter_map(|c| {
            let (mode, suffix) = RotationMode::parse_property(&c.binding.property_name)?;
            let order = mode.components().iter().position(|s| *s == suffix)?;
            Some((mode, order, c.id))
        })
        .collect();

    let mode = found
        .first()
        .map(|(m, _, _)| *m)
        .ok_or_else(|| RotationError::NotFound(path.to_string()))?;
    if found.iter().any(|(m, _, _)| *m != mode) {
        tracing::warn!(path, "Rotation curves bound in more than one mode");
        return Err(RotationError::MixedModes(path.to_string()));
    }
    found.sort_by_key(|(_, order, _)| *order);
    found.dedup_by_key(|(_, order, _)| *order);

    let expected = mode.components().len();
    if found.len() != expected {
        return Err(RotationError::IncompleteComponents {
            path: path.to_string(),
            expected,
            found: found.len(),
        });
    }
    Ok((mode, found.into_iter().map(|(_, _, id)| id).collect()))
}

/// Replace the curves `removed` with `added`, keeping the position of the first removed curve
fn replace_curves(curves: &mut CurveSet, removed: &[CurveId], added: Vec<CurveWrapper>) -> RotationConversion {
    let position = removed
        .iter()
        .filter_map(|id| curves.get_index_of(id))
        .min()
        .unwrap_or(curves.len());
    for id in removed {
        curves.shift_remove(id);
    }

    let position = position.min(curves.len());
    let mut ids = Vec::with_capacity(added.len());
    for (offset, wrapper) in added.into_iter().enumerate() {
        ids.push(wrapper.id);
        curves.shift_insert(position + offset, wrapper.id, wrapper);
    }
    RotationConversion {
        removed: removed.to_vec(),
        added: ids,
    }
}

/// Switch the rotation curves bound on `path` to another interpolation mode.
///
/// Only Euler to Euler conversions are performed. On error the curves are
/// left untouched.
pub fn convert_interpolation(
    curves: &mut CurveSet,
    path: &str,
    target: RotationMode,
) -> Result<RotationConversion, RotationError> {
    let (source, ids) = rotation_curves(curves, path)?;
    if source == target {
        return Ok(RotationConversion::default());
    }
    if source == RotationMode::Quaternion {
        tracing::warn!(path, target = target.name(), "Quaternion rotation curves cannot be converted");
        return Err(RotationError::FromQuaternion);
    }
    if target == RotationMode::Quaternion {
        return Err(RotationError::ToQuaternion);
    }

    let added = ids
        .iter()
        .zip(target.components())
        .filter_map(|(id, suffix)| {
            let old = curves.get(id)?;
            let binding = old
                .binding
                .with_property_name(format!("{}.{suffix}", target.property_prefix()));
            let mut curve = old.curve.clone();
            curve.recalculate_tangents();
            Some(CurveWrapper {
                id: CurveId::new(),
                binding,
                curve,
                ..old.clone()
            })
        })
        .collect();

    tracing::info!(path, from = source.name(), to = target.name(), "Converted rotation curves");
    Ok(replace_curves(curves, &ids, added))
}

/// Replace the quaternion curves bound on `path` with baked Euler curves
pub fn bake_quaternion_rotation(curves: &mut CurveSet, path: &str) -> Result<RotationConversion, RotationError> {
    let (source, ids) = rotation_curves(curves, path)?;
    if source != RotationMode::Quaternion {
        return Ok(RotationConversion::default());
    }

    let components: Vec<&CurveWrapper> = ids.iter().filter_map(|id| curves.get(id)).collect();
    let [x, y, z, w] = components.as_slice() else {
        return Err(RotationError::IncompleteComponents {
            path: path.to_string(),
            expected: 4,
            found: components.len(),
        });
    };
    let euler = euler_from_quaternion_curves(&x.curve, &y.curve, &z.curve, &w.curve);

    let mode = RotationMode::BakedEuler;
    let added = euler
        .into_iter()
        .zip([x, y, z])
        .zip(mode.components())
        .map(|((curve, old), suffix)| {
            let binding = old
                .binding
                .with_property_name(format!("{}.{suffix}", mode.property_prefix()));
            let mut wrapper = CurveWrapper::new(binding, curve);
            wrapper.group_id = old.group_id;
            wrapper.region_id = old.region_id;
            wrapper
        })
        .collect();

    tracing::info!(path, "Baked quaternion rotation curves to Euler angles");
    Ok(replace_curves(curves, &ids, added))
}

/// Compute Euler angle curves (degrees, x/y/z) from quaternion component curves.
///
/// The quaternion is sampled at every key time of any component. Angles are
/// unwrapped so consecutive samples never jump by more than 180 degrees.
pub fn euler_from_quaternion_curves(x: &Curve, y: &Curve, z: &Curve, w: &Curve) -> [Curve; 3] {
    let mut times: Vec<f32> = [x, y, z, w]
        .iter()
        .flat_map(|c| c.keys().iter().map(|k| k.time))
        .collect();
    times.sort_by(f32::total_cmp);
    times.dedup_by(|a, b| (*a - *b).abs() <= KEY_TIME_EPSILON);

    let mut channels: [Vec<Keyframe>; 3] = Default::default();
    let mut previous: Option<[f32; 3]> = None;
    for time in times {
        let sample = |c: &Curve| c.evaluate_float(time).unwrap_or(0.0);
        let q = Quat::from_xyzw(sample(x), sample(y), sample(z), sample(w));
        let q = if q.length_squared() > f32::EPSILON {
            q.normalize()
        } else {
            Quat::IDENTITY
        };

        // Rotations apply Z, then X, then Y
        let (ry, rx, rz) = q.to_euler(EulerRot::YXZ);
        let mut angles = [rx.to_degrees(), ry.to_degrees(), rz.to_degrees()];
        if let Some(prev) = previous {
            for (angle, prev) in angles.iter_mut().zip(prev) {
                *angle = unwrap_degrees(*angle, prev);
            }
        }
        previous = Some(angles);

        for (channel, angle) in channels.iter_mut().zip(angles) {
            channel.push(Keyframe::float(time, angle));
        }
    }

    channels.map(|keys| Curve::from_keys(keys).with_wrap(x.pre_wrap, x.post_wrap))
}

/// Shift `angle` by whole turns to be within 180 degrees of `previous`
fn unwrap_degrees(angle: f32, previous: f32) -> f32 {
    angle + ((previous - angle) / 360.0).round() * 360.0
}
