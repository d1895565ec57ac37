// SPDX-License-Identifier: MIT OR Apache-2.0
//! Curve bindings and bindable property descriptions.

use serde::{Deserialize, Serialize};

/// Component suffixes that make a property part of a vector or color group
const GROUP_SUFFIXES: &[&str] = &["x", "y", "z", "w", "r", "g", "b", "a"];

/// The property a curve animates: object path, component type and property name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurveBinding {
    /// Path of the target object relative to the animated root ("" is the root)
    pub path: String,
    /// Component type name
    pub component_type: String,
    /// Property path within the component
    pub property_name: String,
}

impl CurveBinding {
    /// Create a binding to a property
    pub fn new(
        path: impl Into<String>,
        component_type: impl Into<String>,
        property_name: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            component_type: component_type.into(),
            property_name: property_name.into(),
        }
    }

    /// Property name without a trailing `.x`/`.r`-style component suffix
    pub fn base_property(&self) -> &str {
        match self.component_suffix() {
            Some(suffix) => &self.property_name[..self.property_name.len() - suffix.len() - 1],
            None => &self.property_name,
        }
    }

    /// Trailing component suffix (`x`, `y`, `z`, `w`, `r`, `g`, `b`, `a`)
    pub fn component_suffix(&self) -> Option<&str> {
        let (_, suffix) = self.property_name.rsplit_once('.')?;
        GROUP_SUFFIXES.contains(&suffix).then_some(suffix)
    }

    /// Key shared by every binding of the same vector or color property
    pub fn group_key(&self) -> Option<String> {
        self.component_suffix()?;
        Some(format!("{}|{}|{}", self.path, self.component_type, self.base_property()))
    }

    /// Copy of this binding with another property name
    pub fn with_property_name(&self, property_name: impl Into<String>) -> Self {
        Self {
            path: self.path.clone(),
            component_type: self.component_type.clone(),
            property_name: property_name.into(),
        }
    }

    /// Label shown in the curve list
    pub fn display_name(&self) -> String {
        let object = if self.path.is_empty() {
            "(Root)"
        } else {
            self.path.rsplit('/').next().unwrap_or(&self.path)
        };
        format!("{object} : {}.{}", self.component_type, self.property_name)
    }

    /// Default curve color derived from the component suffix
    pub fn default_color(&self) -> [u8; 3] {
        match self.component_suffix() {
            Some("x") | Some("r") => [255, 90, 90],
            Some("y") | Some("g") => [110, 230, 110],
            Some("z") | Some("b") => [100, 150, 255],
            Some("w") | Some("a") => [220, 220, 120],
            _ => [200, 200, 200],
        }
    }
}

/// Value type of a bindable property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Floating point
    Float,
    /// Integer, keyed as float
    Int,
    /// Boolean, keyed as 0/1
    Bool,
    /// Asset reference
    ObjectRef,
    /// Anything that cannot be represented by a curve
    Unsupported,
}

impl ValueType {
    /// Whether curves can animate this type
    pub fn is_curve_supported(&self) -> bool {
        !matches!(self, ValueType::Unsupported)
    }

    /// Whether keys of this type are object references
    pub fn is_object(&self) -> bool {
        matches!(self, ValueType::ObjectRef)
    }
}

/// A property the host reports as bindable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Property binding
    pub binding: CurveBinding,
    /// Value type
    pub value_type: ValueType,
    /// Whether the host allows animating the property
    pub animatable: bool,
}

impl PropertyDescriptor {
    /// Describe an animatable property
    pub fn new(binding: CurveBinding, value_type: ValueType) -> Self {
        Self {
            binding,
            value_type,
            animatable: true,
        }
    }

    /// Describe an animatable float property
    pub fn float(
        path: impl Into<String>,
        component_type: impl Into<String>,
        property_name: impl Into<String>,
    ) -> Self {
        Self::new(CurveBinding::new(path, component_type, property_name), ValueType::Float)
    }

    /// Whether a curve can be created for this property
    pub fn is_keyable(&self) -> bool {
        self.animatable && self.value_type.is_curve_supported()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_suffix_and_group() {
        let x = CurveBinding::new("Body/Arm", "Transform", "m_LocalPosition.x");
        let y = x.with_property_name("m_LocalPosition.y");
        assert_eq!(x.component_suffix(), Some("x"));
        assert_eq!(x.base_property(), "m_LocalPosition");
        assert_eq!(x.group_key(), y.group_key());

        let plain = CurveBinding::new("", "Light", "m_Intensity");
        assert_eq!(plain.component_suffix(), None);
        assert_eq!(plain.group_key(), None);

        // Only single-component suffixes group
        let nested = CurveBinding::new("", "Material", "material._Color.rgb");
        assert_eq!(nested.group_key(), None);
    }

    #[test]
    fn test_display_name() {
        let binding = CurveBinding::new("Body/Arm", "Transform", "m_LocalPosition.x");
        assert_eq!(binding.display_name(), "Arm : Transform.m_LocalPosition.x");
    }

    #[test]
    fn test_keyable() {
        let mut prop = PropertyDescriptor::float("", "Light", "m_Intensity");
        assert!(prop.is_keyable());
        prop.animatable = false;
        assert!(!prop.is_keyable());
        prop.animatable = true;
        prop.value_type = ValueType::Unsupported;
        assert!(!prop.is_keyable());
    }
}
