// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation hierarchy built from the host's bindable properties.
//!
//! The hierarchy groups properties by object path and component type. It
//! backs the curve list on the left of the editor and the "add property"
//! popup, which offers animatable properties that are not yet bound.

use crate::binding::{CurveBinding, PropertyDescriptor};
use indexmap::IndexMap;

/// An animated object in the hierarchy
#[derive(Debug, Clone, Default)]
pub struct HierarchyNode {
    /// Object path ("" is the root)
    pub path: String,
    /// Properties by component type
    pub components: IndexMap<String, Vec<PropertyDescriptor>>,
}

impl HierarchyNode {
    /// Nesting depth, the root is 0
    pub fn depth(&self) -> usize {
        if self.path.is_empty() {
            0
        } else {
            self.path.split('/').count()
        }
    }

    /// Display name (last path segment)
    pub fn name(&self) -> &str {
        if self.path.is_empty() {
            "(Root)"
        } else {
            self.path.rsplit('/').next().unwrap_or(&self.path)
        }
    }
}

/// A set of properties that are added together (e.g. position x/y/z)
#[derive(Debug, Clone)]
pub struct PropertyGroup<'a> {
    /// Group label
    pub label: String,
    /// Member properties
    pub properties: Vec<&'a PropertyDescriptor>,
}

/// Tree of animatable objects, components and properties
#[derive(Debug, Clone, Default)]
pub struct AnimationHierarchy {
    nodes: IndexMap<String, HierarchyNode>,
}

impl AnimationHierarchy {
    /// Build the hierarchy, dropping properties that cannot be keyed
    pub fn from_properties(properties: &[PropertyDescriptor]) -> Self {
        let mut nodes: IndexMap<String, HierarchyNode> = IndexMap::new();
        for prop in properties.iter().filter(|p| p.is_keyable()) {
            let node = nodes
                .entry(prop.binding.path.clone())
                .or_insert_with(|| HierarchyNode {
                    path: prop.binding.path.clone(),
                    components: IndexMap::new(),
                });
            node.components
                .entry(prop.binding.component_type.clone())
                .or_default()
                .push(prop.clone());
        }
        nodes.sort_by(|a, _, b, _| a.cmp(b));
        Self { nodes }
    }

    /// Get all nodes, parents before children
    pub fn nodes(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.values()
    }

    /// Get a node by path
    pub fn node(&self, path: &str) -> Option<&HierarchyNode> {
        self.nodes.get(path)
    }

    /// Find the descriptor of a binding
    pub fn descriptor(&self, binding: &CurveBinding) -> Option<&PropertyDescriptor> {
        self.nodes
            .get(&binding.path)?
            .components
            .get(&binding.component_type)?
            .iter()
            .find(|p| p.binding == *binding)
    }

    /// Total number of keyable properties
    pub fn property_count(&self) -> usize {
        self.nodes
            .values()
            .flat_map(|n| n.components.values())
            .map(Vec::len)
            .sum()
    }

    /// Keyable properties for which `is_bound` returns false
    pub fn addable_properties(&self, is_bound: impl Fn(&CurveBinding) -> bool) -> Vec<&PropertyDescriptor> {
        self.nodes
            .values()
            .flat_map(|n| n.components.values())
            .flatten()
            .filter(|p| !is_bound(&p.binding))
            .collect()
    }

    /// Addable properties merged into vector/color groups
    pub fn addable_groups(&self, is_bound: impl Fn(&CurveBinding) -> bool) -> Vec<PropertyGroup<'_>> {
        let mut groups: IndexMap<String, PropertyGroup<'_>> = IndexMap::new();
        for prop in self.addable_properties(is_bound) {
            let key = prop
                .binding
                .group_key()
                .unwrap_or_else(|| format!("{}|{}|{}", prop.binding.path, prop.binding.component_type, prop.binding.property_name));
            groups
                .entry(key)
                .or_insert_with(|| PropertyGroup {
                    label: format!("{}.{}", prop.binding.component_type, prop.binding.base_property()),
                    properties: Vec::new(),
                })
                .properties
                .push(prop);
        }
        groups.into_values().collect()
    }
}
