//! Directory-entry tree of the IIS 6 metabase.
//!
//! Every node has a name, a schema class and a bag of properties. Sites are
//! `IIsWebServer` children of the `W3SVC` node named by their numeric
//! identifier; virtual directories and applications hang off each site's
//! `ROOT` node; pools live under the `AppPools` container.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::names_match;

/// Schema class of the `W3SVC` web service node.
pub const WEB_SERVICE: &str = "IIsWebService";
/// Schema class of a site node.
pub const WEB_SERVER: &str = "IIsWebServer";
/// Schema class of a virtual directory (and of an application root).
pub const WEB_VIRTUAL_DIR: &str = "IIsWebVirtualDir";
/// Schema class of a plain directory below a virtual directory.
pub const WEB_DIRECTORY: &str = "IIsWebDirectory";
/// Schema class of the pool container node.
pub const APPLICATION_POOLS: &str = "IIsApplicationPools";
/// Schema class of a pool node.
pub const APPLICATION_POOL: &str = "IIsApplicationPool";

/// Name of the pool container below `W3SVC`.
pub const APP_POOLS_NODE: &str = "AppPools";
/// Name of a site's root virtual directory.
pub const ROOT_NODE: &str = "ROOT";

/// A metabase property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag (`AccessRead`, `DontLog`, …).
    Flag(bool),
    /// Integer value (`AppIsolated`, …).
    Number(i64),
    /// Single string (`ServerComment`, `Path`, …).
    Text(String),
    /// Multi-valued string list (`ScriptMaps`, `SSLCertHash`, …).
    List(Vec<String>),
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// One entry of the metabase tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetabaseNode {
    /// Node name; for sites this is the numeric identifier.
    pub name: String,
    /// Schema class name (`IIsWebServer`, `IIsWebVirtualDir`, …).
    pub class: String,
    /// Property bag.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyValue>,
    /// Child nodes in insertion order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Self>,
}

impl MetabaseNode {
    /// Create an empty node.
    #[must_use]
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            properties: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style child append.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// `true` when the node's schema class is `class` (case-insensitive).
    #[must_use]
    pub fn is_class(&self, class: &str) -> bool {
        self.class.eq_ignore_ascii_case(class)
    }

    /// Children whose schema class is one of `classes`.
    pub fn children_of_class<'a>(
        &'a self,
        classes: &'a [&'a str],
    ) -> impl Iterator<Item = &'a Self> + 'a {
        self.children
            .iter()
            .filter(move |child| classes.iter().any(|class| child.is_class(class)))
    }

    /// First child named `name` (case-insensitive).
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| names_match(&c.name, name))
    }

    /// Append a fully built child node.
    pub fn add_child(&mut self, child: Self) {
        self.children.push(child);
    }

    /// Remove and return the first child matching `predicate`.
    pub fn remove_child_where(&mut self, predicate: impl Fn(&Self) -> bool) -> Option<Self> {
        let index = self.children.iter().position(predicate)?;
        Some(self.children.remove(index))
    }

    /// Raw property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// String property value, if the property holds a single string.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(PropertyValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Flag property value, if the property holds a boolean.
    #[must_use]
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.properties.get(key) {
            Some(PropertyValue::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    /// List property value; a missing or scalar property reads as empty.
    #[must_use]
    pub fn list(&self, key: &str) -> &[String] {
        match self.properties.get(key) {
            Some(PropertyValue::List(values)) => values,
            _ => &[],
        }
    }

    /// Set (or replace) a property.
    pub fn set(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Append `value` to a list property, creating the list if needed.
    ///
    /// A scalar value already stored under `key` is replaced by the list.
    pub fn push_to_list(&mut self, key: &str, value: impl Into<String>) {
        let mut values = self.list(key).to_vec();
        values.push(value.into());
        self.set(key, values);
    }
}

/// The metabase document rooted at the `W3SVC` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metabase {
    /// The `W3SVC` web service node.
    pub root: MetabaseNode,
}

impl Default for Metabase {
    fn default() -> Self {
        let pools = MetabaseNode::new(APP_POOLS_NODE, APPLICATION_POOLS)
            .with_child(MetabaseNode::new("DefaultAppPool", APPLICATION_POOL));
        Self {
            root: MetabaseNode::new("W3SVC", WEB_SERVICE).with_child(pools),
        }
    }
}

impl Metabase {
    /// The `AppPools` container, if present.
    #[must_use]
    pub fn app_pools(&self) -> Option<&MetabaseNode> {
        self.root
            .children_of_class(&[APPLICATION_POOLS])
            .find(|node| names_match(&node.name, APP_POOLS_NODE))
    }

    /// Mutable access to the `AppPools` container, if present.
    pub fn app_pools_mut(&mut self) -> Option<&mut MetabaseNode> {
        self.root.children.iter_mut().find(|node| {
            node.is_class(APPLICATION_POOLS) && names_match(&node.name, APP_POOLS_NODE)
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn default_document_has_default_pool() {
        let doc = Metabase::default();
        assert!(doc.root.is_class(WEB_SERVICE));
        let pools = doc.app_pools().expect("AppPools container");
        assert!(pools.child("defaultapppool").is_some());
    }

    #[test]
    fn children_of_class_filters_by_schema() {
        let node = MetabaseNode::new("W3SVC", WEB_SERVICE)
            .with_child(MetabaseNode::new("1", WEB_SERVER))
            .with_child(MetabaseNode::new("Filters", "IIsFilters"))
            .with_child(MetabaseNode::new("2", "iiswebserver"));
        let names: Vec<&str> = node
            .children_of_class(&[WEB_SERVER])
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["1", "2"]);
    }

    #[test]
    fn typed_property_accessors() {
        let node = MetabaseNode::new("1", WEB_SERVER)
            .with("ServerComment", "Site")
            .with("AccessRead", true)
            .with("SSLCertHash", vec!["AB".to_string()]);
        assert_eq!(node.text("ServerComment"), Some("Site"));
        assert_eq!(node.flag("AccessRead"), Some(true));
        assert_eq!(node.list("SSLCertHash"), ["AB".to_string()]);
        assert_eq!(node.text("AccessRead"), None);
        assert!(node.list("ScriptMaps").is_empty());
    }

    #[test]
    fn push_to_list_appends() {
        let mut node = MetabaseNode::new("v", WEB_VIRTUAL_DIR);
        node.push_to_list("ScriptMaps", "a");
        node.push_to_list("ScriptMaps", "b");
        assert_eq!(node.list("ScriptMaps"), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn remove_child_where_removes_first_match() {
        let mut node = MetabaseNode::new("ROOT", WEB_VIRTUAL_DIR)
            .with_child(MetabaseNode::new("a", WEB_VIRTUAL_DIR))
            .with_child(MetabaseNode::new("b", WEB_DIRECTORY));
        let removed = node.remove_child_where(|c| c.name == "b").unwrap();
        assert_eq!(removed.name, "b");
        assert_eq!(node.children.len(), 1);
        assert!(node.remove_child_where(|c| c.name == "zzz").is_none());
    }

    #[test]
    fn property_values_serialize_untagged() {
        let node = MetabaseNode::new("1", WEB_SERVER)
            .with("LogType", "0")
            .with("AppIsolated", 2_i64)
            .with("AccessRead", true);
        let json = serde_json::to_string(&node).unwrap();
        let back: MetabaseNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
