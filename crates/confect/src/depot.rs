//! Staging area for values whose group may not be declared yet.
//!
//! Configuration sources write into the depot during a load. A staged group
//! is drained into the declared group of the same name the first time that
//! group is accessed, and is then gone for good.

use confect_core::{ConfError, Value};
use indexmap::IndexMap;
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Depot {
    groups: IndexMap<String, DepotGroup>,
}

/// Staged property values for one group name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DepotGroup {
    name: String,
    properties: IndexMap<String, Value>,
}

impl Depot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The staged group `name`, created empty on first use.
    pub fn group(&mut self, name: &str) -> &mut DepotGroup {
        self.groups
            .entry(name.to_string())
            .or_insert_with(|| DepotGroup::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&DepotGroup> {
        self.groups.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Remove and return the staged group `name`.
    pub fn take(&mut self, name: &str) -> Option<DepotGroup> {
        self.groups.shift_remove(name)
    }

    pub fn groups(&self) -> impl Iterator<Item = &DepotGroup> {
        self.groups.values()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Move every value of `other` in, replacing values staged earlier
    /// for the same property.
    pub(crate) fn absorb(&mut self, other: Depot) {
        for (name, staged) in other.groups {
            let group = self.group(&name);
            group.properties.extend(staged.properties);
        }
    }

    /// Number of staged values across all groups.
    pub fn staged_count(&self) -> usize {
        self.groups.values().map(DepotGroup::len).sum()
    }
}

impl DepotGroup {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage `value`, replacing any earlier value for `property`.
    pub fn set(&mut self, property: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        debug!(group = %self.name, property, value = %value, "staged configuration value");
        self.properties.insert(property.to_string(), value);
        self
    }

    pub fn get(&self, property: &str) -> Result<&Value, ConfError> {
        self.properties
            .get(property)
            .ok_or_else(|| ConfError::unknown_property(&self.name, property))
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn into_items(self) -> impl Iterator<Item = (String, Value)> {
        self.properties.into_iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
