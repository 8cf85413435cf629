use confect_core::{ConfError, FromValue, Value};
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::conf::{Conf, MutationGuard};
use crate::depot::DepotGroup;
use crate::property::{PropSpec, Property};

/// A named set of properties. Its property names are fixed once the
/// declaration scope that created it ends.
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    name: String,
    properties: IndexMap<String, Property>,
}

impl Group {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, name: &str) -> Result<&Property, ConfError> {
        self.properties
            .get(name)
            .ok_or_else(|| ConfError::unknown_property(&self.name, name))
    }

    /// Effective value of property `name`.
    pub fn get(&self, name: &str) -> Result<&Value, ConfError> {
        self.property(name).map(Property::value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub(crate) fn insert(&mut self, name: &str, property: Property) {
        self.properties.insert(name.to_string(), property);
    }

    /// Assign an override. The caller has already checked the write window.
    pub(crate) fn set(&mut self, name: &str, value: Value) -> Result<(), ConfError> {
        let group = &self.name;
        let property = self
            .properties
            .get_mut(name)
            .ok_or_else(|| ConfError::unknown_property(group, name))?;
        let value = property.coerce(value)?;
        property.set(value);
        Ok(())
    }

    /// Copy staged values for declared properties; undeclared names are
    /// dropped.
    pub(crate) fn reconcile(&mut self, staged: DepotGroup) {
        for (name, value) in staged.into_items() {
            let Some(property) = self.properties.get_mut(&name) else {
                debug!(group = %self.name, property = %name, "dropping staged value for undeclared property");
                continue;
            };
            match property.coerce(value) {
                Ok(value) => property.set(value),
                Err(e) => warn!(group = %self.name, property = %name, "ignoring staged value: {e}"),
            }
        }
    }
}

/// Handle to a declared group, borrowed from its registry.
///
/// Reads return the live value; writes check the registry's frozen flag
/// at the time of the write.
#[derive(Clone)]
pub struct GroupRef<'a> {
    conf: &'a Conf,
    name: String,
}

impl<'a> GroupRef<'a> {
    pub(crate) fn new(conf: &'a Conf, name: &str) -> Self {
        Self {
            conf,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, property: &str) -> Result<Value, ConfError> {
        self.conf
            .with_group(&self.name, |group| group.get(property).cloned())
    }

    pub fn get_as<T: FromValue>(&self, property: &str) -> Result<T, ConfError> {
        self.get(property)?.into_typed()
    }

    /// Assign an override. Fails with [`ConfError::FrozenProp`] outside a
    /// mutation window.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<(), ConfError> {
        let value = value.into();
        self.conf.with_group_mut(&self.name, |group| {
            group.property(property)?;
            if self.conf.is_frozen() {
                return Err(ConfError::FrozenProp {
                    group: group.name().to_string(),
                    property: property.to_string(),
                });
            }
            group.set(property, value)
        })
    }

    pub fn property(&self, property: &str) -> Result<Property, ConfError> {
        self.conf
            .with_group(&self.name, |group| group.property(property).cloned())
    }

    pub fn parse(&self, property: &str, text: &str) -> Result<Value, ConfError> {
        self.conf.with_group(&self.name, |group| {
            group
                .property(property)?
                .parse(text)
                .map_err(ConfError::from)
        })
    }

    pub fn contains(&self, property: &str) -> bool {
        self.conf
            .with_group(&self.name, |group| Ok(group.property(property).is_ok()))
            .unwrap_or(false)
    }

    pub fn names(&self) -> Vec<String> {
        self.conf
            .with_group(&self.name, |group| Ok(group.names().map(str::to_string).collect()))
            .unwrap_or_default()
    }

    /// Owned copy of the group as it is now.
    pub fn snapshot(&self) -> Result<Group, ConfError> {
        self.conf.with_group(&self.name, |group| Ok(group.clone()))
    }
}

impl std::fmt::Debug for GroupRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRef")
            .field("name", &self.name)
            .field("properties", &self.names())
            .finish()
    }
}

/// Declares the properties of a freshly created group.
///
/// The registry stays unfrozen while the setter is alive; dropping it
/// closes the declaration window.
pub struct GroupDefaultSetter<'a> {
    conf: &'a Conf,
    name: String,
    _window: MutationGuard<'a>,
}

impl<'a> GroupDefaultSetter<'a> {
    pub(crate) fn new(conf: &'a Conf, name: &str, window: MutationGuard<'a>) -> Self {
        Self {
            conf,
            name: name.to_string(),
            _window: window,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare `property` with `default`, inferring its type.
    pub fn set(&mut self, property: &str, default: impl Into<Value>) -> Result<&mut Self, ConfError> {
        self.define(property, PropSpec::new(default))
    }

    /// Declare `property` from a spec carrying a parser, type or description.
    pub fn define(&mut self, property: &str, spec: PropSpec) -> Result<&mut Self, ConfError> {
        let built = self.conf.prop(spec)?;
        self.insert(property, built)
    }

    /// Declare `property` with an already built [`Property`].
    ///
    /// Fails with [`ConfError::UnknownGroup`] if an enclosing
    /// [`Conf::mutate_locally`] scope has already rolled the group back.
    pub fn insert(&mut self, property: &str, built: Property) -> Result<&mut Self, ConfError> {
        self.conf.with_group_mut(&self.name, |group| {
            group.insert(property, built);
            Ok(())
        })?;
        Ok(self)
    }

    /// Declare several properties with inferred types.
    pub fn update<I, K, V>(&mut self, defaults: I) -> Result<&mut Self, ConfError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (property, default) in defaults {
            self.set(property.as_ref(), default)?;
        }
        Ok(self)
    }
}

impl std::fmt::Debug for GroupDefaultSetter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupDefaultSetter")
            .field("name", &self.name)
            .finish()
    }
}
