//! The registry: declared groups, the staging depot and the write guard.
//!
//! A [`Conf`] starts frozen. Property writes are accepted only inside a
//! mutation window, opened by [`Conf::mutate_globally`],
//! [`Conf::mutate_locally`], a group declaration, or one of the loaders.

use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use confect_core::{ConfError, FromValue, Value};
use indexmap::IndexMap;
use tracing::debug;

use crate::depot::Depot;
use crate::group::{Group, GroupDefaultSetter, GroupRef};
use crate::load::ConfSource;
use crate::prop_type::{PropertyType, TypeTable};
use crate::property::{PropSpec, Property};

/// Process-wide configuration registry.
///
/// `Conf` uses interior mutability and is deliberately `!Sync`; keep one
/// per thread, or behind your own lock.
pub struct Conf {
    frozen: Cell<bool>,
    groups: RefCell<IndexMap<String, Group>>,
    depot: RefCell<Depot>,
    types: TypeTable,
    pub(crate) modules: IndexMap<String, Arc<dyn ConfSource>>,
    pub(crate) module_path: Vec<PathBuf>,
}

impl Default for Conf {
    fn default() -> Self {
        Self::new()
    }
}

impl Conf {
    pub fn new() -> Self {
        Self::with_types(TypeTable::builtin())
    }

    /// A registry resolving property types through `types`.
    pub fn with_types(types: TypeTable) -> Self {
        Self {
            frozen: Cell::new(true),
            groups: RefCell::new(IndexMap::new()),
            depot: RefCell::new(Depot::new()),
            types,
            modules: IndexMap::new(),
            module_path: Vec::new(),
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    /// Open a write window. The registry re-freezes when the guard drops,
    /// even if an enclosing window is still open.
    pub fn mutate_globally(&self) -> MutationGuard<'_> {
        MutationGuard::new(self)
    }

    /// Open a write window whose changes are undone when the guard drops.
    ///
    /// Snapshots the group table and the depot; both are restored on drop,
    /// including groups declared inside the window.
    pub fn mutate_locally(&self) -> LocalMutationGuard<'_> {
        let groups = self.groups.borrow().clone();
        let depot = self.depot.borrow().clone();
        LocalMutationGuard {
            window: MutationGuard::new(self),
            groups: Some(groups),
            depot: Some(depot),
        }
    }

    /// Create group `name` and return a setter for its properties.
    ///
    /// ```
    /// use confect::Conf;
    ///
    /// let conf = Conf::new();
    /// {
    ///     let mut yummy = conf.declare_group("yummy").unwrap();
    ///     yummy.set("kind", "seafood").unwrap();
    ///     yummy.set("weight", 10).unwrap();
    /// }
    /// assert_eq!(conf.get_as::<i64>("yummy", "weight").unwrap(), 10);
    /// assert!(conf.set("yummy", "weight", 20).is_err());
    /// ```
    pub fn declare_group(&self, name: &str) -> Result<GroupDefaultSetter<'_>, ConfError> {
        let mut groups = self.groups.borrow_mut();
        if groups.contains_key(name) {
            return Err(ConfError::GroupExists(name.to_string()));
        }
        let window = MutationGuard::new(self);
        groups.insert(name.to_string(), Group::new(name));
        debug!(group = name, "declared configuration group");
        Ok(GroupDefaultSetter::new(self, name, window))
    }

    /// Create group `name` with inline defaults. Nothing is registered if
    /// any default has no known property type.
    pub fn declare_group_with<I, K, V>(&self, name: &str, defaults: I) -> Result<(), ConfError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        if self.contains(name) {
            return Err(ConfError::GroupExists(name.to_string()));
        }
        let mut group = Group::new(name);
        for (property, default) in defaults {
            group.insert(property.as_ref(), self.prop(PropSpec::new(default))?);
        }
        let _window = self.mutate_globally();
        self.groups.borrow_mut().insert(name.to_string(), group);
        debug!(group = name, "declared configuration group");
        Ok(())
    }

    /// Handle to group `name`, first draining any values staged for it.
    pub fn group(&self, name: &str) -> Result<GroupRef<'_>, ConfError> {
        let mut groups = self.groups.borrow_mut();
        let group = groups
            .get_mut(name)
            .ok_or_else(|| ConfError::UnknownGroup(name.to_string()))?;
        if let Some(staged) = self.depot.borrow_mut().take(name) {
            debug!(group = name, staged = staged.len(), "reconciling staged values");
            group.reconcile(staged);
        }
        Ok(GroupRef::new(self, name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.borrow().contains_key(name)
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.borrow().keys().cloned().collect()
    }

    pub fn get(&self, group: &str, property: &str) -> Result<Value, ConfError> {
        self.group(group)?.get(property)
    }

    pub fn get_as<T: FromValue>(&self, group: &str, property: &str) -> Result<T, ConfError> {
        self.group(group)?.get_as(property)
    }

    pub fn set(&self, group: &str, property: &str, value: impl Into<Value>) -> Result<(), ConfError> {
        self.group(group)?.set(property, value)
    }

    pub fn get_prop(&self, group: &str, property: &str) -> Result<Property, ConfError> {
        self.group(group)?.property(property)
    }

    /// Parse `text` the way property `group.property` parses raw strings.
    pub fn parse_prop(&self, group: &str, property: &str, text: &str) -> Result<Value, ConfError> {
        self.group(group)?.parse(property, text)
    }

    /// Build a property from `spec`, resolving its type in this registry.
    pub fn prop(&self, spec: PropSpec) -> Result<Property, ConfError> {
        spec.build(&self.types)
    }

    /// Add a property type, replacing any earlier one for the same kind.
    pub fn register_type(&mut self, prop_type: PropertyType) -> Option<PropertyType> {
        debug!(kind = prop_type.name(), "registered property type");
        self.types.register(prop_type)
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Groups are never replaced wholesale; this always fails.
    pub fn replace_group(&self, name: &str, _group: Group) -> Result<(), ConfError> {
        Err(ConfError::FrozenGroup(name.to_string()))
    }

    /// Every declared property in declaration order, after reconciling
    /// staged values.
    pub fn properties(&self) -> Vec<(String, String, Property)> {
        let names = self.group_names();
        let mut out = Vec::new();
        for name in names {
            let Ok(group) = self.group(&name) else {
                continue;
            };
            if let Ok(snapshot) = group.snapshot() {
                out.extend(
                    snapshot
                        .properties()
                        .map(|(prop, p)| (name.clone(), prop.to_string(), p.clone())),
                );
            }
        }
        out
    }

    /// Copy of the values staged for groups not yet accessed.
    pub fn staged(&self) -> Depot {
        self.depot.borrow().clone()
    }

    pub(crate) fn with_depot<R>(&self, f: impl FnOnce(&mut Depot) -> R) -> R {
        f(&mut self.depot.borrow_mut())
    }

    pub(crate) fn with_group<R>(
        &self,
        name: &str,
        f: impl FnOnce(&Group) -> Result<R, ConfError>,
    ) -> Result<R, ConfError> {
        let groups = self.groups.borrow();
        let group = groups
            .get(name)
            .ok_or_else(|| ConfError::UnknownGroup(name.to_string()))?;
        f(group)
    }

    pub(crate) fn with_group_mut<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Group) -> Result<R, ConfError>,
    ) -> Result<R, ConfError> {
        let mut groups = self.groups.borrow_mut();
        let group = groups
            .get_mut(name)
            .ok_or_else(|| ConfError::UnknownGroup(name.to_string()))?;
        f(group)
    }
}

impl std::fmt::Debug for Conf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conf")
            .field("frozen", &self.frozen.get())
            .field("groups", &self.groups.borrow())
            .field("staged", &self.depot.borrow().staged_count())
            .finish_non_exhaustive()
    }
}

/// Keeps a [`Conf`] writable; re-freezes it on drop.
#[must_use = "the registry re-freezes as soon as the guard is dropped"]
pub struct MutationGuard<'a> {
    conf: &'a Conf,
}

impl<'a> MutationGuard<'a> {
    fn new(conf: &'a Conf) -> Self {
        conf.frozen.set(false);
        Self { conf }
    }
}

impl Deref for MutationGuard<'_> {
    type Target = Conf;

    fn deref(&self) -> &Conf {
        self.conf
    }
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.conf.frozen.set(true);
    }
}

/// A write window that restores the registry's prior state on drop.
#[must_use = "changes are reverted as soon as the guard is dropped"]
pub struct LocalMutationGuard<'a> {
    window: MutationGuard<'a>,
    groups: Option<IndexMap<String, Group>>,
    depot: Option<Depot>,
}

impl Deref for LocalMutationGuard<'_> {
    type Target = Conf;

    fn deref(&self) -> &Conf {
        self.window.conf
    }
}

impl Drop for LocalMutationGuard<'_> {
    fn drop(&mut self) {
        let conf = self.window.conf;
        if let Some(groups) = self.groups.take() {
            *conf.groups.borrow_mut() = groups;
        }
        if let Some(depot) = self.depot.take() {
            *conf.depot.borrow_mut() = depot;
        }
        debug!("restored configuration after local mutation");
    }
}

#[cfg(test)]
#[path = "conf_tests.rs"]
mod tests;
