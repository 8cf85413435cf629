//! Configuration sources and the loaders that stage their values.
//!
//! Every loader opens a mutation window and hands the source a
//! [`LoadContext`] buffer, which is merged into the depot when the source
//! returns. Staged values reach declared groups on their next access; see
//! [`crate::depot`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use confect_core::{ConfError, Value};
use tracing::{debug, info, warn};

use crate::conf::Conf;
use crate::depot::{Depot, DepotGroup};

/// Separator between the prefix, group and property in variable names.
pub const ENV_SEPARATOR: &str = "__";

/// Staging buffer handed to a source during one load.
///
/// Values written here reach the registry's depot when the source
/// returns, so a source may read the registry while it runs.
pub struct LoadContext<'a> {
    depot: Depot,
    origin: &'a str,
}

impl<'a> LoadContext<'a> {
    pub fn new(origin: &'a str) -> Self {
        Self {
            depot: Depot::new(),
            origin,
        }
    }

    /// The staged group `name`, created on first use.
    pub fn group(&mut self, name: &str) -> &mut DepotGroup {
        self.depot.group(name)
    }

    pub fn set(&mut self, group: &str, property: &str, value: impl Into<Value>) -> &mut Self {
        self.depot.group(group).set(property, value);
        self
    }

    /// Where the values come from, for error messages.
    pub fn origin(&self) -> &str {
        self.origin
    }

    /// Values written so far.
    pub fn staged(&self) -> &Depot {
        &self.depot
    }

    pub fn into_depot(self) -> Depot {
        self.depot
    }
}

/// Something that writes configuration values into a [`LoadContext`].
///
/// Closures taking `&mut LoadContext` implement this:
///
/// ```
/// use confect::{Conf, LoadContext};
///
/// let conf = Conf::new();
/// conf.declare_group_with("dummy", [("opt1", 3)]).unwrap();
/// conf.load_source(&|ctx: &mut LoadContext<'_>| {
///     ctx.group("dummy").set("opt1", 5);
///     Ok(())
/// })
/// .unwrap();
/// assert_eq!(conf.get_as::<i64>("dummy", "opt1").unwrap(), 5);
/// ```
pub trait ConfSource {
    fn apply(&self, ctx: &mut LoadContext<'_>) -> Result<(), ConfError>;

    fn origin(&self) -> String {
        "<source>".to_string()
    }
}

impl<F> ConfSource for F
where
    F: Fn(&mut LoadContext<'_>) -> Result<(), ConfError>,
{
    fn apply(&self, ctx: &mut LoadContext<'_>) -> Result<(), ConfError> {
        self(ctx)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
}

impl FileFormat {
    /// `.json` files are JSON; everything else is read as TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// A configuration file whose top-level tables name groups.
///
/// ```toml
/// [dummy]
/// opt1 = 5
/// opt2 = "other string"
/// ```
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
    format: FileFormat,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        Self { path, format }
    }

    pub fn with_format(path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    fn source_error(&self, message: impl Into<String>) -> ConfError {
        ConfError::Source {
            origin: self.path.display().to_string(),
            message: message.into(),
        }
    }

    fn apply_toml(&self, content: &str, ctx: &mut LoadContext<'_>) -> Result<(), ConfError> {
        let table: toml::Table =
            toml::from_str(content).map_err(|e| self.source_error(e.to_string()))?;
        for (group, item) in table {
            let toml::Value::Table(properties) = item else {
                return Err(ConfError::FrozenGroup(group));
            };
            for (property, value) in properties {
                let value = toml_to_value(value).map_err(|e| {
                    self.source_error(format!("{group}.{property}: {e}"))
                })?;
                ctx.group(&group).set(&property, value);
            }
        }
        Ok(())
    }

    fn apply_json(&self, content: &str, ctx: &mut LoadContext<'_>) -> Result<(), ConfError> {
        let json: serde_json::Value =
            serde_json::from_str(content).map_err(|e| self.source_error(e.to_string()))?;
        let serde_json::Value::Object(table) = json else {
            return Err(self.source_error("top level must be an object of groups"));
        };
        for (group, item) in table {
            let serde_json::Value::Object(properties) = item else {
                return Err(ConfError::FrozenGroup(group));
            };
            for (property, value) in properties {
                let value = crate::prop_type::json_to_value(value).map_err(|e| {
                    self.source_error(format!("{group}.{property}: {e}"))
                })?;
                ctx.group(&group).set(&property, value);
            }
        }
        Ok(())
    }
}

impl ConfSource for FileSource {
    fn apply(&self, ctx: &mut LoadContext<'_>) -> Result<(), ConfError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| ConfError::Io {
            path: self.path.clone(),
            source,
        })?;
        match self.format {
            FileFormat::Toml => self.apply_toml(&content, ctx),
            FileFormat::Json => self.apply_json(&content, ctx),
        }
    }

    fn origin(&self) -> String {
        self.path.display().to_string()
    }
}

fn toml_to_value(value: toml::Value) -> Result<Value, String> {
    Ok(match value {
        toml::Value::String(s) => Value::Str(s),
        toml::Value::Integer(i) => Value::Int(i),
        toml::Value::Float(f) => Value::Float(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => toml_datetime(&dt)?,
        toml::Value::Array(items) => Value::List(
            items
                .into_iter()
                .map(toml_to_value)
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => Value::Map(
            table
                .into_iter()
                .map(|(k, v)| toml_to_value(v).map(|v| (k, v)))
                .collect::<Result<_, _>>()?,
        ),
    })
}

#[cfg(feature = "chrono")]
fn toml_datetime(dt: &toml::value::Datetime) -> Result<Value, String> {
    use crate::prop_type::PropertyType;

    let text = dt.to_string();
    let parsed = match (dt.date, dt.time) {
        (Some(_), None) => PropertyType::Date.parse(&text),
        (Some(_), Some(_)) => PropertyType::DateTime.parse(&text),
        (None, _) => return Err(format!("local time '{text}' has no date")),
    };
    parsed.map_err(|e| e.to_string())
}

#[cfg(not(feature = "chrono"))]
fn toml_datetime(dt: &toml::value::Datetime) -> Result<Value, String> {
    Ok(Value::Str(dt.to_string()))
}

/// One `PREFIX__GROUP__PROPERTY` variable, split but not yet parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvOverride {
    pub var: String,
    pub group: String,
    pub property: String,
    pub raw: String,
}

/// Select and split the variables named `prefix__group__property`,
/// sorted by variable name.
///
/// Variables with the prefix but more or fewer than two trailing
/// segments are rejected. Non-UTF-8 variables are skipped.
pub fn env_overrides<I>(prefix: &str, vars: I) -> Result<Vec<EnvOverride>, ConfError>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let head = format!("{prefix}{ENV_SEPARATOR}");
    let mut selected = Vec::new();
    for (name, raw) in vars {
        let (name, raw) = match (name.into_string(), raw.into_string()) {
            (Ok(name), Ok(raw)) => (name, raw),
            (Ok(name), Err(_)) => {
                if name.starts_with(&head) {
                    warn!(var = %name, "skipping environment variable with non-UTF-8 value");
                }
                continue;
            }
            (Err(name), _) => {
                if name.to_string_lossy().starts_with(&head) {
                    warn!(var = %name.to_string_lossy(), "skipping non-UTF-8 environment variable");
                }
                continue;
            }
        };
        if name.starts_with(&head) {
            selected.push((name, raw));
        }
    }
    selected.sort();

    selected
        .into_iter()
        .map(|(var, raw)| {
            let split = var[head.len()..]
                .split_once(ENV_SEPARATOR)
                .filter(|(group, property)| {
                    !group.is_empty() && !property.is_empty() && !property.contains(ENV_SEPARATOR)
                })
                .map(|(group, property)| (group.to_string(), property.to_string()));
            match split {
                Some((group, property)) => Ok(EnvOverride {
                    var,
                    group,
                    property,
                    raw,
                }),
                None => Err(ConfError::MalformedEnvVar(var)),
            }
        })
        .collect()
}

impl Conf {
    /// Run `source` against the depot inside a mutation window.
    ///
    /// Values written before a failure stay staged.
    pub fn load_source(&self, source: &dyn ConfSource) -> Result<(), ConfError> {
        let origin = source.origin();
        let _window = self.mutate_globally();
        let mut ctx = LoadContext::new(&origin);
        let result = source.apply(&mut ctx);
        let written = ctx.into_depot();
        let staged = written.staged_count();
        self.with_depot(|depot| depot.absorb(written));
        result?;
        info!(origin = %origin, staged, "loaded configuration");
        Ok(())
    }

    /// Load a TOML (or `.json`) file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(), ConfError> {
        self.load_source(&FileSource::new(path.as_ref()))
    }

    /// Register an in-process source loadable by [`Conf::load_module`].
    pub fn register_module<S>(&mut self, name: &str, source: S) -> Option<Arc<dyn ConfSource>>
    where
        S: ConfSource + 'static,
    {
        self.modules.insert(name.to_string(), Arc::new(source))
    }

    /// Add a directory searched by [`Conf::load_module`].
    pub fn add_module_path(&mut self, dir: impl Into<PathBuf>) {
        self.module_path.push(dir.into());
    }

    /// Load the module `name`: a registered source, or `a/b.toml`
    /// (then `a/b.json`) for `a.b` under a search directory.
    ///
    /// Modules are not cached; loading one again re-applies it.
    pub fn load_module(&self, name: &str) -> Result<(), ConfError> {
        if let Some(source) = self.modules.get(name) {
            debug!(module = name, "loading registered module");
            return self.load_source(source.as_ref());
        }
        let path = self.find_module(name)?;
        debug!(module = name, path = %path.display(), "loading module file");
        self.load_file(path)
    }

    fn find_module(&self, name: &str) -> Result<PathBuf, ConfError> {
        let valid = name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        });
        if !valid {
            return Err(ConfError::ModuleNotFound(name.to_string()));
        }
        let relative: PathBuf = name.split('.').collect();
        for dir in &self.module_path {
            for ext in ["toml", "json"] {
                let candidate = dir.join(&relative).with_extension(ext);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        Err(ConfError::ModuleNotFound(name.to_string()))
    }

    /// Stage every `prefix__group__property` variable of the process
    /// environment, parsed by the property's type.
    pub fn load_envvars(&self, prefix: &str) -> Result<(), ConfError> {
        self.load_envvars_from(prefix, std::env::vars_os())
    }

    /// [`Conf::load_envvars`] over an explicit variable list.
    pub fn load_envvars_from<I>(&self, prefix: &str, vars: I) -> Result<(), ConfError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let overrides = env_overrides(prefix, vars)?;
        let _window = self.mutate_globally();
        for entry in &overrides {
            let value = self.group(&entry.group)?.parse(&entry.property, &entry.raw)?;
            debug!(var = %entry.var, "staging environment override");
            self.with_depot(|depot| {
                depot.group(&entry.group).set(&entry.property, value);
            });
        }
        info!(prefix, staged = overrides.len(), "loaded environment variables");
        Ok(())
    }
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
