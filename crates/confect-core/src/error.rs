use std::path::PathBuf;

/// Guidance attached to every rejected write on a frozen property.
pub const FROZEN_PROP_HINT: &str = "Configuration properties are frozen. \
They can only be changed globally by loading configuration through \
`Conf::load_file()`, `Conf::load_module()` or `Conf::load_envvars()`, \
and locally inside the scope created by `Conf::mutate_locally()`.";

/// A raw string could not be converted into a property value.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot parse '{input}' as {kind}: {reason}")]
pub struct ParseError {
    /// Name of the property type that attempted the parse.
    pub kind: String,
    pub input: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(kind: impl Into<String>, input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            input: input.into(),
            reason: reason.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfError {
    #[error("Unknown configuration group '{0}'")]
    UnknownGroup(String),

    #[error("Unknown property '{property}' in configuration group '{group}'")]
    UnknownProperty { group: String, property: String },

    #[error("Cannot set '{group}.{property}': {hint}", hint = FROZEN_PROP_HINT)]
    FrozenProp { group: String, property: String },

    #[error(
        "Configuration group '{0}' is frozen: groups cannot be replaced, \
         call `Conf::declare_group()` to register a new group"
    )]
    FrozenGroup(String),

    #[error("Configuration group '{0}' already exists")]
    GroupExists(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid property parameters: {0}")]
    Parameter(String),

    #[error("No property type matches default value of kind '{0}'; supply a parser or a property type")]
    UnsupportedType(String),

    #[error("Expected a value of kind '{expected}', found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error(
        "Malformed environment variable '{0}': expected <prefix>__<group>__<property>"
    )]
    MalformedEnvVar(String),

    #[error("No configuration module named '{0}'")]
    ModuleNotFound(String),

    #[error("Failed to read configuration source {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration source {origin}: {message}")]
    Source { origin: String, message: String },
}

impl ConfError {
    pub fn unknown_property(group: &str, property: &str) -> Self {
        Self::UnknownProperty {
            group: group.to_string(),
            property: property.to_string(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// True when the error is a missing file, as opposed to an unreadable one.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_unknown_group() {
        let err = ConfError::UnknownGroup("dummy".into());
        assert_eq!(err.to_string(), "Unknown configuration group 'dummy'");
    }

    #[test]
    fn test_display_unknown_property() {
        let err = ConfError::unknown_property("dummy", "z");
        assert_eq!(
            err.to_string(),
            "Unknown property 'z' in configuration group 'dummy'"
        );
    }

    #[test]
    fn test_display_frozen_prop_names_write_paths() {
        let err = ConfError::FrozenProp {
            group: "dummy".into(),
            property: "x".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Cannot set 'dummy.x': Configuration properties are frozen."));
        assert!(msg.contains("Conf::load_file()"));
        assert!(msg.contains("Conf::load_module()"));
        assert!(msg.contains("Conf::mutate_locally()"));
    }

    #[test]
    fn test_display_group_exists() {
        let err = ConfError::GroupExists("dummy".into());
        assert_eq!(err.to_string(), "Configuration group 'dummy' already exists");
    }

    #[test]
    fn test_display_parse_is_transparent() {
        let err: ConfError = ParseError::new("int", "abc", "invalid digit").into();
        assert_eq!(err.to_string(), "Cannot parse 'abc' as int: invalid digit");
    }

    #[test]
    fn test_display_malformed_env_var() {
        let err = ConfError::MalformedEnvVar("X__a__b__c".into());
        assert_eq!(
            err.to_string(),
            "Malformed environment variable 'X__a__b__c': expected <prefix>__<group>__<property>"
        );
    }

    #[test]
    fn test_is_not_found() {
        let err = ConfError::Io {
            path: PathBuf::from("missing.toml"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_not_found());
        assert!(!ConfError::ModuleNotFound("a.b".into()).is_not_found());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfError>();
    }
}
