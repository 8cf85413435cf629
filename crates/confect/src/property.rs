use std::any::Any;
use std::fmt;
use std::sync::Arc;

use confect_core::{ConfError, ParseError, TypeToken, Value};

use crate::prop_type::{PropertyType, TypeTable};

/// A single configurable value: a default plus an optional override.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    default: Value,
    /// `None` until an override is assigned.
    value: Option<Value>,
    prop_type: PropertyType,
    description: Option<String>,
}

impl Property {
    pub(crate) fn new(default: Value, prop_type: PropertyType, description: Option<String>) -> Self {
        Self {
            default,
            value: None,
            prop_type,
            description,
        }
    }

    /// Effective value: the override if one was assigned, else the default.
    pub fn value(&self) -> &Value {
        self.value.as_ref().unwrap_or(&self.default)
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn override_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_overridden(&self) -> bool {
        self.value.is_some()
    }

    pub fn prop_type(&self) -> &PropertyType {
        &self.prop_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn parse(&self, text: &str) -> Result<Value, ParseError> {
        self.prop_type.parse(text)
    }

    /// Bring an assigned value to this property's kind.
    ///
    /// Values of the property's kind pass through and ints widen to floats.
    /// Strings are never parsed here; only environment and command-line
    /// input goes through [`Property::parse`].
    pub(crate) fn coerce(&self, value: Value) -> Result<Value, ConfError> {
        let expected = self.prop_type.type_token();
        if value.type_token() == expected {
            return Ok(value);
        }
        match (value, expected) {
            (Value::Int(i), TypeToken::Float) => Ok(Value::Float(i as f64)),
            (other, _) => Err(ConfError::type_mismatch(
                self.prop_type.name(),
                other.kind_name(),
            )),
        }
    }

    pub(crate) fn set(&mut self, value: Value) {
        self.value = Some(value);
    }
}

type SpecParser = Arc<dyn Fn(&str) -> Result<Value, ParseError> + Send + Sync>;

/// Construction arguments for a [`Property`] with an explicit parser,
/// property type, or description.
///
/// ```
/// use confect::{Conf, ParseError, PropSpec, Value};
///
/// #[derive(Debug, PartialEq)]
/// enum Color { Red, Green }
///
/// let conf = Conf::new();
/// let color = conf
///     .prop(
///         PropSpec::new(Value::custom(Color::Red))
///             .custom_parser(|s| match s {
///                 "red" => Ok(Color::Red),
///                 "green" => Ok(Color::Green),
///                 _ => Err(ParseError::new("color", s, "unknown color")),
///             })
///             .description("Accent color"),
///     )
///     .unwrap();
/// assert_eq!(color.description(), Some("Accent color"));
/// ```
#[derive(Clone)]
pub struct PropSpec {
    default: Value,
    parser: Option<SpecParser>,
    prop_type: Option<PropertyType>,
    description: Option<String>,
}

impl PropSpec {
    pub fn new(default: impl Into<Value>) -> Self {
        Self {
            default: default.into(),
            parser: None,
            prop_type: None,
            description: None,
        }
    }

    /// Parse raw strings with `parser` instead of the default's kind.
    pub fn parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(&str) -> Result<Value, ParseError> + Send + Sync + 'static,
    {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// Like [`PropSpec::parser`], for parsers returning a custom type.
    pub fn custom_parser<T, F>(self, parser: F) -> Self
    where
        T: Any + fmt::Debug + PartialEq + Send + Sync,
        F: Fn(&str) -> Result<T, ParseError> + Send + Sync + 'static,
    {
        self.parser(move |s| parser(s).map(Value::custom))
    }

    pub fn prop_type(mut self, prop_type: PropertyType) -> Self {
        self.prop_type = Some(prop_type);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Resolve the property type and build the property.
    ///
    /// An explicit parser and an explicit property type are mutually
    /// exclusive. Without either, the type comes from `table`.
    pub fn build(self, table: &TypeTable) -> Result<Property, ConfError> {
        let Self {
            default,
            parser,
            prop_type,
            description,
        } = self;

        let prop_type = match (parser, prop_type) {
            (Some(_), Some(_)) => {
                return Err(ConfError::Parameter(
                    "a property takes either a parser or a property type, not both".to_string(),
                ));
            }
            (Some(parser), None) => PropertyType::with_parser(
                default.kind_name(),
                default.type_token(),
                move |s: &str| parser(s),
            ),
            (None, Some(prop_type)) => {
                if prop_type.type_token() != default.type_token() {
                    return Err(ConfError::type_mismatch(
                        prop_type.name(),
                        default.kind_name(),
                    ));
                }
                prop_type
            }
            (None, None) => table
                .resolve(&default)
                .cloned()
                .ok_or_else(|| ConfError::UnsupportedType(default.kind_name().to_string()))?,
        };

        Ok(Property::new(default, prop_type, description))
    }
}

impl fmt::Debug for PropSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropSpec")
            .field("default", &self.default)
            .field("parser", &self.parser.as_ref().map(|_| "<fn>"))
            .field("prop_type", &self.prop_type)
            .field("description", &self.description)
            .finish()
    }
}
