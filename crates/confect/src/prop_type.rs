//! Property types: how a raw string from an environment variable or a
//! command-line flag becomes a typed [`Value`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use confect_core::{ParseError, TypeToken, Value};
use indexmap::IndexMap;

#[cfg(feature = "chrono")]
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parser closure shared by clones of a custom property type.
pub type ParserFn = Arc<dyn Fn(&str) -> Result<Value, ParseError> + Send + Sync>;

const TRUE_LITERALS: &[&str] = &["1", "t", "true", "y", "yes"];
const FALSE_LITERALS: &[&str] = &["0", "f", "false", "n", "no"];

#[cfg(feature = "chrono")]
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

#[cfg(feature = "chrono")]
const DATETIME_TZ_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%z",
];

#[cfg(feature = "chrono")]
const DATETIME_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Text encoding used by the bytes property type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    fn encode(self, text: &str) -> Result<Vec<u8>, String> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Ascii => text
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u8)
                    } else {
                        Err(format!("character {c:?} is not ASCII"))
                    }
                })
                .collect(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| format!("character {c:?} is not Latin-1")))
                .collect(),
        }
    }
}

/// A user-defined kind: a name, the runtime kind it produces, and a parser.
#[derive(Clone)]
pub struct CustomType {
    name: String,
    token: TypeToken,
    parser: ParserFn,
}

impl CustomType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> TypeToken {
        self.token
    }
}

impl fmt::Debug for CustomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomType")
            .field("name", &self.name)
            .field("token", &self.token)
            .finish()
    }
}

impl PartialEq for CustomType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.token == other.token
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyType {
    Bool,
    Str,
    Int,
    Float,
    Bytes {
        encoding: Encoding,
    },
    #[cfg(feature = "chrono")]
    Date,
    /// Accepts both offset-aware and naive datetimes.
    #[cfg(feature = "chrono")]
    DateTime,
    List,
    Tuple,
    Map,
    Custom(CustomType),
}

impl PropertyType {
    /// Property type for values built with [`Value::custom`].
    ///
    /// ```
    /// use confect::{ParseError, PropertyType};
    ///
    /// #[derive(Debug, PartialEq)]
    /// enum Color { Red, Green }
    ///
    /// let color = PropertyType::custom("color", |s: &str| match s.to_ascii_lowercase().as_str() {
    ///     "red" => Ok(Color::Red),
    ///     "green" => Ok(Color::Green),
    ///     _ => Err(ParseError::new("color", s, "unknown color")),
    /// });
    /// assert_eq!(color.parse("GREEN").unwrap().downcast_ref::<Color>(), Some(&Color::Green));
    /// ```
    pub fn custom<T, F>(name: impl Into<String>, parser: F) -> Self
    where
        T: Any + fmt::Debug + PartialEq + Send + Sync,
        F: Fn(&str) -> Result<T, ParseError> + Send + Sync + 'static,
    {
        Self::Custom(CustomType {
            name: name.into(),
            token: TypeToken::of::<T>(),
            parser: Arc::new(move |s| parser(s).map(Value::custom)),
        })
    }

    /// Property type producing values of `token` through an arbitrary parser.
    ///
    /// The parser's result is checked against `token` on every parse.
    pub fn with_parser<F>(name: impl Into<String>, token: TypeToken, parser: F) -> Self
    where
        F: Fn(&str) -> Result<Value, ParseError> + Send + Sync + 'static,
    {
        Self::Custom(CustomType {
            name: name.into(),
            token,
            parser: Arc::new(parser),
        })
    }

    pub fn bytes(encoding: Encoding) -> Self {
        Self::Bytes { encoding }
    }

    pub fn type_token(&self) -> TypeToken {
        match self {
            Self::Bool => TypeToken::Bool,
            Self::Str => TypeToken::Str,
            Self::Int => TypeToken::Int,
            Self::Float => TypeToken::Float,
            Self::Bytes { .. } => TypeToken::Bytes,
            #[cfg(feature = "chrono")]
            Self::Date => TypeToken::Date,
            #[cfg(feature = "chrono")]
            Self::DateTime => TypeToken::DateTime,
            Self::List => TypeToken::List,
            Self::Tuple => TypeToken::Tuple,
            Self::Map => TypeToken::Map,
            Self::Custom(custom) => custom.token,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Custom(custom) => &custom.name,
            other => other.type_token().as_str(),
        }
    }

    /// Placeholder shown for the flag value in `--help` output.
    pub fn metavar(&self) -> String {
        match self {
            Self::Bool => "BOOLEAN".to_string(),
            Self::Str => "TEXT".to_string(),
            Self::Int => "INTEGER".to_string(),
            Self::Float => "FLOAT".to_string(),
            Self::Custom(custom) => custom.name.to_uppercase(),
            other => other.name().to_uppercase(),
        }
    }

    pub fn parse(&self, text: &str) -> Result<Value, ParseError> {
        match self {
            Self::Bool => parse_bool(text),
            Self::Str => Ok(Value::Str(text.to_string())),
            Self::Int => parse_int(text).map(Value::Int),
            Self::Float => parse_float(text),
            Self::Bytes { encoding } => encoding
                .encode(text)
                .map(Value::Bytes)
                .map_err(|reason| ParseError::new("bytes", text, reason)),
            #[cfg(feature = "chrono")]
            Self::Date => parse_date(text).map(Value::Date),
            #[cfg(feature = "chrono")]
            Self::DateTime => parse_datetime(text),
            Self::List => match parse_json(text, "list")? {
                Value::List(items) => Ok(Value::List(items)),
                other => Err(shape_error("list", text, &other)),
            },
            Self::Tuple => match parse_json(text, "tuple")? {
                Value::List(items) => Ok(Value::Tuple(items)),
                other => Err(shape_error("tuple", text, &other)),
            },
            Self::Map => match parse_json(text, "map")? {
                Value::Map(entries) => Ok(Value::Map(entries)),
                other => Err(shape_error("map", text, &other)),
            },
            Self::Custom(custom) => {
                let value = (custom.parser)(text)?;
                if value.type_token() != custom.token {
                    return Err(ParseError::new(
                        custom.name.as_str(),
                        text,
                        format!("parser produced a value of kind '{}'", value.kind_name()),
                    ));
                }
                Ok(value)
            }
        }
    }
}

/// Ordered table of known property types, keyed by the runtime kind they
/// produce. Each registry owns its own table.
#[derive(Clone, Debug)]
pub struct TypeTable {
    kinds: IndexMap<TypeToken, PropertyType>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TypeTable {
    /// The builtin kinds. Date and datetime are present only with the
    /// `chrono` feature.
    pub fn builtin() -> Self {
        let mut table = Self {
            kinds: IndexMap::new(),
        };
        for kind in [
            PropertyType::Bool,
            PropertyType::Str,
            PropertyType::Int,
            PropertyType::Float,
            PropertyType::bytes(Encoding::Utf8),
            PropertyType::Tuple,
            PropertyType::Map,
            PropertyType::List,
        ] {
            table.register(kind);
        }
        #[cfg(feature = "chrono")]
        {
            table.register(PropertyType::Date);
            table.register(PropertyType::DateTime);
        }
        table
    }

    /// Register a kind; a later registration for the same runtime kind
    /// replaces the earlier one and keeps its position.
    pub fn register(&mut self, prop_type: PropertyType) -> Option<PropertyType> {
        self.kinds.insert(prop_type.type_token(), prop_type)
    }

    /// The kind whose runtime type exactly matches `value`.
    ///
    /// Matching is on the exact [`TypeToken`]: a bool default never resolves
    /// to the int kind.
    pub fn resolve(&self, value: &Value) -> Option<&PropertyType> {
        self.kinds.get(&value.type_token())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyType> {
        self.kinds.values()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

fn parse_bool(text: &str) -> Result<Value, ParseError> {
    let lowered = text.trim().to_ascii_lowercase();
    if TRUE_LITERALS.contains(&lowered.as_str()) {
        Ok(Value::Bool(true))
    } else if FALSE_LITERALS.contains(&lowered.as_str()) {
        Ok(Value::Bool(false))
    } else {
        Err(ParseError::new(
            "bool",
            text,
            "expected one of 1/t/true/y/yes or 0/f/false/n/no",
        ))
    }
}

/// Integer literal: optional sign, `0x`/`0o`/`0b` radix prefixes, `_`
/// between digits. Decimal literals may not have leading zeros.
fn parse_int(text: &str) -> Result<i64, ParseError> {
    let fail = |reason: &str| ParseError::new("int", text, reason);
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let lower = body.to_ascii_lowercase();
    let (radix, digits) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, lower.as_str())
    };

    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
        || digits.starts_with(['+', '-'])
    {
        return Err(fail("not an integer literal"));
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    if radix == 10 && cleaned.len() > 1 && cleaned.starts_with('0') && !cleaned.trim_start_matches('0').is_empty() {
        return Err(fail("leading zeros are not allowed in decimal literals"));
    }

    let magnitude = i128::from_str_radix(&cleaned, radix).map_err(|e| fail(&e.to_string()))?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| fail("out of range for a 64-bit integer"))
}

fn parse_float(text: &str) -> Result<Value, ParseError> {
    if let Ok(int) = parse_int(text) {
        return Ok(Value::Float(int as f64));
    }
    text.trim()
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|e| ParseError::new("float", text, e.to_string()))
}

#[cfg(feature = "chrono")]
fn parse_date(text: &str) -> Result<NaiveDate, ParseError> {
    let trimmed = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| match parse_datetime(trimmed) {
            Ok(Value::DateTime(dt)) => Some(dt.date()),
            Ok(Value::DateTimeTz(dt)) => Some(dt.date_naive()),
            _ => None,
        })
        .ok_or_else(|| ParseError::new("date", text, "no known date format matches"))
}

#[cfg(feature = "chrono")]
fn parse_datetime(text: &str) -> Result<Value, ParseError> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Value::DateTimeTz(dt));
    }
    if let Some(dt) = DATETIME_TZ_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(trimmed, fmt).ok())
    {
        return Ok(Value::DateTimeTz(dt));
    }
    if let Some(dt) = DATETIME_NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
    {
        return Ok(Value::DateTime(dt));
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(Value::DateTime)
        .ok_or_else(|| ParseError::new("datetime", text, "no known datetime format matches"))
}

fn parse_json(text: &str, kind: &str) -> Result<Value, ParseError> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ParseError::new(kind, text, e.to_string()))?;
    json_to_value(json).map_err(|reason| ParseError::new(kind, text, reason))
}

/// Convert parsed JSON into a [`Value`]; `null` has no counterpart.
pub(crate) fn json_to_value(json: serde_json::Value) -> Result<Value, String> {
    use serde_json::Value as Json;
    match json {
        Json::Null => Err("null is not a supported value".to_string()),
        Json::Bool(b) => Ok(Value::Bool(b)),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .ok_or_else(|| format!("number {n} is out of range")),
        Json::String(s) => Ok(Value::Str(s)),
        Json::Array(items) => items
            .into_iter()
            .map(json_to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Json::Object(entries) => entries
            .into_iter()
            .map(|(k, v)| json_to_value(v).map(|v| (k, v)))
            .collect::<Result<IndexMap<_, _>, _>>()
            .map(Value::Map),
    }
}

fn shape_error(kind: &str, text: &str, found: &Value) -> ParseError {
    ParseError::new(
        kind,
        text,
        format!("expected a JSON {kind}, found {}", found.kind_name()),
    )
}

#[cfg(test)]
#[path = "prop_type_tests.rs"]
mod tests;
