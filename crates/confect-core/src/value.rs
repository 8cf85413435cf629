//! Property values.
//!
//! A [`Value`] is the closed set of things a property can hold. Values
//! outside the builtin kinds are carried as [`Value::Custom`] and compared by
//! concrete type and equality.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

#[cfg(feature = "chrono")]
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use crate::error::ConfError;

/// Runtime kind of a value, used to pick a property type for a default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeToken {
    Bool,
    Str,
    Int,
    Float,
    Bytes,
    Tuple,
    Map,
    List,
    Date,
    DateTime,
    Custom(TypeId),
}

impl TypeToken {
    /// Token for values produced by [`Value::custom`] with a `T`.
    pub fn of<T: Any>() -> Self {
        Self::Custom(TypeId::of::<T>())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bytes => "bytes",
            Self::Tuple => "tuple",
            Self::Map => "map",
            Self::List => "list",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Custom(_) => "custom",
        }
    }
}

/// A user-defined value stored in [`Value::Custom`].
///
/// Implemented for every `Debug + PartialEq` type that is `'static`, `Send`
/// and `Sync`, so enums and newtypes work without extra code.
pub trait CustomValue: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn CustomValue) -> bool;
    fn type_name(&self) -> &'static str;
}

impl<T> CustomValue for T
where
    T: Any + fmt::Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn CustomValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Str(String),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    #[cfg(feature = "chrono")]
    Date(NaiveDate),
    /// Datetime without an offset.
    #[cfg(feature = "chrono")]
    DateTime(NaiveDateTime),
    /// Datetime with a fixed UTC offset. Shares the datetime kind with
    /// [`Value::DateTime`].
    #[cfg(feature = "chrono")]
    DateTimeTz(DateTime<FixedOffset>),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(IndexMap<String, Value>),
    Custom(Arc<dyn CustomValue>),
}

impl Value {
    pub fn custom<T>(value: T) -> Self
    where
        T: Any + fmt::Debug + PartialEq + Send + Sync,
    {
        Self::Custom(Arc::new(value))
    }

    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    pub fn tuple<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Tuple(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn type_token(&self) -> TypeToken {
        match self {
            Self::Bool(_) => TypeToken::Bool,
            Self::Str(_) => TypeToken::Str,
            Self::Int(_) => TypeToken::Int,
            Self::Float(_) => TypeToken::Float,
            Self::Bytes(_) => TypeToken::Bytes,
            #[cfg(feature = "chrono")]
            Self::Date(_) => TypeToken::Date,
            #[cfg(feature = "chrono")]
            Self::DateTime(_) | Self::DateTimeTz(_) => TypeToken::DateTime,
            Self::List(_) => TypeToken::List,
            Self::Tuple(_) => TypeToken::Tuple,
            Self::Map(_) => TypeToken::Map,
            Self::Custom(v) => TypeToken::Custom(v.as_any().type_id()),
        }
    }

    /// Human-readable kind, e.g. `int` or the Rust type name of a custom value.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Custom(v) => v.type_name(),
            other => other.type_token().as_str(),
        }
    }

    /// Borrow the inner value of a [`Value::Custom`] as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Custom(v) => v.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert into a typed Rust value.
    pub fn into_typed<T: FromValue>(self) -> Result<T, ConfError> {
        T::from_value(self)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            #[cfg(feature = "chrono")]
            (Self::Date(a), Self::Date(b)) => a == b,
            #[cfg(feature = "chrono")]
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            #[cfg(feature = "chrono")]
            (Self::DateTimeTz(a), Self::DateTimeTz(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => a.dyn_eq(&**b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Bytes(v) => f
                .debug_tuple("Bytes")
                .field(&String::from_utf8_lossy(v))
                .finish(),
            #[cfg(feature = "chrono")]
            Self::Date(v) => f.debug_tuple("Date").field(v).finish(),
            #[cfg(feature = "chrono")]
            Self::DateTime(v) => f.debug_tuple("DateTime").field(v).finish(),
            #[cfg(feature = "chrono")]
            Self::DateTimeTz(v) => f.debug_tuple("DateTimeTz").field(v).finish(),
            Self::List(v) => f.debug_tuple("List").field(v).finish(),
            Self::Tuple(v) => f.debug_tuple("Tuple").field(v).finish(),
            Self::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Self::Custom(v) => f.debug_tuple("Custom").field(v).finish(),
        }
    }
}

/// Renders the literal form the matching property type parses back.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
            #[cfg(feature = "chrono")]
            Self::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            #[cfg(feature = "chrono")]
            Self::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f")),
            #[cfg(feature = "chrono")]
            Self::DateTimeTz(v) => f.write_str(&v.to_rfc3339()),
            Self::List(_) | Self::Tuple(_) | Self::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
            Self::Custom(v) => write!(f, "{v:?}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Str(v) => serializer.serialize_str(v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::List(items) | Self::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            other => serializer.collect_str(other),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    String => Str,
    &str => Str,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    u16 => Int,
    u8 => Int,
    f64 => Float,
    f32 => Float,
    Vec<u8> => Bytes,
    &[u8] => Bytes,
    Vec<Value> => List,
    IndexMap<String, Value> => Map,
}

#[cfg(feature = "chrono")]
value_from! {
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeTz,
}

#[cfg(feature = "chrono")]
impl From<DateTime<chrono::Utc>> for Value {
    fn from(v: DateTime<chrono::Utc>) -> Self {
        Self::DateTimeTz(v.fixed_offset())
    }
}

/// Conversion from a [`Value`] into a concrete Rust type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConfError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ConfError> {
        Ok(value)
    }
}

macro_rules! from_value {
    ($($ty:ty : $expected:literal => $pat:pat => $out:expr),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ConfError> {
                    match value {
                        $pat => Ok($out),
                        other => Err(ConfError::type_mismatch($expected, other.kind_name())),
                    }
                }
            }
        )*
    };
}

from_value! {
    bool: "bool" => Value::Bool(v) => v,
    String: "str" => Value::Str(v) => v,
    i64: "int" => Value::Int(v) => v,
    f64: "float" => Value::Float(v) => v,
    Vec<u8>: "bytes" => Value::Bytes(v) => v,
    Vec<Value>: "list" => Value::List(v) | Value::Tuple(v) => v,
    IndexMap<String, Value>: "map" => Value::Map(v) => v,
}

#[cfg(feature = "chrono")]
from_value! {
    NaiveDate: "date" => Value::Date(v) => v,
    NaiveDateTime: "datetime" => Value::DateTime(v) => v,
}

#[cfg(feature = "chrono")]
impl FromValue for DateTime<FixedOffset> {
    fn from_value(value: Value) -> Result<Self, ConfError> {
        match value {
            Value::DateTimeTz(v) => Ok(v),
            // Naive datetimes are read as UTC.
            Value::DateTime(v) => Ok(v.and_utc().fixed_offset()),
            other => Err(ConfError::type_mismatch("datetime", other.kind_name())),
        }
    }
}

macro_rules! from_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ConfError> {
                    let wide = i64::from_value(value)?;
                    <$ty>::try_from(wide).map_err(|_| {
                        ConfError::type_mismatch(stringify!($ty), format!("int {wide} out of range"))
                    })
                }
            }
        )*
    };
}

from_value_int!(i32, u16, u32, u64, usize);
