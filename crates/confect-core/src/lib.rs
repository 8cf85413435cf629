//! Value model and error types shared by the confect crates.

pub mod error;
pub mod value;

pub use error::{ConfError, FROZEN_PROP_HINT, ParseError};
pub use value::{CustomValue, FromValue, TypeToken, Value};
