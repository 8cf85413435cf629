//! Frozen-by-default configuration registry.
//!
//! Libraries declare named groups of typed properties with defaults.
//! Applications override them from files, in-process sources, environment
//! variables or command-line options. Outside a sanctioned mutation
//! window every property write is rejected.
//!
//! ```
//! use confect::{Conf, ConfError};
//!
//! let conf = Conf::new();
//! conf.declare_group_with("dummy", [("opt1", 3)]).unwrap();
//!
//! assert!(matches!(conf.set("dummy", "opt1", 5), Err(ConfError::FrozenProp { .. })));
//! {
//!     let _local = conf.mutate_locally();
//!     conf.set("dummy", "opt1", 5).unwrap();
//!     assert_eq!(conf.get_as::<i64>("dummy", "opt1").unwrap(), 5);
//! }
//! assert_eq!(conf.get_as::<i64>("dummy", "opt1").unwrap(), 3);
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod conf;
pub mod depot;
pub mod group;
pub mod load;
pub mod prop_type;
pub mod property;

#[cfg(feature = "cli")]
pub use cli::CliOption;
pub use conf::{Conf, LocalMutationGuard, MutationGuard};
pub use confect_core::{
    ConfError, CustomValue, FROZEN_PROP_HINT, FromValue, ParseError, TypeToken, Value,
};
pub use depot::{Depot, DepotGroup};
pub use group::{Group, GroupDefaultSetter, GroupRef};
pub use load::{ConfSource, ENV_SEPARATOR, EnvOverride, FileFormat, FileSource, LoadContext, env_overrides};
pub use prop_type::{CustomType, Encoding, PropertyType, TypeTable};
pub use property::{PropSpec, Property};
