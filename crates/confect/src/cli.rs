//! Command-line options for declared properties, via clap.
//!
//! Every property `group.name` becomes a `--group-name` option. Parsing
//! goes through the property's type, and a parsed value is written back
//! only when it differs from the property's default.

use clap::{Arg, ArgMatches, Command};
use confect_core::{ConfError, Value};
use tracing::debug;

use crate::conf::Conf;
use crate::prop_type::PropertyType;

/// Description of one generated option.
#[derive(Clone, Debug, PartialEq)]
pub struct CliOption {
    pub group: String,
    pub property: String,
    pub default: Value,
    pub prop_type: PropertyType,
    pub description: Option<String>,
}

impl CliOption {
    /// Long flag name without the leading dashes; also the clap arg id.
    pub fn flag(&self) -> String {
        format!("{}-{}", self.group, self.property)
    }

    pub fn help(&self) -> String {
        match &self.description {
            Some(text) => format!("{text} [default: {}]", self.default),
            None => format!("[default: {}]", self.default),
        }
    }

    fn to_arg(&self) -> Arg {
        let prop_type = self.prop_type.clone();
        let flag = self.flag();
        Arg::new(flag.clone())
            .long(flag)
            .value_name(self.prop_type.metavar())
            .help(self.help())
            .value_parser(move |text: &str| prop_type.parse(text))
    }
}

impl Conf {
    /// One option per declared property, in declaration order.
    pub fn cli_options(&self) -> Vec<CliOption> {
        self.properties()
            .into_iter()
            .map(|(group, property, prop)| CliOption {
                group,
                property,
                default: prop.default_value().clone(),
                prop_type: prop.prop_type().clone(),
                description: prop.description().map(str::to_string),
            })
            .collect()
    }

    /// Add the options from [`Conf::cli_options`] to `command`.
    ///
    /// ```
    /// use confect::Conf;
    ///
    /// let conf = Conf::new();
    /// conf.declare_group_with("yummy", [("weight", 10)]).unwrap();
    /// let matches = conf
    ///     .augment_command(clap::Command::new("app"))
    ///     .get_matches_from(["app", "--yummy-weight", "0x10"]);
    /// assert_eq!(conf.apply_matches(&matches).unwrap(), 1);
    /// assert_eq!(conf.get_as::<i64>("yummy", "weight").unwrap(), 16);
    /// ```
    pub fn augment_command(&self, command: Command) -> Command {
        self.cli_options()
            .iter()
            .fold(command, |command, option| command.arg(option.to_arg()))
    }

    /// Write parsed option values back into the registry. Returns the
    /// number of properties written.
    pub fn apply_matches(&self, matches: &ArgMatches) -> Result<usize, ConfError> {
        let _window = self.mutate_globally();
        let mut written = 0;
        for option in self.cli_options() {
            let Ok(Some(value)) = matches.try_get_one::<Value>(&option.flag()) else {
                continue;
            };
            if *value == option.default {
                continue;
            }
            debug!(group = %option.group, property = %option.property, value = %value, "applying command-line option");
            self.set(&option.group, &option.property, value.clone())?;
            written += 1;
        }
        Ok(written)
    }
}
