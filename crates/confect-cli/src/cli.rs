use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "confect")]
#[command(about = "Inspect configuration sources before an application loads them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a TOML or JSON configuration file and show the values it stages
    Check {
        /// File to load; `.json` files are read as JSON, everything else as TOML
        file: PathBuf,
    },

    /// Resolve a dotted module name on a search path and show what it stages
    Module {
        /// Module name, e.g. `settings.prod`
        name: String,

        /// Directory to search (repeatable, searched in order)
        #[arg(short, long = "path", default_value = ".")]
        paths: Vec<PathBuf>,
    },

    /// List environment overrides named PREFIX__GROUP__PROPERTY
    Env {
        /// Variable prefix, without the trailing separator
        prefix: String,
    },
}

/// Output format for command results
#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
