use anyhow::Result;
use clap::Parser;

mod cli;
mod inspect_cmds;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { file } => inspect_cmds::handle_check(&file, cli.format),
        Commands::Module { name, paths } => inspect_cmds::handle_module(&name, paths, cli.format),
        Commands::Env { prefix } => inspect_cmds::handle_env(&prefix, cli.format),
    }
}
