use anyhow::Result;
use cli::Cli;
use std::process::ExitCode;

mod assembly;
mod book;
mod cli;
mod config_wizard;
mod document;
mod error;
mod paths;
mod publish;
mod render;
mod sinks;
mod source;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = try_main() {
        eprintln!("{}: {e:#}", console::style("Error").red());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    use clap::Parser;
    let cli = Cli::parse();

    match &cli.command {
        cli::Commands::Config => config_wizard::run(),
        cli::Commands::Build { language, force } => publish::run(language.as_deref(), *force),
    }
}
