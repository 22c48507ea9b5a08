use clap::{Parser, Subcommand};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generates a book-splitter.toml config file
    Config,
    /// Splits the configured books into per-section site pages
    Build {
        /// Only build the book for this language code
        #[clap(short, long)]
        language: Option<String>,
        /// Rebuild books even if their sources haven't changed
        #[clap(short, long)]
        force: bool,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}
