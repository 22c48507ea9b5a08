//! Interactive configuration wizard for creating `book-splitter.toml`.
//!
//! The wizard collects the site settings and, for every language, where the
//! book's sources live and how they are read.

use crate::source::DEFAULT_LOCALE_ATTRIBUTES_URL;
use anyhow::{anyhow, Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, FuzzySelect, Input};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "book-splitter.toml";

fn default_output() -> PathBuf {
    PathBuf::from("site")
}

fn default_edition() -> u32 {
    2
}

fn default_root_document() -> String {
    "progit.asc".to_string()
}

fn default_asciidoctor() -> PathBuf {
    PathBuf::from("asciidoctor")
}

fn default_locale_attributes_url() -> String {
    DEFAULT_LOCALE_ATTRIBUTES_URL.to_string()
}

/// How a book's sources are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Files as currently checked out
    #[default]
    Worktree,
    /// Files as committed at a revision
    Commit,
}

impl SourceKind {
    /// All available source kinds for selection UI.
    pub fn all() -> &'static [SourceKind] {
        &[SourceKind::Worktree, SourceKind::Commit]
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Worktree => write!(f, "Working copy"),
            SourceKind::Commit => write!(f, "Committed revision"),
        }
    }
}

/// One translation of the book.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BookSource {
    pub language: String,
    pub repository: PathBuf,
    #[serde(default)]
    pub source: SourceKind,
    /// Revision to read when `source` is `commit`; `HEAD` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Release download URL with a `{tag}` placeholder, e.g.
    /// `https://github.com/progit/progit2/releases/download/{tag}/progit`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebook_release_url: Option<String>,
}

/// Complete configuration for a book-splitter site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Configuration {
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_edition")]
    pub edition: u32,
    #[serde(default = "default_root_document")]
    pub root_document: String,
    #[serde(default = "default_asciidoctor")]
    pub asciidoctor: PathBuf,
    /// Where locale attributes are fetched from, with a `{lang}` placeholder
    #[serde(default = "default_locale_attributes_url")]
    pub locale_attributes_url: String,
    #[serde(default)]
    pub books: Vec<BookSource>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            output: default_output(),
            edition: default_edition(),
            root_document: default_root_document(),
            asciidoctor: default_asciidoctor(),
            locale_attributes_url: default_locale_attributes_url(),
            books: Vec::default(),
        }
    }
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Configuration> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to load {} - run 'book-splitter config' first",
                path.display()
            )
        })?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Run the interactive configuration wizard.
///
/// Prompts for the site settings and each book's sources, then writes
/// `book-splitter.toml` to the current directory.
pub fn run() -> Result<()> {
    let theme = ColorfulTheme {
        ..ColorfulTheme::default()
    };
    let defaults = Configuration::default();

    let output: String = Input::with_theme(&theme)
        .with_prompt("Site output directory")
        .default(defaults.output.display().to_string())
        .interact()
        .with_context(|| "Failed to obtain output directory")?;

    let edition: u32 = Input::with_theme(&theme)
        .with_prompt("Book edition")
        .default(defaults.edition)
        .interact()
        .with_context(|| "Failed to obtain edition")?;

    let root_document: String = Input::with_theme(&theme)
        .with_prompt("Root document of each book")
        .default(defaults.root_document.clone())
        .interact()
        .with_context(|| "Failed to obtain root document")?;

    let asciidoctor: String = Input::with_theme(&theme)
        .with_prompt("asciidoctor executable")
        .default(defaults.asciidoctor.display().to_string())
        .interact()
        .with_context(|| "Failed to obtain asciidoctor executable")?;

    let mut books: Vec<BookSource> = Vec::default();
    'books: loop {
        if !books.is_empty() {
            println!(
                "Books: [{}]",
                books
                    .iter()
                    .map(|book| book.language.clone())
                    .collect::<Vec<String>>()
                    .join("], [")
            );
        }
        let language: String = Input::with_theme(&theme)
            .with_prompt("Language code of a book (leave empty for done)")
            .allow_empty(true)
            .interact()?;
        let language = language.trim().to_string();
        if language.is_empty() {
            break 'books;
        }
        if books.iter().any(|book| book.language == language) {
            println!("{language} is already configured");
            continue 'books;
        }

        let repository: String = Input::with_theme(&theme)
            .with_prompt("Repository directory")
            .default(format!("../progit2-{language}"))
            .interact()
            .with_context(|| "Failed to obtain repository path")?;
        let repository = PathBuf::from(repository);
        if !repository.is_dir() {
            return Err(anyhow!("Path '{}' isn't a directory!", repository.display()));
        }

        let source_idx = FuzzySelect::with_theme(&theme)
            .with_prompt("Read the sources from")
            .items(SourceKind::all())
            .default(0)
            .interact()?;
        let source = SourceKind::all()[source_idx];

        let revision = if source == SourceKind::Commit {
            let revision: String = Input::with_theme(&theme)
                .with_prompt("Revision")
                .default("HEAD".to_string())
                .interact()?;
            Some(revision)
        } else {
            None
        };

        let ebook_release_url: String = Input::with_theme(&theme)
            .with_prompt("Ebook release URL with a {tag} placeholder (leave empty for none)")
            .allow_empty(true)
            .interact()?;
        let ebook_release_url = Some(ebook_release_url.trim().to_string()).filter(|u| !u.is_empty());

        books.push(BookSource {
            language,
            repository,
            source,
            revision,
            ebook_release_url,
        });
    }

    let config = Configuration {
        output: PathBuf::from(output),
        edition,
        root_document,
        asciidoctor: PathBuf::from(asciidoctor),
        books,
        ..defaults
    };

    let config =
        toml::to_string_pretty(&config).with_context(|| "Failed to convert configuration to TOML")?;

    let config_path = PathBuf::from(CONFIG_FILE);
    if config_path.exists()
        && !Confirm::with_theme(&theme)
            .with_prompt(format!("{CONFIG_FILE} already exists, do you want to override it?"))
            .interact()?
    {
        println!("Configuration:");
        println!("{}", config);
    } else {
        std::fs::write(&config_path, config)
            .with_context(|| "Failed to write configuration file")?;
        println!("{CONFIG_FILE} written!");
    }

    Ok(())
}
