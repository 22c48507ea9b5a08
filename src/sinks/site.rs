//! A static site tree on the local filesystem.
//!
//! Each book lives under `<root>/book/<language>/v<edition>/`:
//!
//! - `sections/<page>.html`: one fragment per section
//! - `<image path>`: every image a section references
//! - `assets.json`: every image path written, so stale ones can be removed
//! - `chapters/<number>.json`: chapter and section metadata
//! - `book.json`: the book and its typed cross references
//! - `xrefs.json`: anchor id to page URL, or `redirect-to-en`

use super::Store;
use crate::book::{Book, Chapter, Section, SECTIONS_DIR};
use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const BOOK_FILE: &str = "book.json";
const XREFS_FILE: &str = "xrefs.json";
const ASSETS_FILE: &str = "assets.json";
const CHAPTERS_DIR: &str = "chapters";

#[derive(Debug, Clone)]
pub struct SiteStore {
    root: PathBuf,
}

impl SiteStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> SiteStore {
        SiteStore { root: root.into() }
    }

    pub fn book_dir(&self, edition: u32, language: &str) -> PathBuf {
        self.root
            .join("book")
            .join(language)
            .join(format!("v{edition}"))
    }

    fn dir_of(&self, book: &Book) -> PathBuf {
        self.book_dir(book.edition, &book.language_code)
    }

    /// Where the page of a section is written
    pub fn section_path(&self, book: &Book, chapter: &Chapter, section: &Section) -> PathBuf {
        self.root.join(book.page_url(chapter.number(), section))
    }

    fn load_book(&self, dir: &Path) -> Result<Option<Book>> {
        let path = dir.join(BOOK_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let book = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(book))
    }

    fn load_assets(&self, dir: &Path) -> Result<BTreeSet<String>> {
        let path = dir.join(ASSETS_FILE);
        if !path.exists() {
            return Ok(BTreeSet::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn load_chapters(&self, dir: &Path, book: &mut Book) -> Result<()> {
        let chapters = dir.join(CHAPTERS_DIR);
        if !chapters.is_dir() {
            return Ok(());
        }

        let entries = std::fs::read_dir(&chapters)
            .with_context(|| format!("Failed to list {}", chapters.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("Failed to list {}", chapters.display()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let chapter: Chapter = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            book.chapters.insert(chapter.number(), chapter);
        }
        Ok(())
    }
}

fn write_file<C: AsRef<[u8]>>(path: &Path, contents: C) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

impl Store for SiteStore {
    fn find_or_create_book(&self, edition: u32, language: &str) -> Result<Book> {
        let dir = self.book_dir(edition, language);
        let mut book = match self.load_book(&dir)? {
            Some(book) => book,
            None => {
                info!("starting new book {language} v{edition}");
                Book::new(edition, language)
            }
        };
        self.load_chapters(&dir, &mut book)?;
        Ok(book)
    }

    fn remove_all_section_files(&self, book: &Book) -> Result<()> {
        let dir = self.dir_of(book);

        let sections = dir.join(SECTIONS_DIR);
        if sections.exists() {
            debug!("removing {}", sections.display());
            std::fs::remove_dir_all(&sections)
                .with_context(|| format!("Failed to remove {}", sections.display()))?;
        }

        let manifest = dir.join(ASSETS_FILE);
        for asset in self.load_assets(&dir)? {
            let path = dir.join(&asset);
            if path.is_file() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        if manifest.exists() {
            std::fs::remove_file(&manifest)
                .with_context(|| format!("Failed to remove {}", manifest.display()))?;
        }
        Ok(())
    }

    fn save_chapter(&self, book: &Book, chapter: &Chapter) -> Result<()> {
        let path = self
            .dir_of(book)
            .join(CHAPTERS_DIR)
            .join(format!("{:03}.json", chapter.number()));
        let contents = serde_json::to_string_pretty(chapter)
            .with_context(|| format!("Failed to serialize chapter {}", chapter.number()))?;
        write_file(&path, contents)
    }

    fn save_section(&self, book: &Book, chapter: &Chapter, section: &Section) -> Result<()> {
        let path = self.section_path(book, chapter, section);
        write_file(&path, &section.html)?;

        if section.assets.is_empty() {
            return Ok(());
        }

        // the manifest lists every asset before it exists on disk
        let dir = self.dir_of(book);
        let mut manifest = self.load_assets(&dir)?;
        manifest.extend(section.assets.keys().cloned());
        let contents = serde_json::to_string_pretty(&manifest)
            .with_context(|| "Failed to serialize asset manifest")?;
        write_file(&dir.join(ASSETS_FILE), contents)?;

        for (asset, bytes) in &section.assets {
            write_file(&dir.join(asset), bytes)?;
        }
        Ok(())
    }

    fn save_book(&self, book: &Book) -> Result<()> {
        let dir = self.dir_of(book);

        let contents =
            serde_json::to_string_pretty(book).with_context(|| "Failed to serialize book")?;
        write_file(&dir.join(BOOK_FILE), contents)?;

        let xrefs = serde_json::to_string_pretty(&book.xref_urls())
            .with_context(|| "Failed to serialize cross references")?;
        write_file(&dir.join(XREFS_FILE), xrefs)
    }
}
