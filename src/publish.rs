//! The `build` command: assemble and publish every configured book.
//!
//! Each book is built on its own. A book that fails is reported and the
//! remaining books are still built.

use crate::assembly::{Assembler, BuildRequestBuilder};
use crate::book::EbookLinks;
use crate::config_wizard::{BookSource, Configuration, SourceKind, CONFIG_FILE};
use crate::render::Asciidoctor;
use crate::sinks::{SiteStore, Store};
use crate::source::{fetch_locale_attributes, latest_tag, CommitSnapshot, ContentLookup, Worktree};
use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};

/// Run the build command.
///
/// Builds the book for `language`, or every configured book when no
/// language is given. Books already built from their current revision are
/// skipped unless `force` is set.
pub fn run(language: Option<&str>, force: bool) -> Result<()> {
    let config = Configuration::load(CONFIG_FILE)?;

    let books: Vec<&BookSource> = config
        .books
        .iter()
        .filter(|book| language.map(|l| l == book.language).unwrap_or(true))
        .collect();
    if books.is_empty() {
        return Err(match language {
            Some(language) => anyhow!("No book configured for language '{language}'"),
            None => anyhow!("No books configured in {CONFIG_FILE}"),
        });
    }

    let store = SiteStore::new(&config.output);
    let renderer = Asciidoctor::new(&config.asciidoctor);

    let mut built = 0;
    let mut failed = 0;
    for book in books {
        match publish_book(&config, book, &renderer, &store, force) {
            Ok(true) => built += 1,
            Ok(false) => {}
            Err(e) => {
                error!("{e:#}");
                failed += 1;
            }
        }
    }

    info!("{built} book(s) built, {failed} failed");
    Ok(())
}

/// Open the sources of a book along with the revision they reflect.
fn open_sources(book: &BookSource) -> Result<(Box<dyn ContentLookup>, String)> {
    match book.source {
        SourceKind::Worktree => {
            let worktree = Worktree::open(&book.repository)?;
            let revision = worktree.revision()?;
            Ok((Box::new(worktree), revision))
        }
        SourceKind::Commit => {
            let revision = book.revision.as_deref().unwrap_or("HEAD");
            let snapshot = CommitSnapshot::open(&book.repository, revision)?;
            let revision = snapshot.revision();
            Ok((Box::new(snapshot), revision))
        }
    }
}

fn ebook_links(book: &BookSource) -> Result<EbookLinks> {
    let Some(template) = &book.ebook_release_url else {
        return Ok(EbookLinks::default());
    };
    match latest_tag(&book.repository)? {
        Some(tag) => {
            info!("{}: ebooks from release {tag}", book.language);
            Ok(EbookLinks::from_release(template, &tag))
        }
        None => {
            warn!("{}: no release tag found, skipping ebook links", book.language);
            Ok(EbookLinks::default())
        }
    }
}

/// Build one book. Returns whether it was rebuilt.
fn publish_book(
    config: &Configuration,
    book: &BookSource,
    renderer: &Asciidoctor,
    store: &SiteStore,
    force: bool,
) -> Result<bool> {
    let language = &book.language;
    let (lookup, revision) = open_sources(book)
        .with_context(|| format!("Failed to open the sources of book {language}"))?;

    let stored = store.find_or_create_book(config.edition, language)?;
    if !force && stored.is_current(&revision) {
        info!("{language} is up to date at {revision}");
        return Ok(false);
    }

    info!("building {language} at {revision}");
    let locale_attributes = fetch_locale_attributes(&config.locale_attributes_url, language);
    let request = BuildRequestBuilder::default()
        .language(language.as_str())
        .edition(config.edition)
        .root_document(config.root_document.as_str())
        .locale_attributes(locale_attributes)
        .revision(revision.as_str())
        .build()
        .with_context(|| "Failed to prepare build request")?;

    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .with_context(|| "Failed to parse progress style")?
            .progress_chars("#>-"),
    );

    let assembler = Assembler::new(lookup.as_ref(), renderer, store);
    let assembled = assembler
        .build(&request, &progress)
        .with_context(|| format!("Failed to build book {language}"))?;
    let ebook = ebook_links(book)?;
    let published = assembler.publish(assembled, &revision, ebook)?;

    info!(
        "{language}: {} chapters, {} cross references",
        published.chapters.values().filter(|c| !c.is_empty()).count(),
        published.xrefs.len()
    );
    Ok(true)
}
