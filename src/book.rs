//! The book aggregate and its chapters and sections.
//!
//! One [`Book`] exists per (edition, language) pair. Chapter and section
//! metadata survive between builds, while rendered section bodies and their
//! assets are regenerated from scratch every time.

use crate::error::RewriteError;
use crate::paths;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Appendices share the chapter numbering space shifted by this amount.
pub const APPENDIX_OFFSET: u32 = 100;

/// Directory of a book holding one page per section
pub const SECTIONS_DIR: &str = "sections";

const FOOTNOTE_PREFIXES: &[&str] = &["_footnotedef_", "_footnoteref_"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterKind {
    Chapter,
    Appendix,
}

impl ChapterKind {
    /// The number a chapter of this kind is stored under
    pub fn chapter_number(self, ordinal: u32) -> u32 {
        match self {
            ChapterKind::Chapter => ordinal,
            ChapterKind::Appendix => ordinal + APPENDIX_OFFSET,
        }
    }
}

impl fmt::Display for ChapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChapterKind::Chapter => write!(f, "chapter"),
            ChapterKind::Appendix => write!(f, "appendix"),
        }
    }
}

/// Where an anchor id resolves to in the published book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XrefTarget {
    Section { chapter: u32, section: u32 },
    /// No section is known; the site falls back to the English edition.
    RedirectToEn,
}

impl fmt::Display for XrefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XrefTarget::Section { chapter, section } => write!(f, "section {chapter}.{section}"),
            XrefTarget::RedirectToEn => write!(f, "redirect-to-en"),
        }
    }
}

/// Download links for the packaged ebooks of a release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbookLinks {
    pub pdf: Option<String>,
    pub epub: Option<String>,
    pub mobi: Option<String>,
}

impl EbookLinks {
    /// Expand a release URL template such as
    /// `https://example.com/releases/download/{tag}/progit` for one tag.
    pub fn from_release(template: &str, tag: &str) -> EbookLinks {
        let base = template.replace("{tag}", tag);
        EbookLinks {
            pdf: Some(format!("{base}.pdf")),
            epub: Some(format!("{base}.epub")),
            mobi: Some(format!("{base}.mobi")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    pub number: u32,
    pub title: String,
    /// Pretext, body, footnotes and navigation; regenerated every build
    #[serde(skip)]
    pub html: String,
    /// Relocated image path → image bytes
    #[serde(skip)]
    pub assets: BTreeMap<String, Vec<u8>>,
}

impl Section {
    pub fn new(number: u32) -> Section {
        Section {
            number,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    /// Page name of this section within its book, e.g. `001-02-first-time-setup`
    pub fn page(&self, chapter: u32) -> String {
        let slug = slugify(&self.title);
        if slug.is_empty() {
            format!("{chapter:03}-{:02}", self.number)
        } else {
            format!("{chapter:03}-{:02}-{slug}", self.number)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub kind: ChapterKind,
    /// Position among chapters of the same kind, starting at 1
    pub ordinal: u32,
    pub revision: Option<String>,
    /// The source file the chapter was included from
    pub source_path: String,
    pub sections: BTreeMap<u32, Section>,
}

impl Chapter {
    pub fn new(kind: ChapterKind, ordinal: u32) -> Chapter {
        Chapter {
            title: String::new(),
            kind,
            ordinal,
            revision: None,
            source_path: String::new(),
            sections: BTreeMap::default(),
        }
    }

    pub fn number(&self) -> u32 {
        self.kind.chapter_number(self.ordinal)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(Section::is_empty)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub edition: u32,
    pub language_code: String,
    pub revision: Option<String>,
    pub chapters: BTreeMap<u32, Chapter>,
    pub xrefs: BTreeMap<String, XrefTarget>,
    #[serde(default)]
    pub ebook: EbookLinks,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Book {
    pub fn new<S: ToString>(edition: u32, language_code: S) -> Book {
        Book {
            edition,
            language_code: language_code.to_string(),
            revision: None,
            chapters: BTreeMap::default(),
            xrefs: BTreeMap::default(),
            ebook: EbookLinks::default(),
            updated_at: None,
        }
    }

    /// URL path segment all rewritten links and assets live under
    pub fn prefix(&self) -> String {
        format!("book/{}/v{}/", self.language_code, self.edition)
    }

    /// Whether this book was last built from `revision`
    pub fn is_current(&self, revision: &str) -> bool {
        self.revision.as_deref() == Some(revision)
    }

    /// Forget everything that is regenerated by a build: section bodies,
    /// assets and the cross-reference table.
    pub fn clear_section_content(&mut self) {
        self.xrefs.clear();
        for chapter in self.chapters.values_mut() {
            for section in chapter.sections.values_mut() {
                section.html.clear();
                section.assets.clear();
            }
        }
    }

    /// Record where an anchor id resolves to.
    ///
    /// The first registration of an id wins. The only exception is a
    /// redirect placeholder, which gives way to a concrete section once the
    /// anchor's owner is known. Footnote ids are never recorded.
    ///
    /// Returns whether the table changed.
    pub fn register_xref(&mut self, id: &str, target: XrefTarget) -> bool {
        if id.is_empty() || is_footnote_id(id) {
            return false;
        }

        match self.xrefs.get(id) {
            None => {
                self.xrefs.insert(id.to_string(), target);
                true
            }
            Some(XrefTarget::RedirectToEn) if target != XrefTarget::RedirectToEn => {
                self.xrefs.insert(id.to_string(), target);
                true
            }
            Some(_) => false,
        }
    }

    /// Map an image reference found in rendered markup to the root-relative
    /// path it is fetched from and published under.
    pub fn fix_image_path(&self, src: &str) -> Result<String, RewriteError> {
        let src = src.trim();
        if src.is_empty() {
            return Err(RewriteError::EmptyImage);
        }
        if src.contains("://") || src.starts_with("data:") || src.starts_with("//") {
            return Err(RewriteError::ExternalImage(src.to_string()));
        }
        if src.starts_with('/') {
            return Err(RewriteError::EscapingImage(src.to_string()));
        }

        let path = paths::clean(src);
        if path.is_empty() {
            return Err(RewriteError::EmptyImage);
        }
        if paths::escapes_root(&path) {
            return Err(RewriteError::EscapingImage(src.to_string()));
        }
        Ok(path)
    }

    /// Book-relative location of a section's page, e.g.
    /// `book/en/v2/sections/001-02-first-time-setup.html`. Stores write the
    /// page here and cross references link to it.
    pub fn page_url(&self, chapter: u32, section: &Section) -> String {
        format!(
            "{}{SECTIONS_DIR}/{}.html",
            self.prefix(),
            section.page(chapter)
        )
    }

    pub fn section(&self, chapter: u32, section: u32) -> Option<&Section> {
        self.chapters.get(&chapter)?.sections.get(&section)
    }

    /// The published id → URL map. Ids whose section was not produced by
    /// the last build fall back to the redirect placeholder.
    pub fn xref_urls(&self) -> BTreeMap<String, String> {
        self.xrefs
            .iter()
            .map(|(id, target)| {
                let url = match target {
                    XrefTarget::Section { chapter, section } => self
                        .section(*chapter, *section)
                        .filter(|s| !s.is_empty())
                        .map(|s| format!("{}#{id}", self.page_url(*chapter, s))),
                    XrefTarget::RedirectToEn => None,
                };
                (
                    id.clone(),
                    url.unwrap_or_else(|| XrefTarget::RedirectToEn.to_string()),
                )
            })
            .collect()
    }
}

pub fn is_footnote_id(id: &str) -> bool {
    FOOTNOTE_PREFIXES.iter().any(|prefix| id.starts_with(prefix))
}

/// Lowercase a title into a URL-friendly page name, keeping letters and
/// digits of any script.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}
