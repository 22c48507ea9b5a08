//! Turning a book's sources into stored, per-section pages.
//!
//! A build flattens the root document, renders it once, and walks the
//! rendered chapters section by section: links become site placeholders,
//! images are relocated and fetched, and each section keeps only the
//! footnotes it cites.

use crate::book::{Book, Chapter, EbookLinks, Section, XrefTarget};
use crate::document::{to_html, DocumentTree, Node};
use crate::render::Renderer;
use crate::sinks::Store;
use crate::source::ContentLookup;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use derive_builder::Builder;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use std::collections::BTreeSet;

pub mod assets;
pub mod include;
pub mod layout;
pub mod segment;
pub mod xref;

use layout::ChapterSlot;
use segment::{ChapterUnit, SectionUnit};
use xref::FootnoteCitations;

/// Appended to every section page
pub const NAVIGATION: &str = r#"<div id="nav"><a href="{{< previous-section >}}">prev</a> | <a href="{{< next-section >}}">next</a></div>"#;

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct BuildRequest {
    pub language: String,
    #[builder(default = "2")]
    pub edition: u32,
    #[builder(default = "\"progit.asc\".to_string()")]
    pub root_document: String,
    /// Locale attribute definitions injected ahead of the first chapter
    #[builder(default)]
    pub locale_attributes: String,
    /// Revision of the sources, stamped on every chapter built
    #[builder(setter(into, strip_option), default)]
    pub revision: Option<String>,
}

pub struct Assembler<'a> {
    lookup: &'a dyn ContentLookup,
    renderer: &'a dyn Renderer,
    store: &'a dyn Store,
}

impl<'a> Assembler<'a> {
    pub fn new(
        lookup: &'a dyn ContentLookup,
        renderer: &'a dyn Renderer,
        store: &'a dyn Store,
    ) -> Assembler<'a> {
        Assembler {
            lookup,
            renderer,
            store,
        }
    }

    /// Flatten the root document into the text handed to the renderer,
    /// along with the chapters it is expected to produce.
    fn flatten(&self, request: &BuildRequest) -> Result<(String, Vec<ChapterSlot>)> {
        let root = self
            .lookup
            .fetch_text(&request.root_document)
            .with_context(|| format!("Failed to read {}", request.root_document))?
            .ok_or_else(|| anyhow!("Root document {} not found", request.root_document))?;
        let root = root.trim_start_matches('\u{FEFF}');

        let slots = layout::classify(root);
        debug!("planned {} chapters and appendices", slots.len());

        let text = layout::strip_foreign_includes(root);
        let text = layout::inject_locale_attributes(&text, &request.locale_attributes);
        let text = include::expand(&text, &request.root_document, self.lookup);
        Ok((include::collapse_document_xrefs(&text), slots))
    }

    /// Rebuild every section of a book from its sources.
    ///
    /// The returned book holds fresh section pages and cross references;
    /// pass it to [`Assembler::publish`] to record the revision it was built
    /// from.
    pub fn build(&self, request: &BuildRequest, progress: &ProgressBar) -> Result<Book> {
        progress.set_message(format!("Rendering {}", request.language));
        let (text, slots) = self.flatten(request)?;
        let tree = self
            .renderer
            .render(&text, &request.language)
            .with_context(|| format!("Failed to render book {}", request.language))?;

        let mut book = self
            .store
            .find_or_create_book(request.edition, &request.language)?;
        self.store
            .remove_all_section_files(&book)
            .with_context(|| "Failed to remove old section files")?;
        book.clear_section_content();

        let containers = segment::chapter_containers(&tree);
        progress.set_length(containers.len() as u64);
        // chapters saved during this build, whose stored metadata must be
        // refreshed even if they end up without sections
        let mut touched: BTreeSet<u32> = BTreeSet::new();

        for (index, container) in containers.into_iter().enumerate() {
            let Some(slot) = slots.get(index) else {
                let title = segment::chapter_heading(container)
                    .map(|heading| heading.text())
                    .unwrap_or_default();
                warn!("not including {title}");
                break;
            };
            let Some(unit) = segment::segment(container) else {
                progress.inc(1);
                continue;
            };

            progress.set_message(unit.title.clone());
            let number = slot.chapter_number();
            let chapter = book
                .chapters
                .entry(number)
                .or_insert_with(|| Chapter::new(slot.kind, slot.ordinal));
            chapter.title = unit.title.clone();
            chapter.kind = slot.kind;
            chapter.ordinal = slot.ordinal;
            chapter.revision = request.revision.clone();
            chapter.source_path = slot.source_path.clone();
            self.store
                .save_chapter(&book, &book.chapters[&number])
                .with_context(|| format!("Failed to save chapter {number}"))?;
            touched.insert(number);

            let sections = self.assemble_chapter(&mut book, &tree, slot, unit);
            if let Some(chapter) = book.chapters.get_mut(&number) {
                let count = sections.len() as u32;
                for section in sections {
                    chapter.sections.insert(section.number, section);
                }
                // numbering stays contiguous when a chapter loses sections
                chapter.sections.retain(|n, _| *n <= count);
            }
            progress.inc(1);
        }

        for chapter in book
            .chapters
            .values()
            .filter(|c| !c.is_empty() || touched.contains(&c.number()))
        {
            self.store
                .save_chapter(&book, chapter)
                .with_context(|| format!("Failed to save chapter {}", chapter.number()))?;
            for section in chapter.sections.values().filter(|s| !s.is_empty()) {
                self.store
                    .save_section(&book, chapter, section)
                    .with_context(|| {
                        format!(
                            "Failed to save section {}.{}",
                            chapter.number(),
                            section.number
                        )
                    })?;
            }
        }

        progress.finish_with_message(format!("Book {} assembled", request.language));
        Ok(book)
    }

    fn assemble_chapter(
        &self,
        book: &mut Book,
        tree: &DocumentTree,
        slot: &ChapterSlot,
        unit: ChapterUnit,
    ) -> Vec<Section> {
        let number = slot.chapter_number();
        let mut pretext = Some(unit.pretext);
        let mut sections = Vec::with_capacity(unit.sections.len());

        for (index, SectionUnit { title, nodes, .. }) in unit.sections.into_iter().enumerate() {
            let section_number = index as u32 + 1;
            let target = XrefTarget::Section {
                chapter: number,
                section: section_number,
            };

            let mut nodes: Vec<Node> = match pretext.take() {
                Some(mut pretext) => {
                    pretext.extend(nodes);
                    pretext
                }
                None => nodes,
            };
            segment::shift_headings(&mut nodes);

            let mut citations = FootnoteCitations::default();
            xref::rewrite_links(&mut nodes, book, &mut citations);
            let images = assets::relocate_images(&mut nodes, book);
            let footnotes = assets::footnote_block(tree, &citations);

            if section_number == 1 {
                if let Some(id) = &unit.heading_id {
                    book.register_xref(id, target);
                }
            }
            xref::register_ids(&nodes, book, target);

            let mut section = Section::new(section_number);
            section.html = format!("{}{footnotes}{NAVIGATION}", to_html(&nodes));
            section.assets = assets::fetch_assets(self.lookup, &images, &slot.source_path);
            section.title = title;

            info!(
                "{} {}.{} : {} . {} - {}",
                slot.kind,
                slot.ordinal,
                section_number,
                unit.title,
                section.title,
                section.html.len()
            );
            sections.push(section);
        }
        sections
    }

    /// Record that `book` now reflects `revision` and store it.
    pub fn publish(&self, mut book: Book, revision: &str, ebook: EbookLinks) -> Result<Book> {
        book.revision = Some(revision.to_string());
        book.ebook = ebook;
        book.updated_at = Some(Utc::now());
        self.store
            .save_book(&book)
            .with_context(|| format!("Failed to save book {}", book.language_code))?;
        Ok(book)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sinks::SiteStore;
    use crate::source::fixtures::MemorySource;
    use std::cell::RefCell;

    /// Returns the same markup whatever it is given, remembering the input.
    struct StaticRenderer {
        html: String,
        rendered: RefCell<Option<String>>,
    }

    impl StaticRenderer {
        fn new(html: &str) -> StaticRenderer {
            StaticRenderer {
                html: html.to_string(),
                rendered: RefCell::new(None),
            }
        }
    }

    impl Renderer for StaticRenderer {
        fn render(&self, source: &str, _locale: &str) -> Result<DocumentTree> {
            *self.rendered.borrow_mut() = Some(source.to_string());
            DocumentTree::parse(&self.html)
        }
    }

    const ROOT: &str = "= Pro Git\n\
include::book/license.asc[]\n\
include::ch01-getting-started.asc[]\n\
include::ch02-git-basics.asc[]\n\
include::A-git-in-other-environments.asc[]\n";

    const RENDERED: &str = r##"<div class="sect1">
<h2 id="_getting_started">Getting Started</h2>
<div class="sectionbody">
<div class="paragraph"><p>Intro text.</p></div>
<div class="sect2">
<h3 id="_about_version_control">About Version Control</h3>
<div class="paragraph"><p>See <a href="#_tagging">Tagging</a> and <a href="1-git-basics.html#_recording">recording</a>.<sup class="footnote">[<a id="_footnoteref_1" class="footnote" href="#_footnotedef_1">1</a>]</sup></p></div>
<div class="imageblock"><div class="content"><img src="images/local.png" alt="local"/></div></div>
</div>
<div class="sect2">
<h3 id="_first_time_setup">First-Time Git Setup</h3>
<div class="paragraph"><p>Setup<sup class="footnote">[<a id="_footnoteref_2" class="footnote" href="#_footnotedef_2">2</a>]</sup></p></div>
<div class="sect3"><h4 id="_identity">Your Identity</h4></div>
</div>
</div>
</div>
<div class="sect1">
<h2 id="_git_basics">Git Basics</h2>
<div class="sectionbody">
<div class="sect2">
<h3 id="_tagging">Tagging</h3>
<div class="paragraph"><p>Back to <a href="#_first_time_setup">setup</a>.</p></div>
</div>
</div>
</div>
<div class="sect1">
<h2 id="_other_environments">Git in Other Environments</h2>
<div class="sectionbody">
<div class="sect2">
<h3 id="_guis">Graphical Interfaces</h3>
<div class="imageblock"><img src="images/missing.png" alt="missing"/></div>
</div>
</div>
</div>
<div class="sect1">
<h2 id="_index">Index</h2>
<div class="sectionbody"><div class="sect2"><h3 id="_extra">Extra</h3></div></div>
</div>
<div id="footnotes">
<hr/>
<div class="footnote" id="_footnotedef_1">
<a href="#_footnoteref_1">1</a>. First note.
</div>
<div class="footnote" id="_footnotedef_2">
<a href="#_footnoteref_2">2</a>. Second note.
</div>
</div>"##;

    fn sources() -> MemorySource {
        MemorySource::default()
            .with_file("progit.asc", ROOT)
            .with_file("book/license.asc", "Licensed.\n")
            .with_file(
                "ch01-getting-started.asc",
                "== Getting Started\ninclude::book/01-introduction/sections/about.asc[]\nSee <<ch02-git-basics.asc#_tagging>>.\n",
            )
            .with_file("book/01-introduction/sections/about.asc", "=== About Version Control\n")
            .with_file("ch02-git-basics.asc", "== Git Basics\n")
            .with_file("A-git-in-other-environments.asc", "== Git in Other Environments\n")
            .with_file("images/local.png", [7u8, 7, 7])
    }

    fn request() -> BuildRequest {
        BuildRequestBuilder::default()
            .language("en")
            .locale_attributes(":appendix-caption: Appendix")
            .revision("abc123")
            .build()
            .expect("can build request")
    }

    #[test]
    fn request_defaults() {
        let request = BuildRequestBuilder::default()
            .language("fr")
            .build()
            .expect("can build request");
        assert_eq!(request.edition, 2);
        assert_eq!(request.root_document, "progit.asc");
        assert!(request.locale_attributes.is_empty());
        assert!(request.revision.is_none());
    }

    #[test]
    fn flattened_source_is_handed_to_the_renderer() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let source = sources();
        let renderer = StaticRenderer::new(RENDERED);
        let store = SiteStore::new(dir.path());
        Assembler::new(&source, &renderer, &store)
            .build(&request(), &ProgressBar::hidden())
            .expect("can build book");

        let rendered = renderer.rendered.borrow().clone().expect("renderer called");
        assert!(!rendered.contains("Licensed."));
        assert!(rendered.contains(":appendix-caption: Appendix\n== Getting Started"));
        assert!(rendered.contains("=== About Version Control"));
        assert!(rendered.contains("See <<_tagging>>."));
        assert!(rendered.contains("== Git in Other Environments"));
    }

    #[test]
    fn builds_sections_with_rewritten_links_footnotes_and_assets() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let source = sources();
        let renderer = StaticRenderer::new(RENDERED);
        let store = SiteStore::new(dir.path());
        let book = Assembler::new(&source, &renderer, &store)
            .build(&request(), &ProgressBar::hidden())
            .expect("can build book");

        let numbers: Vec<u32> = book.chapters.keys().copied().collect();
        assert_eq!(numbers, vec![1, 2, 101]);
        assert_eq!(book.chapters[&1].title, "Getting Started");
        assert_eq!(book.chapters[&1].revision.as_deref(), Some("abc123"));
        assert_eq!(book.chapters[&101].source_path, "A-git-in-other-environments.asc");

        let about = book.section(1, 1).expect("first section");
        assert_eq!(about.title, "About Version Control");
        assert!(about.html.starts_with("\n<div class=\"paragraph\"><p>Intro text.</p></div>"));
        assert!(about.html.contains(r#"<h2 id="_about_version_control">"#));
        assert!(about.html.contains(r#"href="{{< relurl "book/en/v2/ch00/_tagging" >}}""#));
        assert!(about.html.contains(r#"href="{{< relurl "book/en/v2/ch00/_recording" >}}""#));
        assert!(about.html.contains(r#"src="{{< relurl "book/en/v2/images/local.png" >}}""#));
        assert!(about.html.contains("First note."));
        assert!(!about.html.contains("Second note."));
        assert!(about.html.ends_with(NAVIGATION));
        assert_eq!(about.assets["images/local.png"], vec![7, 7, 7]);

        let setup = book.section(1, 2).expect("second section");
        assert!(!setup.html.contains("Intro text."));
        assert!(setup.html.contains(r#"<h3 id="_identity">Your Identity</h3>"#));
        assert!(setup.html.contains("Second note."));
        assert!(!setup.html.contains("First note."));

        let guis = book.section(101, 1).expect("appendix section");
        assert!(guis.assets.is_empty());

        let at = |chapter, section| XrefTarget::Section { chapter, section };
        assert_eq!(book.xrefs["_getting_started"], at(1, 1));
        assert_eq!(book.xrefs["_first_time_setup"], at(1, 2));
        assert_eq!(book.xrefs["_identity"], at(1, 2));
        assert_eq!(book.xrefs["_tagging"], at(2, 1));
        assert_eq!(book.xrefs["_guis"], at(101, 1));
        assert_eq!(book.xrefs["_recording"], XrefTarget::RedirectToEn);
        assert!(!book.xrefs.contains_key("_extra"));
        assert!(!book.xrefs.keys().any(|id| id.starts_with("_footnote")));

        let page = dir
            .path()
            .join("book/en/v2/sections/001-01-about-version-control.html");
        assert_eq!(std::fs::read_to_string(page).expect("page written"), about.html);
        assert!(dir.path().join("book/en/v2/images/local.png").exists());
    }

    #[test]
    fn publishing_records_the_revision() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let source = sources();
        let renderer = StaticRenderer::new(RENDERED);
        let store = SiteStore::new(dir.path());
        let assembler = Assembler::new(&source, &renderer, &store);
        let book = assembler
            .build(&request(), &ProgressBar::hidden())
            .expect("can build book");
        let ebook = EbookLinks::from_release("https://example.com/{tag}/progit", "2.1.0");
        let book = assembler
            .publish(book, "abc123", ebook.clone())
            .expect("can publish book");

        assert!(book.is_current("abc123"));
        assert!(book.updated_at.is_some());

        let stored = store.find_or_create_book(2, "en").expect("can load book");
        assert!(stored.is_current("abc123"));
        assert_eq!(stored.ebook, ebook);
        assert_eq!(stored.xrefs, book.xrefs);
        assert!(dir.path().join("book/en/v2/xrefs.json").exists());
    }

    #[test]
    fn rebuilding_drops_stale_sections() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let source = sources();
        let store = SiteStore::new(dir.path());
        let renderer = StaticRenderer::new(RENDERED);
        let assembler = Assembler::new(&source, &renderer, &store);
        let book = assembler
            .build(&request(), &ProgressBar::hidden())
            .expect("can build book");
        assembler
            .publish(book, "abc123", EbookLinks::default())
            .expect("can publish book");

        let shorter = RENDERED.replace(
            r#"<div class="sect2">
<h3 id="_first_time_setup">"#,
            r#"<div class="gone">
<h3 id="_first_time_setup">"#,
        );
        let renderer = StaticRenderer::new(&shorter);
        let book = Assembler::new(&source, &renderer, &store)
            .build(&request(), &ProgressBar::hidden())
            .expect("can rebuild book");

        assert_eq!(book.chapters[&1].sections.len(), 1);
        let sections = dir.path().join("book/en/v2/sections");
        assert!(sections.join("001-01-about-version-control.html").exists());
        assert!(!sections.join("001-02-first-time-git-setup.html").exists());
    }

    #[test]
    fn chapters_emptied_by_a_rebuild_are_stored_without_sections() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let source = sources();
        let store = SiteStore::new(dir.path());
        let renderer = StaticRenderer::new(RENDERED);
        Assembler::new(&source, &renderer, &store)
            .build(&request(), &ProgressBar::hidden())
            .expect("can build book");

        let emptied = RENDERED.replace(r#"class="sect2""#, r#"class="gone""#);
        let renderer = StaticRenderer::new(&emptied);
        let book = Assembler::new(&source, &renderer, &store)
            .build(&request(), &ProgressBar::hidden())
            .expect("can rebuild book");
        assert!(book.chapters[&1].sections.is_empty());

        let stored = store.find_or_create_book(2, "en").expect("can load book");
        assert!(stored.chapters[&1].sections.is_empty());
        assert!(stored.chapters[&2].sections.is_empty());
    }

    #[test]
    fn missing_root_document_fails_the_build() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let source = MemorySource::default();
        let renderer = StaticRenderer::new(RENDERED);
        let store = SiteStore::new(dir.path());
        let result = Assembler::new(&source, &renderer, &store)
            .build(&request(), &ProgressBar::hidden());
        assert!(result.is_err());
        assert!(renderer.rendered.borrow().is_none());
    }
}
