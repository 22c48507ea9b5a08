//! Images and footnotes that travel with a section.

use super::xref::FootnoteCitations;
use crate::book::Book;
use crate::document::{for_each_element_mut, to_html, DocumentTree, Element, Node};
use crate::paths;
use crate::source::ContentLookup;
use lazy_static::lazy_static;
use log::{debug, error, trace};
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref NEWLINES_RE: Regex = Regex::new(r"\n+").unwrap();
}

const FOOTNOTES_ID: &str = "footnotes";

/// Point every image in `nodes` at its published location.
///
/// Returns the root-relative paths of the images, without duplicates, in
/// the order they first appear.
pub fn relocate_images(nodes: &mut [Node], book: &Book) -> Vec<String> {
    let prefix = book.prefix();
    let mut images: Vec<String> = Vec::new();

    for_each_element_mut(nodes, &mut |element: &mut Element| {
        if element.name != "img" {
            return;
        }
        let Some(src) = element.attr("src").map(|src| src.into_owned()) else {
            return;
        };
        match book.fix_image_path(&src) {
            Ok(path) => {
                element.set_raw_attr("src", format!("{{{{< relurl \"{prefix}{path}\" >}}}}"));
                if !images.contains(&path) {
                    images.push(path);
                }
            }
            Err(e) => trace!("leaving image {src} as is: {e}"),
        }
    });
    images
}

/// Fetch the bytes of every image, falling back to a path relative to the
/// chapter's source file for books that still use per-chapter image
/// directories. Images that can't be found are reported and skipped.
pub fn fetch_assets(
    lookup: &dyn ContentLookup,
    images: &[String],
    chapter_source: &str,
) -> BTreeMap<String, Vec<u8>> {
    let mut assets = BTreeMap::new();
    for path in images {
        match fetch_image(lookup, path, chapter_source) {
            Ok(Some(bytes)) => {
                assets.insert(path.clone(), bytes);
            }
            Ok(None) => error!("referenced image {path} does not exist"),
            Err(e) => error!("referenced image {path} could not be read: {e:#}"),
        }
    }
    assets
}

fn fetch_image(
    lookup: &dyn ContentLookup,
    path: &str,
    chapter_source: &str,
) -> anyhow::Result<Option<Vec<u8>>> {
    if let Some(bytes) = lookup.fetch_bytes(path)? {
        return Ok(Some(bytes));
    }

    let relative = paths::resolve(chapter_source, path);
    if relative == path {
        return Ok(None);
    }
    debug!("image {path} not found, trying {relative}");
    lookup.fetch_bytes(&relative)
}

/// The footnote definitions cited by one section, as a block to append to
/// its page. Sections citing nothing get no block at all.
pub fn footnote_block(tree: &DocumentTree, citations: &FootnoteCitations) -> String {
    if citations.is_empty() {
        return String::new();
    }

    let kept: Vec<Node> = tree
        .find_by_id(FOOTNOTES_ID)
        .map(|footnotes| {
            footnotes
                .children
                .iter()
                .filter(|node| match node {
                    Node::Element(e) if e.name == "div" => {
                        e.id().map(|id| citations.cites(&id)).unwrap_or(false)
                    }
                    _ => true,
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let html = to_html(&kept);
    format!(
        "<div id='{FOOTNOTES_ID}'>{}</div>",
        NEWLINES_RE.replace_all(&html, "\n")
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::source::fixtures::MemorySource;

    const FOOTNOTES: &str = r##"<div class="sect1"/>
<div id="footnotes">
<hr/>
<div class="footnote" id="_footnotedef_1">
<a href="#_footnoteref_1">1</a>. One</div>


<div class="footnote" id="_footnotedef_2">
<a href="#_footnoteref_2">2</a>. Two</div>
<div class="footnote" id="_footnotedef_3">
<a href="#_footnoteref_3">3</a>. Three</div>
</div>"##;

    #[test]
    fn only_cited_footnotes_are_kept() {
        let tree = DocumentTree::parse(FOOTNOTES).expect("can parse");
        let mut citations = FootnoteCitations::default();
        citations.cite("_footnoteref_1");
        citations.cite("_footnoteref_3");

        let block = footnote_block(&tree, &citations);
        assert!(block.starts_with("<div id='footnotes'>\n<hr>\n"));
        assert!(block.contains("One"));
        assert!(!block.contains("Two"));
        assert!(block.contains("Three"));
        assert!(!block.contains("\n\n"));
        assert!(block.ends_with("</div>"));
    }

    #[test]
    fn no_citations_no_block() {
        let tree = DocumentTree::parse(FOOTNOTES).expect("can parse");
        assert_eq!(footnote_block(&tree, &FootnoteCitations::default()), "");
    }

    #[test]
    fn images_are_relocated_once() {
        let book = Book::new(2, "en");
        let mut nodes = DocumentTree::parse(
            r#"<img src="images/foo.png" alt="foo"/><img src="./images/foo.png"/><img src="https://example.com/x.png"/>"#,
        )
        .expect("can parse")
        .root
        .children;

        let images = relocate_images(&mut nodes, &book);

        assert_eq!(images, vec!["images/foo.png"]);
        assert_eq!(
            to_html(&nodes),
            r#"<img src="{{< relurl "book/en/v2/images/foo.png" >}}" alt="foo"><img src="{{< relurl "book/en/v2/images/foo.png" >}}"><img src="https://example.com/x.png">"#
        );
    }

    #[test]
    fn images_fall_back_to_the_chapter_directory() {
        let source = MemorySource::default()
            .with_file("book/01-intro/images/foo.png", [1u8, 2, 3])
            .with_file("images/bar.png", [4u8]);
        let images = vec![
            "images/foo.png".to_string(),
            "images/bar.png".to_string(),
            "images/missing.png".to_string(),
        ];

        let assets = fetch_assets(&source, &images, "book/01-intro/1-intro.asc");

        assert_eq!(assets.len(), 2);
        assert_eq!(assets["images/foo.png"], vec![1, 2, 3]);
        assert_eq!(assets["images/bar.png"], vec![4]);
        assert!(!assets.contains_key("images/missing.png"));
    }
}
