//! Rewriting of in-book links to site placeholders and registration of the
//! anchors each section owns.

use crate::book::{is_footnote_id, Book, XrefTarget};
use crate::document::{elements, for_each_element_mut, Element, Node};
use crate::error::RewriteError;
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    /// A link into a chapter page of the multi-page rendering, e.g. `1-intro.html#_setup`.
    static ref CHAPTER_LINK_RE: Regex = Regex::new(r"^1-.*?\.html#(.+)$").unwrap();
}

/// Footnotes cited from within one section, by footnote number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FootnoteCitations {
    numbers: BTreeSet<String>,
}

impl FootnoteCitations {
    /// Record a citation if `id` names a footnote definition or reference.
    pub fn cite(&mut self, id: &str) -> bool {
        match footnote_number(id) {
            Some(number) => {
                self.numbers.insert(number.to_string());
                true
            }
            None => false,
        }
    }

    /// Whether the footnote with definition or reference id `id` is cited
    pub fn cites(&self, id: &str) -> bool {
        footnote_number(id)
            .map(|number| self.numbers.contains(number))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

fn footnote_number(id: &str) -> Option<&str> {
    if !is_footnote_id(id) {
        return None;
    }
    id.strip_prefix("_footnotedef_")
        .or_else(|| id.strip_prefix("_footnoteref_"))
}

/// The site placeholder a link to anchor `id` is rewritten to.
pub fn placeholder_url(prefix: &str, id: &str) -> Result<String, RewriteError> {
    let unsafe_char = |c: char| matches!(c, '"' | '<' | '>' | '{' | '}' | '\\') || c.is_whitespace();
    if id.is_empty() || id.contains(unsafe_char) {
        return Err(RewriteError::UnsafeAnchor(id.to_string()));
    }
    Ok(format!("{{{{< relurl \"{prefix}ch00/{id}\" >}}}}"))
}

/// The anchor a link points at, for links that stay inside the book.
fn link_anchor(href: &str) -> Option<String> {
    if let Some(caps) = CHAPTER_LINK_RE.captures(href) {
        return Some(caps[1].to_string());
    }
    href.strip_prefix('#')
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Rewrite every in-book link in `nodes` to its site placeholder.
///
/// Anchors that don't have an owner yet are registered as redirects. Links
/// to footnotes are left alone and collected into `citations` instead.
pub fn rewrite_links(nodes: &mut [Node], book: &mut Book, citations: &mut FootnoteCitations) {
    let prefix = book.prefix();
    for_each_element_mut(nodes, &mut |element: &mut Element| {
        let Some(href) = element.attr("href").map(|href| href.into_owned()) else {
            return;
        };
        let Some(anchor) = link_anchor(&href) else {
            return;
        };
        if href.starts_with('#') && citations.cite(&anchor) {
            return;
        }

        book.register_xref(&anchor, XrefTarget::RedirectToEn);
        match placeholder_url(&prefix, &anchor) {
            Ok(url) => element.set_raw_attr("href", url),
            Err(e) => trace!("leaving link {href} as is: {e}"),
        }
    });
}

/// Point every anchor in `nodes` at `target`.
pub fn register_ids(nodes: &[Node], book: &mut Book, target: XrefTarget) {
    for element in elements(nodes) {
        if let Some(id) = element.id() {
            book.register_xref(&id, target);
        }
    }
}
