//! Flattening of `include::<file>[]` directives into one document.

use crate::paths;
use crate::source::ContentLookup;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::{Captures, Regex};

lazy_static! {
    /// An include directive with no attributes.
    pub(crate) static ref INCLUDE_RE: Regex = Regex::new(r"include::(\S+)\[\]").unwrap();
    /// A cross reference into another source file, e.g. `<<ch02-git-basics.asc#_tagging>>`.
    static ref DOCUMENT_XREF_RE: Regex = Regex::new(r"<<[^<>#]*?#([^<>]*?)>>").unwrap();
}

const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Recursively replace every include directive in `content` with the
/// expanded contents of the file it names.
///
/// `path` is the root-relative path `content` was read from; targets are
/// resolved relative to its directory. Files that cannot be fetched expand
/// to nothing.
pub fn expand(content: &str, path: &str, lookup: &dyn ContentLookup) -> String {
    INCLUDE_RE
        .replace_all(content, |caps: &Captures| {
            let target = paths::resolve(path, &caps[1]);
            match lookup.fetch_text(&target) {
                Ok(Some(text)) => {
                    debug!("expanding {target} into {path}");
                    let text = text.trim_start_matches(BYTE_ORDER_MARK);
                    expand(text, &target, lookup)
                }
                Ok(None) => {
                    warn!("{target} could not be resolved for expansion");
                    String::new()
                }
                Err(e) => {
                    warn!("{target} could not be resolved for expansion: {e:#}");
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Reduce cross references that name another source file to plain in-document
/// references, since the flattened book is rendered as a single document.
pub fn collapse_document_xrefs(content: &str) -> String {
    DOCUMENT_XREF_RE.replace_all(content, "<<$1>>").into_owned()
}
