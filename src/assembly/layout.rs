//! Classification of the root document's includes into chapters and
//! appendices.
//!
//! Two repository layouts are recognised. The legacy one keeps every chapter
//! in its own directory (`book/01-introduction/1-introduction.asc`), the
//! modern one keeps chapter files at the top level (`ch01-introduction.asc`,
//! `A-git-in-other-environments.asc`).

use super::include::INCLUDE_RE;
use crate::book::ChapterKind;
use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, Regex};

lazy_static! {
    static ref LEGACY_CHAPTER_RE: Regex =
        Regex::new(r"^book/(?:[^/]+/)?[0-9][^/]*/1-[^/]*\.asc$").unwrap();
    static ref LEGACY_APPENDIX_RE: Regex =
        Regex::new(r"^book/(?:[^/]+/)?[A-C][^/]*/[^/]*\.asc$").unwrap();
    static ref MODERN_CHAPTER_RE: Regex = Regex::new(r"^(?:.*/)?ch[0-9]{2}-[^/]*\.asc$").unwrap();
    static ref MODERN_APPENDIX_RE: Regex = Regex::new(r"^(?:.*/)?[A-C]-[^/]*\.asc$").unwrap();
}

/// A planned chapter, in the order the root document includes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSlot {
    pub kind: ChapterKind,
    /// Position among slots of the same kind, starting at 1
    pub ordinal: u32,
    pub source_path: String,
}

impl ChapterSlot {
    pub fn chapter_number(&self) -> u32 {
        self.kind.chapter_number(self.ordinal)
    }
}

fn kind_of(target: &str) -> Option<ChapterKind> {
    if LEGACY_CHAPTER_RE.is_match(target) || MODERN_CHAPTER_RE.is_match(target) {
        Some(ChapterKind::Chapter)
    } else if LEGACY_APPENDIX_RE.is_match(target) || MODERN_APPENDIX_RE.is_match(target) {
        Some(ChapterKind::Appendix)
    } else {
        None
    }
}

/// Targets of the include directives in `root`, in file order.
pub fn include_targets(root: &str) -> Vec<String> {
    INCLUDE_RE
        .captures_iter(root)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Plan the chapters of a book from its root document.
pub fn classify(root: &str) -> Vec<ChapterSlot> {
    let mut chapters = 0;
    let mut appendices = 0;
    let mut slots = Vec::new();

    for target in include_targets(root) {
        let Some(kind) = kind_of(&target) else {
            continue;
        };
        let ordinal = match kind {
            ChapterKind::Chapter => {
                chapters += 1;
                chapters
            }
            ChapterKind::Appendix => {
                appendices += 1;
                appendices
            }
        };
        debug!("planned {kind} {ordinal} from {target}");
        slots.push(ChapterSlot {
            kind,
            ordinal,
            source_path: target,
        });
    }
    slots
}

/// Drop every include directive that doesn't name a chapter or appendix.
pub fn strip_foreign_includes(root: &str) -> String {
    INCLUDE_RE
        .replace_all(root, |caps: &Captures| {
            if kind_of(&caps[1]).is_some() {
                caps[0].to_string()
            } else {
                debug!("dropping include of {}", &caps[1]);
                String::new()
            }
        })
        .into_owned()
}

/// Insert the locale attribute definitions right before the first chapter
/// or appendix include, so they apply to the whole book body.
pub fn inject_locale_attributes(root: &str, attributes: &str) -> String {
    if attributes.is_empty() {
        return root.to_string();
    }

    let first = INCLUDE_RE
        .captures_iter(root)
        .find(|caps| kind_of(&caps[1]).is_some())
        .and_then(|caps| caps.get(0));

    match first {
        Some(directive) => {
            let at = directive.start();
            format!("{}{attributes}\n{}", &root[..at], &root[at..])
        }
        None => root.to_string(),
    }
}
