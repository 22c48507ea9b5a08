//! Access to the book's source files.
//!
//! The assembly pipeline never reads files itself; everything goes through a
//! [`ContentLookup`] so the same build can run against a working copy, a
//! commit in a git object database, or an in-memory fixture.

use anyhow::Result;

mod locale;
pub use locale::*;

mod providers;
pub use providers::*;

mod tag;
pub use tag::*;

pub trait ContentLookup {
    /// Fetch the raw contents of a root-relative path.
    ///
    /// `Ok(None)` means nothing exists at `path`; errors are reserved for
    /// lookups that could not be performed at all.
    fn fetch_bytes(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Fetch a text file, replacing invalid UTF-8.
    fn fetch_text(&self, path: &str) -> Result<Option<String>> {
        Ok(self
            .fetch_bytes(path)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}
