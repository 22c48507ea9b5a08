use crate::book::{Book, Chapter, Section};
use anyhow::Result;

mod site;
pub use site::*;

/// Persistence for books as they are assembled.
///
/// Chapters are saved as soon as they are known, sections once their
/// markup and assets are final, and the book itself last, once the build
/// has succeeded.
pub trait Store {
    /// Load the stored metadata of a book, or start a new one.
    fn find_or_create_book(&self, edition: u32, language: &str) -> Result<Book>;

    /// Remove every generated section page and asset of `book`.
    fn remove_all_section_files(&self, book: &Book) -> Result<()>;

    fn save_chapter(&self, book: &Book, chapter: &Chapter) -> Result<()>;

    fn save_section(&self, book: &Book, chapter: &Chapter, section: &Section) -> Result<()>;

    fn save_book(&self, book: &Book) -> Result<()>;
}
