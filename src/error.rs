use thiserror::Error;

/// Failures of a single rewrite inside a section fragment.
///
/// These never abort a build: the offending link or image is left as it was
/// and processing moves on to the next one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("anchor id `{0}` cannot be embedded in a link placeholder")]
    UnsafeAnchor(String),

    #[error("image reference is empty")]
    EmptyImage,

    #[error("image reference `{0}` does not point into the repository")]
    ExternalImage(String),

    #[error("image reference `{0}` escapes the repository root")]
    EscapingImage(String),
}
