//! Lexical helpers for `/`-separated repository paths.
//!
//! Book sources are addressed by paths relative to the repository root no
//! matter which provider serves them, so these helpers never touch the
//! filesystem.

/// Remove `.` components and fold `..` into their parent.
///
/// Leading `..` components that climb above the root are kept, so callers
/// can detect them with [`escapes_root`].
pub fn clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            part => parts.push(part),
        }
    }
    parts.join("/")
}

/// The directory containing `path`, or `None` for files at the root.
pub fn parent(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((dir, _)) if dir == "." => None,
        Some((dir, _)) => Some(dir),
    }
}

/// Resolve `target` relative to the directory of the file `from`.
///
/// Files at the root resolve their targets as written.
pub fn resolve(from: &str, target: &str) -> String {
    match parent(from) {
        Some(dir) => clean(&format!("{dir}/{target}")),
        None => target.to_string(),
    }
}

pub fn escapes_root(path: &str) -> bool {
    path == ".." || path.starts_with("../")
}
