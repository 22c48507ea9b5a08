use super::{open_repository, resolve_commit};
use crate::paths;
use crate::source::ContentLookup;
use anyhow::{anyhow, Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Source files read from a checked-out working copy.
#[derive(Debug)]
pub struct Worktree {
    root: PathBuf,
}

impl Worktree {
    /// Use the working copy rooted at `root`
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Worktree> {
        let root: PathBuf = root.into();

        // make sure the root is a path
        if !root.is_dir() {
            return Err(anyhow!(
                "Working copy path {} isn't a directory!",
                root.display()
            ));
        }

        let root = match std::fs::canonicalize(&root) {
            Ok(p) => p,
            Err(e) => {
                return Err(anyhow!("Failed to canonicalize {}: {e:#}", root.display()));
            }
        };

        Ok(Worktree { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The commit checked out in the working copy
    pub fn revision(&self) -> Result<String> {
        let repo = open_repository(&self.root)?;
        let commit = resolve_commit(&repo, "HEAD")?;
        Ok(commit.id().to_string())
    }
}

impl ContentLookup for Worktree {
    fn fetch_bytes(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let cleaned = paths::clean(path);
        if path.starts_with('/') || paths::escapes_root(&cleaned) {
            return Err(anyhow!("'{path}' is outside the working copy"));
        }
        let file_path = self.root.join(cleaned);
        match std::fs::read(&file_path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read '{}'", file_path.display())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_files_relative_to_the_root() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        std::fs::create_dir_all(dir.path().join("book/01-intro")).expect("can create dirs");
        std::fs::write(dir.path().join("book/01-intro/1-intro.asc"), "== Intro\n")
            .expect("can write file");

        let worktree = Worktree::open(dir.path()).expect("can open worktree");
        assert_eq!(
            worktree
                .fetch_text("book/01-intro/1-intro.asc")
                .expect("lookup works"),
            Some("== Intro\n".to_string())
        );
        assert_eq!(worktree.fetch_bytes("missing.asc").expect("lookup works"), None);
    }

    #[test]
    fn refuses_paths_outside_the_root() {
        let parent = tempfile::tempdir().expect("can create temp dir");
        std::fs::write(parent.path().join("secret.txt"), "secret").expect("can write file");
        let root = parent.path().join("book");
        std::fs::create_dir_all(&root).expect("can create dirs");

        let worktree = Worktree::open(&root).expect("can open worktree");
        assert!(worktree.fetch_bytes("../secret.txt").is_err());
        assert!(worktree.fetch_bytes("images/../../secret.txt").is_err());
        let absolute = parent.path().join("secret.txt");
        assert!(worktree
            .fetch_bytes(&absolute.display().to_string())
            .is_err());
    }

    #[test]
    fn refuses_missing_roots() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        assert!(Worktree::open(dir.path().join("nope")).is_err());
    }

    #[test]
    fn revision_requires_a_repository() {
        let dir = tempfile::tempdir().expect("can create temp dir");
        let worktree = Worktree::open(dir.path()).expect("can open worktree");
        assert!(worktree.revision().is_err());
    }
}
