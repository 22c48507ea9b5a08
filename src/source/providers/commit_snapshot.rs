use super::{open_repository, resolve_commit};
use crate::source::ContentLookup;
use anyhow::{Context, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

/// Source files read straight from the tree of one commit, without needing
/// a checkout. Blobs are cached by object id, so files shared between paths
/// or fetched twice are only decoded once.
pub struct CommitSnapshot {
    repo: git2::Repository,
    commit_id: git2::Oid,
    tree_id: git2::Oid,
    blobs: RefCell<HashMap<git2::Oid, Vec<u8>>>,
}

impl CommitSnapshot {
    pub fn open<P: AsRef<Path>>(path: P, revision: &str) -> Result<CommitSnapshot> {
        let repo = open_repository(path.as_ref())?;
        let (commit_id, tree_id) = {
            let commit = resolve_commit(&repo, revision)?;
            let tree = commit
                .tree()
                .with_context(|| format!("Failed to load the tree of commit {}", commit.id()))?;
            (commit.id(), tree.id())
        };

        Ok(CommitSnapshot {
            repo,
            commit_id,
            tree_id,
            blobs: RefCell::new(HashMap::default()),
        })
    }

    /// The commit id the snapshot was taken from
    pub fn revision(&self) -> String {
        self.commit_id.to_string()
    }
}

impl ContentLookup for CommitSnapshot {
    fn fetch_bytes(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let tree = self
            .repo
            .find_tree(self.tree_id)
            .with_context(|| format!("Failed to find tree {}", self.tree_id))?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to look up '{path}'"));
            }
        };
        if entry.kind() != Some(git2::ObjectType::Blob) {
            return Ok(None);
        }

        let id = entry.id();
        if let Some(contents) = self.blobs.borrow().get(&id) {
            return Ok(Some(contents.clone()));
        }

        let blob = self
            .repo
            .find_blob(id)
            .with_context(|| format!("Failed to read blob {id} for '{path}'"))?;
        let contents = blob.content().to_vec();
        self.blobs.borrow_mut().insert(id, contents.clone());
        Ok(Some(contents))
    }
}
