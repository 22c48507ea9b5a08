mod commit_snapshot;
mod worktree;
pub use commit_snapshot::*;
pub use worktree::*;

use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Open the git repository at `path`, failing with a readable message.
pub fn open_repository(path: &Path) -> Result<git2::Repository> {
    if !path.is_dir() {
        return Err(anyhow!(
            "Repository path {} isn't a directory!",
            path.display()
        ));
    }

    git2::Repository::open(path).with_context(|| {
        format!(
            "Failed to open path {} as a git repository!",
            path.display()
        )
    })
}

/// Resolve a revision such as `HEAD`, a branch or a commit id to a commit.
pub fn resolve_commit<'r>(repo: &'r git2::Repository, revision: &str) -> Result<git2::Commit<'r>> {
    repo.revparse_single(revision)
        .with_context(|| format!("Failed to resolve revision '{revision}'"))?
        .peel_to_commit()
        .with_context(|| format!("Revision '{revision}' doesn't point to a commit"))
}
