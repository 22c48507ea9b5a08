//! Git tag lookup for ebook release links.
//!
//! Packaged ebooks are published per release tag, so the newest tag of the
//! book repository decides which download links a book advertises. Both
//! annotated tags (peeled through the tag object) and lightweight tags
//! (refs pointing straight at a commit) are considered.

use super::open_repository;
use anyhow::{Context, Result};
use chrono::prelude::*;
use std::path::Path;

/// A git tag and the commit it points to.
pub struct Tag {
    /// Tag name without the refs/tags/ prefix (e.g., "2.1.400")
    pub name: String,
    /// Full SHA-1 hash of the tagged commit
    pub commit_hash: String,
    /// Commit timestamp with the committer's timezone
    pub commit_date: DateTime<FixedOffset>,
}

impl Tag {
    /// Look up a tag by name, returning `None` when it doesn't lead to a
    /// commit.
    pub fn find(repo: &git2::Repository, name: &str) -> Option<Tag> {
        let reference = repo.find_reference(&format!("refs/tags/{name}")).ok()?;
        let commit = reference.peel_to_commit().ok()?;

        let time = commit.time();
        let offset = FixedOffset::east_opt(time.offset_minutes() * 60)?;
        let commit_date = offset.timestamp_opt(time.seconds(), 0).single()?;

        Some(Tag {
            name: name.to_string(),
            commit_hash: commit.id().to_string(),
            commit_date,
        })
    }

    /// All tags of a repository, most recent commit first.
    pub fn all(repo: &git2::Repository) -> Result<Vec<Tag>> {
        let names = repo
            .tag_names(None)
            .with_context(|| "Failed to list repository tags")?;

        let mut tags: Vec<Tag> = names
            .iter()
            .flatten()
            .filter_map(|name| Tag::find(repo, name))
            .collect();
        tags.sort_by(|a, b| {
            b.commit_date
                .cmp(&a.commit_date)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(tags)
    }
}

/// The name of the most recently committed tag of the repository at `path`.
pub fn latest_tag(path: &Path) -> Result<Option<String>> {
    let repo = open_repository(path)?;
    let tags = Tag::all(&repo)?;
    Ok(tags.into_iter().next().map(|tag| tag.name))
}
