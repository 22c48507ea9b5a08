//! Locale attributes for the renderer.
//!
//! Asciidoctor ships translated captions ("Chapter", "Table of Contents", …)
//! as attribute files, one per language. The file for the book's language is
//! spliced into the document ahead of the first chapter. A missing or
//! unreachable file is not an error: the book is built with default captions.

use anyhow::{Context, Result};
use log::warn;
use std::time::Duration;

pub const DEFAULT_LOCALE_ATTRIBUTES_URL: &str = "https://raw.githubusercontent.com/asciidoctor/asciidoctor/main/data/locale/attributes-{lang}.adoc";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The attribute file URL for `language`
pub fn locale_attributes_url(template: &str, language: &str) -> String {
    template.replace("{lang}", language)
}

/// Fetch the locale attribute file for `language`, or an empty string if it
/// can't be read.
pub fn fetch_locale_attributes(template: &str, language: &str) -> String {
    let url = locale_attributes_url(template, language);
    match try_fetch(&url) {
        Ok(attributes) => attributes,
        Err(e) => {
            warn!("could not read {language} attributes: {e:#}");
            String::new()
        }
    }
}

fn try_fetch(url: &str) -> Result<String> {
    let agent = ureq::AgentBuilder::new().timeout(FETCH_TIMEOUT).build();
    let response = agent
        .get(url)
        .call()
        .with_context(|| format!("Failed to fetch {url}"))?;
    response
        .into_string()
        .with_context(|| format!("Failed to read the response from {url}"))
}
