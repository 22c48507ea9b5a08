//! Rendering flattened AsciiDoc into a document tree.

use crate::document::DocumentTree;
use anyhow::{anyhow, Context, Result};
use log::debug;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

pub trait Renderer {
    /// Render a fully expanded document for the given locale.
    fn render(&self, source: &str, locale: &str) -> Result<DocumentTree>;
}

/// Renders with the `asciidoctor` command line tool.
///
/// The document is converted with the XHTML5 backend so the output is
/// well-formed XML, and without header and footer so the result is the
/// embeddable body: the section containers followed by the footnotes.
#[derive(Debug, Clone)]
pub struct Asciidoctor {
    program: PathBuf,
}

impl Asciidoctor {
    pub fn new<P: Into<PathBuf>>(program: P) -> Asciidoctor {
        Asciidoctor {
            program: program.into(),
        }
    }

    fn arguments(locale: &str) -> Vec<String> {
        vec![
            "--backend".to_string(),
            "xhtml5".to_string(),
            "--no-header-footer".to_string(),
            "--attribute".to_string(),
            format!("lang={locale}"),
            "--out-file".to_string(),
            "-".to_string(),
            "-".to_string(),
        ]
    }
}

impl Renderer for Asciidoctor {
    fn render(&self, source: &str, locale: &str) -> Result<DocumentTree> {
        debug!(
            "rendering {} bytes with {}",
            source.len(),
            self.program.display()
        );

        // asciidoctor reads all of stdin before writing anything, and its
        // warnings go straight to our stderr, so the pipes can't deadlock
        let mut child = Command::new(&self.program)
            .args(Self::arguments(locale))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("Failed to open stdin of {}", self.program.display()))?;
            stdin
                .write_all(source.as_bytes())
                .with_context(|| "Failed to send the document to the renderer")?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", self.program.display()))?;
        if !output.status.success() {
            return Err(anyhow!(
                "{} exited with {}",
                self.program.display(),
                output.status
            ));
        }

        let html = String::from_utf8(output.stdout)
            .with_context(|| "Renderer output isn't valid UTF-8")?;
        DocumentTree::parse(&html)
    }
}
