//! Splitting a rendered book into chapter and section units.
//!
//! Every top-level `div.sect1` is one chapter; its `div.sect2` descendants
//! are its sections. Units hold clones of the rendered nodes so they can be
//! rewritten without touching the document they came from.

use crate::document::{for_each_element_mut, DocumentTree, Element, Node};

/// One chapter's worth of rendered markup.
#[derive(Debug, Clone)]
pub struct ChapterUnit {
    pub title: String,
    pub heading_id: Option<String>,
    /// Markup between the chapter heading and the first section
    pub pretext: Vec<Node>,
    pub sections: Vec<SectionUnit>,
}

#[derive(Debug, Clone)]
pub struct SectionUnit {
    pub title: String,
    pub heading_id: Option<String>,
    pub nodes: Vec<Node>,
}

/// The chapter containers of a rendered book, in document order.
pub fn chapter_containers(tree: &DocumentTree) -> Vec<&Element> {
    tree.elements().filter(|e| e.is("div", "sect1")).collect()
}

/// The chapter heading of a container, if it has one.
pub fn chapter_heading(container: &Element) -> Option<&Element> {
    container.child_elements().find(|e| e.name == "h2")
}

/// Cut a chapter container into its pretext and sections.
///
/// Returns `None` for containers without a chapter heading.
pub fn segment(container: &Element) -> Option<ChapterUnit> {
    let heading = chapter_heading(container)?;
    let body = container.child_elements().find(|e| e.is("div", "sectionbody"));

    let pretext = match body {
        Some(body) => body
            .children
            .iter()
            .take_while(|node| !matches!(node, Node::Element(e) if e.is("div", "sect2")))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let sections = container
        .descendants()
        .filter(|e| e.is("div", "sect2"))
        .map(|section| {
            let heading = section.child_elements().find(|e| e.name == "h3");
            SectionUnit {
                title: heading.map(Element::text).unwrap_or_default(),
                heading_id: heading.and_then(|h| h.id()).map(|id| id.into_owned()),
                nodes: section.children.clone(),
            }
        })
        .collect();

    Some(ChapterUnit {
        title: heading.text(),
        heading_id: heading.id().map(|id| id.into_owned()),
        pretext,
        sections,
    })
}

/// Promote headings one level, as sections become pages of their own.
pub fn shift_headings(nodes: &mut [Node]) {
    for_each_element_mut(nodes, &mut |element: &mut Element| {
        let level = match element.name.as_str() {
            "h3" => 2,
            "h4" => 3,
            "h5" => 4,
            "h6" => 5,
            _ => return,
        };
        element.name = format!("h{level}");
    });
}
