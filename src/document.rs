//! Typed tree for rendered book markup.
//!
//! The renderer emits XHTML, which is read once into a tree of elements, text
//! and comments. Structural queries (section containers, headings, ids, links,
//! images) and rewrites operate on this tree instead of on serialized text.
//!
//! Text and attribute values are stored exactly as they appeared in the
//! markup (still escaped) so that serializing an untouched subtree gives back
//! the original bytes. Accessors such as [`Element::attr`] and
//! [`Element::text`] decode entities on the way out.

use anyhow::Result;
use log::{trace, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;

/// Elements that never have content and are written without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const DOCUMENT_ROOT: &str = "#document";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// The value as written in the markup, entities left escaped
    raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Raw (escaped) character data
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

/// A parsed rendered document. Its root is a synthetic container holding the
/// top-level nodes, so fragments with several root elements are accepted.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    pub root: Element,
}

impl Element {
    pub fn new<S: ToString>(name: S) -> Element {
        Element {
            name: name.to_string(),
            attributes: Vec::default(),
            children: Vec::default(),
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Element {
        let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
        for attr in start.attributes().with_checks(false).flatten() {
            element.attributes.push(Attribute {
                name: String::from_utf8_lossy(attr.key.as_ref()).to_string(),
                raw: String::from_utf8_lossy(&attr.value).to_string(),
            });
        }
        element
    }

    /// The decoded value of an attribute
    pub fn attr(&self, name: &str) -> Option<Cow<'_, str>> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| html_escape::decode_html_entities(&attr.raw))
    }

    /// Set an attribute to a value that is written to the markup verbatim.
    ///
    /// Used for placeholders such as `{{< relurl "…" >}}` that must reach the
    /// static site generator without being escaped.
    pub fn set_raw_attr<S: ToString>(&mut self, name: &str, raw: S) {
        let raw = raw.to_string();
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(attr) => attr.raw = raw,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                raw,
            }),
        }
    }

    pub fn id(&self) -> Option<Cow<'_, str>> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn is(&self, name: &str, class: &str) -> bool {
        self.name == name && self.has_class(class)
    }

    /// Direct child elements, skipping text and comments
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// All descendant elements in document order, excluding `self`
    pub fn descendants(&self) -> Elements<'_> {
        Elements::new(&self.children)
    }

    /// Decoded text content of this element and its descendants, trimmed
    pub fn text(&self) -> String {
        let mut text = String::new();
        collect_text(&self.children, &mut text);
        html_escape::decode_html_entities(&text).trim().to_string()
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str())
    }

    pub fn to_html(&self) -> String {
        let mut html = String::new();
        self.write_html(&mut html);
        html
    }

    pub fn inner_html(&self) -> String {
        to_html(&self.children)
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&attr.name);
            out.push_str("=\"");
            out.push_str(&attr.raw);
            out.push('"');
        }
        out.push('>');

        if self.is_void() && self.children.is_empty() {
            return;
        }

        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

impl Node {
    fn write_html(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_html(out),
            Node::Text(text) => out.push_str(text),
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
        }
    }
}

fn collect_text(nodes: &[Node], text: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => text.push_str(t),
            Node::Element(element) => collect_text(&element.children, text),
            Node::Comment(_) => {}
        }
    }
}

/// Serialize a list of sibling nodes.
pub fn to_html(nodes: &[Node]) -> String {
    let mut html = String::new();
    for node in nodes {
        node.write_html(&mut html);
    }
    html
}

/// Every element in `nodes` and below, in document order.
pub fn elements(nodes: &[Node]) -> Elements<'_> {
    Elements::new(nodes)
}

/// Call `f` on every element in `nodes` and below, parents before children.
pub fn for_each_element_mut<F: FnMut(&mut Element)>(nodes: &mut [Node], f: &mut F) {
    for node in nodes.iter_mut() {
        if let Node::Element(element) = node {
            f(element);
            for_each_element_mut(&mut element.children, f);
        }
    }
}

/// Pre-order iterator over elements.
pub struct Elements<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Elements<'a> {
    fn new(nodes: &'a [Node]) -> Self {
        let mut stack = Vec::new();
        push_elements(&mut stack, nodes);
        Elements { stack }
    }
}

fn push_elements<'a>(stack: &mut Vec<&'a Element>, nodes: &'a [Node]) {
    for node in nodes.iter().rev() {
        if let Node::Element(element) = node {
            stack.push(element);
        }
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        push_elements(&mut self.stack, &element.children);
        Some(element)
    }
}

impl DocumentTree {
    /// Parse markup produced by the renderer.
    ///
    /// The document may be a full page or an embedded fragment with several
    /// top-level elements. Parsing is lenient: void elements need no closing
    /// tag, a closing tag closes every element opened after its match, stray
    /// closing tags are ignored, and a syntax error ends the document where
    /// it occurs. Declarations, doctypes and processing instructions are
    /// dropped; entity references are kept verbatim in the text.
    pub fn parse(content: &str) -> Result<DocumentTree> {
        let mut reader = Reader::from_str(content);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;

        let mut stack: Vec<Element> = vec![Element::new(DOCUMENT_ROOT)];

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        "rendered document is malformed near byte {}, ignoring the rest: {e}",
                        reader.buffer_position()
                    );
                    break;
                }
            };

            match event {
                Event::Eof => break,
                Event::Start(start) => {
                    let element = Element::from_start(&start);
                    if element.is_void() {
                        push_child(&mut stack, Node::Element(element));
                    } else {
                        stack.push(element);
                    }
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).to_string();
                    close_element(&mut stack, &name);
                }
                Event::Empty(start) => {
                    push_child(&mut stack, Node::Element(Element::from_start(&start)));
                }
                Event::Text(text) => {
                    push_text(&mut stack, &String::from_utf8_lossy(&text));
                }
                Event::GeneralRef(reference) => {
                    push_text(
                        &mut stack,
                        &format!("&{};", String::from_utf8_lossy(&reference)),
                    );
                }
                Event::CData(data) => {
                    push_text(
                        &mut stack,
                        &format!("<![CDATA[{}]]>", String::from_utf8_lossy(&data)),
                    );
                }
                Event::Comment(comment) => {
                    push_child(
                        &mut stack,
                        Node::Comment(String::from_utf8_lossy(&comment).to_string()),
                    );
                }
                // declarations, doctypes and processing instructions
                _ => {}
            }
        }

        // close anything left open at the end of input
        while stack.len() > 1 {
            if let Some(element) = stack.pop() {
                push_child(&mut stack, Node::Element(element));
            }
        }

        let root = stack.pop().unwrap_or_else(|| Element::new(DOCUMENT_ROOT));
        Ok(DocumentTree { root })
    }

    /// All elements of the document in document order
    pub fn elements(&self) -> Elements<'_> {
        self.root.descendants()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.elements()
            .find(|element| element.id().as_deref() == Some(id))
    }
}

/// Close the innermost open element named `name`, along with everything
/// opened inside it. Closing tags without an open element are dropped.
fn close_element(stack: &mut Vec<Element>, name: &str) {
    // the synthetic root is never closed by the markup
    let Some(depth) = stack.iter().skip(1).rposition(|e| e.name == name) else {
        trace!("ignoring stray closing tag </{name}>");
        return;
    };
    while stack.len() > depth + 1 {
        if let Some(element) = stack.pop() {
            push_child(stack, Node::Element(element));
        }
    }
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

/// Append text, merging with a preceding text node so entity references do
/// not split runs of character data.
fn push_text(stack: &mut [Element], text: &str) {
    if let Some(parent) = stack.last_mut() {
        if let Some(Node::Text(previous)) = parent.children.last_mut() {
            previous.push_str(text);
        } else {
            parent.children.push(Node::Text(text.to_string()));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = r##"<div class="sect1">
<h2 id="_getting_started">Getting <code>git</code> Started</h2>
<div class="sectionbody">
<div class="paragraph"><p>Tom &amp; Jerry&#8217;s <a href="#_setup">setup</a>.</p></div>
<div class="imageblock"><img src="images/a.png" alt="A"/></div>
<!-- a comment -->
</div>
</div>
<div id="footnotes"><hr/></div>"##;

    #[test]
    fn untouched_markup_serializes_back_verbatim() {
        let tree = DocumentTree::parse(SAMPLE).expect("can parse sample");
        let expected = SAMPLE
            .replace(r#"alt="A"/>"#, r#"alt="A">"#)
            .replace("<hr/>", "<hr>");
        assert_eq!(tree.root.inner_html(), expected);
    }

    #[test]
    fn accepts_several_top_level_elements() {
        let tree = DocumentTree::parse(SAMPLE).expect("can parse sample");
        let names: Vec<&str> = tree
            .root
            .child_elements()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["div", "div"]);
    }

    #[test]
    fn descendants_are_in_document_order() {
        let tree = DocumentTree::parse(SAMPLE).expect("can parse sample");
        let names: Vec<&str> = tree.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["div", "h2", "code", "div", "div", "p", "a", "div", "img", "div", "hr"]
        );
    }

    #[test]
    fn text_and_attributes_are_decoded() {
        let tree = DocumentTree::parse(
            r#"<p title="a &amp; b">Tom &amp; Jerry&#8217;s <em>cat</em></p>"#,
        )
        .expect("can parse");
        let p = tree.root.child_elements().next().expect("has a paragraph");
        assert_eq!(p.attr("title").as_deref(), Some("a & b"));
        assert_eq!(p.text(), "Tom & Jerry\u{2019}s cat");
    }

    #[test]
    fn queries_by_id_and_class() {
        let tree = DocumentTree::parse(SAMPLE).expect("can parse sample");
        let heading = tree.find_by_id("_getting_started").expect("heading found");
        assert_eq!(heading.text(), "Getting git Started");
        assert!(tree.find_by_id("footnotes").is_some());
        assert!(tree.find_by_id("missing").is_none());

        let sect1 = tree.root.child_elements().next().expect("has sect1");
        assert!(sect1.is("div", "sect1"));
        assert!(!sect1.is("div", "sect2"));
    }

    #[test]
    fn raw_attributes_are_written_verbatim() {
        let mut element = Element::new("a");
        element.set_raw_attr("href", r#"{{< relurl "book/en/v2/ch00/x" >}}"#);
        element.children.push(Node::Text("x".to_string()));
        assert_eq!(
            element.to_html(),
            r#"<a href="{{< relurl "book/en/v2/ch00/x" >}}">x</a>"#
        );
    }

    #[test]
    fn rewrites_reach_nested_elements() {
        let mut tree = DocumentTree::parse(SAMPLE).expect("can parse sample");
        for_each_element_mut(&mut tree.root.children, &mut |element| {
            if element.name == "h2" {
                element.name = "h1".to_string();
            }
        });
        assert!(tree.root.inner_html().contains("<h1 id=\"_getting_started\">"));
        assert!(tree.root.inner_html().contains("</h1>"));
    }

    #[test]
    fn empty_non_void_elements_keep_their_closing_tag() {
        let tree = DocumentTree::parse(r#"<div class="x"/><br/>"#).expect("can parse");
        assert_eq!(tree.root.inner_html(), r#"<div class="x"></div><br>"#);
    }

    #[test]
    fn unclosed_void_elements_do_not_break_parsing() {
        let tree = DocumentTree::parse(
            r#"<div class="sect1"><h2 id="_a">A</h2><p>x<br>y<img src="a.png"></p></div><div id="after"/>"#,
        )
        .expect("can parse");
        let sect1 = tree.root.child_elements().next().expect("has sect1");
        assert!(sect1.is("div", "sect1"));
        assert_eq!(
            sect1.inner_html(),
            r#"<h2 id="_a">A</h2><p>x<br>y<img src="a.png"></p>"#
        );
        assert!(tree.find_by_id("after").is_some());
    }

    #[test]
    fn mismatched_closing_tags_are_recovered() {
        let tree = DocumentTree::parse("<div><p><em>a</p>b</div></span><p>c</p>")
            .expect("can parse");
        assert_eq!(
            tree.root.inner_html(),
            "<div><p><em>a</em></p>b</div><p>c</p>"
        );
    }

    #[test]
    fn malformed_markup_keeps_what_came_before() {
        let tree = DocumentTree::parse(r#"<div id="kept"><p>ok</p><p class="x></div>"#)
            .expect("can parse");
        assert!(tree.find_by_id("kept").is_some());
    }
}
