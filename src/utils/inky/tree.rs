//! Lenient markup tree that reproduces its source byte for byte.
//!
//! Every node keeps the raw slice it was parsed from. Only elements whose
//! attributes were changed are re-serialized; everything else is written
//! back exactly as read.
//!
//! HTML is not XML, so the builder tolerates what the reader reports:
//! - void elements (`<br>`, `<img>`, ...) never take children
//! - a closing tag without a matching open element is kept as text
//! - an element that is never closed gives up its children, which become
//!   its following siblings
//! - a `<` that cannot open a tag is text, see [`mask_stray_lt`]

use anyhow::{Result, anyhow};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use std::borrow::Cow;

/// Private-use stand-in for a `<` that is text.
const STRAY_LT: char = '\u{E000}';

/// Elements that never have content or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug)]
pub enum Node<'a> {
    /// Text, comments, doctype, stray closing tags.
    Raw(&'a str),
    Element(Element<'a>),
}

#[derive(Debug)]
pub struct Element<'a> {
    /// Lowercased tag name.
    pub name: String,
    open: &'a str,
    attrs: Vec<(String, String)>,
    dirty: bool,
    /// `<x/>` or a void element.
    pub self_closing: bool,
    /// A matching closing tag was found.
    pub closed: bool,
    pub children: Vec<Node<'a>>,
    close: &'a str,
}

impl<'a> Element<'a> {
    fn new(open: &'a str, start: &BytesStart<'_>, self_closing: bool) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
        let attrs = start
            .html_attributes()
            .filter_map(Result::ok)
            .map(|attr| {
                (
                    String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase(),
                    String::from_utf8_lossy(&attr.value).into_owned(),
                )
            })
            .collect();

        Self {
            name,
            open,
            attrs,
            dirty: false,
            self_closing,
            closed: false,
            children: Vec::new(),
            close: "",
        }
    }

    /// Complete in the source: either closed or self-closing.
    pub const fn is_complete(&self) -> bool {
        self.closed || self.self_closing
    }

    pub fn attrs(&self) -> &[(String, String)] {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_owned(),
            None => self.attrs.push((name.to_owned(), value.to_owned())),
        }
        self.dirty = true;
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let classes = match self.attr("class").map(str::trim) {
            Some(existing) if !existing.is_empty() => format!("{existing} {class}"),
            _ => class.to_owned(),
        };
        self.set_attr("class", &classes);
    }

    /// Element children, skipping text.
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element<'a>> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Raw(_) => None,
        })
    }

    /// Whether any descendant element matches `pred`.
    pub fn any_descendant(&self, pred: &impl Fn(&Element<'_>) -> bool) -> bool {
        self.children.iter().any(|node| match node {
            Node::Element(el) => pred(el) || el.any_descendant(pred),
            Node::Raw(_) => false,
        })
    }

    /// Apply `f` to every descendant element, depth first.
    pub fn for_each_descendant_mut(&mut self, f: &mut impl FnMut(&mut Element<'a>)) {
        for el in self.child_elements_mut() {
            f(el);
            el.for_each_descendant_mut(f);
        }
    }

    pub fn write_open(&self, out: &mut String) {
        if !self.dirty {
            out.push_str(self.open);
            return;
        }
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            push_attr(out, key, value);
        }
        if self.open.ends_with("/>") {
            out.push_str(" />");
        } else {
            out.push('>');
        }
    }

    pub fn write_close(&self, out: &mut String) {
        out.push_str(self.close);
    }
}

/// Append ` key="value"`, switching to single quotes when needed.
pub fn push_attr(out: &mut String, key: &str, value: &str) {
    let quote = if value.contains('"') { '\'' } else { '"' };
    out.push(' ');
    out.push_str(key);
    out.push('=');
    out.push(quote);
    out.push_str(value);
    out.push(quote);
}

/// Serialize nodes without any component expansion.
pub fn write_nodes(nodes: &[Node<'_>], out: &mut String) {
    for node in nodes {
        match node {
            Node::Raw(text) => out.push_str(text),
            Node::Element(el) => {
                el.write_open(out);
                write_nodes(&el.children, out);
                el.write_close(out);
            }
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Hide every `<` that is not followed by a tag name, `/name`, `!` or `?`.
///
/// The reader would take such a `<` as the start of a tag. Sources that
/// already contain the stand-in character are returned unchanged.
pub fn mask_stray_lt(source: &str) -> Cow<'_, str> {
    if source.contains(STRAY_LT) {
        return Cow::Borrowed(source);
    }

    let bytes = source.as_bytes();
    let opens_markup = |pos: usize| match bytes.get(pos + 1) {
        Some(b'!' | b'?') => true,
        Some(b'/') => bytes.get(pos + 2).is_some_and(u8::is_ascii_alphabetic),
        Some(c) => c.is_ascii_alphabetic(),
        None => false,
    };

    let stray: Vec<usize> = source
        .match_indices('<')
        .map(|(pos, _)| pos)
        .filter(|&pos| !opens_markup(pos))
        .collect();
    if stray.is_empty() {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len() + stray.len() * 2);
    let mut last = 0;
    for pos in stray {
        out.push_str(&source[last..pos]);
        out.push(STRAY_LT);
        last = pos + 1;
    }
    out.push_str(&source[last..]);
    Cow::Owned(out)
}

/// Undo [`mask_stray_lt`] on rendered output.
pub fn unmask_stray_lt(rendered: String) -> String {
    if rendered.contains(STRAY_LT) {
        rendered.replace(STRAY_LT, "<")
    } else {
        rendered
    }
}

/// Parse `source` into a node list.
pub fn parse(source: &str) -> Result<Vec<Node<'_>>> {
    let mut reader = Reader::from_str(source);
    let config = reader.config_mut();
    config.trim_text(false);
    config.enable_all_checks(false);
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut builder = TreeBuilder::default();

    loop {
        let start = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| anyhow!("malformed markup at byte {start}: {e}"))?;
        let raw = &source[start..reader.buffer_position() as usize];

        match event {
            Event::Start(elem) => {
                let mut el = Element::new(raw, &elem, false);
                if VOID_ELEMENTS.contains(&el.name.as_str()) {
                    el.self_closing = true;
                    builder.push(Node::Element(el));
                } else {
                    builder.open(el);
                }
            }
            Event::Empty(elem) => builder.push(Node::Element(Element::new(raw, &elem, true))),
            Event::End(elem) => {
                let name = String::from_utf8_lossy(elem.name().as_ref()).to_ascii_lowercase();
                builder.close(&name, raw);
            }
            Event::Eof => break,
            _ => builder.push(Node::Raw(raw)),
        }
    }

    Ok(builder.finish())
}

#[derive(Default)]
struct TreeBuilder<'a> {
    root: Vec<Node<'a>>,
    stack: Vec<Element<'a>>,
}

impl<'a> TreeBuilder<'a> {
    fn push(&mut self, node: Node<'a>) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn open(&mut self, el: Element<'a>) {
        self.stack.push(el);
    }

    fn close(&mut self, name: &str, raw: &'a str) {
        let Some(pos) = self.stack.iter().rposition(|el| el.name == name) else {
            self.push(Node::Raw(raw));
            return;
        };
        while self.stack.len() > pos + 1 {
            self.hoist_top();
        }
        if let Some(mut el) = self.stack.pop() {
            el.closed = true;
            el.close = raw;
            self.push(Node::Element(el));
        }
    }

    /// The top element was never closed: keep its open tag, and move its
    /// children after it.
    fn hoist_top(&mut self) {
        if let Some(mut el) = self.stack.pop() {
            let children = std::mem::take(&mut el.children);
            self.push(Node::Element(el));
            for child in children {
                self.push(child);
            }
        }
    }

    fn finish(mut self) -> Vec<Node<'a>> {
        while !self.stack.is_empty() {
            self.hoist_top();
        }
        self.root
    }
}
