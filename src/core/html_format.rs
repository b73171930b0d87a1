// src/core/html_format.rs
//! Re-indents generated HTML by nesting depth.
//!
//! Markup is split into tags, comments and text, folded into a loose tree and
//! printed two spaces per level. Elements holding only text and inline children
//! stay on one line. `pre` and `textarea` bodies are kept byte for byte; `script`
//! and `style` bodies are re-indented as a block.

use regex::Regex;
use std::sync::OnceLock;

const INDENT: &str = "  ";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "cite", "code", "data", "dfn", "em", "i", "img",
    "kbd", "label", "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time",
    "u", "var", "wbr",
];

const VERBATIM_ELEMENTS: &[&str] = &["pre", "textarea"];
const BLOCK_TEXT_ELEMENTS: &[&str] = &["script", "style"];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|<![^>]*>|</?[A-Za-z][^>]*>").expect("valid regex")
    })
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^</?\s*([A-Za-z][A-Za-z0-9:-]*)").expect("valid regex"))
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
    /// Comments, doctypes and stray closing tags, printed as they came.
    Markup(String),
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    open: String,
    children: Vec<Node>,
    /// Body of a `pre`/`script`/... element, never parsed.
    body: Option<String>,
    closed: bool,
}

impl Element {
    fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.name.as_str()) || self.open.ends_with("/>")
    }

    fn close_tag(&self) -> String {
        if self.closed {
            format!("</{}>", self.name)
        } else {
            String::new()
        }
    }
}

/// Pretty-print `markup` with two-space indentation.
pub fn prettify_html(markup: &str) -> String {
    let nodes = parse(markup);
    let mut lines = Vec::new();
    print_children(&nodes, 0, &mut lines);
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn tag_name(tag: &str) -> String {
    name_re()
        .captures(tag)
        .map(|c| c[1].to_lowercase())
        .unwrap_or_default()
}

fn parse(markup: &str) -> Vec<Node> {
    // stack[0] is the document root
    let mut stack: Vec<Element> = vec![Element::default()];
    let mut pos = 0;

    while let Some(m) = token_re().find_at(markup, pos) {
        push_text(&mut stack, &markup[pos..m.start()]);
        pos = m.end();
        let tag = m.as_str();

        if tag.starts_with("<!") {
            push_node(&mut stack, Node::Markup(tag.to_string()));
        } else if tag.starts_with("</") {
            let name = tag_name(tag);
            match stack.iter().rposition(|e| e.name == name) {
                Some(idx) if idx > 0 => {
                    while stack.len() > idx {
                        let mut element = stack.pop().unwrap_or_default();
                        element.closed = stack.len() == idx;
                        push_node(&mut stack, Node::Element(element));
                    }
                }
                _ => push_node(&mut stack, Node::Markup(tag.to_string())),
            }
        } else {
            let mut element = Element {
                name: tag_name(tag),
                open: tag.to_string(),
                ..Element::default()
            };
            let raw = VERBATIM_ELEMENTS.contains(&element.name.as_str())
                || BLOCK_TEXT_ELEMENTS.contains(&element.name.as_str());

            if element.is_void() {
                push_node(&mut stack, Node::Element(element));
            } else if raw {
                let close = format!("</{}", element.name);
                let rest = &markup[pos..];
                let end = rest.to_ascii_lowercase().find(&close);
                let body_end = end.unwrap_or(rest.len());
                element.body = Some(rest[..body_end].to_string());
                element.closed = end.is_some();
                pos += body_end;
                if end.is_some() {
                    pos += rest[body_end..].find('>').map_or(rest.len() - body_end, |i| i + 1);
                }
                push_node(&mut stack, Node::Element(element));
            } else {
                stack.push(element);
            }
        }
    }
    push_text(&mut stack, &markup[pos..]);

    // unclosed elements keep their content but print no closing tag
    while stack.len() > 1 {
        let element = stack.pop().unwrap_or_default();
        push_node(&mut stack, Node::Element(element));
    }
    stack.pop().map(|root| root.children).unwrap_or_default()
}

fn push_node(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    if !text.is_empty() {
        push_node(stack, Node::Text(text.to_string()));
    }
}

fn is_inline(node: &Node) -> bool {
    match node {
        Node::Text(_) => true,
        Node::Markup(_) => false,
        Node::Element(e) => {
            INLINE_ELEMENTS.contains(&e.name.as_str())
                && e.body.is_none()
                && e.children.iter().all(is_inline)
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn render_inline(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&collapse_whitespace(text)),
            Node::Markup(markup) => out.push_str(markup),
            Node::Element(e) => {
                out.push_str(&e.open);
                if !e.is_void() {
                    render_inline(&e.children, out);
                    out.push_str(&e.close_tag());
                }
            }
        }
    }
}

fn indented(depth: usize, text: &str) -> String {
    format!("{}{}", INDENT.repeat(depth), text)
}

fn print_children(nodes: &[Node], depth: usize, lines: &mut Vec<String>) {
    let mut run: Vec<&Node> = Vec::new();
    let flush = |run: &mut Vec<&Node>, lines: &mut Vec<String>| {
        let mut text = String::new();
        for node in run.drain(..) {
            render_inline(std::slice::from_ref(node), &mut text);
        }
        let text = text.trim();
        if !text.is_empty() {
            lines.push(indented(depth, text));
        }
    };

    for node in nodes {
        if is_inline(node) {
            run.push(node);
            continue;
        }
        flush(&mut run, lines);
        match node {
            Node::Markup(markup) => lines.push(indented(depth, markup.trim())),
            Node::Element(e) => print_element(e, depth, lines),
            Node::Text(_) => {}
        }
    }
    flush(&mut run, lines);
}

fn print_element(e: &Element, depth: usize, lines: &mut Vec<String>) {
    if e.is_void() {
        lines.push(indented(depth, &e.open));
        return;
    }

    if let Some(body) = &e.body {
        if VERBATIM_ELEMENTS.contains(&e.name.as_str()) || body.trim().is_empty() {
            let body = if body.trim().is_empty() { "" } else { body.as_str() };
            lines.push(indented(depth, &format!("{}{}{}", e.open, body, e.close_tag())));
        } else {
            lines.push(indented(depth, &e.open));
            print_block_text(body, depth + 1, lines);
            if e.closed {
                lines.push(indented(depth, &e.close_tag()));
            }
        }
        return;
    }

    if e.children.iter().all(is_inline) {
        let mut inner = String::new();
        render_inline(&e.children, &mut inner);
        let line = format!("{}{}{}", e.open, inner.trim(), e.close_tag());
        lines.push(indented(depth, &line));
        return;
    }

    lines.push(indented(depth, &e.open));
    print_children(&e.children, depth + 1, lines);
    if e.closed {
        lines.push(indented(depth, &e.close_tag()));
    }
}

/// Shift a script/style body so its least indented line sits at `depth`.
fn print_block_text(body: &str, depth: usize, lines: &mut Vec<String>) {
    let body_lines: Vec<&str> = body
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let margin = body_lines
        .iter()
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    for line in body_lines {
        lines.push(indented(depth, &line[margin..]));
    }
}
