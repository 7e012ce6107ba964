//! In-process HTML rendering for the reStructuredText subset docbuild emits.
//!
//! Supported: section titles (underline or over+underline), `contents` and
//! `csv-table` directives, `::` literal blocks, bullet lists, paragraphs,
//! and the inline forms `**strong**`, `*emphasis*`, ``literal`` and
//! `` `text <target>`_ ``. Other directives are skipped.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::document::{is_adornment, split_csv_line};

/// Body and title of a rendered document.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedHtml {
    /// Text of the first section title, if any.
    pub title: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Heading { level: usize, text: String, id: String },
    Paragraph(String),
    Literal(Vec<String>),
    Bullets(Vec<String>),
    Table { header: Vec<String>, rows: Vec<Vec<String>> },
    Contents,
}

/// Render reStructuredText source to an HTML body fragment.
pub fn render_html(source: &str) -> RenderedHtml {
    let lines: Vec<&str> = source.lines().collect();
    let nodes = Parser::new(&lines).parse();

    let title = nodes.iter().find_map(|n| match n {
        Node::Heading { text, .. } => Some(text.clone()),
        _ => None,
    });

    let mut body = String::from("<div class=\"document\">\n");
    for node in &nodes {
        write_node(node, &nodes, &mut body);
    }
    body.push_str("</div>\n");

    RenderedHtml { title, body }
}

/// Substitute `%(key)s` placeholders in a docutils-style template.
///
/// `title` and `body` receive the rendered document, `encoding` is always
/// `utf-8`, `%%` is a literal percent sign, and any other key becomes empty.
pub fn fill_template(template: &str, rendered: &RenderedHtml) -> String {
    static PLACEHOLDER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"%(?:\((\w+)\)s|%)").expect("valid regex"));

    let title = rendered.title.as_deref().map(escape).unwrap_or_default();
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| match caps.get(1) {
            None => "%".to_string(),
            Some(key) => match key.as_str() {
                "title" => title.clone(),
                "body" => rendered.body.clone(),
                "encoding" => "utf-8".to_string(),
                _ => String::new(),
            },
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// Block parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    lines: &'a [&'a str],
    pos: usize,
    styles: Vec<(char, bool)>,
    ids: HashMap<String, usize>,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    fn new(lines: &'a [&'a str]) -> Self {
        Self {
            lines,
            pos: 0,
            styles: Vec::new(),
            ids: HashMap::new(),
            nodes: Vec::new(),
        }
    }

    fn line(&self, idx: usize) -> Option<&'a str> {
        self.lines.get(idx).copied()
    }

    fn parse(mut self) -> Vec<Node> {
        while let Some(line) = self.line(self.pos) {
            if line.trim().is_empty() {
                self.pos += 1;
            } else if self.try_overlined_heading() || self.try_underlined_heading() {
                continue;
            } else if line.starts_with(".. ") {
                self.directive();
            } else if bullet_text(line).is_some() {
                self.bullets();
            } else if line.trim() == "::" {
                self.pos += 1;
                self.literal_block();
            } else {
                self.paragraph();
            }
        }
        self.nodes
    }

    fn try_overlined_heading(&mut self) -> bool {
        let (Some(over), Some(text), Some(under)) = (
            self.line(self.pos),
            self.line(self.pos + 1),
            self.line(self.pos + 2),
        ) else {
            return false;
        };
        let over = over.trim_end();
        if !is_adornment(over) || over.trim_end() != under.trim_end() || text.trim().is_empty() {
            return false;
        }
        let ch = over.chars().next().unwrap_or('=');
        self.heading(text.trim(), ch, true);
        self.pos += 3;
        true
    }

    fn try_underlined_heading(&mut self) -> bool {
        let (Some(text), Some(under)) = (self.line(self.pos), self.line(self.pos + 1)) else {
            return false;
        };
        let under = under.trim_end();
        if text.starts_with(char::is_whitespace)
            || is_adornment(text)
            || !is_adornment(under)
            || under.chars().count() < text.trim_end().chars().count()
        {
            return false;
        }
        let ch = under.chars().next().unwrap_or('=');
        self.heading(text.trim(), ch, false);
        self.pos += 2;
        true
    }

    fn heading(&mut self, text: &str, ch: char, overline: bool) {
        let style = (ch, overline);
        let level = match self.styles.iter().position(|s| *s == style) {
            Some(idx) => idx + 1,
            None => {
                self.styles.push(style);
                self.styles.len()
            }
        };
        let id = self.unique_id(text);
        self.nodes.push(Node::Heading {
            level: level.min(6),
            text: text.to_string(),
            id,
        });
    }

    fn unique_id(&mut self, text: &str) -> String {
        let base = slugify(text);
        let count = self.ids.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{base}-{count}")
        }
    }

    fn directive(&mut self) {
        let Some(head) = self.line(self.pos) else {
            return;
        };
        let head = head.trim_end();
        self.pos += 1;
        let body = self.indented_block();

        match head.trim_start_matches(".. ").split("::").next().map(str::trim) {
            Some("contents") if head.contains("::") => self.nodes.push(Node::Contents),
            Some("csv-table") if head.contains("::") => self.csv_table(&body),
            _ => debug!(directive = head, "skipping unsupported directive"),
        }
    }

    fn csv_table(&mut self, body: &[String]) {
        let mut header = Vec::new();
        let mut rows = Vec::new();
        let mut in_options = true;

        for line in body {
            let trimmed = line.trim();
            if in_options && trimmed.starts_with(':') {
                if let Some(value) = trimmed.strip_prefix(":header:") {
                    header = split_csv_line(value.trim(), ',');
                }
                continue;
            }
            in_options = false;
            if !trimmed.is_empty() {
                rows.push(split_csv_line(trimmed, ','));
            }
        }
        self.nodes.push(Node::Table { header, rows });
    }

    fn bullets(&mut self) {
        let mut items: Vec<String> = Vec::new();
        while let Some(line) = self.line(self.pos) {
            if let Some(text) = bullet_text(line) {
                items.push(text.trim().to_string());
                self.pos += 1;
            } else if line.starts_with(char::is_whitespace) && !line.trim().is_empty() {
                if let Some(last) = items.last_mut() {
                    last.push(' ');
                    last.push_str(line.trim());
                }
                self.pos += 1;
            } else if line.trim().is_empty()
                && self.line(self.pos + 1).and_then(bullet_text).is_some()
            {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.nodes.push(Node::Bullets(items));
    }

    fn paragraph(&mut self) {
        let mut text: Vec<&str> = Vec::new();
        while let Some(line) = self.line(self.pos) {
            if line.trim().is_empty() {
                break;
            }
            text.push(line.trim());
            self.pos += 1;
        }
        let mut joined = text.join(" ");

        let expects_literal = joined.ends_with("::");
        if expects_literal {
            joined.truncate(joined.len() - 1);
            if joined.ends_with(" :") {
                joined.truncate(joined.len() - 2);
            }
        }
        if !joined.is_empty() {
            self.nodes.push(Node::Paragraph(joined));
        }
        if expects_literal {
            self.literal_block();
        }
    }

    fn literal_block(&mut self) {
        let lines = self.indented_block();
        self.nodes.push(Node::Literal(lines));
    }

    /// Consume the following indented block (after optional blank lines),
    /// dedented by its smallest indentation, trailing blanks removed.
    fn indented_block(&mut self) -> Vec<String> {
        let start = self.pos;
        let mut end = self.pos;
        let mut idx = self.pos;
        while let Some(line) = self.line(idx) {
            if line.trim().is_empty() {
                idx += 1;
                continue;
            }
            if !line.starts_with(char::is_whitespace) {
                break;
            }
            idx += 1;
            end = idx;
        }
        if end == start {
            return Vec::new();
        }
        self.pos = end;

        let block = &self.lines[start..end];
        let indent = block
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| indent_width(l))
            .min()
            .unwrap_or(0);

        let mut out: Vec<String> = block
            .iter()
            .map(|l| {
                if l.trim().is_empty() {
                    String::new()
                } else {
                    l.get(indent..).unwrap_or(*l).trim_end().to_string()
                }
            })
            .collect();
        while out.first().is_some_and(|l| l.is_empty()) {
            out.remove(0);
        }
        while out.last().is_some_and(|l| l.is_empty()) {
            out.pop();
        }
        out
    }
}

/// Leading indentation in bytes, counting ASCII spaces and tabs only.
fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

fn bullet_text(line: &str) -> Option<&str> {
    ["* ", "- ", "+ "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
}

// ---------------------------------------------------------------------------
// HTML writer
// ---------------------------------------------------------------------------

fn write_node(node: &Node, all: &[Node], out: &mut String) {
    match node {
        Node::Heading { level, text, id } => {
            out.push_str(&format!(
                "<h{level} id=\"{id}\">{}</h{level}>\n",
                inline(text)
            ));
        }
        Node::Paragraph(text) => {
            out.push_str(&format!("<p>{}</p>\n", inline(text)));
        }
        Node::Literal(lines) => {
            let escaped: Vec<String> = lines.iter().map(|l| escape(l)).collect();
            out.push_str("<pre class=\"literal-block\">\n");
            out.push_str(&escaped.join("\n"));
            out.push_str("\n</pre>\n");
        }
        Node::Bullets(items) => {
            out.push_str("<ul class=\"simple\">\n");
            for item in items {
                out.push_str(&format!("<li>{}</li>\n", inline(item)));
            }
            out.push_str("</ul>\n");
        }
        Node::Table { header, rows } => {
            out.push_str("<table class=\"docutils\">\n");
            if !header.is_empty() {
                out.push_str("<thead>\n<tr>");
                for cell in header {
                    out.push_str(&format!("<th>{}</th>", inline(cell)));
                }
                out.push_str("</tr>\n</thead>\n");
            }
            out.push_str("<tbody>\n");
            for row in rows {
                out.push_str("<tr>");
                for cell in row {
                    out.push_str(&format!("<td>{}</td>", inline(cell)));
                }
                out.push_str("</tr>\n");
            }
            out.push_str("</tbody>\n</table>\n");
        }
        Node::Contents => write_contents(all, out),
    }
}

/// Table of contents: every heading after the document title.
fn write_contents(all: &[Node], out: &mut String) {
    out.push_str("<div class=\"contents topic\" id=\"contents\">\n");
    out.push_str("<p class=\"topic-title\">Contents</p>\n<ul class=\"simple\">\n");
    for (level, text, id) in all
        .iter()
        .filter_map(|n| match n {
            Node::Heading { level, text, id } => Some((level, text, id)),
            _ => None,
        })
        .skip(1)
    {
        out.push_str(&format!(
            "<li class=\"toc-level-{level}\"><a href=\"#{id}\">{}</a></li>\n",
            escape(text)
        ));
    }
    out.push_str("</ul>\n</div>\n");
}

/// Escape the HTML special characters.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Escape, then apply the inline markup passes. Literal spans are left alone.
fn inline(text: &str) -> String {
    static CODE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"``([^`]+)``").expect("valid regex"));

    let text = escape(text);
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for caps in CODE_RE.captures_iter(&text) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&markup(&text[copied..whole.start()]));
        out.push_str("<code>");
        out.push_str(code.as_str());
        out.push_str("</code>");
        copied = whole.end();
    }
    out.push_str(&markup(&text[copied..]));
    out
}

/// Links, strong and emphasis on already-escaped text outside literals.
fn markup(text: &str) -> String {
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"`([^`]+?)\s*&lt;([^`]+?)&gt;`__?").expect("valid regex")
    });
    static STRONG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\*\*([^*\s](?:[^*]*[^*\s])?)\*\*").expect("valid regex")
    });
    static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\*([^*\s](?:[^*]*[^*\s])?)\*").expect("valid regex")
    });

    let text = LINK_RE.replace_all(text, "<a class=\"reference external\" href=\"$2\">$1</a>");
    let text = delimited(&text, &STRONG_RE, "strong");
    delimited(&text, &EMPHASIS_RE, "em")
}

/// Wrap each match of `re` in `tag`, honouring the inline-markup start and
/// end rules: the opening delimiter follows whitespace or punctuation and
/// the closing one is followed by whitespace or punctuation.
fn delimited(text: &str, re: &Regex, tag: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;
    while let Some(caps) = re.captures_at(text, pos) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let before = text[..whole.start()].chars().next_back();
        let after = text[whole.end()..].chars().next();
        if opens_markup(before) && closes_markup(after) {
            out.push_str(&text[copied..whole.start()]);
            out.push_str(&format!("<{tag}>{}</{tag}>", inner.as_str()));
            copied = whole.end();
            pos = whole.end();
        } else {
            // Delimiters are ASCII, so one byte on is a char boundary.
            pos = whole.start() + 1;
        }
    }
    out.push_str(&text[copied..]);
    out
}

fn opens_markup(before: Option<char>) -> bool {
    before.is_none_or(|c| c.is_whitespace() || "-:/'\"<([{;>".contains(c))
}

fn closes_markup(after: Option<char>) -> bool {
    after.is_none_or(|c| c.is_whitespace() || "-.,:;!?\\/'\")]}>&<".contains(c))
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
