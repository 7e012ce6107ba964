//! Structured document builder.
//!
//! Generated documents are assembled as an ordered tree of sections and
//! blocks, then serialized to reStructuredText in one final pass. Content
//! assembly never touches the concrete syntax.

/// Heading decoration: the adornment character and whether an overline is
/// drawn as well as the underline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adornment {
    pub ch: char,
    pub overline: bool,
}

impl Adornment {
    /// Top-level title of aggregate documents (dictionary, error listing).
    pub const DOCUMENT: Self = Self::over('=');
    /// Per-file table titles inside the dictionary.
    pub const TABLE: Self = Self::under('=');
    /// Title of a test report.
    pub const REPORT: Self = Self::under('`');
    /// Sections of a test report (Input, Output, ...).
    pub const SECTION: Self = Self::under('^');
    /// Nested report sections (object sources, debug transcript).
    pub const SUBSECTION: Self = Self::under('~');

    pub const fn under(ch: char) -> Self {
        Self {
            ch,
            overline: false,
        }
    }

    pub const fn over(ch: char) -> Self {
        Self { ch, overline: true }
    }

    fn heading(&self, title: &str) -> String {
        let rule: String = std::iter::repeat_n(self.ch, title.chars().count().max(1)).collect();
        if self.overline {
            format!("{rule}\n{title}\n{rule}")
        } else {
            format!("{title}\n{rule}")
        }
    }
}

/// Characters reStructuredText accepts as section adornments.
const ADORNMENT_CHARS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Whether `line` consists solely of one repeated adornment character.
pub fn is_adornment(line: &str) -> bool {
    let line = line.trim_end();
    let mut chars = line.chars();
    match chars.next() {
        Some(first) if ADORNMENT_CHARS.contains(first) => chars.all(|c| c == first),
        _ => false,
    }
}

/// A complete generated document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub adornment: Adornment,
    pub blocks: Vec<Block>,
}

/// A titled section holding further blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub adornment: Adornment,
    pub blocks: Vec<Block>,
}

/// A `csv-table` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One body element.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// `.. contents::` marker.
    Contents,
    /// Free text inserted as-is (annotations, prose).
    Text(String),
    /// Literal block; each line is embedded verbatim.
    Literal(Vec<String>),
    /// Bullet list, one item per entry.
    Bullets(Vec<String>),
    Table(CsvTable),
    Section(Section),
}

impl Block {
    /// Literal block from captured text, one entry per line.
    ///
    /// Trailing whitespace is dropped from every line and trailing blank
    /// lines are removed; everything else is kept in order.
    pub fn literal(text: &str) -> Self {
        let mut lines: Vec<String> = text.lines().map(|l| l.trim_end().to_string()).collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Self::Literal(lines)
    }

    /// Free text, trimmed of trailing whitespace.
    pub fn text(text: &str) -> Self {
        Self::Text(text.trim_end().to_string())
    }

    fn to_rst(&self) -> String {
        match self {
            Self::Contents => ".. contents::".to_string(),
            Self::Text(text) => text.clone(),
            Self::Literal(lines) => {
                let mut out = String::from("::");
                if !lines.is_empty() {
                    out.push_str("\n\n");
                    let indented: Vec<String> = lines
                        .iter()
                        .map(|l| if l.is_empty() { String::new() } else { format!("    {l}") })
                        .collect();
                    out.push_str(&indented.join("\n"));
                }
                out
            }
            Self::Bullets(items) => items
                .iter()
                .map(|item| format!("* {item}"))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Table(table) => table.to_rst(),
            Self::Section(section) => section.to_rst(),
        }
    }
}

impl CsvTable {
    fn to_rst(&self) -> String {
        let mut out = String::from(".. csv-table::\n");
        out.push_str("   :header: ");
        out.push_str(
            &self
                .header
                .iter()
                .map(|h| quote_always(h))
                .collect::<Vec<_>>()
                .join(", "),
        );
        if !self.rows.is_empty() {
            out.push_str("\n\n");
            let rows: Vec<String> = self
                .rows
                .iter()
                .map(|row| format!("   {}", csv_line(row)))
                .collect();
            out.push_str(&rows.join("\n"));
        }
        out
    }
}

impl Section {
    pub fn new(title: impl Into<String>, adornment: Adornment) -> Self {
        Self {
            title: title.into(),
            adornment,
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    pub fn with(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    fn to_rst(&self) -> String {
        let mut chunks = vec![self.adornment.heading(&self.title)];
        chunks.extend(self.blocks.iter().map(Block::to_rst));
        chunks.join("\n\n")
    }
}

impl Document {
    pub fn new(title: impl Into<String>, adornment: Adornment) -> Self {
        Self {
            title: title.into(),
            adornment,
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) -> &mut Self {
        self.blocks.push(block);
        self
    }

    /// Serialize to reStructuredText.
    pub fn to_rst(&self) -> String {
        let mut chunks = vec![self.adornment.heading(&self.title)];
        chunks.extend(self.blocks.iter().map(Block::to_rst));
        let mut out = chunks.join("\n\n");
        out.push('\n');
        out
    }

    /// Titles of every section, depth first.
    pub fn section_titles(&self) -> Vec<&str> {
        fn collect<'a>(blocks: &'a [Block], out: &mut Vec<&'a str>) {
            for block in blocks {
                if let Block::Section(section) = block {
                    out.push(section.title.as_str());
                    collect(&section.blocks, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.blocks, &mut out);
        out
    }
}

// ---------------------------------------------------------------------------
// CSV helpers
// ---------------------------------------------------------------------------

/// Split one CSV line into fields.
///
/// Double quotes group a field and `""` inside quotes is a literal quote.
/// Whitespace directly after a delimiter is skipped.
pub fn split_csv_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        if c == delimiter {
            fields.push(std::mem::take(&mut field));
            at_field_start = true;
        } else if at_field_start && c == ' ' {
            // skip leading spaces
        } else if at_field_start && c == '"' {
            in_quotes = true;
            at_field_start = false;
        } else {
            field.push(c);
            at_field_start = false;
        }
    }
    fields.push(field);
    fields
}

fn csv_line(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| {
            if f.contains([',', '"']) || f.starts_with(' ') || f.ends_with(' ') {
                quote_always(f)
            } else {
                f.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote_always(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
