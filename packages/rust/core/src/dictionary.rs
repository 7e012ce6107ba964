//! Data element dictionary: one table per delimited definition file.

use std::path::Path;

use tracing::{debug, instrument};

use docbuild_discovery::{ScanOptions, scan};
use docbuild_rst::{Adornment, Block, CsvTable, Document, Section, split_csv_line};
use docbuild_shared::{DocBuildError, Result, read_required};

pub const TITLE: &str = "Data Element Dictionary";

/// Column headers shared by every dictionary table.
pub const HEADERS: [&str; 6] = [
    "Variable Name",
    "Module Defined",
    "Data Type",
    "Local/Global",
    "Purpose",
    "Range",
];

const DELIMITER: char = ',';

/// One definition file turned into a table.
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryTable {
    /// File name without its extension.
    pub title: String,
    pub rows: Vec<Vec<String>>,
}

impl DictionaryTable {
    fn into_section(self) -> Section {
        Section::new(self.title, Adornment::TABLE).with(Block::Table(CsvTable {
            header: HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: self.rows,
        }))
    }
}

/// Parse one definition file.
///
/// Rows are kept as written, whatever their field count. Blank lines are
/// skipped; a line with no delimiter at all is rejected.
pub fn parse_table(path: &Path) -> Result<DictionaryTable> {
    let text = read_required(path)?;
    let mut rows = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !line.contains(DELIMITER) {
            return Err(DocBuildError::malformed(
                path,
                idx + 1,
                format!("expected `{DELIMITER}`-separated fields"),
            ));
        }
        rows.push(split_csv_line(line, DELIMITER));
    }

    Ok(DictionaryTable {
        title: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        rows,
    })
}

/// Build the dictionary from every `*.<extension>` file below `root`.
#[instrument(skip_all, fields(root = %root.display(), extension = %extension))]
pub fn build_dictionary(root: &Path, extension: &str) -> Result<Document> {
    let mut doc = Document::new(TITLE, Adornment::DOCUMENT);
    doc.push(Block::Contents);

    for path in scan(root, extension, ScanOptions::RECURSIVE) {
        let table = parse_table(&path)?;
        debug!(file = %path.display(), rows = table.rows.len(), "dictionary table");
        doc.push(Block::Section(table.into_section()));
    }
    Ok(doc)
}
