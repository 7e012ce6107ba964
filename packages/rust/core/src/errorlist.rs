//! Error listing: `<code> <message>` lines turned into a bullet list.

use std::path::Path;

use tracing::instrument;

use docbuild_rst::{Adornment, Block, Document};
use docbuild_shared::{DocBuildError, Result, read_required};

pub const TITLE: &str = "Error Listing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: String,
    pub message: String,
}

impl ErrorCode {
    fn bullet(&self) -> String {
        format!("**{}** - {}", self.code, self.message)
    }
}

/// Split every non-blank line on its first space.
///
/// A line without a space is rejected with the file and line number.
pub fn parse_error_codes(path: &Path) -> Result<Vec<ErrorCode>> {
    let text = read_required(path)?;
    let mut codes = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((code, message)) = line.split_once(' ') else {
            return Err(DocBuildError::malformed(
                path,
                idx + 1,
                "expected `<code> <message>`",
            ));
        };
        codes.push(ErrorCode {
            code: code.to_string(),
            message: message.trim_end().to_string(),
        });
    }
    Ok(codes)
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn build_error_list(path: &Path) -> Result<Document> {
    let codes = parse_error_codes(path)?;
    let mut doc = Document::new(TITLE, Adornment::DOCUMENT);
    if !codes.is_empty() {
        doc.push(Block::Bullets(codes.iter().map(ErrorCode::bullet).collect()));
    }
    Ok(doc)
}
