//! Wrapper documents for the downstream API-doc extractor.
//!
//! The extractor cannot read structured text, so each rendered page gets a
//! tiny indirection document that declares a page and pulls the rendered
//! HTML in verbatim.

use std::path::Path;

use tracing::debug;

use docbuild_shared::{DocBuildError, Result, read_required};

use crate::document::is_adornment;

/// Title used when a source document has no usable title line.
pub const UNTITLED: &str = "Untitled Document";

/// One extractor page pointing at a rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWrapper {
    /// Page identifier, the source document's base name without extension.
    pub page_id: String,
    pub title: String,
}

impl PageWrapper {
    /// Build the wrapper for a source document and its text.
    pub fn for_source(source: &Path, content: &str) -> Self {
        Self {
            page_id: page_id(source),
            title: extract_title(content),
        }
    }

    /// Serialize as an extractor comment block.
    pub fn to_doxygen(&self) -> String {
        format!(
            "/**\n\n\\page {id} {title}\n\\htmlinclude {id}.html\n\n*/",
            id = self.page_id,
            title = self.title
        )
    }
}

/// The first line that is neither blank nor a heading adornment.
pub fn extract_title(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !is_adornment(line))
        .map(str::to_string)
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Base file name without its extension.
pub fn page_id(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read `source`, then write its wrapper document to `destination`.
pub fn emit_wrapper(source: &Path, destination: &Path) -> Result<PageWrapper> {
    let content = read_required(source)?;
    let wrapper = PageWrapper::for_source(source, &content);
    std::fs::write(destination, wrapper.to_doxygen())
        .map_err(|e| DocBuildError::io(destination, e))?;
    debug!(page = %wrapper.page_id, title = %wrapper.title, "wrote page wrapper");
    Ok(wrapper)
}
