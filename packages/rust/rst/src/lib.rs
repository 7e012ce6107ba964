//! Structured-text documents for docbuild.
//!
//! - [`document`]: an ordered section/block builder serialized to
//!   reStructuredText as a final step
//! - [`render`]: the [`Renderer`] seam, with an in-process engine and a
//!   docutils engine
//! - [`wrapper`]: indirection pages for the downstream API-doc extractor

pub mod document;
pub mod html;
pub mod render;
pub mod wrapper;

pub use document::{Adornment, Block, CsvTable, Document, Section, split_csv_line};
pub use render::{
    BuiltinRenderer, DocutilsRenderer, PublishedPage, RenderContext, RenderFuture, Renderer,
    publish, renderer_for,
};
pub use wrapper::{PageWrapper, UNTITLED, emit_wrapper, extract_title};

use std::path::Path;

use docbuild_shared::{DocBuildError, Result};

/// Serialize `document` and write it to `path`.
pub fn write_document(document: &Document, path: &Path) -> Result<()> {
    std::fs::write(path, document.to_rst()).map_err(|e| DocBuildError::io(path, e))
}
