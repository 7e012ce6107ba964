//! Build orchestration for docbuild.
//!
//! This crate turns a resolved [`docbuild_shared::Project`] into a
//! published documentation site: generated documents (dictionary, error
//! listing, test reports), rendered pages with their wrappers, extractor
//! output, and the aggregated site tree.

pub mod dictionary;
pub mod errorlist;
pub mod extractor;
pub mod pipeline;
pub mod site;

pub use pipeline::{
    ModuleSummary, ProgressReporter, SilentProgress, SiteSummary, build_module, build_site,
};
