//! Name normalization for index links.
//!
//! Display names such as `LinkTwoModules` become `link_two_modules`, which
//! combined with a per-suite prefix gives the stable page stem.

use std::sync::LazyLock;

use regex::Regex;

/// Convert a mixed-case name to underscore-separated lowercase.
///
/// Two passes, applied left to right: a separator goes between any
/// character and a following capital+lowercase run, then between a
/// lowercase letter or digit and an immediately following capital.
pub fn normalize_name(name: &str) -> String {
    static WORD_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").expect("valid regex"));
    static BOUNDARY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid regex"));

    let first = WORD_RE.replace_all(name, "${1}_${2}");
    BOUNDARY_RE
        .replace_all(&first, "${1}_${2}")
        .to_lowercase()
}

/// Page stem for a test report: `prefix` followed by the normalized name.
pub fn page_stem(prefix: &str, display_name: &str) -> String {
    format!("{prefix}{}", normalize_name(display_name))
}
