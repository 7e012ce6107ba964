//! Core domain types shared by every docbuild crate.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::naming::page_stem;

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// A documentation target with all paths resolved.
///
/// Built once per run from the configuration and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Module {
    /// Module name, also the subdirectory under the aggregated site.
    pub name: String,
    /// The module's documentation directory; every relative path below was
    /// resolved against it and script/simulator binaries run from it.
    pub doc_dir: PathBuf,
    /// Root scanned recursively for dictionary files.
    pub source_root: PathBuf,
    /// Extension of dictionary files (without the dot).
    pub dictionary_ext: String,
    /// Flat directory of test fixtures (or link groups).
    pub tests_dir: PathBuf,
    /// The binary exercised by the test suite.
    pub binary: PathBuf,
    /// Flat `<code> <message>` error listing.
    pub errors_file: PathBuf,
    /// Hand-written manual documents.
    pub manual_dir: PathBuf,
    /// Image assets copied into the output tree.
    pub images_dir: PathBuf,
    /// Working directory for intermediate documents and rendered pages.
    pub tmp_dir: PathBuf,
    /// Output root; the published tree lives in `out_dir/html`.
    pub out_dir: PathBuf,
    /// Render template name for every page of this module.
    pub template: String,
    /// Which harness protocol drives this module's tests.
    pub suite: TestSuite,
}

impl Module {
    /// Directory holding generated report sources (`tmp/tests`).
    pub fn report_dir(&self) -> PathBuf {
        self.tmp_dir.join("tests")
    }

    /// The published HTML tree of this module.
    pub fn html_dir(&self) -> PathBuf {
        self.out_dir.join("html")
    }
}

// ---------------------------------------------------------------------------
// Test suites
// ---------------------------------------------------------------------------

/// The protocol used to drive a module's fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuiteKind {
    /// One fixture file per test, binary invoked once.
    Script {
        #[serde(default = "default_script_ext")]
        fixture_ext: String,
    },
    /// One directory per test holding an `objects/` group.
    Link {
        #[serde(default = "default_object_ext")]
        object_ext: String,
        #[serde(default = "default_load_ext")]
        load_ext: String,
    },
    /// One fixture file per test, binary invoked in normal then debug mode.
    Simulator {
        #[serde(default = "default_simulator_ext")]
        fixture_ext: String,
        #[serde(default = "default_debug_flag")]
        debug_flag: String,
    },
}

impl SuiteKind {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Script { .. } => "script",
            Self::Link { .. } => "link",
            Self::Simulator { .. } => "simulator",
        }
    }
}

fn default_script_ext() -> String {
    "txt".into()
}
fn default_object_ext() -> String {
    "objtxt".into()
}
fn default_load_ext() -> String {
    "ffa".into()
}
fn default_simulator_ext() -> String {
    "ffa".into()
}
fn default_debug_flag() -> String {
    "-d".into()
}

/// A fully resolved test suite of one module.
#[derive(Debug, Clone)]
pub struct TestSuite {
    pub kind: SuiteKind,
    /// Prefix of every report page stem (`testfile_`, ...).
    pub prefix: String,
    /// Stem of the index page (`testscript_index`, ...).
    pub index_name: String,
    /// Title of the index page.
    pub index_title: String,
    /// Maximum number of concurrent invocations.
    pub jobs: usize,
    /// Bound on a single invocation.
    pub timeout: Duration,
}

// ---------------------------------------------------------------------------
// IndexEntry
// ---------------------------------------------------------------------------

/// One line of a suite index: display name plus link target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub display_name: String,
    pub target: String,
}

impl IndexEntry {
    /// Derive the link target from the display name and suite prefix.
    pub fn new(prefix: &str, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        let target = format!("{}.html", page_stem(prefix, &display_name));
        Self {
            display_name,
            target,
        }
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{} <{}>`_", self.display_name, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_entry_link_uses_normalized_name() {
        let entry = IndexEntry::new("testfile_", "add");
        assert_eq!(entry.target, "testfile_add.html");
        assert_eq!(entry.to_string(), "`add <testfile_add.html>`_");

        let entry = IndexEntry::new("testlink_", "TwoModules");
        assert_eq!(entry.display_name, "TwoModules");
        assert_eq!(entry.target, "testlink_two_modules.html");
    }

    #[test]
    fn suite_kind_parses_with_defaults() {
        let kind: SuiteKind = toml::from_str(r#"kind = "simulator""#).expect("parse");
        assert_eq!(
            kind,
            SuiteKind::Simulator {
                fixture_ext: "ffa".into(),
                debug_flag: "-d".into(),
            }
        );

        let kind: SuiteKind = toml::from_str("kind = \"link\"\nload_ext = \"lod\"").expect("parse");
        assert_eq!(
            kind,
            SuiteKind::Link {
                object_ext: "objtxt".into(),
                load_ext: "lod".into(),
            }
        );
    }
}
