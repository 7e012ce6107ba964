//! Test harness: runs a module's fixtures against its binary and records
//! the transcripts as report documents.
//!
//! Three protocols are supported, selected by [`SuiteKind`]:
//! - [`ScriptTest`]: one fixture file, one invocation
//! - [`GroupedLinkTest`]: one directory of object sources, one invocation
//!   from inside that directory
//! - [`SimulatorTest`]: one fixture file, a normal and a debug invocation
//!
//! The harness records behavior and never asserts on it: exit status and
//! stderr of the target are not inspected. Tests run on a bounded worker
//! pool; reports and the index are always produced in discovery order.

pub mod link;
pub mod runner;
pub mod script;
pub mod simulator;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use docbuild_discovery::{ScanOptions, scan, scan_dirs};
use docbuild_rst::{Adornment, Block, Document, write_document};
use docbuild_shared::{DocBuildError, IndexEntry, Module, Result, SuiteKind, TestSuite, page_stem};

pub use link::GroupedLinkTest;
pub use runner::{Invocation, Transcript, run};
pub use script::ScriptTest;
pub use simulator::SimulatorTest;

// ---------------------------------------------------------------------------
// Test cases
// ---------------------------------------------------------------------------

/// One discovered test, whichever protocol drives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestCase {
    Script(ScriptTest),
    Link(GroupedLinkTest),
    Simulator(SimulatorTest),
}

impl TestCase {
    /// Name shown in the index and used to derive the page stem.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Script(t) => &t.name,
            Self::Link(t) => &t.name,
            Self::Simulator(t) => &t.name,
        }
    }

    async fn report(&self, env: &SuiteEnv) -> Result<Document> {
        match self {
            Self::Script(t) => t.report(env).await,
            Self::Link(t) => t.report(env).await,
            Self::Simulator(t) => t.report(env).await,
        }
    }
}

/// Find every test of `kind` directly under `tests_dir`, sorted by name.
///
/// A missing tests directory yields no tests.
pub fn discover(kind: &SuiteKind, tests_dir: &Path) -> Vec<TestCase> {
    match kind {
        SuiteKind::Script { fixture_ext } => scan(tests_dir, fixture_ext, ScanOptions::FLAT)
            .into_iter()
            .map(|p| TestCase::Script(ScriptTest::new(p, fixture_ext)))
            .collect(),
        SuiteKind::Link {
            object_ext,
            load_ext,
        } => scan_dirs(tests_dir)
            .into_iter()
            .map(|d| TestCase::Link(GroupedLinkTest::new(d, object_ext, load_ext)))
            .collect(),
        SuiteKind::Simulator {
            fixture_ext,
            debug_flag,
        } => scan(tests_dir, fixture_ext, ScanOptions::FLAT)
            .into_iter()
            .map(|p| TestCase::Simulator(SimulatorTest::new(p, fixture_ext, debug_flag)))
            .collect(),
    }
}

/// Read-only state shared by every test of a suite run.
#[derive(Debug, Clone)]
pub struct SuiteEnv {
    pub binary: PathBuf,
    /// Working directory of script and simulator invocations.
    pub work_dir: PathBuf,
    pub timeout: Duration,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callbacks for a suite run.
pub trait HarnessProgress: Send + Sync {
    /// A test's report has been written. `done` counts in discovery order.
    fn test_recorded(&self, name: &str, done: usize, total: usize);
}

/// No-op progress reporter (for tests or non-interactive use).
pub struct SilentHarnessProgress;

impl HarnessProgress for SilentHarnessProgress {
    fn test_recorded(&self, _name: &str, _done: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Suite run
// ---------------------------------------------------------------------------

/// One written report.
#[derive(Debug, Clone)]
pub struct TestReport {
    pub entry: IndexEntry,
    /// The generated report source (`tmp/tests/<stem>.rst`).
    pub source: PathBuf,
}

/// Everything a suite run wrote.
#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    pub reports: Vec<TestReport>,
    /// The generated index source (`tmp/<index>.rst`).
    pub index: PathBuf,
}

/// Reject suites where two tests normalize to the same page stem.
fn check_unique_stems(prefix: &str, cases: &[TestCase]) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for case in cases {
        let stem = page_stem(prefix, case.display_name());
        if let Some(first) = seen.insert(stem.clone(), case.display_name()) {
            return Err(DocBuildError::validation(format!(
                "tests `{first}` and `{}` both map to page `{stem}`",
                case.display_name()
            )));
        }
    }
    Ok(())
}

/// The suite index: one link per test, in discovery order.
pub fn index_document(suite: &TestSuite, entries: &[IndexEntry]) -> Document {
    let mut doc = Document::new(&suite.index_title, Adornment::DOCUMENT);
    if !entries.is_empty() {
        doc.push(Block::Bullets(entries.iter().map(ToString::to_string).collect()));
    }
    doc
}

/// Run every test of `module` and write the reports and index.
///
/// `module.report_dir()` and `module.tmp_dir` must already exist.
#[instrument(skip_all, fields(module = %module.name, kind = module.suite.kind.label()))]
pub async fn run_suite(module: &Module, progress: &dyn HarnessProgress) -> Result<SuiteOutcome> {
    let suite = &module.suite;
    let cases = discover(&suite.kind, &module.tests_dir);
    check_unique_stems(&suite.prefix, &cases)?;
    info!(tests = cases.len(), jobs = suite.jobs, "running test suite");

    let env = Arc::new(SuiteEnv {
        binary: module.binary.clone(),
        work_dir: module.doc_dir.clone(),
        timeout: suite.timeout,
    });
    let report_dir = module.report_dir();
    let semaphore = Arc::new(Semaphore::new(suite.jobs));

    let mut handles = Vec::with_capacity(cases.len());
    for case in &cases {
        let case = case.clone();
        let env = Arc::clone(&env);
        let sem = Arc::clone(&semaphore);
        let source = report_dir.join(format!(
            "{}.rst",
            page_stem(&suite.prefix, case.display_name())
        ));
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            let doc = case.report(&env).await?;
            write_document(&doc, &source)?;
            Ok::<_, DocBuildError>(source)
        }));
    }

    let total = cases.len();
    let mut reports = Vec::with_capacity(total);
    let mut pending = handles.into_iter();
    while let Some(handle) = pending.next() {
        let case = &cases[reports.len()];
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(DocBuildError::validation(format!(
                "test `{}` aborted: {e}",
                case.display_name()
            ))),
        };
        let source = match outcome {
            Ok(source) => source,
            Err(e) => {
                // Dropping the remaining tasks' futures kills their children.
                for rest in pending {
                    rest.abort();
                }
                return Err(e);
            }
        };
        debug!(test = case.display_name(), "report written");
        progress.test_recorded(case.display_name(), reports.len() + 1, total);
        reports.push(TestReport {
            entry: IndexEntry::new(&suite.prefix, case.display_name()),
            source,
        });
    }

    let entries: Vec<IndexEntry> = reports.iter().map(|r| r.entry.clone()).collect();
    let index = module.tmp_dir.join(format!("{}.rst", suite.index_name));
    write_document(&index_document(suite, &entries), &index)?;

    info!(tests = reports.len(), "test suite recorded");
    Ok(SuiteOutcome { reports, index })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    use docbuild_shared::{ModuleConfig, ProjectConfig};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docbuild-harness-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn script(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn module(root: &Path, kind: SuiteKind, binary: &str) -> Module {
        let config = ProjectConfig {
            jobs: 2,
            timeout_secs: 10,
            modules: vec![ModuleConfig::new("m", "doc", binary, kind)],
            ..ProjectConfig::default()
        };
        let module = config.resolve(root).unwrap().modules.remove(0);
        std::fs::create_dir_all(&module.doc_dir).unwrap();
        std::fs::create_dir_all(module.report_dir()).unwrap();
        module
    }

    fn script_kind() -> SuiteKind {
        SuiteKind::Script {
            fixture_ext: "txt".into(),
        }
    }

    #[tokio::test]
    async fn script_suite_records_output_and_index() {
        let root = temp_dir();
        script(&root.join("bin/asm"), "echo OK");
        let tests = root.join("Tests/Programs");
        std::fs::create_dir_all(&tests).unwrap();
        std::fs::write(tests.join("add.txt"), "ADD R1 R2\n").unwrap();

        let module = module(&root, script_kind(), "../bin/asm");
        let outcome = run_suite(&module, &SilentHarnessProgress).await.unwrap();

        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].entry.target, "testfile_add.html");
        let report = std::fs::read_to_string(module.report_dir().join("testfile_add.rst")).unwrap();
        assert_eq!(
            report,
            "add.txt\n```````\n\n.. contents::\n\n\
             Input\n^^^^^\n\n::\n\n    ADD R1 R2\n\n\
             Output\n^^^^^^\n\n::\n\n    OK\n"
        );
        assert!(!report.contains("Object File"));

        let index = std::fs::read_to_string(&outcome.index).unwrap();
        assert!(outcome.index.ends_with("tmp/testscript_index.rst"));
        assert!(index.contains("* `add <testfile_add.html>`_"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn script_suite_embeds_sidecars_and_failures() {
        let root = temp_dir();
        // Writes an object file next to the fixture, then fails.
        script(
            &root.join("bin/asm"),
            "echo assembled; echo boom >&2; echo 'OBJ 01' > \"$1.obj\"; exit 1",
        );
        let tests = root.join("Tests/Programs");
        std::fs::create_dir_all(&tests).unwrap();
        std::fs::write(tests.join("LoopTest.txt"), "JMP 0\n").unwrap();
        std::fs::write(tests.join("LoopTest.info"), "An endless loop.\n").unwrap();
        std::fs::write(tests.join("notes.md"), "ignored").unwrap();

        let module = module(&root, script_kind(), "../bin/asm");
        let outcome = run_suite(&module, &SilentHarnessProgress).await.unwrap();

        assert_eq!(outcome.reports.len(), 1);
        let report =
            std::fs::read_to_string(module.report_dir().join("testfile_loop_test.rst")).unwrap();
        assert!(report.contains(".. contents::\n\nAn endless loop.\n\nInput"));
        assert!(report.contains("    assembled"));
        assert!(!report.contains("boom"));
        assert!(report.ends_with("Object File\n^^^^^^^^^^^\n\n::\n\n    OBJ 01\n"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn reports_follow_discovery_order() {
        let root = temp_dir();
        // Earlier fixtures take longer so completion order is reversed.
        script(
            &root.join("bin/asm"),
            "case \"$1\" in *a.txt) sleep 0.4;; *b.txt) sleep 0.2;; esac; basename \"$1\"",
        );
        let tests = root.join("Tests/Programs");
        std::fs::create_dir_all(&tests).unwrap();
        for name in ["c.txt", "a.txt", "b.txt"] {
            std::fs::write(tests.join(name), name).unwrap();
        }

        let module = module(&root, script_kind(), "../bin/asm");
        let outcome = run_suite(&module, &SilentHarnessProgress).await.unwrap();

        let names: Vec<&str> = outcome
            .reports
            .iter()
            .map(|r| r.entry.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        let index = std::fs::read_to_string(&outcome.index).unwrap();
        let a = index.find("`a <").unwrap();
        let b = index.find("`b <").unwrap();
        let c = index.find("`c <").unwrap();
        assert!(a < b && b < c);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn link_suite_runs_inside_objects_dir() {
        let root = temp_dir();
        // Emits its arguments and writes the load file for the first one.
        script(
            &root.join("bin/link"),
            "echo \"linking $*\"; echo LOAD > \"$(basename \"$1\" .objtxt).ffa\"",
        );
        let group = root.join("Tests/Programs/TwoModules");
        std::fs::create_dir_all(group.join("objects")).unwrap();
        std::fs::write(group.join("info"), "Links two modules.").unwrap();
        std::fs::write(group.join("objects/main.objtxt"), "MAIN").unwrap();
        std::fs::write(group.join("objects/lib.objtxt"), "LIB").unwrap();
        std::fs::write(group.join("objects/readme"), "skip").unwrap();

        let kind = SuiteKind::Link {
            object_ext: "objtxt".into(),
            load_ext: "ffa".into(),
        };
        let module = module(&root, kind, "../bin/link");
        let outcome = run_suite(&module, &SilentHarnessProgress).await.unwrap();

        assert_eq!(outcome.reports[0].entry.target, "testlink_two_modules.html");
        let report =
            std::fs::read_to_string(module.report_dir().join("testlink_two_modules.rst")).unwrap();
        assert!(report.starts_with("TwoModules\n``````````\n\n.. contents::\n\nLinks two modules."));
        assert!(report.contains("lib.objtxt\n~~~~~~~~~~\n\n::\n\n    LIB\n\nmain.objtxt\n"));
        assert!(report.contains("    linking lib.objtxt main.objtxt"));
        assert!(report.ends_with("Load File\n^^^^^^^^^\n\n::\n\n    LOAD\n"));
        assert!(group.join("objects/lib.ffa").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn simulator_suite_runs_normal_and_debug() {
        let root = temp_dir();
        script(&root.join("bin/sim"), "echo \"args: $*\"; cat");
        let tests = root.join("Tests/Programs");
        std::fs::create_dir_all(&tests).unwrap();
        std::fs::write(tests.join("echo.ffa"), "LOAD").unwrap();
        std::fs::write(tests.join("echo.input"), "42\n").unwrap();
        std::fs::write(tests.join("quiet.ffa"), "HALT").unwrap();

        let kind = SuiteKind::Simulator {
            fixture_ext: "ffa".into(),
            debug_flag: "-d".into(),
        };
        let module = module(&root, kind, "../bin/sim");
        let outcome = run_suite(&module, &SilentHarnessProgress).await.unwrap();
        assert_eq!(outcome.reports.len(), 2);

        let fixture = module.tests_dir.join("echo.ffa");
        let report = std::fs::read_to_string(module.report_dir().join("testsim_echo.rst")).unwrap();
        assert!(report.contains(&format!(
            "Output\n^^^^^^\n\n::\n\n    args: {}\n    42\n\nDebug Mode\n~~~~~~~~~~\n\n::\n\n    args: -d {}\n    42\n",
            fixture.display(),
            fixture.display()
        )));

        let quiet = std::fs::read_to_string(module.report_dir().join("testsim_quiet.rst")).unwrap();
        assert!(quiet.contains("Debug Mode"));
        assert!(!quiet.contains("    42"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn empty_suite_writes_titled_index() {
        let root = temp_dir();
        let module = module(&root, script_kind(), "../bin/asm");
        let outcome = run_suite(&module, &SilentHarnessProgress).await.unwrap();

        assert!(outcome.reports.is_empty());
        assert_eq!(
            std::fs::read_to_string(&outcome.index).unwrap(),
            "============\nTest Scripts\n============\n"
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn colliding_names_are_rejected() {
        let root = temp_dir();
        let tests = root.join("Tests/Programs");
        std::fs::create_dir_all(&tests).unwrap();
        std::fs::write(tests.join("FooBar.txt"), "").unwrap();
        std::fs::write(tests.join("foo_bar.txt"), "").unwrap();

        let module = module(&root, script_kind(), "../bin/asm");
        let err = run_suite(&module, &SilentHarnessProgress).await.unwrap_err();
        assert!(matches!(err, DocBuildError::Validation { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn hung_binary_times_out() {
        let root = temp_dir();
        script(&root.join("bin/asm"), "sleep 30");
        let tests = root.join("Tests/Programs");
        std::fs::create_dir_all(&tests).unwrap();
        std::fs::write(tests.join("hang.txt"), "").unwrap();

        let mut module = module(&root, script_kind(), "../bin/asm");
        module.suite.timeout = Duration::from_millis(300);
        let err = run_suite(&module, &SilentHarnessProgress).await.unwrap_err();
        assert!(matches!(err, DocBuildError::Timeout { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }
}
