//! Dual-mode simulator tests.

use std::path::PathBuf;

use tracing::debug;

use docbuild_rst::{Adornment, Block, Document, Section};
use docbuild_shared::{Result, read_optional, read_required};

use crate::SuiteEnv;
use crate::runner::{Invocation, run};
use crate::script::{file_name, fixture_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorTest {
    pub name: String,
    pub fixture: PathBuf,
    /// Argument placed before the fixture for the debug run.
    pub debug_flag: String,
}

impl SimulatorTest {
    pub fn new(fixture: PathBuf, extension: &str, debug_flag: &str) -> Self {
        Self {
            name: fixture_name(&fixture, extension),
            fixture,
            debug_flag: debug_flag.to_string(),
        }
    }

    pub fn annotation_path(&self) -> PathBuf {
        self.fixture.with_extension("info")
    }

    /// Sidecar piped to stdin on both runs.
    pub fn input_path(&self) -> PathBuf {
        self.fixture.with_extension("input")
    }

    pub(crate) async fn report(&self, env: &SuiteEnv) -> Result<Document> {
        let mut doc = Document::new(file_name(&self.fixture), Adornment::REPORT);
        doc.push(Block::Contents);
        if let Some(info) = read_optional(&self.annotation_path())? {
            doc.push(Block::text(&info));
        }

        let program = read_required(&self.fixture)?;
        doc.push(Block::Section(
            Section::new("Input", Adornment::SECTION).with(Block::literal(&program)),
        ));

        let stdin = match read_optional(&self.input_path())? {
            Some(text) => {
                debug!(test = %self.name, "input file found");
                text.into_bytes()
            }
            None => Vec::new(),
        };

        let base = Invocation::new(&env.binary, &env.work_dir, env.timeout, &self.name)
            .stdin(stdin);
        let normal = run(&base.clone().arg(&self.fixture)).await?;
        let debug = run(&base.arg(&self.debug_flag).arg(&self.fixture)).await?;

        let mut output =
            Section::new("Output", Adornment::SECTION).with(Block::literal(&normal.stdout));
        output.push(Block::Section(
            Section::new("Debug Mode", Adornment::SUBSECTION).with(Block::literal(&debug.stdout)),
        ));
        doc.push(Block::Section(output));
        Ok(doc)
    }
}
