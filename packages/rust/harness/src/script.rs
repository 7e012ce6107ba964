//! Single-fixture script tests.
//!
//! The binary is invoked once with the fixture path. The report embeds the
//! fixture, the captured output and, when the binary left one behind, the
//! `<fixture>.obj` object file.

use std::path::{Path, PathBuf};

use tracing::debug;

use docbuild_rst::{Adornment, Block, Document, Section};
use docbuild_shared::{Result, read_optional, read_required};

use crate::SuiteEnv;
use crate::runner::{Invocation, run};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTest {
    /// Fixture file name without the suite extension.
    pub name: String,
    pub fixture: PathBuf,
}

impl ScriptTest {
    pub fn new(fixture: PathBuf, extension: &str) -> Self {
        Self {
            name: fixture_name(&fixture, extension),
            fixture,
        }
    }

    /// File name of the fixture, used as the report title.
    pub fn file_name(&self) -> String {
        file_name(&self.fixture)
    }

    pub fn annotation_path(&self) -> PathBuf {
        self.fixture.with_extension("info")
    }

    /// The object file the assembler writes next to its input.
    pub fn object_path(&self) -> PathBuf {
        let mut path = self.fixture.clone().into_os_string();
        path.push(".obj");
        PathBuf::from(path)
    }

    pub(crate) async fn report(&self, env: &SuiteEnv) -> Result<Document> {
        let mut doc = Document::new(self.file_name(), Adornment::REPORT);
        doc.push(Block::Contents);
        if let Some(info) = read_optional(&self.annotation_path())? {
            doc.push(Block::text(&info));
        }

        let input = read_required(&self.fixture)?;
        doc.push(Block::Section(
            Section::new("Input", Adornment::SECTION).with(Block::literal(&input)),
        ));

        let transcript = run(&Invocation::new(
            &env.binary,
            &env.work_dir,
            env.timeout,
            &self.name,
        )
        .arg(&self.fixture))
        .await?;
        doc.push(Block::Section(
            Section::new("Output", Adornment::SECTION).with(Block::literal(&transcript.stdout)),
        ));

        // Read after the run: the binary under test produces it.
        if let Some(object) = read_optional(&self.object_path())? {
            debug!(test = %self.name, "object file found");
            doc.push(Block::Section(
                Section::new("Object File", Adornment::SECTION).with(Block::literal(&object)),
            ));
        }
        Ok(doc)
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// File name with a trailing `.<extension>` removed.
pub(crate) fn fixture_name(path: &Path, extension: &str) -> String {
    let name = file_name(path);
    match name.strip_suffix(&format!(".{extension}")) {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_strip_only_the_suite_extension() {
        let test = ScriptTest::new(PathBuf::from("/t/loop.v2.txt"), "txt");
        assert_eq!(test.name, "loop.v2");
        assert_eq!(test.file_name(), "loop.v2.txt");
        assert_eq!(test.annotation_path(), PathBuf::from("/t/loop.v2.info"));
        assert_eq!(test.object_path(), PathBuf::from("/t/loop.v2.txt.obj"));
    }
}
