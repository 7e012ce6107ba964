//! Grouped link tests.
//!
//! A test is a directory holding an optional `info` annotation and an
//! `objects/` directory of object sources. The linker runs once inside
//! `objects/` with every source name as an argument, and its load file is
//! looked up there afterwards.

use std::path::{Path, PathBuf};

use tracing::debug;

use docbuild_discovery::{ScanOptions, scan};
use docbuild_rst::{Adornment, Block, Document, Section};
use docbuild_shared::{DocBuildError, Result, read_optional, read_required};

use crate::SuiteEnv;
use crate::runner::{Invocation, run};
use crate::script::file_name;

/// Subdirectory of a link test holding its sources.
pub const OBJECTS_DIR: &str = "objects";
/// Directory-level annotation file.
pub const ANNOTATION_FILE: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedLinkTest {
    /// Directory name.
    pub name: String,
    pub dir: PathBuf,
    pub object_ext: String,
    pub load_ext: String,
}

impl GroupedLinkTest {
    pub fn new(dir: PathBuf, object_ext: &str, load_ext: &str) -> Self {
        Self {
            name: file_name(&dir),
            dir,
            object_ext: object_ext.to_string(),
            load_ext: load_ext.to_string(),
        }
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.dir.join(OBJECTS_DIR)
    }

    /// Object sources in name order.
    pub fn sources(&self) -> Result<Vec<PathBuf>> {
        let objects = self.objects_dir();
        if !objects.is_dir() {
            return Err(DocBuildError::validation(format!(
                "link test `{}` has no {OBJECTS_DIR}/ directory at {}",
                self.name,
                objects.display()
            )));
        }
        Ok(scan(&objects, &self.object_ext, ScanOptions::FLAT))
    }

    /// Load file named after the first source.
    pub fn load_path(&self, first_source: &Path) -> PathBuf {
        first_source.with_extension(&self.load_ext)
    }

    pub(crate) async fn report(&self, env: &SuiteEnv) -> Result<Document> {
        let sources = self.sources()?;

        let mut doc = Document::new(&self.name, Adornment::REPORT);
        doc.push(Block::Contents);
        if let Some(info) = read_optional(&self.dir.join(ANNOTATION_FILE))? {
            doc.push(Block::text(&info));
        }

        let mut input = Section::new("Input", Adornment::SECTION);
        for source in &sources {
            let text = read_required(source)?;
            input.push(Block::Section(
                Section::new(file_name(source), Adornment::SUBSECTION).with(Block::literal(&text)),
            ));
        }
        doc.push(Block::Section(input));

        let transcript = run(&Invocation::new(
            &env.binary,
            self.objects_dir(),
            env.timeout,
            &self.name,
        )
        .args(sources.iter().map(|s| file_name(s))))
        .await?;
        doc.push(Block::Section(
            Section::new("Output", Adornment::SECTION).with(Block::literal(&transcript.stdout)),
        ));

        let load = match sources.first() {
            Some(first) => read_optional(&self.load_path(first))?,
            None => None,
        };
        if let Some(load) = load {
            debug!(test = %self.name, "load file found");
            doc.push(Block::Section(
                Section::new("Load File", Adornment::SECTION).with(Block::literal(&load)),
            ));
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_file_swaps_extension() {
        let test = GroupedLinkTest::new(PathBuf::from("/t/TwoModules"), "objtxt", "ffa");
        assert_eq!(test.name, "TwoModules");
        assert_eq!(test.objects_dir(), PathBuf::from("/t/TwoModules/objects"));
        assert_eq!(
            test.load_path(Path::new("/t/TwoModules/objects/main.objtxt")),
            PathBuf::from("/t/TwoModules/objects/main.ffa")
        );
    }

    #[test]
    fn missing_objects_dir_is_rejected() {
        let dir = std::env::temp_dir().join(format!("docbuild-link-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let test = GroupedLinkTest::new(dir.clone(), "objtxt", "ffa");
        let err = test.sources().unwrap_err();
        assert!(matches!(err, DocBuildError::Validation { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
