//! Project configuration for docbuild.
//!
//! The project file lives next to the top-level documentation sources as
//! `docbuild.toml`. Top-level paths resolve against the directory holding
//! that file; module paths resolve against each module's `doc_dir`.
//! Without a file, the defaults describe the assembler/linker/simulator
//! layout the toolchain ships with.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocBuildError, Result};
use crate::types::{Module, SuiteKind, TestSuite};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "docbuild.toml";

// ---------------------------------------------------------------------------
// Config structs (matching docbuild.toml schema)
// ---------------------------------------------------------------------------

/// Top-level project config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Aggregated site directory.
    #[serde(default = "default_site_dir")]
    pub site_dir: String,

    /// Top-level manual sources.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Directory of render templates (`<name>.html`).
    #[serde(default = "default_template_dir")]
    pub template_dir: String,

    /// Shared stylesheet copied to the site root.
    #[serde(default = "default_stylesheet")]
    pub stylesheet: String,

    /// Template used for the top-level manual.
    #[serde(default = "default_top_template")]
    pub template: String,

    /// Maximum concurrent test invocations per suite.
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Bound on a single test invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Structured-text renderer settings.
    #[serde(default)]
    pub render: RenderConfig,

    /// External API-doc extractor; omitted means rendered pages are
    /// published directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<ExtractorConfig>,

    /// Documentation modules, built in this order.
    #[serde(default = "default_modules")]
    pub modules: Vec<ModuleConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            site_dir: default_site_dir(),
            source_dir: default_source_dir(),
            template_dir: default_template_dir(),
            stylesheet: default_stylesheet(),
            template: default_top_template(),
            jobs: default_jobs(),
            timeout_secs: default_timeout_secs(),
            render: RenderConfig::default(),
            extractor: Some(ExtractorConfig::default()),
            modules: default_modules(),
        }
    }
}

fn default_site_dir() -> String {
    "html".into()
}
fn default_source_dir() -> String {
    "src".into()
}
fn default_template_dir() -> String {
    "template".into()
}
fn default_stylesheet() -> String {
    "template/style.css".into()
}
fn default_top_template() -> String {
    "rst-top".into()
}
fn default_jobs() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    300
}

fn default_modules() -> Vec<ModuleConfig> {
    vec![
        ModuleConfig::new(
            "assembler",
            "../Assembler/doc",
            "../bin/Release/Assembler.exe",
            SuiteKind::Script {
                fixture_ext: "txt".into(),
            },
        ),
        ModuleConfig {
            errors: "../Resources/Errors.txt".into(),
            ..ModuleConfig::new(
                "linker",
                "../Linker/doc",
                "../bin/Release/Linker.exe",
                SuiteKind::Link {
                    object_ext: "objtxt".into(),
                    load_ext: "ffa".into(),
                },
            )
        },
        ModuleConfig::new(
            "simulator",
            "../Simulator/doc",
            "../bin/Release/Simulator.exe",
            SuiteKind::Simulator {
                fixture_ext: "ffa".into(),
                debug_flag: "-d".into(),
            },
        ),
    ]
}

/// Which structured-text renderer to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderEngine {
    /// In-process renderer for the reStructuredText subset docbuild emits.
    #[default]
    Builtin,
    /// External docutils front end.
    Docutils,
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub engine: RenderEngine,

    /// Docutils front end invoked when `engine = "docutils"`.
    #[serde(default = "default_render_command")]
    pub command: String,

    /// Bound on one external render, in seconds.
    #[serde(default = "default_render_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            engine: RenderEngine::default(),
            command: default_render_command(),
            timeout_secs: default_render_timeout_secs(),
        }
    }
}

fn default_render_command() -> String {
    "rst2html".into()
}
fn default_render_timeout_secs() -> u64 {
    60
}

/// `[extractor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Program run from each module's `doc_dir` after its wrappers exist.
    #[serde(default = "default_extractor_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            command: default_extractor_command(),
            args: Vec::new(),
        }
    }
}

fn default_extractor_command() -> String {
    "doxygen".into()
}

/// `[[modules]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,

    /// Module documentation directory, relative to the project file.
    pub doc_dir: String,

    /// Target binary, relative to `doc_dir`. A bare program name is looked
    /// up on `PATH` instead.
    pub binary: String,

    /// Render template; defaults to `rst-<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default = "default_source_root")]
    pub source_root: String,

    #[serde(default = "default_dictionary_ext")]
    pub dictionary_ext: String,

    #[serde(default = "default_tests_dir")]
    pub tests_dir: String,

    #[serde(default = "default_errors")]
    pub errors: String,

    #[serde(default = "default_source_dir")]
    pub manual_dir: String,

    #[serde(default = "default_images_dir")]
    pub images_dir: String,

    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: String,

    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    pub tests: SuiteConfig,
}

impl ModuleConfig {
    /// A module entry using the conventional layout below `doc_dir`.
    pub fn new(name: &str, doc_dir: &str, binary: &str, kind: SuiteKind) -> Self {
        Self {
            name: name.into(),
            doc_dir: doc_dir.into(),
            binary: binary.into(),
            template: None,
            source_root: default_source_root(),
            dictionary_ext: default_dictionary_ext(),
            tests_dir: default_tests_dir(),
            errors: default_errors(),
            manual_dir: default_source_dir(),
            images_dir: default_images_dir(),
            tmp_dir: default_tmp_dir(),
            out_dir: default_out_dir(),
            tests: SuiteConfig {
                kind,
                prefix: None,
                index: None,
                index_title: None,
            },
        }
    }
}

fn default_source_root() -> String {
    "..".into()
}
fn default_dictionary_ext() -> String {
    "csv".into()
}
fn default_tests_dir() -> String {
    "../Tests/Programs".into()
}
fn default_errors() -> String {
    "../Resources/errors.txt".into()
}
fn default_images_dir() -> String {
    "src/images".into()
}
fn default_tmp_dir() -> String {
    "tmp".into()
}
fn default_out_dir() -> String {
    "out".into()
}

/// `[modules.tests]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    #[serde(flatten)]
    pub kind: SuiteKind,

    /// Report page prefix; defaults per kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Index page stem; defaults per kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_title: Option<String>,
}

impl SuiteConfig {
    fn defaults(&self) -> (&'static str, &'static str, &'static str) {
        match self.kind {
            SuiteKind::Script { .. } => ("testfile_", "testscript_index", "Test Scripts"),
            SuiteKind::Link { .. } => ("testlink_", "testlink_index", "Linker Tests"),
            SuiteKind::Simulator { .. } => ("testsim_", "testsim_index", "Simulator Tests"),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved project
// ---------------------------------------------------------------------------

/// Runtime project description with every path resolved.
#[derive(Debug, Clone)]
pub struct Project {
    /// Directory holding the project file; the top-level build root.
    pub root: PathBuf,
    pub site_dir: PathBuf,
    pub source_dir: PathBuf,
    pub template_dir: PathBuf,
    pub stylesheet: PathBuf,
    pub template: String,
    pub render: RenderConfig,
    pub extractor: Option<ExtractorConfig>,
    pub modules: Vec<Module>,
}

impl Project {
    /// Look up a module by name.
    pub fn module(&self, name: &str) -> Result<&Module> {
        self.modules.iter().find(|m| m.name == name).ok_or_else(|| {
            let known: Vec<&str> = self.modules.iter().map(|m| m.name.as_str()).collect();
            DocBuildError::config(format!(
                "unknown module '{name}' (known: {})",
                known.join(", ")
            ))
        })
    }
}

impl ProjectConfig {
    /// Resolve every path against `root` and validate the module list.
    pub fn resolve(&self, root: &Path) -> Result<Project> {
        if self.jobs == 0 {
            return Err(DocBuildError::config("jobs must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(DocBuildError::config("timeout_secs must be at least 1"));
        }
        if self.render.timeout_secs == 0 {
            return Err(DocBuildError::config("render.timeout_secs must be at least 1"));
        }

        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            if module.name.trim().is_empty() {
                return Err(DocBuildError::config("module name must not be empty"));
            }
            if !seen.insert(module.name.as_str()) {
                return Err(DocBuildError::config(format!(
                    "module '{}' is declared twice",
                    module.name
                )));
            }
            modules.push(self.resolve_module(root, module));
        }

        Ok(Project {
            root: root.to_path_buf(),
            site_dir: join(root, &self.site_dir),
            source_dir: join(root, &self.source_dir),
            template_dir: join(root, &self.template_dir),
            stylesheet: join(root, &self.stylesheet),
            template: self.template.clone(),
            render: self.render.clone(),
            extractor: self.extractor.clone(),
            modules,
        })
    }

    fn resolve_module(&self, root: &Path, module: &ModuleConfig) -> Module {
        let doc_dir = join(root, &module.doc_dir);
        let (prefix, index, title) = module.tests.defaults();

        Module {
            name: module.name.clone(),
            source_root: join(&doc_dir, &module.source_root),
            dictionary_ext: module.dictionary_ext.clone(),
            tests_dir: join(&doc_dir, &module.tests_dir),
            binary: resolve_program(&doc_dir, &module.binary),
            errors_file: join(&doc_dir, &module.errors),
            manual_dir: join(&doc_dir, &module.manual_dir),
            images_dir: join(&doc_dir, &module.images_dir),
            tmp_dir: join(&doc_dir, &module.tmp_dir),
            out_dir: join(&doc_dir, &module.out_dir),
            template: module
                .template
                .clone()
                .unwrap_or_else(|| format!("rst-{}", module.name)),
            suite: TestSuite {
                kind: module.tests.kind.clone(),
                prefix: module.tests.prefix.clone().unwrap_or_else(|| prefix.into()),
                index_name: module.tests.index.clone().unwrap_or_else(|| index.into()),
                index_title: module
                    .tests
                    .index_title
                    .clone()
                    .unwrap_or_else(|| title.into()),
                jobs: self.jobs,
                timeout: Duration::from_secs(self.timeout_secs),
            },
            doc_dir,
        }
    }
}

fn join(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Bare program names stay as-is so the OS searches `PATH`.
fn resolve_program(base: &Path, program: &str) -> PathBuf {
    if Path::new(program).components().count() == 1 && !program.starts_with('.') {
        PathBuf::from(program)
    } else {
        join(base, program)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Find and parse the project file.
///
/// With no explicit path, `./docbuild.toml` is used when present and the
/// built-in defaults otherwise. An explicit path must exist. Returns the
/// config together with the directory its relative paths resolve against.
pub fn load_config(config_path: Option<&Path>) -> Result<(ProjectConfig, PathBuf)> {
    let cwd = std::env::current_dir()
        .map_err(|e| DocBuildError::config(format!("cannot determine working directory: {e}")))?;

    let path = match config_path {
        Some(p) => absolute(&cwd, p),
        None => {
            let default = cwd.join(CONFIG_FILE_NAME);
            if !default.exists() {
                tracing::debug!(path = %default.display(), "config file not found, using defaults");
                return Ok((ProjectConfig::default(), cwd));
            }
            default
        }
    };

    let config = load_config_from(&path)?;
    let root = path.parent().map(Path::to_path_buf).unwrap_or(cwd);
    Ok((config, root))
}

/// Load and resolve the project.
pub fn load_project(config_path: Option<&Path>) -> Result<Project> {
    let (config, root) = load_config(config_path)?;
    config.resolve(&root)
}

/// Parse a project config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocBuildError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocBuildError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write the default config to `path`, refusing to overwrite an existing file.
pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(DocBuildError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&ProjectConfig::default())
        .map_err(|e| DocBuildError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| DocBuildError::io(path, e))?;
    tracing::info!(path = %path.display(), "created default config file");

    Ok(())
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let toml_str = toml::to_string_pretty(&ProjectConfig::default()).expect("serialize");
        assert!(toml_str.contains("site_dir"));
        assert!(toml_str.contains("doxygen"));
        assert!(toml_str.contains("Assembler.exe"));
    }

    #[test]
    fn config_roundtrip() {
        let toml_str = toml::to_string_pretty(&ProjectConfig::default()).expect("serialize");
        let parsed: ProjectConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.modules.len(), 3);
        assert_eq!(parsed.modules[1].name, "linker");
        assert_eq!(parsed.modules[1].errors, "../Resources/Errors.txt");
        assert_eq!(parsed.jobs, 4);
    }

    #[test]
    fn minimal_module_table() {
        let toml_str = r#"
jobs = 2

[render]
engine = "docutils"

[[modules]]
name = "assembler"
doc_dir = "asm/doc"
binary = "../bin/asm"

[modules.tests]
kind = "script"
"#;
        let config: ProjectConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.extractor.is_none());
        assert_eq!(config.render.engine, RenderEngine::Docutils);
        assert_eq!(config.render.timeout_secs, 60);
        assert_eq!(config.modules.len(), 1);
        assert_eq!(config.modules[0].tests_dir, "../Tests/Programs");
    }

    #[test]
    fn resolve_applies_module_defaults() {
        let root = Path::new("/project/doc");
        let project = ProjectConfig::default().resolve(root).expect("resolve");

        let asm = project.module("assembler").expect("assembler");
        assert_eq!(asm.doc_dir, root.join("../Assembler/doc"));
        assert_eq!(asm.template, "rst-assembler");
        assert_eq!(asm.suite.prefix, "testfile_");
        assert_eq!(asm.suite.index_name, "testscript_index");
        assert_eq!(asm.report_dir(), asm.doc_dir.join("tmp").join("tests"));
        assert_eq!(asm.html_dir(), asm.doc_dir.join("out").join("html"));

        let sim = project.module("simulator").expect("simulator");
        assert_eq!(sim.suite.prefix, "testsim_");
        assert_eq!(project.site_dir, root.join("html"));
    }

    #[test]
    fn bare_program_names_stay_on_path() {
        let base = Path::new("/m/doc");
        assert_eq!(resolve_program(base, "cat"), PathBuf::from("cat"));
        assert_eq!(resolve_program(base, "./run.sh"), base.join("./run.sh"));
        assert_eq!(
            resolve_program(base, "../bin/Release/Linker.exe"),
            base.join("../bin/Release/Linker.exe")
        );
    }

    #[test]
    fn unknown_module_lists_known_names() {
        let project = ProjectConfig::default()
            .resolve(Path::new("/p"))
            .expect("resolve");
        let err = project.module("compiler").unwrap_err();
        assert!(err.to_string().contains("assembler, linker, simulator"));
    }

    #[test]
    fn duplicate_module_rejected() {
        let mut config = ProjectConfig::default();
        let copy = config.modules[0].clone();
        config.modules.push(copy);
        let err = config.resolve(Path::new("/p")).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn zero_jobs_rejected() {
        let config = ProjectConfig {
            jobs: 0,
            ..ProjectConfig::default()
        };
        assert!(config.resolve(Path::new("/p")).is_err());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = std::env::temp_dir().join(format!("docbuild-config-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);

        init_config(&path).expect("first init");
        let loaded = load_config_from(&path).expect("load");
        assert_eq!(loaded.modules.len(), 3);
        assert!(init_config(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn zero_render_timeout_rejected() {
        let mut config = ProjectConfig::default();
        config.render.timeout_secs = 0;
        let err = config.resolve(Path::new("/p")).unwrap_err();
        assert!(err.to_string().contains("render.timeout_secs"));
    }

    #[test]
    fn load_project_resolves_against_config_dir() {
        let dir = std::env::temp_dir().join(format!("docbuild-config-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "site_dir = \"out\"\n\n[[modules]]\nname = \"asm\"\ndoc_dir = \"asm/doc\"\nbinary = \"bin/asm\"\n\n[modules.tests]\nkind = \"script\"\n",
        )
        .unwrap();

        let project = load_project(Some(&path)).expect("load");
        assert_eq!(project.root, dir);
        assert_eq!(project.site_dir, dir.join("out"));
        let asm = project.module("asm").expect("asm");
        assert_eq!(asm.doc_dir, dir.join("asm/doc"));
        assert_eq!(asm.binary, dir.join("asm/doc").join("bin/asm"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_project_requires_explicit_file() {
        let missing = std::env::temp_dir()
            .join(format!("docbuild-config-{}", uuid::Uuid::now_v7()))
            .join(CONFIG_FILE_NAME);
        assert!(load_project(Some(&missing)).is_err());
    }
}
