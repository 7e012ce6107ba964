//! Module and site builds.
//!
//! A module build runs its steps in a fixed order:
//! 1. Reset `tmp/` and `out/`
//! 2. Data element dictionary
//! 3. Test suite, then one page per report plus the index page
//! 4. Error listing
//! 5. Manual documents
//! 6. API-doc extractor, or a direct copy of the rendered pages
//! 7. Image assets
//!
//! A site build runs every module build in configuration order, then
//! aggregates their output trees under the site directory next to the
//! top-level manual and the shared stylesheet.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument};

use docbuild_discovery::{ScanOptions, scan};
use docbuild_harness::{HarnessProgress, run_suite};
use docbuild_rst::{Document, RenderContext, Renderer, publish, renderer_for, write_document};
use docbuild_shared::{DocBuildError, Module, Project, Result};

use crate::dictionary::build_dictionary;
use crate::errorlist::build_error_list;
use crate::extractor::run_extractor;
use crate::site::{copy_tree, digest_tree, reset_dir};

/// Stem of the generated dictionary page.
pub const DICTIONARY_PAGE: &str = "ded";
/// Stem of the generated error listing page.
pub const ERROR_LIST_PAGE: &str = "errorlist";
/// Extension of hand-written manual documents.
pub const MANUAL_EXT: &str = "rst";

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting build status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a module enters a new step.
    fn phase(&self, module: &str, name: &str);
    /// Called as each test report is recorded, in discovery order.
    fn test_recorded(&self, name: &str, current: usize, total: usize);
    /// Called after a page is rendered and wrapped.
    fn page_published(&self, page: &str);
    /// Called when the whole build completes.
    fn done(&self);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _module: &str, _name: &str) {}
    fn test_recorded(&self, _name: &str, _current: usize, _total: usize) {}
    fn page_published(&self, _page: &str) {}
    fn done(&self) {}
}

/// Forwards harness progress to the pipeline reporter.
struct SuiteProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl HarnessProgress for SuiteProgress<'_> {
    fn test_recorded(&self, name: &str, done: usize, total: usize) {
        self.inner.test_recorded(name, done, total);
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Result of one module build.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    /// Pages rendered and wrapped.
    pub pages: usize,
    /// Test reports recorded.
    pub tests: usize,
    pub html_dir: PathBuf,
    /// SHA-256 of the module's published tree.
    pub digest: String,
    pub elapsed: Duration,
}

/// Result of a full site build.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub site_dir: PathBuf,
    pub modules: Vec<ModuleSummary>,
    /// Top-level pages rendered into the site root.
    pub pages: usize,
    /// SHA-256 of the whole site tree.
    pub digest: String,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Module build
// ---------------------------------------------------------------------------

/// Renders pages into one directory with one template.
struct Publisher<'a> {
    renderer: &'a dyn Renderer,
    ctx: &'a RenderContext,
    out_dir: &'a Path,
    template: &'a str,
    progress: &'a dyn ProgressReporter,
    count: usize,
}

impl Publisher<'_> {
    async fn publish(&mut self, source: &Path) -> Result<()> {
        let page = publish(self.renderer, self.ctx, source, self.out_dir, self.template).await?;
        self.progress.page_published(&page.page_id);
        self.count += 1;
        Ok(())
    }

    /// Write a generated document to `out_dir/<stem>.rst` and publish it.
    async fn publish_document(&mut self, doc: &Document, stem: &str) -> Result<()> {
        let source = self.out_dir.join(format!("{stem}.rst"));
        write_document(doc, &source)?;
        self.publish(&source).await
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| DocBuildError::io(dir, e))
}

/// Build one module's documentation into `module.html_dir()`.
#[instrument(skip_all, fields(module = %module.name))]
pub async fn build_module(
    project: &Project,
    module: &Module,
    progress: &dyn ProgressReporter,
) -> Result<ModuleSummary> {
    let start = Instant::now();
    let renderer = renderer_for(&project.render);
    let ctx = RenderContext::new(&project.template_dir);
    info!(engine = renderer.name(), template = %module.template, "building module");

    // --- Step 1: Clean ---
    progress.phase(&module.name, "Cleaning");
    reset_dir(&module.tmp_dir)?;
    reset_dir(&module.out_dir)?;
    create_dir(&module.report_dir())?;

    let mut publisher = Publisher {
        renderer: renderer.as_ref(),
        ctx: &ctx,
        out_dir: &module.tmp_dir,
        template: &module.template,
        progress,
        count: 0,
    };

    // --- Step 2: Dictionary ---
    progress.phase(&module.name, "Building data element dictionary");
    let dictionary = build_dictionary(&module.source_root, &module.dictionary_ext)?;
    publisher.publish_document(&dictionary, DICTIONARY_PAGE).await?;

    // --- Step 3: Tests ---
    progress.phase(&module.name, "Running tests");
    let suite = run_suite(module, &SuiteProgress { inner: progress }).await?;
    progress.phase(&module.name, "Rendering test reports");
    for report in &suite.reports {
        publisher.publish(&report.source).await?;
    }
    publisher.publish(&suite.index).await?;

    // --- Step 4: Error listing ---
    progress.phase(&module.name, "Creating error listing");
    let errors = build_error_list(&module.errors_file)?;
    publisher.publish_document(&errors, ERROR_LIST_PAGE).await?;

    // --- Step 5: Manual ---
    progress.phase(&module.name, "Building manual");
    for source in scan(&module.manual_dir, MANUAL_EXT, ScanOptions::RECURSIVE) {
        publisher.publish(&source).await?;
    }
    let pages = publisher.count;

    // --- Step 6: Extractor ---
    let html_dir = module.html_dir();
    match &project.extractor {
        Some(extractor) => {
            progress.phase(&module.name, "Running API-doc extractor");
            run_extractor(extractor, &module.doc_dir).await?;
            create_dir(&html_dir)?;
        }
        None => {
            progress.phase(&module.name, "Publishing pages");
            create_dir(&html_dir)?;
            for page in scan(&module.tmp_dir, "html", ScanOptions::FLAT) {
                let Some(name) = page.file_name() else {
                    continue;
                };
                let target = html_dir.join(name);
                std::fs::copy(&page, &target).map_err(|e| DocBuildError::io(&target, e))?;
            }
        }
    }

    // --- Step 7: Images ---
    if module.images_dir.is_dir() {
        progress.phase(&module.name, "Copying images");
        let copied = copy_tree(&module.images_dir, &html_dir.join("images"))?;
        debug!(copied, "images copied");
    } else {
        debug!(dir = %module.images_dir.display(), "no image directory, skipping");
    }

    let summary = ModuleSummary {
        name: module.name.clone(),
        pages,
        tests: suite.reports.len(),
        digest: digest_tree(&html_dir)?,
        html_dir,
        elapsed: start.elapsed(),
    };
    info!(
        pages = summary.pages,
        tests = summary.tests,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "module built"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Site build
// ---------------------------------------------------------------------------

/// Build every module, then aggregate the site.
#[instrument(skip_all, fields(site = %project.site_dir.display()))]
pub async fn build_site(project: &Project, progress: &dyn ProgressReporter) -> Result<SiteSummary> {
    let start = Instant::now();
    info!(modules = project.modules.len(), "starting site build");

    reset_dir(&project.site_dir)?;

    let mut modules = Vec::with_capacity(project.modules.len());
    for module in &project.modules {
        let summary = build_module(project, module, progress).await?;
        progress.phase(&module.name, "Aggregating");
        copy_tree(&summary.html_dir, &project.site_dir.join(&module.name))?;
        modules.push(summary);
    }

    progress.phase("top", "Building top-level manual");
    let renderer = renderer_for(&project.render);
    let ctx = RenderContext::new(&project.template_dir);
    let mut publisher = Publisher {
        renderer: renderer.as_ref(),
        ctx: &ctx,
        out_dir: &project.site_dir,
        template: &project.template,
        progress,
        count: 0,
    };
    for source in scan(&project.source_dir, MANUAL_EXT, ScanOptions::RECURSIVE) {
        publisher.publish(&source).await?;
    }
    let pages = publisher.count;

    let stylesheet_name = project
        .stylesheet
        .file_name()
        .ok_or_else(|| DocBuildError::config("stylesheet path has no file name"))?;
    let stylesheet = project.site_dir.join(stylesheet_name);
    std::fs::copy(&project.stylesheet, &stylesheet)
        .map_err(|e| DocBuildError::io(&project.stylesheet, e))?;

    let summary = SiteSummary {
        site_dir: project.site_dir.clone(),
        modules,
        pages,
        digest: digest_tree(&project.site_dir)?,
        elapsed: start.elapsed(),
    };
    progress.done();
    info!(digest = %summary.digest, "site built");
    Ok(summary)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    use docbuild_shared::{ExtractorConfig, ModuleConfig, ProjectConfig, SuiteKind};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docbuild-pipeline-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn script(path: &Path, body: &str) {
        write(path, &format!("#!/bin/sh\n{body}\n"));
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    const TEMPLATE: &str = "<html><head><title>%(title)s</title></head><body>%(body)s</body></html>";

    /// A one-module toolchain tree:
    ///
    /// ```text
    /// root/
    ///   doc/docbuild.toml, src/index.rst, template/*.html, template/style.css
    ///   Assembler/bin/asm, Assembler/Vars.csv, Assembler/Resources/errors.txt
    ///   Assembler/Tests/Programs/add.txt
    ///   Assembler/doc/src/guide.rst, Assembler/doc/src/images/logo.png
    /// ```
    fn fixture_tree(root: &Path) -> Project {
        let doc = root.join("doc");
        write(&doc.join("src/index.rst"), "Toolchain\n=========\n\nSee the modules.\n");
        write(&doc.join("template/rst-top.html"), TEMPLATE);
        write(&doc.join("template/rst-assembler.html"), TEMPLATE);
        write(&doc.join("template/style.css"), "body { margin: 0; }\n");

        let asm = root.join("Assembler");
        script(&asm.join("bin/asm"), "echo OK");
        write(&asm.join("Vars.csv"), "pc, Core, int, Global, program counter, 0-1023\n");
        write(&asm.join("Resources/errors.txt"), "E01 Unknown opcode\n");
        write(&asm.join("Tests/Programs/add.txt"), "ADD R1 R2\n");
        write(&asm.join("doc/src/guide.rst"), "\nUser Guide\n==========\n\nRead me.\n");
        write(&asm.join("doc/src/images/logo.png"), "PNG");

        let config = ProjectConfig {
            site_dir: "html".into(),
            extractor: None,
            jobs: 2,
            timeout_secs: 10,
            modules: vec![ModuleConfig::new(
                "assembler",
                "../Assembler/doc",
                "../bin/asm",
                SuiteKind::Script {
                    fixture_ext: "txt".into(),
                },
            )],
            ..ProjectConfig::default()
        };
        config.resolve(&doc).unwrap()
    }

    #[tokio::test]
    async fn module_build_publishes_every_page() {
        let root = temp_dir();
        let project = fixture_tree(&root);
        let module = &project.modules[0];

        let summary = build_module(&project, module, &SilentProgress).await.unwrap();
        // ded, one report, index, errorlist, guide
        assert_eq!(summary.pages, 5);
        assert_eq!(summary.tests, 1);

        let html = module.html_dir();
        for page in ["ded", "testfile_add", "testscript_index", "errorlist", "guide"] {
            assert!(html.join(format!("{page}.html")).exists(), "missing {page}.html");
            assert!(module.tmp_dir.join(format!("{page}.dox")).exists(), "missing {page}.dox");
        }
        assert!(html.join("images/logo.png").exists());

        let report = std::fs::read_to_string(html.join("testfile_add.html")).unwrap();
        assert!(report.contains("<title>add.txt</title>"));
        assert!(report.contains("ADD R1 R2"));
        assert!(report.contains("OK"));
        assert!(!report.contains("Object File"));

        let index = std::fs::read_to_string(html.join("testscript_index.html")).unwrap();
        assert!(index.contains("href=\"testfile_add.html\""));

        let wrapper = std::fs::read_to_string(module.tmp_dir.join("guide.dox")).unwrap();
        assert_eq!(
            wrapper,
            "/**\n\n\\page guide User Guide\n\\htmlinclude guide.html\n\n*/"
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn module_build_clears_stale_output() {
        let root = temp_dir();
        let project = fixture_tree(&root);
        let module = &project.modules[0];
        write(&module.tmp_dir.join("stale.rst"), "old");
        write(&module.html_dir().join("stale.html"), "old");

        build_module(&project, module, &SilentProgress).await.unwrap();
        assert!(!module.tmp_dir.join("stale.rst").exists());
        assert!(!module.html_dir().join("stale.html").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn site_build_aggregates_modules() {
        let root = temp_dir();
        let project = fixture_tree(&root);

        let summary = build_site(&project, &SilentProgress).await.unwrap();
        let site = root.join("doc/html");
        assert_eq!(summary.site_dir, site);
        assert_eq!(summary.pages, 1);
        assert!(site.join("assembler/testfile_add.html").exists());
        assert!(site.join("assembler/images/logo.png").exists());
        assert!(site.join("index.html").exists());
        assert!(site.join("index.dox").exists());
        assert_eq!(
            std::fs::read_to_string(site.join("style.css")).unwrap(),
            "body { margin: 0; }\n"
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn consecutive_builds_are_byte_identical() {
        let root = temp_dir();
        let project = fixture_tree(&root);

        let first = build_site(&project, &SilentProgress).await.unwrap();
        let second = build_site(&project, &SilentProgress).await.unwrap();
        assert_eq!(first.digest, second.digest);
        assert_eq!(first.modules[0].digest, second.modules[0].digest);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn extractor_output_becomes_module_output() {
        let root = temp_dir();
        let mut project = fixture_tree(&root);
        let extractor = root.join("extract.sh");
        script(
            &extractor,
            "mkdir -p out/html && ls tmp/*.dox | wc -l | tr -d ' ' > out/html/wrappers.txt",
        );
        project.extractor = Some(ExtractorConfig {
            command: extractor.display().to_string(),
            args: Vec::new(),
        });
        let module = &project.modules[0];

        build_module(&project, module, &SilentProgress).await.unwrap();
        let html = module.html_dir();
        assert_eq!(std::fs::read_to_string(html.join("wrappers.txt")).unwrap(), "5\n");
        assert!(!html.join("ded.html").exists());
        assert!(html.join("images/logo.png").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn malformed_error_listing_aborts() {
        let root = temp_dir();
        let project = fixture_tree(&root);
        write(&root.join("Assembler/Resources/errors.txt"), "E01 ok\nBROKEN\n");

        let err = build_site(&project, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, DocBuildError::Malformed { line: 2, .. }));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn missing_images_are_skipped() {
        let root = temp_dir();
        let project = fixture_tree(&root);
        std::fs::remove_dir_all(root.join("Assembler/doc/src/images")).unwrap();

        let summary = build_module(&project, &project.modules[0], &SilentProgress)
            .await
            .unwrap();
        assert!(!summary.html_dir.join("images").exists());

        let _ = std::fs::remove_dir_all(&root);
    }
}
