//! Render pipeline: structured text in, styled HTML out.
//!
//! A [`Renderer`] is a pure function of its source file, template name and
//! [`RenderContext`]. The context carries the template directory
//! explicitly, so renders do not depend on call order or the process's
//! working directory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, instrument};

use docbuild_shared::{DocBuildError, RenderConfig, RenderEngine, Result, read_required};

use crate::html::{fill_template, render_html};
use crate::wrapper::{PageWrapper, emit_wrapper, page_id};

/// Explicit render settings threaded from the orchestrator.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Directory holding `<template>.html` files.
    pub template_dir: PathBuf,
}

impl RenderContext {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    /// Path of the named template.
    pub fn template_path(&self, template: &str) -> PathBuf {
        self.template_dir.join(format!("{template}.html"))
    }
}

/// Future returned by [`Renderer::render`].
pub type RenderFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Converts one structured-text file into a styled HTML file.
pub trait Renderer: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &'static str;

    fn render<'a>(
        &'a self,
        ctx: &'a RenderContext,
        source: &'a Path,
        destination: &'a Path,
        template: &'a str,
    ) -> RenderFuture<'a>;
}

/// Pick the renderer described by the configuration.
pub fn renderer_for(config: &RenderConfig) -> Box<dyn Renderer> {
    match config.engine {
        RenderEngine::Builtin => Box::new(BuiltinRenderer),
        RenderEngine::Docutils => Box::new(DocutilsRenderer::new(
            &config.command,
            Duration::from_secs(config.timeout_secs),
        )),
    }
}

// ---------------------------------------------------------------------------
// Built-in engine
// ---------------------------------------------------------------------------

/// Renders the supported subset in-process and fills the template's
/// `%(title)s` / `%(body)s` placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRenderer;

impl Renderer for BuiltinRenderer {
    fn name(&self) -> &'static str {
        "builtin"
    }

    fn render<'a>(
        &'a self,
        ctx: &'a RenderContext,
        source: &'a Path,
        destination: &'a Path,
        template: &'a str,
    ) -> RenderFuture<'a> {
        Box::pin(async move {
            let template_path = ctx.template_path(template);
            let template_text = std::fs::read_to_string(&template_path).map_err(|e| {
                DocBuildError::render(
                    source,
                    format!("cannot read template {}: {e}", template_path.display()),
                )
            })?;

            let text = read_required(source)?;
            let html = fill_template(&template_text, &render_html(&text));
            std::fs::write(destination, html).map_err(|e| DocBuildError::io(destination, e))
        })
    }
}

// ---------------------------------------------------------------------------
// Docutils engine
// ---------------------------------------------------------------------------

/// Shells out to a docutils front end (`rst2html` and friends).
///
/// Each call is bounded by `timeout`; a front end that overruns it is
/// killed and the render fails with [`DocBuildError::Timeout`].
#[derive(Debug, Clone)]
pub struct DocutilsRenderer {
    command: String,
    timeout: Duration,
}

impl DocutilsRenderer {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    async fn run(
        &self,
        ctx: &RenderContext,
        source: &Path,
        destination: &Path,
        template: &str,
    ) -> Result<()> {
        let child = Command::new(&self.command)
            .arg(format!("--template={}", ctx.template_path(template).display()))
            .arg(source)
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DocBuildError::Spawn {
                program: self.command.clone(),
                source: e,
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| DocBuildError::io(source, e))?,
            Err(_) => {
                return Err(DocBuildError::Timeout {
                    program: self.command.clone(),
                    subject: source.display().to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocBuildError::render(
                source,
                format!(
                    "`{}` exited with {}: {}",
                    self.command,
                    output.status,
                    stderr.trim()
                ),
            ));
        }
        Ok(())
    }
}

impl Renderer for DocutilsRenderer {
    fn name(&self) -> &'static str {
        "docutils"
    }

    fn render<'a>(
        &'a self,
        ctx: &'a RenderContext,
        source: &'a Path,
        destination: &'a Path,
        template: &'a str,
    ) -> RenderFuture<'a> {
        Box::pin(self.run(ctx, source, destination, template))
    }
}

// ---------------------------------------------------------------------------
// Render + wrap
// ---------------------------------------------------------------------------

/// Files produced by [`publish`].
#[derive(Debug, Clone)]
pub struct PublishedPage {
    pub page_id: String,
    pub html: PathBuf,
    pub wrapper_path: PathBuf,
    pub wrapper: PageWrapper,
}

/// Render `source` into `out_dir/<stem>.html` and write its wrapper to
/// `out_dir/<stem>.dox`.
#[instrument(skip_all, fields(source = %source.display(), template = %template, engine = renderer.name()))]
pub async fn publish(
    renderer: &dyn Renderer,
    ctx: &RenderContext,
    source: &Path,
    out_dir: &Path,
    template: &str,
) -> Result<PublishedPage> {
    let id = page_id(source);
    let html = out_dir.join(format!("{id}.html"));
    let wrapper_path = out_dir.join(format!("{id}.dox"));

    renderer.render(ctx, source, &html, template).await?;
    let wrapper = emit_wrapper(source, &wrapper_path)?;

    debug!(page = %id, "published page");
    Ok(PublishedPage {
        page_id: id,
        html,
        wrapper_path,
        wrapper,
    })
}
