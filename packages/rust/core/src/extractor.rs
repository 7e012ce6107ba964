//! The external API-doc extractor step.
//!
//! The extractor is opaque: it runs from the module's documentation
//! directory, reads the wrapper pages and its own project file there, and
//! writes the module's `out/html` tree.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, instrument};

use docbuild_shared::{DocBuildError, ExtractorConfig, Result};

#[instrument(skip_all, fields(command = %config.command, dir = %work_dir.display()))]
pub async fn run_extractor(config: &ExtractorConfig, work_dir: &Path) -> Result<()> {
    info!("running API-doc extractor");

    let output = Command::new(&config.command)
        .args(&config.args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DocBuildError::Extractor {
            message: format!("failed to spawn `{}`: {e}. Is it installed?", config.command),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DocBuildError::Extractor {
            message: format!(
                "`{}` exited with {} in {}: {}",
                config.command,
                output.status,
                work_dir.display(),
                stderr.trim()
            ),
        });
    }
    if !output.stderr.is_empty() {
        debug!(stderr = %String::from_utf8_lossy(&output.stderr).trim_end(), "extractor stderr");
    }
    Ok(())
}
