//! Process runner for the binaries under test.
//!
//! Every invocation has an explicit working directory, optional stdin and a
//! hard time bound. Only stdout is recorded; stderr and the exit status are
//! logged at debug level and otherwise ignored.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use docbuild_shared::{DocBuildError, Result};

/// One call of a binary under test.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: PathBuf,
    /// Bytes written to stdin. `None` attaches stdin to the null device.
    pub stdin: Option<Vec<u8>>,
    pub timeout: Duration,
    /// Test name, for logs and timeout errors.
    pub subject: String,
}

impl Invocation {
    pub fn new(
        program: impl Into<PathBuf>,
        current_dir: impl Into<PathBuf>,
        timeout: Duration,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: current_dir.into(),
            stdin: None,
            timeout,
            subject: subject.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, input: Vec<u8>) -> Self {
        self.stdin = Some(input);
        self
    }
}

/// What a finished invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub stdout: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Run `invocation` to completion and capture its standard output.
///
/// A nonzero exit is not an error. Exceeding the time bound kills the child
/// and returns [`DocBuildError::Timeout`].
#[instrument(skip_all, fields(program = %invocation.program.display(), subject = %invocation.subject))]
pub async fn run(invocation: &Invocation) -> Result<Transcript> {
    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .current_dir(&invocation.current_dir)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| DocBuildError::Spawn {
        program: invocation.program.display().to_string(),
        source: e,
    })?;

    if let (Some(input), Some(mut pipe)) = (invocation.stdin.clone(), child.stdin.take()) {
        tokio::spawn(async move {
            // The pipe closes when `pipe` drops at the end of this task.
            if let Err(e) = pipe.write_all(&input).await {
                debug!(error = %e, "target closed stdin early");
            }
        });
    }

    let output = match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| DocBuildError::io(&invocation.current_dir, e))?,
        Err(_) => {
            return Err(DocBuildError::Timeout {
                program: invocation.program.display().to_string(),
                subject: invocation.subject.clone(),
                secs: invocation.timeout.as_secs(),
            });
        }
    };

    if !output.status.success() {
        debug!(status = %output.status, "target exited unsuccessfully");
    }
    if !output.stderr.is_empty() {
        debug!(stderr = %String::from_utf8_lossy(&output.stderr).trim_end(), "target stderr");
    }

    Ok(Transcript {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        exit_code: output.status.code(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docbuild-runner-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn captures_stdout_and_ignores_exit_status() {
        let tmp = temp_dir();
        let bin = script(&tmp, "fail.sh", "echo out; echo err >&2; exit 3");

        let transcript = run(&Invocation::new(&bin, &tmp, Duration::from_secs(10), "fail"))
            .await
            .unwrap();
        assert_eq!(transcript.stdout, "out\n");
        assert_eq!(transcript.exit_code, Some(3));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn runs_in_requested_directory_with_arguments() {
        let tmp = temp_dir();
        let work = tmp.join("work");
        std::fs::create_dir_all(&work).unwrap();
        let bin = script(&tmp, "pwd.sh", "basename \"$(pwd)\"; echo \"$@\"");

        let transcript = run(&Invocation::new(&bin, &work, Duration::from_secs(10), "pwd")
            .args(["a.objtxt", "b.objtxt"]))
        .await
        .unwrap();
        assert_eq!(transcript.stdout, "work\na.objtxt b.objtxt\n");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn feeds_stdin() {
        let tmp = temp_dir();
        let bin = script(&tmp, "cat.sh", "cat");

        let transcript = run(&Invocation::new(&bin, &tmp, Duration::from_secs(10), "cat")
            .stdin(b"5\n7\n".to_vec()))
        .await
        .unwrap();
        assert_eq!(transcript.stdout, "5\n7\n");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn null_stdin_reads_eof() {
        let tmp = temp_dir();
        let bin = script(&tmp, "cat.sh", "cat; echo done");

        let transcript = run(&Invocation::new(&bin, &tmp, Duration::from_secs(10), "cat"))
            .await
            .unwrap();
        assert_eq!(transcript.stdout, "done\n");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let tmp = temp_dir();
        let bin = script(&tmp, "hang.sh", "sleep 30");

        let err = run(&Invocation::new(&bin, &tmp, Duration::from_millis(200), "hang"))
            .await
            .unwrap_err();
        match err {
            DocBuildError::Timeout { subject, .. } => assert_eq!(subject, "hang"),
            other => panic!("expected timeout, got {other:?}"),
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let tmp = temp_dir();
        let err = run(&Invocation::new(
            tmp.join("no-such-binary"),
            &tmp,
            Duration::from_secs(1),
            "x",
        ))
        .await
        .unwrap_err();
        assert!(matches!(err, DocBuildError::Spawn { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
