//! Running external media tools.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Output, Stdio};

use tokio::process::Command as TokioCommand;

use super::error::StageError;

/// How much of a failing tool's stderr ends up in the job message.
const STDERR_TAIL_LINES: usize = 8;

/// Runs `program` to completion and returns its output if it exited 0.
///
/// The child is killed if the returned future is dropped, so a stage
/// timeout also stops the process.
pub async fn run_tool<I, S>(program: &str, args: I) -> Result<Output, StageError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| StageError::Spawn {
            tool: program.to_string(),
            source: e,
        })?;

    if !output.status.success() {
        let status = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "a signal".to_string(),
        };
        return Err(StageError::ToolFailed {
            tool: program.to_string(),
            status,
            stderr: stderr_tail(&output.stderr),
        });
    }

    Ok(output)
}

/// Last few non-empty stderr lines, joined on one line.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return "no error output".to_string();
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

/// Fails with `SourceUnreadable` unless `path` is an existing file.
pub async fn ensure_readable(path: &Path) -> Result<(), StageError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| StageError::SourceUnreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
    if !meta.is_file() {
        return Err(StageError::SourceUnreadable {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    Ok(())
}

/// Fails with `MissingOutput` unless `path` exists and is non-empty.
pub async fn ensure_output(path: &Path) -> Result<(), StageError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(StageError::MissingOutput(path.to_path_buf())),
    }
}
