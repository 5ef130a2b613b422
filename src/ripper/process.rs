//! Running the ripping tool (and other external commands).
//!
//! A [`ProcessRunner`] starts a command and hands back a channel of
//! [`ProcessEvent`]s: output lines as they arrive, then the exit code.
//! Lines from one stream keep their emission order; stdout and stderr are
//! read independently, so no order between the two is implied.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Output stream of a running command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Something a running command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// One line of output, without its line terminator
    Line(OutputStream, String),
    /// The command finished; always the last event. Signal termination reports -1.
    Exit(i32),
}

/// Errors starting a command.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} pipe was not available")]
    Pipe(&'static str),
}

/// Starts external commands and streams their output.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Start `program` with `args` in `cwd`.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<mpsc::Receiver<ProcessEvent>, ProcessError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone)]
pub struct TokioRunner;

#[async_trait]
impl ProcessRunner for TokioRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<mpsc::Receiver<ProcessEvent>, ProcessError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        tracing::info!(target: "ripper::process", program, arg_count = args.len(), cwd = ?cwd.map(PathBuf::from), "Starting command");
        let mut child = command.spawn().map_err(|e| ProcessError::Spawn {
            program: program.to_string(),
            source: e,
        })?;

        let stdout = child.stdout.take().ok_or(ProcessError::Pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(ProcessError::Pipe("stderr"))?;

        let (tx, rx) = mpsc::channel(256);
        let stdout_task = tokio::spawn(forward_lines(stdout, OutputStream::Stdout, tx.clone()));
        let stderr_task = tokio::spawn(forward_lines(stderr, OutputStream::Stderr, tx.clone()));

        let program = program.to_string();
        tokio::spawn(async move {
            // Exit is reported only after both streams are drained
            let _ = stdout_task.await;
            let _ = stderr_task.await;

            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    tracing::warn!(target: "ripper::process", program = %program, error = %e, "Failed to wait for command");
                    -1
                }
            };
            tracing::info!(target: "ripper::process", program = %program, code, "Command exited");
            let _ = tx.send(ProcessEvent::Exit(code)).await;
        });

        Ok(rx)
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(
    reader: R,
    stream: OutputStream,
    tx: mpsc::Sender<ProcessEvent>,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return,
            Ok(_) => {
                // The tool prints tags in whatever encoding the disc metadata came in
                let line = decode_line(&buf);
                for segment in split_carriage_returns(&line) {
                    tracing::debug!(target: "ripper::process", stream = stream.as_str(), "{}", segment);
                    if tx
                        .send(ProcessEvent::Line(stream, segment.to_string()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(target: "ripper::process", stream = stream.as_str(), error = %e, "Stopped reading output");
                return;
            }
        }
    }
}

/// One raw output line without its terminator; invalid UTF-8 is replaced.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Split a line on in-place progress redraws (`\r`), dropping empty redraws.
fn split_carriage_returns(line: &str) -> Vec<&str> {
    if !line.contains('\r') {
        return vec![line];
    }
    line.split('\r').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_carriage_returns() {
        assert_eq!(split_carriage_returns(""), vec![""]);
        assert_eq!(split_carriage_returns("plain"), vec!["plain"]);
        assert_eq!(
            split_carriage_returns("a ... 10 %\ra ... 20 %\r"),
            vec!["a ... 10 %", "a ... 20 %"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_streams_lines_and_exit_code() {
        let runner = TokioRunner;
        let args = vec![
            "-c".to_string(),
            "echo one; echo two; echo oops 1>&2; exit 3".to_string(),
        ];
        let mut rx = runner.run("sh", &args, None).await.unwrap();

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit = None;
        while let Some(event) = rx.recv().await {
            match event {
                ProcessEvent::Line(OutputStream::Stdout, line) => stdout.push(line),
                ProcessEvent::Line(OutputStream::Stderr, line) => stderr.push(line),
                ProcessEvent::Exit(code) => exit = Some(code),
            }
        }

        assert_eq!(stdout, vec!["one", "two"]);
        assert_eq!(stderr, vec!["oops"]);
        assert_eq!(exit, Some(3));
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"plain\n"), "plain");
        assert_eq!(decode_line(b"dos\r\n"), "dos");
        assert_eq!(decode_line(b"last"), "last");
        assert_eq!(decode_line(b"\n"), "");
        assert_eq!(decode_line(b"Artist  : Bj\xf6rk\n"), "Artist  : Bj\u{fffd}rk");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tokio_runner_survives_invalid_utf8() {
        let runner = TokioRunner;
        // A Latin-1 line followed by enough output to fill the pipe if nobody reads it
        let args = vec![
            "-c".to_string(),
            "printf 'Artist  : Bj\\366rk\\n'; echo 'after one'; \
             i=0; while [ $i -lt 5000 ]; do echo 'Reading ... 10 % ........................'; i=$((i+1)); done; \
             echo 'after many'"
                .to_string(),
        ];
        let mut rx = runner.run("sh", &args, None).await.unwrap();

        let mut stdout = Vec::new();
        let mut exit = None;
        while let Some(event) = rx.recv().await {
            match event {
                ProcessEvent::Line(OutputStream::Stdout, line) => stdout.push(line),
                ProcessEvent::Line(OutputStream::Stderr, _) => {}
                ProcessEvent::Exit(code) => exit = Some(code),
            }
        }

        assert_eq!(stdout[0], "Artist  : Bj\u{fffd}rk");
        assert_eq!(stdout[1], "after one");
        assert_eq!(stdout.len(), 5003);
        assert_eq!(stdout.last().map(String::as_str), Some("after many"));
        assert_eq!(exit, Some(0));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let result = TokioRunner
            .run("rip-minder-definitely-not-installed", &[], None)
            .await;
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }
}
