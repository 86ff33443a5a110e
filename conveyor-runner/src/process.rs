//! Child process execution
//!
//! Runs external tools (git, docker) and forwards their stdout and stderr to
//! an output sink while they run. Children are killed if the future running
//! them is dropped, so a stage timeout terminates the process.

use conveyor_core::SharedSink;
use std::io;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// Errors from running a child process
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {}", exit_description(*code))]
    Exited { program: String, code: Option<i32> },

    #[error("I/O error while running a command: {0}")]
    Io(#[from] io::Error),
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Renders a command line for logs and error messages
pub fn describe(command: &Command) -> String {
    let std = command.as_std();
    std::iter::once(std.get_program())
        .chain(std.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs a command to completion, streaming combined output to the sink
///
/// # Returns
/// `Ok(())` if the process exited successfully, `ProcessError::Exited`
/// otherwise
pub async fn run_streaming(mut command: Command, output: &SharedSink) -> Result<(), ProcessError> {
    let program = describe(&command);
    debug!("Running: {}", program);

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout_result, stderr_result, status) = tokio::join!(
        forward(stdout, output),
        forward(stderr, output),
        child.wait()
    );
    stdout_result?;
    stderr_result?;
    let status = status?;

    if !status.success() {
        return Err(ProcessError::Exited {
            program,
            code: status.code(),
        });
    }

    Ok(())
}

/// Copies a pipe into the sink chunk by chunk until EOF
async fn forward<R: AsyncRead + Unpin>(pipe: Option<R>, output: &SharedSink) -> io::Result<()> {
    let Some(mut pipe) = pipe else {
        return Ok(());
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = pipe.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        output.write(&buf[..n])?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::MemorySink;
    use std::sync::Arc;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn test_streams_stdout_and_stderr() {
        let sink = MemorySink::new();
        let output: SharedSink = Arc::new(sink.clone());

        run_streaming(sh("echo out; echo err 1>&2"), &output)
            .await
            .unwrap();

        let text = sink.contents_lossy();
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let output: SharedSink = Arc::new(MemorySink::new());

        let err = run_streaming(sh("exit 3"), &output).await.unwrap_err();

        match err {
            ProcessError::Exited { program, code } => {
                assert_eq!(code, Some(3));
                assert!(program.starts_with("sh -c"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let output: SharedSink = Arc::new(MemorySink::new());

        let err = run_streaming(Command::new("conveyor-no-such-binary"), &output)
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[test]
    fn test_describe() {
        let mut command = Command::new("git");
        command.args(["checkout", "-qf", "abc123"]);
        assert_eq!(describe(&command), "git checkout -qf abc123");
    }
}
