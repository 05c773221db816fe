use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::{excerpt, parse_response, InvokeError, Result};

// ─── Command construction ─────────────────────────────────────────────────

pub(crate) fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

pub(crate) fn program_command(program: &Path) -> Command {
    Command::new(program)
}

// ─── Invocation ───────────────────────────────────────────────────────────

/// Run `cmd` with `input` as JSON on stdin and parse its stdout as JSON.
///
/// A non-zero exit is an application failure; the message carries an excerpt
/// of stderr (or the exit status if stderr was empty). The child is killed if
/// the returned future is dropped before it completes, which is how per-call
/// and whole-run timeouts reclaim the process.
pub(crate) async fn run_json(
    mut cmd: Command,
    address: &str,
    input: &serde_json::Value,
) -> Result<serde_json::Value> {
    let mut buf = serde_json::to_vec(input).map_err(|source| InvokeError::Parse {
        address: address.to_string(),
        source,
    })?;
    buf.push(b'\n');

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| InvokeError::Transport {
        address: address.to_string(),
        message: format!("failed to spawn: {e}"),
    })?;

    // Feed stdin while stdout and stderr drain.
    let stdin = child.stdin.take();
    let write = async move {
        let Some(mut stdin) = stdin else {
            return Ok(());
        };
        // Dropping stdin at the end of this block closes the pipe.
        stdin.write_all(&buf).await
    };

    let (written, output) = tokio::join!(write, child.wait_with_output());

    match written {
        Ok(()) => {}
        // A collaborator that ignores its input may exit before we finish
        // writing; that is not a failure of the call.
        Err(e) if e.kind() == ErrorKind::BrokenPipe => {
            tracing::debug!(address, "collaborator closed stdin early");
        }
        Err(e) => {
            return Err(InvokeError::Transport {
                address: address.to_string(),
                message: format!("failed to write stdin: {e}"),
            })
        }
    }

    let output = output.map_err(|e| InvokeError::Transport {
        address: address.to_string(),
        message: e.to_string(),
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    tracing::debug!(
        address,
        status = %output.status,
        stdout_bytes = output.stdout.len(),
        "collaborator exited"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let hint = excerpt(&stderr);
        let message = if hint.is_empty() {
            format!("exited with {}", output.status)
        } else {
            format!("exited with {}: {hint}", output.status)
        };
        return Err(InvokeError::Failed {
            address: address.to_string(),
            message,
        });
    }

    parse_response(address, &stdout)
}

// ─── Tests ────────────────────────────────────────────────────────────────
