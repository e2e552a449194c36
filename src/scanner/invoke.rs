//! Single external tool invocation under a deadline.
//!
//! The only observable contract with a tool is its exit status and captured
//! stdout. A timeout kills that one subprocess and never touches siblings.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{ScanError, ScanResult};

/// Cap on how much stderr is carried into an error message.
const STDERR_EXCERPT_LEN: usize = 512;

/// Run `bin` with `argv`, returning captured stdout.
///
/// The subprocess is killed when the deadline elapses (`kill_on_drop`
/// reaps it as the cancelled future is dropped).
pub async fn run_tool(bin: &str, argv: &[String], deadline: Duration) -> ScanResult<Vec<u8>> {
    let mut cmd = Command::new(bin);
    cmd.args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout(deadline, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ScanError::Spawn {
                tool: bin.to_string(),
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(ScanError::Timeout {
                tool: bin.to_string(),
                secs: deadline.as_secs(),
            })
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let excerpt: String = stderr.chars().take(STDERR_EXCERPT_LEN).collect();
        return Err(ScanError::ToolFailed {
            tool: bin.to_string(),
            status: output.status.to_string(),
            stderr: excerpt.trim().to_string(),
        });
    }

    Ok(output.stdout)
}
