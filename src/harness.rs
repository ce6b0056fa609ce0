//! The `invoke` tool's collaborator: an opaque auxiliary process that loads
//! an assembly and reflectively invokes one method. The core only knows its
//! process contract — command line in, stdout/exit code out — never its
//! internals, per SPEC_FULL §2/§4.6.

use crate::{Error, Result};
use serde::Serialize;
use tokio::process::Command;

const HARNESS_PATH_ENV: &str = "DOTNET_DEBUGGER_HARNESS_PATH";
const DEFAULT_HARNESS_PATH: &str = "harness/DebugHarness.dll";

/// One `invoke` call's worth of reflection parameters.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessInvocation {
    pub assembly: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, rename = "ctorArgs")]
    pub ctor_args: Vec<String>,
    #[serde(skip)]
    pub cwd: Option<String>,
}

fn harness_path() -> String {
    std::env::var(HARNESS_PATH_ENV).unwrap_or_else(|_| DEFAULT_HARNESS_PATH.to_string())
}

/// The `dotnet <harness.dll> <json invocation>` command line, shared by
/// both the no-debug and debug-mode code paths so they never drift apart.
pub fn harness_command_line(invocation: &HarnessInvocation) -> (String, Vec<String>) {
    let payload = serde_json::to_string(invocation).unwrap_or_default();
    ("dotnet".to_string(), vec![harness_path(), payload])
}

/// Runs the harness as a plain sub-process with no debugger attached,
/// capturing its stdout as the tool's return value.
pub async fn run_no_debug(invocation: &HarnessInvocation) -> Result<String> {
    let (command, args) = harness_command_line(invocation);
    let mut cmd = Command::new(&command);
    cmd.args(&args);
    if let Some(cwd) = &invocation.cwd {
        cmd.current_dir(cwd);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| Error::Process(format!("failed to run harness: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Process(format!(
            "harness exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

/// The `(program, args)` pair a Session should `launch` with when the
/// `invoke` tool is called with `debug: true` — the harness becomes the
/// debuggee instead of a fire-and-forget subprocess.
pub fn launch_target(invocation: &HarnessInvocation) -> (String, Vec<String>) {
    let (_, args) = harness_command_line(invocation);
    (harness_path(), args.into_iter().skip(1).collect())
}
