//! Fake rebuild driver for hot-reload integration testing: stands in for
//! `dotnet watch run`. Accepts the same argument shape the Watch Controller
//! passes its driver (`[--no-hot-reload] run --launch-profile <name> |
//! --no-launch-profile -- <args>`), spawns a long-lived debuggee child whose
//! command line contains `<cwd>/bin/` (so process-probe discovery matches
//! it the same way it would match a real build output path), and rebuilds
//! on request: touching a `.rebuild-trigger` file in the current directory
//! prints `Building...` to stdout, kills the old child, and spawns a new
//! one with a fresh pid.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

const TRIGGER_FILE: &str = ".rebuild-trigger";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn bin_path(cwd: &std::path::Path) -> PathBuf {
    cwd.join("bin").join("Debug").join("net8.0").join("App.dll")
}

fn spawn_debuggee(cwd: &std::path::Path) -> Child {
    // `sleep` never reads its args as a path, but the process-probe
    // discovery rule only inspects the full command line text.
    Command::new("sleep")
        .arg("86400")
        .arg(bin_path(cwd).to_string_lossy().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn fake debuggee")
}

fn main() {
    // Args are accepted but not interpreted beyond presence; the real
    // driver's profile/hot-reload flags only matter to `dotnet watch`.
    let _args: Vec<String> = std::env::args().skip(1).collect();

    let cwd = std::env::current_dir().expect("no current directory");
    let trigger_path = cwd.join(TRIGGER_FILE);
    let _ = std::fs::remove_file(&trigger_path);

    let mut child = spawn_debuggee(&cwd);
    println!("watch : Started");
    std::io::stdout().flush().ok();

    loop {
        std::thread::sleep(POLL_INTERVAL);

        if trigger_path.exists() {
            let _ = std::fs::remove_file(&trigger_path);
            println!("watch : Building...");
            std::io::stdout().flush().ok();

            let _ = child.kill();
            let _ = child.wait();
            child = spawn_debuggee(&cwd);

            println!("watch : Started");
            std::io::stdout().flush().ok();
        }

        if let Ok(Some(_status)) = child.try_wait() {
            // Debuggee exited on its own; nothing left to watch.
            break;
        }
    }
}
