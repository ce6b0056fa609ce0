//! Hot-reload engine: runs an external rebuild-driver process, locates the
//! debuggee child under it, and orchestrates kill-wait-reattach cycles so a
//! Session's Transport stays attached to the live debuggee across restarts
//! — the centerpiece feature described in SPEC_FULL §4.3.

pub mod state;

use crate::dap::types::{AttachRequestArguments, Capabilities};
use crate::dap::DapClient;
use crate::process::{ProcessProbe, SystemProcessProbe};
use crate::session::config::SessionConfig;
use crate::session::Session;
use crate::{Error, Result};
use state::WatchFlags;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{info, warn};

const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);
const PID_GONE_POLL_INTERVAL: Duration = Duration::from_millis(50);
const PID_GONE_TIMEOUT: Duration = Duration::from_secs(5);
const PORT_RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(300);
const PORT_RELEASE_TIMEOUT: Duration = Duration::from_secs(10);
const STARTUP_PAUSE: Duration = Duration::from_secs(1);
const LIVENESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

const DEFAULT_ADAPTER_COMMAND: &str = "netcoredbg";
const DEFAULT_ADAPTER_ARGS: &[&str] = &["--interpreter=vscode"];
const ADAPTER_COMMAND_ENV: &str = "DOTNET_DEBUGGER_ADAPTER_COMMAND";
const DRIVER_COMMAND_ENV: &str = "DOTNET_DEBUGGER_WATCH_DRIVER_COMMAND";

/// The debug adapter's command line, overridable for testing so the real
/// `netcoredbg` binary need not be installed.
fn adapter_command() -> (String, Vec<String>) {
    match std::env::var(ADAPTER_COMMAND_ENV) {
        Ok(path) => (path, Vec::new()),
        Err(_) => (
            DEFAULT_ADAPTER_COMMAND.to_string(),
            DEFAULT_ADAPTER_ARGS.iter().map(|s| s.to_string()).collect(),
        ),
    }
}

/// The rebuild driver binary, overridable for testing so a real `dotnet`
/// install is not required.
fn driver_command() -> String {
    std::env::var(DRIVER_COMMAND_ENV).unwrap_or_else(|_| "dotnet".to_string())
}

/// Owns the rebuild-driver child and the background tasks that watch it;
/// created by `launch_watch`, destroyed by `stop_watch`/`terminate`.
pub struct WatchController {
    driver: Child,
    flags: Arc<WatchFlags>,
    project_dir: String,
    launch_profile: Option<String>,
    ports: Vec<u16>,
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl WatchController {
    /// Runs the full startup sequence from SPEC_FULL §4.3 and returns a
    /// controller wired to background tasks that will drive future
    /// reconnects against `session`.
    pub async fn start(
        session: Weak<Session>,
        project_dir: String,
        launch_profile: Option<String>,
        args: Vec<String>,
        no_hot_reload: bool,
    ) -> Result<Self> {
        let project_dir_abs = crate::security::validate_directory_path(&project_dir)?
            .to_string_lossy()
            .to_string();

        let ports = match &launch_profile {
            Some(name) => crate::profile::resolve_launch_profile(Path::new(&project_dir_abs), name)?
                .map(|p| p.ports())
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let mut driver_args = vec!["watch".to_string()];
        if no_hot_reload {
            driver_args.push("--no-hot-reload".to_string());
        }
        driver_args.push("run".to_string());
        match &launch_profile {
            Some(name) => {
                driver_args.push("--launch-profile".to_string());
                driver_args.push(name.clone());
            }
            None => driver_args.push("--no-launch-profile".to_string()),
        }
        driver_args.push("--".to_string());
        driver_args.extend(args);

        let mut driver = Command::new(driver_command())
            .args(&driver_args)
            .current_dir(&project_dir_abs)
            .env("DOTNET_WATCH_RESTART_ON_RUDE_EDIT", "1")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| Error::Process(format!("failed to spawn rebuild driver: {}", e)))?;

        let probe: Arc<dyn ProcessProbe> = Arc::new(SystemProcessProbe::new());
        let pid = discover_debuggee(probe.as_ref(), &project_dir_abs, None, DISCOVERY_TIMEOUT).await?;

        sleep(STARTUP_PAUSE).await;

        let mut initial_config = SessionConfig::for_watch(project_dir_abs.clone(), Vec::new(), launch_profile.clone());
        initial_config.process_id = Some(pid);
        initial_config.start_time = Some(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        );
        attach_session(&session, pid, initial_config).await?;

        let flags = WatchFlags::new();
        flags.last_child_pid.store(pid, Ordering::SeqCst);

        let stdout = driver.stdout.take();
        let stderr = driver.stderr.take();

        let mut background_tasks = Vec::new();

        if let Some(stdout) = stdout {
            background_tasks.push(spawn_stdout_watcher(
                stdout,
                session.clone(),
                flags.clone(),
                probe.clone(),
                project_dir_abs.clone(),
                ports.clone(),
            ));
        }
        if let Some(stderr) = stderr {
            background_tasks.push(spawn_stderr_relay(stderr, session.clone()));
        }
        background_tasks.push(spawn_liveness_poller(
            session.clone(),
            flags.clone(),
            probe.clone(),
            project_dir_abs.clone(),
            ports.clone(),
        ));

        info!(pid, "watch controller attached to debuggee");

        Ok(Self {
            driver,
            flags,
            project_dir: project_dir_abs,
            launch_profile,
            ports,
            background_tasks,
        })
    }

    pub fn project_dir(&self) -> &str {
        &self.project_dir
    }

    pub fn launch_profile(&self) -> Option<&str> {
        self.launch_profile.as_deref()
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub async fn stop_watch(mut self) {
        self.flags.stopped.store(true, Ordering::SeqCst);
        for task in self.background_tasks.drain(..) {
            task.abort();
        }
        if let Some(pid) = self.driver.id() {
            let _ = std::process::Command::new("kill").args(["-TERM", &pid.to_string()]).status();
        }
        let _ = self.driver.wait().await;
    }
}

/// The `bin/`-match discovery rule from SPEC_FULL §4.3, polled until
/// `timeout_at` elapses.
async fn discover_debuggee(
    probe: &dyn ProcessProbe,
    project_dir: &str,
    exclude_pid: Option<u32>,
    timeout_budget: Duration,
) -> Result<u32> {
    let bin_marker = format!("{}/bin/", project_dir.trim_end_matches('/'));
    let deadline = tokio::time::Instant::now() + timeout_budget;

    loop {
        let procs = probe.list_processes().await?;
        if let Some(found) = procs.iter().find(|p| {
            Some(p.pid) != exclude_pid
                && p.command.contains(&bin_marker)
                && !p.command.contains("watch")
                && !p.command.contains("MSBuild")
                && !p.command.contains("grep")
        }) {
            return Ok(found.pid);
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(Error::Timeout(format!(
                "no debuggee found under {} within {:?}",
                project_dir, timeout_budget
            )));
        }
        sleep(DISCOVERY_POLL_INTERVAL).await;
    }
}

async fn attach_session(session: &Weak<Session>, pid: u32, config: SessionConfig) -> Result<()> {
    let session = session.upgrade().ok_or_else(|| Error::Internal("session dropped during watch attach".to_string()))?;
    let (adapter_cmd, adapter_args) = adapter_command();
    let client = Arc::new(DapClient::spawn(&adapter_cmd, &adapter_args).await?);
    let capabilities: Capabilities = client.initialize_with_timeout().await?;
    client.attach(AttachRequestArguments { process_id: pid }).await?;
    client.configuration_done().await?;

    session.set_client_and_config(client, capabilities, config).await;
    Ok(())
}

fn spawn_stderr_relay(
    stderr: tokio::process::ChildStderr,
    session: Weak<Session>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(session) = session.upgrade() {
                session.push_output(format!("[stderr] {}", line)).await;
            }
        }
    })
}

fn spawn_stdout_watcher(
    stdout: tokio::process::ChildStdout,
    session: Weak<Session>,
    flags: Arc<WatchFlags>,
    probe: Arc<dyn ProcessProbe>,
    project_dir: String,
    ports: Vec<u16>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(session) = session.upgrade() {
                session.push_output(format!("[watch] {}", line)).await;
            }
            if line.contains("Building...") {
                trigger_reconnect(&session, &flags, probe.clone(), &project_dir, &ports, true).await;
            }
        }
    })
}

fn spawn_liveness_poller(
    session: Weak<Session>,
    flags: Arc<WatchFlags>,
    probe: Arc<dyn ProcessProbe>,
    project_dir: String,
    ports: Vec<u16>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(LIVENESS_POLL_INTERVAL).await;
            if flags.stopped.load(Ordering::SeqCst) {
                return;
            }
            if flags.reconnecting.load(Ordering::SeqCst) {
                continue;
            }
            let pid = flags.last_child_pid.load(Ordering::SeqCst);
            if pid == 0 {
                continue;
            }
            if !probe.is_alive(pid).await {
                trigger_reconnect(&session, &flags, probe.clone(), &project_dir, &ports, false).await;
                continue;
            }
            if let Ok(procs) = probe.list_processes().await {
                if let Some(p) = procs.iter().find(|p| p.pid == pid) {
                    if p.ppid == 1 {
                        let _ = std::process::Command::new("kill").args(["-9", &pid.to_string()]).status();
                        trigger_reconnect(&session, &flags, probe.clone(), &project_dir, &ports, false).await;
                    }
                }
            }
        }
    })
}

/// Coalesces all four reconnection triggers from SPEC_FULL §4.3 behind a
/// single CAS on `reconnecting`, then runs cleanup + reattach.
async fn trigger_reconnect(
    session: &Weak<Session>,
    flags: &Arc<WatchFlags>,
    probe: Arc<dyn ProcessProbe>,
    project_dir: &str,
    ports: &[u16],
    early: bool,
) {
    if flags.reconnecting.swap(true, Ordering::SeqCst) {
        return;
    }
    let Some(session) = session.upgrade() else { return };
    let session_flag = session.reconnecting_flag();
    session_flag.store(true, Ordering::SeqCst);

    if early {
        flags.early_cleanup_done.store(true, Ordering::SeqCst);
    }

    let old_pid = flags.last_child_pid.load(Ordering::SeqCst);
    cleanup_phase(&session, &probe, old_pid, ports).await;

    match reattach_phase(&session, probe.as_ref(), project_dir, old_pid).await {
        Ok(new_pid) => {
            flags.last_child_pid.store(new_pid, Ordering::SeqCst);
            info!(old_pid, new_pid, "watch reconnect completed");
        }
        Err(e) => {
            warn!(error = %e, "watch reconnect failed to find a new debuggee; session left idle");
            session.push_output(format!("[watch] reconnect failed: {}", e)).await;
        }
    }

    flags.early_cleanup_done.store(false, Ordering::SeqCst);
    flags.reconnecting.store(false, Ordering::SeqCst);
    session_flag.store(false, Ordering::SeqCst);
}

async fn cleanup_phase(session: &Arc<Session>, probe: &Arc<dyn ProcessProbe>, old_pid: u32, ports: &[u16]) {
    session.terminate_transport_only().await;

    if old_pid != 0 && probe.is_alive(old_pid).await {
        let _ = std::process::Command::new("kill").args(["-9", &old_pid.to_string()]).status();
    }

    let pid_gone_deadline = tokio::time::Instant::now() + PID_GONE_TIMEOUT;
    while old_pid != 0 && probe.is_alive(old_pid).await {
        if tokio::time::Instant::now() >= pid_gone_deadline {
            break;
        }
        sleep(PID_GONE_POLL_INTERVAL).await;
    }

    if ports.is_empty() {
        return;
    }
    let port_deadline = tokio::time::Instant::now() + PORT_RELEASE_TIMEOUT;
    loop {
        let busy = probe.tcp_ports_busy(ports).await.unwrap_or_default();
        if busy.is_empty() {
            break;
        }
        if tokio::time::Instant::now() >= port_deadline {
            for port in &busy {
                session.push_output(format!("[watch] port {} still busy after reattach wait", port)).await;
            }
            break;
        }
        sleep(PORT_RELEASE_POLL_INTERVAL).await;
    }
}

async fn reattach_phase(
    session: &Arc<Session>,
    probe: &dyn ProcessProbe,
    project_dir: &str,
    old_pid: u32,
) -> Result<u32> {
    let new_pid = discover_debuggee(probe, project_dir, Some(old_pid), DISCOVERY_TIMEOUT).await?;
    sleep(STARTUP_PAUSE).await;

    let (adapter_cmd, adapter_args) = adapter_command();
    let client = Arc::new(DapClient::spawn(&adapter_cmd, &adapter_args).await?);
    let capabilities = client.initialize_with_timeout().await?;
    client.attach(AttachRequestArguments { process_id: new_pid }).await?;
    client.configuration_done().await?;

    let mut config = SessionConfig::for_watch(project_dir.to_string(), Vec::new(), None);
    config.process_id = Some(new_pid);
    session.set_client_and_config(client, capabilities, config).await;
    session.replay_all_breakpoints().await;

    Ok(new_pid)
}
