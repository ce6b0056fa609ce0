//! One active debug conversation: holds exactly one DAP Transport at a
//! time, a per-file breakpoint map with conditions, an output ring buffer,
//! last-stop status, an optional Watch Controller, and its launch
//! configuration — per SPEC_FULL §3/§4.2.

pub mod config;
pub mod state;

use crate::dap::types::{
    AttachRequestArguments, Breakpoint, Capabilities, EvaluateResponseBody, LaunchRequestArguments,
    Scope, Source, SourceBreakpoint, StackFrame, Thread, Variable,
};
use crate::dap::DapClient;
use crate::watch::WatchController;
use crate::{Error, Result};
use config::{ProgramIdentifier, SessionConfig, SessionMode};
use state::{OutputBuffer, SessionStateKind, SessionStatus, StopInfo};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::{info, warn};

const DEFAULT_ADAPTER_COMMAND: &str = "netcoredbg";
const DEFAULT_ADAPTER_ARGS: &[&str] = &["--interpreter=vscode"];
const DEFAULT_STACK_DEPTH: i64 = 20;
const ADAPTER_COMMAND_ENV: &str = "DOTNET_DEBUGGER_ADAPTER_COMMAND";

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

/// Inner mutable state guarded by a single lock per session, so the Tool
/// Router never holds more than one session's lock at a time.
struct Inner {
    client: Option<Arc<DapClient>>,
    capabilities: Option<Capabilities>,
    breakpoints: BTreeMap<String, BTreeMap<i64, Breakpoint>>,
    conditions: BTreeMap<String, BTreeMap<i64, String>>,
    stop_info: Option<StopInfo>,
    output: OutputBuffer,
    config: SessionConfig,
    watch: Option<WatchController>,
    start_instant: Option<Instant>,
    terminated: bool,
}

/// One logical debug conversation, uniquely named, owning one debugger
/// child at a time.
pub struct Session {
    pub id: String,
    inner: Arc<RwLock<Inner>>,
    reconnecting: Arc<AtomicBool>,
}

impl Session {
    pub fn new(id: String) -> Self {
        Self {
            id,
            inner: Arc::new(RwLock::new(Inner {
                client: None,
                capabilities: None,
                breakpoints: BTreeMap::new(),
                conditions: BTreeMap::new(),
                stop_info: None,
                output: OutputBuffer::new(),
                config: SessionConfig::for_launch(String::new(), Vec::new(), None, false),
                watch: None,
                start_instant: None,
                terminated: false,
            })),
            reconnecting: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }

    /// All inspection/control operations require a running Transport and no
    /// in-flight reconnect, per SPEC_FULL §4.2's "Guard".
    async fn guard(&self) -> Result<()> {
        if self.is_reconnecting() {
            return Err(Error::Reconnecting);
        }
        let inner = self.inner.read().await;
        if inner.client.is_none() {
            return Err(Error::NotRunning(self.id.clone()));
        }
        Ok(())
    }

    async fn subscribe_lifecycle_events(&self, client: &DapClient) {
        let inner = self.inner.clone();
        client
            .on_event("stopped", move |event| {
                let inner = inner.clone();
                tokio::spawn(async move {
                    let reason = event
                        .body
                        .as_ref()
                        .and_then(|b| b.get("reason"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown")
                        .to_string();
                    let thread_id = event
                        .body
                        .as_ref()
                        .and_then(|b| b.get("threadId"))
                        .and_then(|v| v.as_i64());
                    let mut inner = inner.write().await;
                    inner.stop_info = Some(StopInfo { reason, thread_id });
                });
            })
            .await;

        let inner = self.inner.clone();
        client
            .on_event("output", move |event| {
                let inner = inner.clone();
                tokio::spawn(async move {
                    if let Some(text) = event.body.as_ref().and_then(|b| b.get("output")).and_then(|v| v.as_str()) {
                        let mut inner = inner.write().await;
                        inner.output.push(text.trim_end_matches('\n').to_string());
                    }
                });
            })
            .await;

        let reconnecting = self.reconnecting.clone();
        let inner = self.inner.clone();
        let watch_mode = matches!(self.config_mode().await, SessionMode::Watch);
        client
            .on_event("terminated", move |_event| {
                let inner = inner.clone();
                let reconnecting = reconnecting.clone();
                tokio::spawn(async move {
                    if watch_mode {
                        if reconnecting.swap(true, Ordering::SeqCst) {
                            return;
                        }
                        // The Watch Controller itself drives reattach; this
                        // flag flip just coalesces concurrent triggers per
                        // the invariant in SPEC_FULL §3.
                    } else {
                        let mut inner = inner.write().await;
                        inner.client = None;
                        inner.terminated = true;
                    }
                });
            })
            .await;
    }

    async fn config_mode(&self) -> SessionMode {
        self.inner.read().await.config.mode
    }

    fn resolve_env(
        launch_profile: Option<&crate::profile::LaunchProfile>,
        explicit_env: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut resolved = BTreeMap::new();
        if let Some(profile) = launch_profile {
            for (k, v) in &profile.environment_variables {
                resolved.insert(k.clone(), v.clone());
            }
            if let Some(url) = &profile.application_url {
                resolved.insert("ASPNETCORE_URLS".to_string(), url.clone());
            }
        }
        for (k, v) in explicit_env {
            resolved.insert(k.clone(), v.clone());
        }
        resolved
    }

    /// `launch(program, args, cwd, stopAtEntry, env?, launchProfile?)`.
    pub async fn launch(
        &self,
        program: String,
        args: Vec<String>,
        cwd: Option<String>,
        stop_at_entry: bool,
        explicit_env: BTreeMap<String, String>,
        launch_profile_name: Option<String>,
    ) -> Result<(Capabilities, BTreeMap<String, String>)> {
        self.cleanup_transport().await;

        let launch_profile = match (&cwd, &launch_profile_name) {
            (Some(cwd_dir), Some(name)) => {
                crate::profile::resolve_launch_profile(std::path::Path::new(cwd_dir), name)?
            }
            _ => None,
        };
        let resolved_env = Self::resolve_env(launch_profile.as_ref(), &explicit_env);

        let (adapter_cmd, adapter_args) = adapter_command();
        let client = Arc::new(DapClient::spawn(&adapter_cmd, &adapter_args).await?);
        let capabilities = client.initialize_with_timeout().await?;
        self.subscribe_lifecycle_events(&client).await;

        let launch_args = LaunchRequestArguments {
            program: program.clone(),
            args: args.clone(),
            cwd: cwd.clone(),
            stop_at_entry,
            env: if resolved_env.is_empty() { None } else { Some(resolved_env.clone()) },
            console: "internalConsole",
        };
        client.launch(launch_args).await?;
        client.configuration_done().await?;

        let mut config = SessionConfig::for_launch(program, args, cwd, stop_at_entry);
        config.launch_profile = launch_profile_name;
        config.explicit_env = explicit_env;
        config.resolved_env = resolved_env.clone();
        config.start_time = Some(now_secs());

        let mut inner = self.inner.write().await;
        inner.capabilities = Some(capabilities.clone());
        inner.config = config;
        inner.start_instant = Some(Instant::now());
        inner.terminated = false;
        inner.client = Some(client);

        info!(session_id = %self.id, "session launched");
        Ok((capabilities, resolved_env))
    }

    pub async fn attach(&self, process_id: u32) -> Result<Capabilities> {
        self.cleanup_transport().await;

        let (adapter_cmd, adapter_args) = adapter_command();
        let client = Arc::new(DapClient::spawn(&adapter_cmd, &adapter_args).await?);
        let capabilities = client.initialize_with_timeout().await?;
        self.subscribe_lifecycle_events(&client).await;
        client.attach(AttachRequestArguments { process_id }).await?;
        client.configuration_done().await?;

        let mut config = SessionConfig::for_attach(process_id);
        config.start_time = Some(now_secs());

        let mut inner = self.inner.write().await;
        inner.capabilities = Some(capabilities.clone());
        inner.config = config;
        inner.start_instant = Some(Instant::now());
        inner.terminated = false;
        inner.client = Some(client);

        info!(session_id = %self.id, process_id, "session attached");
        Ok(capabilities)
    }

    /// Launch mode only: behaves like `launch` with the saved config.
    pub async fn restart(&self) -> Result<(Capabilities, BTreeMap<String, String>)> {
        let config = self.inner.read().await.config.clone_for_restart()?;
        self.launch(
            config.0,
            config.1,
            config.2,
            config.3,
            config.4,
            config.5,
        )
        .await
    }

    /// Disconnects and drops the current Transport without touching the
    /// Watch Controller — used by the Watch Controller itself during its
    /// cleanup phase, where it is already the one driving the handover.
    pub async fn terminate_transport_only(&self) {
        self.cleanup_transport().await;
    }

    async fn cleanup_transport(&self) {
        let mut inner = self.inner.write().await;
        if let Some(client) = inner.client.take() {
            if let Some(caps) = inner.capabilities.clone() {
                let _ = client.shutdown_with_timeout(&caps).await;
            }
        }
    }

    /// `setBreakpoint(file, line, condition?)`.
    pub async fn set_breakpoint(&self, file: &str, line: i64, condition: Option<String>) -> Result<Breakpoint> {
        self.guard().await?;
        let file = normalize_path(file);

        {
            let mut inner = self.inner.write().await;
            if let Some(cond) = condition {
                inner.conditions.entry(file.clone()).or_default().insert(line, cond);
            } else {
                inner.conditions.entry(file.clone()).or_default().remove(&line);
            }
            inner.breakpoints.entry(file.clone()).or_default().insert(
                line,
                Breakpoint {
                    id: None,
                    verified: false,
                    message: None,
                    source: Some(Source { name: None, path: Some(file.clone()) }),
                    line,
                    column: None,
                    condition: None,
                },
            );
        }

        let echoes = self.replay_file(&file).await?;
        let echoed = echoes
            .into_iter()
            .find(|b| b.line == line)
            .ok_or_else(|| Error::Dap(format!("debugger did not echo a breakpoint at {}:{}", file, line)))?;
        Ok(echoed)
    }

    /// `removeBreakpoint(file, line)`.
    pub async fn remove_breakpoint(&self, file: &str, line: i64) -> Result<()> {
        self.guard().await?;
        let file = normalize_path(file);

        {
            let mut inner = self.inner.write().await;
            let had = inner
                .breakpoints
                .get_mut(&file)
                .map(|lines| lines.remove(&line).is_some())
                .unwrap_or(false);
            if !had {
                return Err(Error::InvalidRequest(format!(
                    "no breakpoint at {}:{}",
                    file, line
                )));
            }
            inner.conditions.entry(file.clone()).or_default().remove(&line);
        }

        self.replay_file(&file).await?;
        Ok(())
    }

    /// Re-sends the complete breakpoint set for `file`, storing the
    /// debugger's echoed list atomically — the debugger's per-file view is
    /// replaced wholesale, never patched incrementally.
    async fn replay_file(&self, file: &str) -> Result<Vec<Breakpoint>> {
        let (lines, client): (Vec<i64>, Arc<DapClient>) = {
            let inner = self.inner.read().await;
            let lines = inner
                .breakpoints
                .get(file)
                .map(|m| m.keys().copied().collect())
                .unwrap_or_default();
            let client = inner
                .client
                .clone()
                .ok_or_else(|| Error::NotRunning(self.id.clone()))?;
            (lines, client)
        };

        let conditions = self.inner.read().await.conditions.get(file).cloned().unwrap_or_default();
        let source_breakpoints: Vec<SourceBreakpoint> = lines
            .iter()
            .map(|line| SourceBreakpoint {
                line: *line,
                condition: conditions.get(line).cloned(),
            })
            .collect();

        let echoes = client
            .set_breakpoints(
                Source { name: None, path: Some(file.to_string()) },
                source_breakpoints,
            )
            .await?;

        let mut inner = self.inner.write().await;
        let entry = inner.breakpoints.entry(file.to_string()).or_default();
        entry.clear();
        for bp in &echoes {
            entry.insert(bp.line, bp.clone());
        }
        Ok(echoes)
    }

    /// Flat enumeration of all stored echoes across files.
    pub async fn list_breakpoints(&self) -> Vec<Breakpoint> {
        let inner = self.inner.read().await;
        inner
            .breakpoints
            .values()
            .flat_map(|lines| lines.values().cloned())
            .collect()
    }

    async fn resolve_thread_id(&self, explicit: Option<i64>) -> i64 {
        if let Some(tid) = explicit {
            return tid;
        }
        let inner = self.inner.read().await;
        inner.stop_info.as_ref().and_then(|s| s.thread_id).unwrap_or(1)
    }

    async fn client(&self) -> Result<Arc<DapClient>> {
        self.inner
            .read()
            .await
            .client
            .clone()
            .ok_or_else(|| Error::NotRunning(self.id.clone()))
    }

    pub async fn continue_execution(&self, thread_id: Option<i64>) -> Result<()> {
        self.guard().await?;
        let tid = self.resolve_thread_id(thread_id).await;
        self.client().await?.continue_execution(tid).await?;
        let mut inner = self.inner.write().await;
        inner.stop_info = None;
        Ok(())
    }

    pub async fn pause(&self, thread_id: Option<i64>) -> Result<()> {
        self.guard().await?;
        let tid = self.resolve_thread_id(thread_id).await;
        self.client().await?.pause(tid).await
    }

    pub async fn step_over(&self, thread_id: Option<i64>) -> Result<()> {
        self.guard().await?;
        let tid = self.resolve_thread_id(thread_id).await;
        self.client().await?.next(tid).await
    }

    pub async fn step_into(&self, thread_id: Option<i64>) -> Result<()> {
        self.guard().await?;
        let tid = self.resolve_thread_id(thread_id).await;
        self.client().await?.step_in(tid).await
    }

    pub async fn step_out(&self, thread_id: Option<i64>) -> Result<()> {
        self.guard().await?;
        let tid = self.resolve_thread_id(thread_id).await;
        self.client().await?.step_out(tid).await
    }

    pub async fn stack_trace(&self, thread_id: Option<i64>, depth: Option<i64>) -> Result<Vec<StackFrame>> {
        self.guard().await?;
        let tid = self.resolve_thread_id(thread_id).await;
        let levels = depth.unwrap_or(DEFAULT_STACK_DEPTH);
        self.client().await?.stack_trace(tid, levels).await
    }

    pub async fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>> {
        self.guard().await?;
        self.client().await?.scopes(frame_id).await
    }

    pub async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>> {
        self.guard().await?;
        self.client().await?.variables(variables_reference).await
    }

    pub async fn evaluate(&self, expression: &str, frame_id: Option<i64>) -> Result<EvaluateResponseBody> {
        self.guard().await?;
        self.client().await?.evaluate(expression, frame_id).await
    }

    pub async fn threads(&self) -> Result<Vec<Thread>> {
        self.guard().await?;
        self.client().await?.threads().await
    }

    pub async fn output(&self, lines: usize) -> Vec<String> {
        self.inner.read().await.output.last(lines)
    }

    pub async fn push_output(&self, tagged_line: String) {
        self.inner.write().await.output.push(tagged_line);
    }

    pub async fn status(&self) -> SessionStatus {
        let inner = self.inner.read().await;
        let state = if self.is_reconnecting() {
            SessionStateKind::Reconnecting
        } else if inner.terminated || inner.client.is_none() {
            SessionStateKind::Terminated
        } else if inner.stop_info.is_some() {
            SessionStateKind::Stopped
        } else {
            SessionStateKind::Running
        };

        SessionStatus {
            state,
            stop_reason: inner.stop_info.as_ref().map(|s| s.reason.clone()),
            stopped_thread_id: inner.stop_info.as_ref().and_then(|s| s.thread_id),
            process_id: inner.config.process_id,
            uptime_secs: inner.start_instant.map(|t| t.elapsed().as_secs()),
            breakpoint_count: inner.breakpoints.values().map(|m| m.len()).sum(),
            output_line_count: inner.output.len(),
        }
    }

    pub async fn terminate(&self) {
        if let Some(watch) = self.inner.write().await.watch.take() {
            watch.stop_watch().await;
        }
        self.cleanup_transport().await;
        let mut inner = self.inner.write().await;
        inner.terminated = true;
    }

    pub async fn attach_watch_controller(&self, controller: WatchController) {
        self.inner.write().await.watch = Some(controller);
    }

    pub fn reconnecting_flag(&self) -> Arc<AtomicBool> {
        self.reconnecting.clone()
    }

    pub async fn set_client_and_config(&self, client: Arc<DapClient>, capabilities: Capabilities, config: SessionConfig) {
        self.subscribe_lifecycle_events(&client).await;
        let mut inner = self.inner.write().await;
        inner.client = Some(client);
        inner.capabilities = Some(capabilities);
        inner.config = config;
        inner.start_instant = Some(Instant::now());
    }

    /// Replays every stored breakpoint file-by-file against a freshly
    /// attached client, ignoring per-file failures per SPEC_FULL §4.3's
    /// reattach phase.
    pub async fn replay_all_breakpoints(&self) {
        let files: Vec<String> = self.inner.read().await.breakpoints.keys().cloned().collect();
        for file in files {
            if let Err(e) = self.replay_file(&file).await {
                warn!(session_id = %self.id, file = %file, error = %e, "breakpoint replay failed for file");
            }
        }
    }

    pub async fn program_identifier(&self) -> ProgramIdentifier {
        self.inner.read().await.config.program.clone()
    }
}

fn normalize_path(file: &str) -> String {
    let expanded = shellexpand::tilde(file);
    std::path::Path::new(expanded.as_ref())
        .to_string_lossy()
        .to_string()
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl SessionConfig {
    /// Extracts the fields `restart` needs to re-run `launch` with, failing
    /// if this session was not created via `launch`.
    fn clone_for_restart(&self) -> Result<(String, Vec<String>, Option<String>, bool, BTreeMap<String, String>, Option<String>)> {
        match &self.program {
            ProgramIdentifier::Program(p) => Ok((
                p.clone(),
                self.args.clone(),
                self.cwd.clone(),
                self.stop_at_entry,
                self.explicit_env.clone(),
                self.launch_profile.clone(),
            )),
            _ => Err(Error::InvalidRequest("restart is only valid for launch-mode sessions".to_string())),
        }
    }
}
