use super::transport::DapTransport;
use super::transport_trait::DapTransportTrait;
use super::types::*;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex, Notify, RwLock};
use tracing::{debug, error, info, warn};

type ResponseSender = oneshot::Sender<Response>;
type EventNotifier = Arc<Notify>;
type EventCallback = Arc<dyn Fn(Event) + Send + Sync>;

/// Event-driven client for a single `netcoredbg --interpreter=vscode`
/// process, talking DAP over its stdio. Requests are correlated by `seq`;
/// events fan out to both one-shot waiters (`wait_for_event`) and standing
/// callbacks (`on_event`), mirroring how `Session` needs to both await a
/// `stopped` event during `continue` and keep a long-lived `output` sink.
pub struct DapClient {
    transport: Arc<Mutex<Box<dyn DapTransportTrait>>>,
    seq_counter: Arc<AtomicI64>,
    pending_requests: Arc<RwLock<HashMap<i64, ResponseSender>>>,
    event_notifiers: Arc<RwLock<HashMap<String, EventNotifier>>>,
    event_callbacks: Arc<RwLock<HashMap<String, Vec<EventCallback>>>>,
    write_tx: mpsc::UnboundedSender<Message>,
    closed: Arc<AtomicBool>,
    _child: Option<Child>,
}

impl DapClient {
    /// Spawn `netcoredbg --interpreter=vscode` and wire up its stdio.
    pub async fn spawn(command: &str, args: &[String]) -> Result<Self> {
        info!("spawning DAP adapter: {} {:?}", command, args);

        let mut child = Command::new(command)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Process(format!("failed to spawn debug adapter: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Process("failed to capture adapter stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Process("failed to capture adapter stdout".to_string()))?;

        let transport: Box<dyn DapTransportTrait> = Box::new(DapTransport::new(stdin, stdout));
        Self::new_with_transport(transport, Some(child)).await
    }

    /// Build a client around a caller-supplied transport (tests use this to
    /// plug in a mock or a handle to the fake adapter binary).
    pub async fn new_with_transport(
        transport: Box<dyn DapTransportTrait>,
        child: Option<Child>,
    ) -> Result<Self> {
        let transport = Arc::new(Mutex::new(transport));
        let seq_counter = Arc::new(AtomicI64::new(1));
        let pending_requests = Arc::new(RwLock::new(HashMap::new()));
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        let event_notifiers = Arc::new(RwLock::new(HashMap::new()));
        let event_callbacks = Arc::new(RwLock::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let client = Self {
            transport: transport.clone(),
            seq_counter,
            pending_requests: pending_requests.clone(),
            event_notifiers: event_notifiers.clone(),
            event_callbacks: event_callbacks.clone(),
            write_tx,
            closed: closed.clone(),
            _child: child,
        };

        tokio::spawn(Self::message_reader(
            transport.clone(),
            pending_requests,
            event_notifiers,
            event_callbacks,
            closed,
        ));
        tokio::spawn(Self::message_writer(transport, write_rx));

        Ok(client)
    }

    /// Reads messages off the transport and dispatches them: responses go
    /// to their waiting `send_request` caller, events fan out to
    /// notifiers/callbacks. Releases the transport lock between read
    /// attempts so `message_writer` isn't starved.
    async fn message_reader(
        transport: Arc<Mutex<Box<dyn DapTransportTrait>>>,
        pending_requests: Arc<RwLock<HashMap<i64, ResponseSender>>>,
        event_notifiers: Arc<RwLock<HashMap<String, EventNotifier>>>,
        event_callbacks: Arc<RwLock<HashMap<String, Vec<EventCallback>>>>,
        closed: Arc<AtomicBool>,
    ) {
        loop {
            let msg_result = {
                let mut transport = transport.lock().await;
                tokio::select! {
                    result = transport.read_message() => Some(result),
                    _ = tokio::time::sleep(tokio::time::Duration::from_millis(50)) => None,
                }
            };

            let msg = match msg_result {
                None => {
                    tokio::time::sleep(tokio::time::Duration::from_micros(100)).await;
                    continue;
                }
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    error!("message_reader: failed to read DAP message: {}", e);
                    closed.store(true, Ordering::SeqCst);
                    let mut pending = pending_requests.write().await;
                    for (seq, sender) in pending.drain() {
                        debug!("rejecting pending request {} after transport close", seq);
                        drop(sender);
                    }
                    break;
                }
            };

            match msg {
                Message::Response(resp) => {
                    debug!("received response for seq {}", resp.request_seq);
                    let mut pending = pending_requests.write().await;
                    if let Some(sender) = pending.remove(&resp.request_seq) {
                        if sender.send(resp).is_err() {
                            warn!("failed to deliver response to waiting request");
                        }
                    } else {
                        warn!("received response for unknown request: {}", resp.request_seq);
                    }
                }
                Message::Event(event) => {
                    debug!("event received: '{}'", event.event);

                    let notifiers = event_notifiers.read().await;
                    if let Some(notifier) = notifiers.get(&event.event) {
                        notifier.notify_waiters();
                    }
                    drop(notifiers);

                    let callbacks = event_callbacks.read().await;
                    if let Some(handlers) = callbacks.get(&event.event) {
                        for callback in handlers.iter() {
                            callback(event.clone());
                        }
                    }
                }
                Message::Request(_) => {
                    warn!("received reverse request from debug adapter (not supported)");
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_micros(100)).await;
        }
    }

    /// Serializes writes through a channel so `send_request` callers never
    /// contend with `message_reader` for the transport lock.
    async fn message_writer(
        transport: Arc<Mutex<Box<dyn DapTransportTrait>>>,
        mut write_rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(message) = write_rx.recv().await {
            let mut transport = transport.lock().await;
            if let Err(e) = transport.write_message(&message).await {
                error!("message_writer: failed to write DAP message: {}", e);
                break;
            }
        }
    }

    /// Register a callback invoked every time `event_name` is received.
    pub async fn on_event<F>(&self, event_name: &str, callback: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut callbacks = self.event_callbacks.write().await;
        callbacks
            .entry(event_name.to_string())
            .or_insert_with(Vec::new)
            .push(Arc::new(callback));
    }

    pub async fn remove_event_handlers(&self, event_name: &str) {
        let mut callbacks = self.event_callbacks.write().await;
        callbacks.remove(event_name);
    }

    /// Wait for a single occurrence of `event_name`, or time out.
    pub async fn wait_for_event(&self, event_name: &str, timeout: tokio::time::Duration) -> Result<()> {
        let notifier = {
            let mut notifiers = self.event_notifiers.write().await;
            notifiers
                .entry(event_name.to_string())
                .or_insert_with(|| Arc::new(Notify::new()))
                .clone()
        };

        tokio::select! {
            _ = notifier.notified() => Ok(()),
            _ = tokio::time::sleep(timeout) => {
                Err(Error::Timeout(format!("waiting for '{}' event after {:?}", event_name, timeout)))
            }
        }
    }

    async fn send_request_nowait(&self, command: &str, arguments: Option<Value>) -> Result<i64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let request = Request {
            seq,
            command: command.to_string(),
            arguments,
        };

        let mut transport = self.transport.lock().await;
        transport.write_message(&Message::Request(request)).await?;
        Ok(seq)
    }

    /// Send a request and wait for its correlated response.
    pub async fn send_request(&self, command: &str, arguments: Option<Value>) -> Result<Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Dap("DAP client closed".to_string()));
        }
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let request = Request {
            seq,
            command: command.to_string(),
            arguments,
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending_requests.write().await;
            pending.insert(seq, tx);
        }

        self.write_tx
            .send(Message::Request(request))
            .map_err(|_| Error::Dap("write channel closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Dap("request cancelled or connection closed".to_string()))
    }

    pub async fn send_request_with_timeout(
        &self,
        command: &str,
        arguments: Option<Value>,
        timeout: std::time::Duration,
    ) -> Result<Response> {
        tokio::time::timeout(timeout, self.send_request(command, arguments))
            .await
            .map_err(|_| Error::Timeout(format!("'{}' request after {:?}", command, timeout)))?
    }

    pub async fn initialize(&self) -> Result<Capabilities> {
        let args = InitializeRequestArguments {
            client_id: "dotnet-debugger-mcp".to_string(),
            client_name: "dotnet-debugger-mcp".to_string(),
            adapter_id: "coreclr".to_string(),
            path_format: "path",
            lines_start_at1: true,
            columns_start_at1: true,
            supports_run_in_terminal_request: false,
        };

        let response = self
            .send_request("initialize", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("initialize failed: {:?}", response.message)));
        }

        let caps: Capabilities = response
            .body
            .ok_or_else(|| Error::Dap("no capabilities in initialize response".to_string()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| Error::Dap(format!("failed to parse capabilities: {}", e)))
            })?;

        Ok(caps)
    }

    pub async fn launch(&self, args: LaunchRequestArguments) -> Result<()> {
        let response = self
            .send_request("launch", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("launch failed: {:?}", response.message)));
        }
        Ok(())
    }

    pub async fn attach(&self, args: AttachRequestArguments) -> Result<()> {
        let response = self
            .send_request("attach", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("attach failed: {:?}", response.message)));
        }
        Ok(())
    }

    /// Initialize, send `launch`/`attach` without waiting for its response,
    /// then sequence `initialized` → (optional breakpoints, applied by the
    /// caller before calling this) → `configurationDone` → launch response,
    /// per the DAP handshake netcoredbg expects.
    pub async fn initialize_and_start(&self, start_command: &str, start_args: Value) -> Result<()> {
        info!("sending initialize request to netcoredbg");
        let capabilities = self.initialize().await?;
        let config_done_supported = capabilities.supports_configuration_done_request;

        let (init_tx, init_rx) = oneshot::channel();
        let init_tx = Arc::new(tokio::sync::Mutex::new(Some(init_tx)));

        self.on_event("initialized", move |_event| {
            let tx = init_tx.clone();
            tokio::spawn(async move {
                if let Some(sender) = tx.lock().await.take() {
                    let _ = sender.send(());
                }
            });
        })
        .await;

        let start_seq = self.send_request_nowait(start_command, Some(start_args)).await?;
        debug!("{} request sent with seq {}", start_command, start_seq);

        if config_done_supported {
            tokio::time::timeout(tokio::time::Duration::from_secs(5), init_rx)
                .await
                .map_err(|_| {
                    Error::Timeout(
                        "waiting for 'initialized' event (5s); the target may not exist or failed to start".to_string(),
                    )
                })?
                .map_err(|_| Error::Dap("'initialized' event signal was cancelled".to_string()))?;

            self.configuration_done().await?;
        }

        Ok(())
    }

    pub async fn configuration_done(&self) -> Result<()> {
        let response = self.send_request("configurationDone", None).await?;
        if !response.success {
            return Err(Error::Dap(format!(
                "configurationDone failed: {:?}",
                response.message
            )));
        }
        Ok(())
    }

    pub async fn set_breakpoints(
        &self,
        source: Source,
        breakpoints: Vec<SourceBreakpoint>,
    ) -> Result<Vec<Breakpoint>> {
        let args = SetBreakpointsArguments {
            source,
            breakpoints,
            source_modified: false,
        };

        let response = self
            .send_request("setBreakpoints", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("setBreakpoints failed: {:?}", response.message)));
        }

        #[derive(serde::Deserialize)]
        struct SetBreakpointsResponseBody {
            breakpoints: Vec<Breakpoint>,
        }

        let body: SetBreakpointsResponseBody = response
            .body
            .ok_or_else(|| Error::Dap("no breakpoints in response".to_string()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| Error::Dap(format!("failed to parse breakpoints: {}", e)))
            })?;

        Ok(body.breakpoints)
    }

    pub async fn continue_execution(&self, thread_id: i64) -> Result<()> {
        let args = ContinueArguments { thread_id };
        let response = self
            .send_request("continue", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("continue failed: {:?}", response.message)));
        }
        Ok(())
    }

    pub async fn pause(&self, thread_id: i64) -> Result<()> {
        let args = ThreadArguments { thread_id };
        let response = self
            .send_request("pause", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("pause failed: {:?}", response.message)));
        }
        Ok(())
    }

    pub async fn next(&self, thread_id: i64) -> Result<()> {
        let args = ThreadArguments { thread_id };
        let response = self.send_request("next", Some(serde_json::to_value(args)?)).await?;

        if !response.success {
            return Err(Error::Dap(format!("step over failed: {:?}", response.message)));
        }
        Ok(())
    }

    pub async fn step_in(&self, thread_id: i64) -> Result<()> {
        let args = ThreadArguments { thread_id };
        let response = self
            .send_request("stepIn", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("step in failed: {:?}", response.message)));
        }
        Ok(())
    }

    pub async fn step_out(&self, thread_id: i64) -> Result<()> {
        let args = ThreadArguments { thread_id };
        let response = self
            .send_request("stepOut", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("step out failed: {:?}", response.message)));
        }
        Ok(())
    }

    pub async fn threads(&self) -> Result<Vec<Thread>> {
        let response = self.send_request("threads", None).await?;
        if !response.success {
            return Err(Error::Dap(format!("threads failed: {:?}", response.message)));
        }

        #[derive(serde::Deserialize)]
        struct ThreadsResponseBody {
            threads: Vec<Thread>,
        }

        let body: ThreadsResponseBody = response
            .body
            .ok_or_else(|| Error::Dap("no threads in response".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| Error::Dap(format!("failed to parse threads: {}", e)))
            })?;

        Ok(body.threads)
    }

    pub async fn stack_trace(&self, thread_id: i64, levels: i64) -> Result<Vec<StackFrame>> {
        let args = StackTraceArguments {
            thread_id,
            start_frame: 0,
            levels,
        };

        let response = self
            .send_request("stackTrace", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("stackTrace failed: {:?}", response.message)));
        }

        #[derive(serde::Deserialize)]
        struct StackTraceResponseBody {
            #[serde(rename = "stackFrames")]
            stack_frames: Vec<StackFrame>,
        }

        let body: StackTraceResponseBody = response
            .body
            .ok_or_else(|| Error::Dap("no stack frames in response".to_string()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| Error::Dap(format!("failed to parse stack frames: {}", e)))
            })?;

        Ok(body.stack_frames)
    }

    pub async fn scopes(&self, frame_id: i64) -> Result<Vec<Scope>> {
        let args = ScopesArguments { frame_id };
        let response = self.send_request("scopes", Some(serde_json::to_value(args)?)).await?;

        if !response.success {
            return Err(Error::Dap(format!("scopes failed: {:?}", response.message)));
        }

        #[derive(serde::Deserialize)]
        struct ScopesResponseBody {
            scopes: Vec<Scope>,
        }

        let body: ScopesResponseBody = response
            .body
            .ok_or_else(|| Error::Dap("no scopes in response".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| Error::Dap(format!("failed to parse scopes: {}", e)))
            })?;

        Ok(body.scopes)
    }

    pub async fn variables(&self, variables_reference: i64) -> Result<Vec<Variable>> {
        let args = VariablesArguments { variables_reference };
        let response = self
            .send_request("variables", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("variables failed: {:?}", response.message)));
        }

        #[derive(serde::Deserialize)]
        struct VariablesResponseBody {
            variables: Vec<Variable>,
        }

        let body: VariablesResponseBody = response
            .body
            .ok_or_else(|| Error::Dap("no variables in response".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| Error::Dap(format!("failed to parse variables: {}", e)))
            })?;

        Ok(body.variables)
    }

    pub async fn evaluate(&self, expression: &str, frame_id: Option<i64>) -> Result<EvaluateResponseBody> {
        let args = EvaluateArguments {
            expression: expression.to_string(),
            frame_id,
            context: "repl",
        };

        let response = self
            .send_request("evaluate", Some(serde_json::to_value(args)?))
            .await?;

        if !response.success {
            return Err(Error::Dap(format!("evaluate failed: {:?}", response.message)));
        }

        response
            .body
            .ok_or_else(|| Error::Dap("no result in evaluate response".to_string()))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| Error::Dap(format!("failed to parse evaluate result: {}", e)))
            })
    }

    /// Prefer `terminate` when the adapter advertises it (it asks netcoredbg
    /// to shut the debuggee down cleanly); fall back to `disconnect` with
    /// `terminateDebuggee: true` otherwise.
    pub async fn shutdown(&self, capabilities: &Capabilities) -> Result<()> {
        if capabilities.supports_terminate_request {
            let response = self.send_request("terminate", None).await?;
            if !response.success {
                warn!("terminate failed, falling back to disconnect: {:?}", response.message);
            } else {
                return Ok(());
            }
        }

        let args = DisconnectArguments { terminate_debuggee: true };
        let response = self
            .send_request("disconnect", Some(serde_json::to_value(args)?))
            .await?;
        if !response.success {
            warn!("disconnect failed: {:?}", response.message);
        }
        Ok(())
    }

    pub async fn initialize_with_timeout(&self) -> Result<Capabilities> {
        let timeout = std::time::Duration::from_secs(2);
        tokio::time::timeout(timeout, self.initialize())
            .await
            .map_err(|_| Error::Timeout(format!("initialize after {:?}", timeout)))?
    }

    pub async fn shutdown_with_timeout(&self, capabilities: &Capabilities) -> Result<()> {
        let timeout = std::time::Duration::from_secs(2);
        tokio::time::timeout(timeout, self.shutdown(capabilities))
            .await
            .map_err(|_| Error::Timeout(format!("shutdown after {:?}", timeout)))?
    }
}
