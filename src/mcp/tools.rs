//! Tool Router: a thin adapter that receives named tool invocations from
//! the JSON-RPC transport, resolves a Session via the Session Manager, and
//! calls through to Session methods — SPEC_FULL §4.6/§6.

use crate::harness::HarnessInvocation;
use crate::manager::SessionManager;
use crate::session::config::ProgramIdentifier;
use crate::session::state::SessionStateKind;
use crate::{harness, Error, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One entry of the `tools/list` response.
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub struct ToolsHandler {
    manager: Arc<SessionManager>,
}

impl ToolsHandler {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        vec![
            tool("launch", "Launch a .NET program under the debugger", schema(&["program"], &["args", "cwd", "stopAtEntry", "env", "launchProfile", "sessionId"])),
            tool("attach", "Attach the debugger to a running process", schema(&["processId"], &["sessionId"])),
            tool("launch_watch", "Launch a project in hot-reload (dotnet watch) mode", schema(&["projectPath"], &["launchProfile", "args", "noHotReload", "sessionId"])),
            tool("stop_watch", "Stop a hot-reload session's driver and debugger", schema(&[], &["sessionId"])),
            tool("restart", "Restart a launch-mode session", schema(&[], &["rebuild", "sessionId"])),
            tool("set_breakpoint", "Set a breakpoint", schema(&["file", "line"], &["condition", "sessionId"])),
            tool("remove_breakpoint", "Remove a breakpoint", schema(&["file", "line"], &["sessionId"])),
            tool("list_breakpoints", "List all breakpoints", schema(&[], &["sessionId"])),
            tool("continue", "Resume execution", schema(&[], &["threadId", "sessionId"])),
            tool("pause", "Pause execution", schema(&[], &["threadId", "sessionId"])),
            tool("step_over", "Step over the current line", schema(&[], &["threadId", "sessionId"])),
            tool("step_into", "Step into the current call", schema(&[], &["threadId", "sessionId"])),
            tool("step_out", "Step out of the current function", schema(&[], &["threadId", "sessionId"])),
            tool("stack_trace", "Get the current call stack", schema(&[], &["threadId", "depth", "sessionId"])),
            tool("scopes", "Get variable scopes for a stack frame", schema(&["frameId"], &["sessionId"])),
            tool("variables", "Get variables in a scope", schema(&["variablesReference"], &["sessionId"])),
            tool("evaluate", "Evaluate an expression", schema(&["expression"], &["frameId", "sessionId"])),
            tool("threads", "List threads", schema(&[], &["sessionId"])),
            tool("output", "Read recent program output", schema(&[], &["lines", "sessionId"])),
            tool("status", "Get session status", schema(&[], &["sessionId"])),
            tool("terminate", "Terminate a session", schema(&[], &["sessionId"])),
            tool("list_sessions", "List all sessions", schema(&[], &[])),
            tool("select_session", "Select the default session", schema(&["sessionId"], &[])),
            tool("terminate_session", "Terminate a specific session", schema(&["sessionId"], &[])),
            tool("invoke", "Invoke a method via the reflection harness", schema(&["assembly", "type", "method"], &["args", "ctorArgs", "debug", "cwd", "sessionId"])),
        ]
    }

    pub async fn handle_tool(&self, name: &str, arguments: Value) -> Result<String> {
        match name {
            "launch" => self.launch(&arguments).await,
            "attach" => self.attach(&arguments).await,
            "launch_watch" => self.launch_watch(&arguments).await,
            "stop_watch" => self.stop_watch(&arguments).await,
            "restart" => self.restart(&arguments).await,
            "set_breakpoint" => self.set_breakpoint(&arguments).await,
            "remove_breakpoint" => self.remove_breakpoint(&arguments).await,
            "list_breakpoints" => self.list_breakpoints(&arguments).await,
            "continue" => self.continue_execution(&arguments).await,
            "pause" => self.pause(&arguments).await,
            "step_over" => self.step_over(&arguments).await,
            "step_into" => self.step_into(&arguments).await,
            "step_out" => self.step_out(&arguments).await,
            "stack_trace" => self.stack_trace(&arguments).await,
            "scopes" => self.scopes(&arguments).await,
            "variables" => self.variables(&arguments).await,
            "evaluate" => self.evaluate(&arguments).await,
            "threads" => self.threads(&arguments).await,
            "output" => self.output(&arguments).await,
            "status" => self.status(&arguments).await,
            "terminate" => self.terminate(&arguments).await,
            "list_sessions" => self.list_sessions().await,
            "select_session" => self.select_session(&arguments).await,
            "terminate_session" => self.terminate_session(&arguments).await,
            "invoke" => self.invoke(&arguments).await,
            other => Err(Error::MethodNotFound(other.to_string())),
        }
    }

    async fn launch(&self, args: &Value) -> Result<String> {
        let program = get_str(args, "program")?;
        let cli_args = get_str_array(args, "args");
        let cwd = get_opt_str(args, "cwd");
        let stop_at_entry = get_bool(args, "stopAtEntry", false);
        let env = get_str_map(args, "env");
        let launch_profile = get_opt_str(args, "launchProfile");

        let session_id = get_opt_str(args, "sessionId");
        let session = self.manager.create_session(Some(&program), session_id.as_deref()).await?;
        let (capabilities, resolved_env) = session
            .launch(program, cli_args, cwd, stop_at_entry, env, launch_profile)
            .await?;

        Ok(format!(
            "Launched session '{}'. supportsConfigurationDoneRequest={}, resolved env: {}",
            session.id,
            capabilities.supports_configuration_done_request,
            format_env(&resolved_env)
        ))
    }

    async fn attach(&self, args: &Value) -> Result<String> {
        let process_id = get_i64(args, "processId")? as u32;
        let session_id = get_opt_str(args, "sessionId");
        let session = self
            .manager
            .create_session(Some(&format!("process:{}", process_id)), session_id.as_deref())
            .await?;
        session.attach(process_id).await?;
        Ok(format!("Attached session '{}' to pid {}", session.id, process_id))
    }

    async fn launch_watch(&self, args: &Value) -> Result<String> {
        let project_path = get_str(args, "projectPath")?;
        let launch_profile = get_opt_str(args, "launchProfile");
        let cli_args = get_str_array(args, "args");
        let no_hot_reload = get_bool(args, "noHotReload", false);
        let session_id = get_opt_str(args, "sessionId");

        let session = self
            .manager
            .create_session(Some(&format!("watch:{}", project_path)), session_id.as_deref())
            .await?;
        let controller = crate::watch::WatchController::start(
            Arc::downgrade(&session),
            project_path,
            launch_profile,
            cli_args,
            no_hot_reload,
        )
        .await?;
        session.attach_watch_controller(controller).await;

        Ok(format!("Launched watch session '{}'", session.id))
    }

    async fn stop_watch(&self, args: &Value) -> Result<String> {
        let session_id = get_opt_str(args, "sessionId");
        let session = self.manager.get_session(session_id.as_deref()).await?;
        let id = session.id.clone();
        self.manager.remove_session(&id).await?;
        Ok(format!("Stopped watch session '{}'", id))
    }

    async fn restart(&self, args: &Value) -> Result<String> {
        let session_id = get_opt_str(args, "sessionId");
        let session = self.manager.get_session(session_id.as_deref()).await?;
        let (_, resolved_env) = session.restart().await?;
        Ok(format!("Restarted session '{}'. resolved env: {}", session.id, format_env(&resolved_env)))
    }

    async fn set_breakpoint(&self, args: &Value) -> Result<String> {
        let file = get_str(args, "file")?;
        let line = get_i64(args, "line")?;
        let condition = get_opt_str(args, "condition");
        let session_id = get_opt_str(args, "sessionId");
        let session = self.manager.get_session(session_id.as_deref()).await?;
        let bp = session.set_breakpoint(&file, line, condition).await?;
        Ok(if bp.verified {
            format!("Breakpoint set at {}:{} (verified)", file, line)
        } else {
            format!(
                "Breakpoint pending at {}:{}{}",
                file,
                line,
                bp.message.map(|m| format!(": {}", m)).unwrap_or_default()
            )
        })
    }

    async fn remove_breakpoint(&self, args: &Value) -> Result<String> {
        let file = get_str(args, "file")?;
        let line = get_i64(args, "line")?;
        let session_id = get_opt_str(args, "sessionId");
        let session = self.manager.get_session(session_id.as_deref()).await?;
        session.remove_breakpoint(&file, line).await?;
        Ok(format!("Removed breakpoint at {}:{}", file, line))
    }

    async fn list_breakpoints(&self, args: &Value) -> Result<String> {
        let session_id = get_opt_str(args, "sessionId");
        let session = self.manager.get_session(session_id.as_deref()).await?;
        let bps = session.list_breakpoints().await;
        if bps.is_empty() {
            return Ok("No breakpoints set".to_string());
        }
        let lines: Vec<String> = bps
            .iter()
            .map(|b| {
                format!(
                    "{}:{} ({})",
                    b.source.as_ref().and_then(|s| s.path.clone()).unwrap_or_default(),
                    b.line,
                    if b.verified { "verified" } else { "pending" }
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }

    async fn continue_execution(&self, args: &Value) -> Result<String> {
        let thread_id = get_opt_i64(args, "threadId");
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        session.continue_execution(thread_id).await?;
        Ok("Continued".to_string())
    }

    async fn pause(&self, args: &Value) -> Result<String> {
        let thread_id = get_opt_i64(args, "threadId");
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        session.pause(thread_id).await?;
        Ok("Paused".to_string())
    }

    async fn step_over(&self, args: &Value) -> Result<String> {
        let thread_id = get_opt_i64(args, "threadId");
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        session.step_over(thread_id).await?;
        Ok("Stepped over".to_string())
    }

    async fn step_into(&self, args: &Value) -> Result<String> {
        let thread_id = get_opt_i64(args, "threadId");
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        session.step_into(thread_id).await?;
        Ok("Stepped into".to_string())
    }

    async fn step_out(&self, args: &Value) -> Result<String> {
        let thread_id = get_opt_i64(args, "threadId");
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        session.step_out(thread_id).await?;
        Ok("Stepped out".to_string())
    }

    async fn stack_trace(&self, args: &Value) -> Result<String> {
        let thread_id = get_opt_i64(args, "threadId");
        let depth = get_opt_i64(args, "depth");
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        let frames = session.stack_trace(thread_id, depth).await?;
        if frames.is_empty() {
            return Ok("No stack frames (is the thread stopped?)".to_string());
        }
        Ok(frames
            .iter()
            .map(|f| {
                format!(
                    "#{} {} at {}:{}",
                    f.id,
                    f.name,
                    f.source.as_ref().and_then(|s| s.path.clone()).unwrap_or_default(),
                    f.line
                )
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn scopes(&self, args: &Value) -> Result<String> {
        let frame_id = get_i64(args, "frameId")?;
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        let scopes = session.scopes(frame_id).await?;
        Ok(scopes
            .iter()
            .map(|s| format!("{} (ref={}, expensive={})", s.name, s.variables_reference, s.expensive))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn variables(&self, args: &Value) -> Result<String> {
        let variables_reference = get_i64(args, "variablesReference")?;
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        let vars = session.variables(variables_reference).await?;
        Ok(vars
            .iter()
            .map(|v| format!("{} = {} ({})", v.name, v.value, v.var_type.clone().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn evaluate(&self, args: &Value) -> Result<String> {
        let expression = get_str(args, "expression")?;
        let frame_id = get_opt_i64(args, "frameId");
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        let result = session.evaluate(&expression, frame_id).await?;
        Ok(result.result)
    }

    async fn threads(&self, args: &Value) -> Result<String> {
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        let threads = session.threads().await?;
        Ok(threads
            .iter()
            .map(|t| format!("{}: {}", t.id, t.name))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn output(&self, args: &Value) -> Result<String> {
        let lines = get_opt_i64(args, "lines").unwrap_or(20).max(0) as usize;
        let session = self.manager.get_session(get_opt_str(args, "sessionId").as_deref()).await?;
        let out = session.output(lines).await;
        if out.is_empty() {
            return Ok("(no output)".to_string());
        }
        Ok(out.join("\n"))
    }

    async fn status(&self, args: &Value) -> Result<String> {
        let session_id = get_opt_str(args, "sessionId");
        let session = match self.manager.get_session(session_id.as_deref()).await {
            Ok(s) => s,
            Err(Error::SessionNotFound(_)) if session_id.is_none() => {
                return Ok("No active debug sessions".to_string())
            }
            Err(e) => return Err(e),
        };
        let status = session.status().await;
        let state_str = match status.state {
            SessionStateKind::Running => "running".to_string(),
            SessionStateKind::Stopped => format!(
                "stopped ({}) on thread {}",
                status.stop_reason.as_deref().unwrap_or("unknown"),
                status.stopped_thread_id.unwrap_or(0)
            ),
            SessionStateKind::Reconnecting => "reconnecting".to_string(),
            SessionStateKind::Terminated => "terminated".to_string(),
        };
        Ok(format!(
            "Session '{}': {}, processId={:?}, uptime={:?}s, breakpoints={}, outputLines={}",
            session.id,
            state_str,
            status.process_id,
            status.uptime_secs,
            status.breakpoint_count,
            status.output_line_count
        ))
    }

    async fn terminate(&self, args: &Value) -> Result<String> {
        let session_id = get_opt_str(args, "sessionId");
        let session = self.manager.get_session(session_id.as_deref()).await?;
        let id = session.id.clone();
        self.manager.remove_session(&id).await?;
        Ok(format!("Terminated session '{}'", id))
    }

    async fn list_sessions(&self) -> Result<String> {
        let sessions = self.manager.list_sessions().await;
        if sessions.is_empty() {
            return Ok("No active debug sessions".to_string());
        }
        let default_id = self.manager.default_session_id().await;
        let mut lines = Vec::new();
        for s in sessions {
            let marker = if Some(&s.id) == default_id.as_ref() { " (default)" } else { "" };
            let program = s.program_identifier().await;
            lines.push(format!("{}{}: {}", s.id, marker, describe_program(&program)));
        }
        Ok(lines.join("\n"))
    }

    async fn select_session(&self, args: &Value) -> Result<String> {
        let session_id = get_str(args, "sessionId")?;
        self.manager.select_session(&session_id).await?;
        Ok(format!("Selected session '{}'", session_id))
    }

    async fn terminate_session(&self, args: &Value) -> Result<String> {
        let session_id = get_str(args, "sessionId")?;
        self.manager.remove_session(&session_id).await?;
        Ok(format!("Terminated session '{}'", session_id))
    }

    async fn invoke(&self, args: &Value) -> Result<String> {
        let invocation = HarnessInvocation {
            assembly: get_str(args, "assembly")?,
            type_name: get_str(args, "type")?,
            method: get_str(args, "method")?,
            args: get_str_array(args, "args"),
            ctor_args: get_str_array(args, "ctorArgs"),
            cwd: get_opt_str(args, "cwd"),
        };
        let debug = get_bool(args, "debug", false);

        if !debug {
            return harness::run_no_debug(&invocation).await;
        }

        let (program, launch_args) = harness::launch_target(&invocation);
        let session = self.manager.create_session(Some(&invocation.assembly), None).await?;
        let (capabilities, _) = session
            .launch(program, launch_args, invocation.cwd.clone(), false, BTreeMap::new(), None)
            .await?;
        Ok(format!(
            "Launched harness under session '{}' (supportsConfigurationDoneRequest={})",
            session.id, capabilities.supports_configuration_done_request
        ))
    }
}

fn describe_program(program: &ProgramIdentifier) -> String {
    match program {
        ProgramIdentifier::Program(p) => p.clone(),
        ProgramIdentifier::Process(pid) => format!("process:{}", pid),
        ProgramIdentifier::Watch(path) => format!("watch:{}", path),
    }
}

fn format_env(env: &BTreeMap<String, String>) -> String {
    if env.is_empty() {
        return "(none)".to_string();
    }
    env.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(", ")
}

fn tool(name: &'static str, description: &'static str, input_schema: Value) -> ToolDefinition {
    ToolDefinition { name, description, input_schema }
}

fn schema(required: &[&str], optional: &[&str]) -> Value {
    let mut properties = serde_json::Map::new();
    for key in required.iter().chain(optional.iter()) {
        properties.insert((*key).to_string(), json!({"type": "string"}));
    }
    json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    })
}

fn get_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::InvalidRequest(format!("missing required argument '{}'", key)))
}

fn get_opt_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn get_i64(args: &Value, key: &str) -> Result<i64> {
    args.get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::InvalidRequest(format!("missing required argument '{}'", key)))
}

fn get_opt_i64(args: &Value, key: &str) -> Option<i64> {
    args.get(key).and_then(|v| v.as_i64())
}

fn get_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn get_str_array(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
        .unwrap_or_default()
}

fn get_str_map(args: &Value, key: &str) -> BTreeMap<String, String> {
    args.get(key)
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
