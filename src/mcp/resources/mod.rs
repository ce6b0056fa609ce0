//! MCP `resources/*` surface: read-only session introspection plus the
//! static workflow/state-machine/error-handling guides shipped alongside
//! the tool surface.

use crate::manager::SessionManager;
use crate::session::state::SessionStateKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// MCP Resource representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Resource contents response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: String,
    pub text: Option<String>,
    pub blob: Option<String>,
}

/// Resource handler for MCP resources
pub struct ResourcesHandler {
    manager: Arc<SessionManager>,
}

impl ResourcesHandler {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// List all available resources
    pub async fn list_resources(&self) -> Result<Vec<Resource>> {
        let sessions = self.manager.list_sessions().await;

        let mut resources = vec![
            Resource {
                uri: "debugger://sessions".to_string(),
                name: "Debug Sessions".to_string(),
                description: Some("List of all active debugging sessions".to_string()),
                mime_type: Some("application/json".to_string()),
            },
            Resource {
                uri: "debugger://status".to_string(),
                name: "Debugger Status".to_string(),
                description: Some(
                    "Aggregate status: session count, default session, per-state breakdown"
                        .to_string(),
                ),
                mime_type: Some("application/json".to_string()),
            },
            Resource {
                uri: "debugger://workflows".to_string(),
                name: "Common Debugging Workflows".to_string(),
                description: Some(
                    "Step-by-step workflows for common debugging scenarios".to_string(),
                ),
                mime_type: Some("application/json".to_string()),
            },
            Resource {
                uri: "debugger://state-machine".to_string(),
                name: "Session State Machine".to_string(),
                description: Some(
                    "Complete state machine diagram showing all session states and transitions"
                        .to_string(),
                ),
                mime_type: Some("application/json".to_string()),
            },
            Resource {
                uri: "debugger://error-handling".to_string(),
                name: "Error Handling Guide".to_string(),
                description: Some(
                    "Error codes, recovery strategies, and troubleshooting tips".to_string(),
                ),
                mime_type: Some("application/json".to_string()),
            },
        ];

        for session in sessions {
            resources.push(Resource {
                uri: format!("debugger://sessions/{}", session.id),
                name: format!("Session {}", session.id),
                description: Some(format!("Details for debug session {}", session.id)),
                mime_type: Some("application/json".to_string()),
            });

            resources.push(Resource {
                uri: format!("debugger://sessions/{}/stackTrace", session.id),
                name: format!("Stack Trace ({})", session.id),
                description: Some(format!("Call stack for session {}", session.id)),
                mime_type: Some("application/json".to_string()),
            });
        }

        Ok(resources)
    }

    /// Read resource contents by URI
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        if !uri.starts_with("debugger://") {
            return Err(Error::InvalidRequest(format!(
                "Invalid resource URI: {}",
                uri
            )));
        }

        let path = &uri["debugger://".len()..];

        if path == "sessions" {
            self.read_sessions_list().await
        } else if path == "status" {
            self.read_status().await
        } else if path == "workflows" {
            Self::read_workflows()
        } else if path == "state-machine" {
            Self::read_state_machine()
        } else if path == "error-handling" {
            Self::read_error_handling()
        } else if let Some(rest) = path.strip_prefix("sessions/") {
            let parts: Vec<&str> = rest.split('/').collect();
            match parts.as_slice() {
                [session_id] if !session_id.is_empty() => {
                    self.read_session_details(session_id).await
                }
                [session_id, "stackTrace"] if !session_id.is_empty() => {
                    self.read_session_stack_trace(session_id).await
                }
                _ => Err(Error::InvalidRequest(format!(
                    "Unknown resource path: {}",
                    path
                ))),
            }
        } else {
            Err(Error::InvalidRequest(format!("Unknown resource: {}", uri)))
        }
    }

    /// Read workflows resource
    fn read_workflows() -> Result<ResourceContents> {
        let workflows = json!({
            "workflows": [
                {
                    "name": "basic_debugging",
                    "title": "Basic Debugging with Breakpoints",
                    "description": "Launch a process, set a breakpoint, and inspect variables",
                    "steps": [
                        {
                            "step": 1,
                            "action": "Launch the target with stopAtEntry",
                            "tool": "launch",
                            "parameters": {
                                "program": "/path/to/App.dll",
                                "stopAtEntry": true
                            },
                            "expectedResult": "Session id returned; entry stop reported"
                        },
                        {
                            "step": 2,
                            "action": "Set a breakpoint while stopped at entry",
                            "tool": "set_breakpoint",
                            "parameters": {
                                "file": "/path/to/Program.cs",
                                "line": 42
                            },
                            "expectedResult": "verified: true"
                        },
                        {
                            "step": 3,
                            "action": "Continue execution to hit the breakpoint",
                            "tool": "continue"
                        },
                        {
                            "step": 4,
                            "action": "Inspect the call stack and variables",
                            "tool": "stack_trace",
                            "note": "Follow with scopes and variables on the top frame"
                        },
                        {
                            "step": 5,
                            "action": "Evaluate an expression in the current frame",
                            "tool": "evaluate",
                            "parameters": { "expression": "someVariable" }
                        },
                        {
                            "step": 6,
                            "action": "Terminate the session",
                            "tool": "terminate"
                        }
                    ],
                    "tips": [
                        "Use stopAtEntry: true when you need to set breakpoints before any code runs",
                        "Breakpoints survive a restart because the file/line/condition set is replayed",
                        "status reports state, stop reason, uptime, and breakpoint/output counts in one call"
                    ]
                },
                {
                    "name": "attach_to_running_process",
                    "title": "Attach to an Already-Running Process",
                    "description": "Attach to a live .NET process by id instead of launching one",
                    "steps": [
                        { "step": 1, "action": "Attach by process id", "tool": "attach", "parameters": { "processId": 4242 } },
                        { "step": 2, "action": "Set breakpoints", "tool": "set_breakpoint" },
                        { "step": 3, "action": "Inspect state once stopped", "tool": "stack_trace" },
                        { "step": 4, "action": "Detach/terminate when done", "tool": "terminate" }
                    ]
                },
                {
                    "name": "watch_mode_hot_reload",
                    "title": "Debugging Under dotnet watch",
                    "description": "Keep a debug session attached across hot-reload rebuilds",
                    "steps": [
                        {
                            "step": 1,
                            "action": "Start watch mode for a project",
                            "tool": "launch_watch",
                            "parameters": { "projectPath": "/path/to/project", "launchProfile": "https" }
                        },
                        {
                            "step": 2,
                            "action": "Set breakpoints as usual",
                            "tool": "set_breakpoint"
                        },
                        {
                            "step": 3,
                            "action": "Edit source; dotnet watch rebuilds and restarts the process",
                            "note": "Operations made during the reconnect window return a reconnecting error; retry after it clears"
                        },
                        {
                            "step": 4,
                            "action": "Confirm reattachment",
                            "tool": "status",
                            "expectedResult": "state no longer reconnecting; breakpoints replayed automatically"
                        },
                        {
                            "step": 5,
                            "action": "Stop watch mode",
                            "tool": "stop_watch"
                        }
                    ],
                    "useCase": "Iterating on source while keeping one debug session across rebuilds"
                }
            ],
            "commonPatterns": {
                "polling": {
                    "description": "Poll status to detect state transitions (stopped, reconnecting, terminated)",
                    "note": "status never blocks; it reports the last observed state"
                },
                "stateChecks": {
                    "beforeBreakpoint": "Works in any state except reconnecting",
                    "beforeContinue": "Requires state == stopped",
                    "beforeStackTrace": "Requires state == stopped"
                },
                "errorHandling": {
                    "reconnecting": "Operation rejected while a watch-mode reconnect is in progress; retry shortly",
                    "sessionNotFound": "Session id unknown or already terminated; check list_sessions"
                }
            }
        });

        Ok(ResourceContents {
            uri: "debugger://workflows".to_string(),
            mime_type: "application/json".to_string(),
            text: Some(serde_json::to_string_pretty(&workflows)?),
            blob: None,
        })
    }

    /// Read state machine resource
    fn read_state_machine() -> Result<ResourceContents> {
        let state_machine = json!({
            "states": [
                {
                    "name": "running",
                    "description": "The debuggee is executing",
                    "availableOperations": ["set_breakpoint", "pause", "status"],
                    "nextStates": ["stopped", "terminated", "reconnecting"]
                },
                {
                    "name": "stopped",
                    "description": "Execution is paused at a breakpoint, step, pause, or entry",
                    "details": {
                        "stopReason": "entry, breakpoint, step, pause, or exception",
                        "stoppedThreadId": "thread id reported by the last stopped event"
                    },
                    "availableOperations": [
                        "set_breakpoint", "stack_trace", "scopes", "variables", "evaluate",
                        "continue", "step_over", "step_into", "step_out", "status"
                    ],
                    "nextStates": ["running", "terminated", "reconnecting"]
                },
                {
                    "name": "reconnecting",
                    "description": "A watch-mode rebuild restarted the debuggee; the transport is being re-attached",
                    "availableOperations": ["status"],
                    "note": "All other tools are rejected until reattachment completes",
                    "nextStates": ["running", "stopped"]
                },
                {
                    "name": "terminated",
                    "description": "The debuggee process has exited and no transport is attached",
                    "availableOperations": ["status", "terminate_session", "restart"],
                    "nextStates": []
                }
            ],
            "transitions": [
                { "from": "running", "to": "stopped", "trigger": "breakpoint hit, step completed, or pause requested" },
                { "from": "running", "to": "terminated", "trigger": "debuggee process exit" },
                { "from": "stopped", "to": "running", "trigger": "continue" },
                { "from": "running", "to": "reconnecting", "trigger": "watch-mode rebuild detected" },
                { "from": "stopped", "to": "reconnecting", "trigger": "watch-mode rebuild detected" },
                { "from": "reconnecting", "to": "running", "trigger": "reattach succeeded, debuggee running" },
                { "from": "reconnecting", "to": "stopped", "trigger": "reattach succeeded, debuggee already stopped" }
            ],
            "bestPractices": [
                "Poll status rather than assuming a fixed delay after continue/step",
                "Set breakpoints at any time; they are replayed automatically after a reconnect",
                "Treat a reconnecting error as transient and retry rather than failing the caller"
            ]
        });

        Ok(ResourceContents {
            uri: "debugger://state-machine".to_string(),
            mime_type: "application/json".to_string(),
            text: Some(serde_json::to_string_pretty(&state_machine)?),
            blob: None,
        })
    }

    /// Read error handling resource
    fn read_error_handling() -> Result<ResourceContents> {
        let error_handling = json!({
            "errors": [
                {
                    "type": "SessionNotFound",
                    "causes": [
                        "Invalid or unknown session id",
                        "Session was removed via terminate_session",
                        "No sessionId given and no sessions exist yet"
                    ],
                    "recovery": [
                        "Call list_sessions to see known ids",
                        "Launch or attach to create a session"
                    ]
                },
                {
                    "type": "Reconnecting",
                    "causes": ["A watch-mode rebuild is in progress and the transport is being re-attached"],
                    "recovery": ["Retry the call after a short delay; status reports when reattachment completes"]
                },
                {
                    "type": "NotRunning",
                    "causes": ["No transport is attached to the session (never launched, or terminated)"],
                    "recovery": ["launch or attach to establish a transport before calling other tools"]
                },
                {
                    "type": "Dap",
                    "causes": ["The debug adapter returned an unsuccessful response to a DAP request"],
                    "recovery": ["Inspect the message for the adapter's reported reason; verify arguments (paths, thread/frame ids)"]
                },
                {
                    "type": "Process",
                    "causes": ["Spawning the debug adapter, watch driver, or harness process failed"],
                    "recovery": ["Verify the adapter/`dotnet` binaries are on PATH and the project path is correct"]
                },
                {
                    "type": "Timeout",
                    "causes": [
                        "Debug adapter did not respond to initialize within its deadline",
                        "Watch mode could not find the rebuilt process within the discovery window"
                    ],
                    "recovery": ["Check adapter/process health directly; retry once resolved"]
                }
            ],
            "troubleshooting": {
                "breakpointNotVerified": {
                    "symptoms": "verified: false in set_breakpoint's response",
                    "steps": [
                        "Use an absolute path for file",
                        "Confirm the line contains executable code",
                        "Confirm the source matches the binary actually running"
                    ]
                },
                "watchModeStuckReconnecting": {
                    "symptoms": "status reports reconnecting for longer than the rebuild normally takes",
                    "steps": [
                        "Check the session's recent output for a [stderr] build failure",
                        "Confirm dotnet watch is still running (stop_watch then launch_watch again if not)"
                    ]
                }
            },
            "bestPractices": [
                "Check status before operations that require stopped state",
                "Treat Reconnecting as retry-able, not fatal",
                "Use absolute paths for file arguments",
                "Call terminate or terminate_session to free resources when done"
            ],
            "seeAlso": [
                "debugger://workflows",
                "debugger://state-machine"
            ]
        });

        Ok(ResourceContents {
            uri: "debugger://error-handling".to_string(),
            mime_type: "application/json".to_string(),
            text: Some(serde_json::to_string_pretty(&error_handling)?),
            blob: None,
        })
    }

    /// Read sessions list resource
    async fn read_sessions_list(&self) -> Result<ResourceContents> {
        let sessions = self.manager.list_sessions().await;

        let mut entries = Vec::new();
        for session in &sessions {
            let status = session.status().await;
            let program = session.program_identifier().await;
            entries.push(json!({
                "id": session.id,
                "program": program.as_manager_hint(),
                "state": state_name(status.state),
            }));
        }

        let content = json!({
            "sessions": entries,
            "total": entries.len(),
            "default": self.manager.default_session_id().await,
        });

        Ok(ResourceContents {
            uri: "debugger://sessions".to_string(),
            mime_type: "application/json".to_string(),
            text: Some(serde_json::to_string_pretty(&content)?),
            blob: None,
        })
    }

    /// Read aggregate status resource: session count, default session, and a
    /// per-state breakdown, for a caller that wants a single liveness probe
    /// instead of walking the full session list.
    async fn read_status(&self) -> Result<ResourceContents> {
        let sessions = self.manager.list_sessions().await;

        let mut by_state: BTreeMap<&'static str, u64> = BTreeMap::new();
        for session in &sessions {
            let status = session.status().await;
            *by_state.entry(state_name(status.state)).or_insert(0) += 1;
        }

        let content = json!({
            "totalSessions": sessions.len(),
            "defaultSession": self.manager.default_session_id().await,
            "byState": by_state,
        });

        Ok(ResourceContents {
            uri: "debugger://status".to_string(),
            mime_type: "application/json".to_string(),
            text: Some(serde_json::to_string_pretty(&content)?),
            blob: None,
        })
    }

    /// Read session details resource
    async fn read_session_details(&self, session_id: &str) -> Result<ResourceContents> {
        let session = self.manager.get_session(Some(session_id)).await?;

        let status = session.status().await;
        let program = session.program_identifier().await;
        let breakpoints = session.list_breakpoints().await;

        let content = json!({
            "id": session.id,
            "program": program.as_manager_hint(),
            "state": state_name(status.state),
            "stopReason": status.stop_reason,
            "stoppedThreadId": status.stopped_thread_id,
            "processId": status.process_id,
            "uptimeSecs": status.uptime_secs,
            "breakpoints": breakpoints,
            "outputLineCount": status.output_line_count,
        });

        Ok(ResourceContents {
            uri: format!("debugger://sessions/{}", session_id),
            mime_type: "application/json".to_string(),
            text: Some(serde_json::to_string_pretty(&content)?),
            blob: None,
        })
    }

    /// Read session stack trace resource
    async fn read_session_stack_trace(&self, session_id: &str) -> Result<ResourceContents> {
        let session = self.manager.get_session(Some(session_id)).await?;
        let status = session.status().await;

        let frames = if matches!(status.state, SessionStateKind::Stopped) {
            session.stack_trace(None, None).await.unwrap_or_default()
        } else {
            vec![]
        };

        let content = json!({
            "sessionId": session.id,
            "state": state_name(status.state),
            "stackFrames": frames,
        });

        Ok(ResourceContents {
            uri: format!("debugger://sessions/{}/stackTrace", session_id),
            mime_type: "application/json".to_string(),
            text: Some(serde_json::to_string_pretty(&content)?),
            blob: None,
        })
    }

    /// List available resource templates (for MCP discovery)
    pub fn list_resource_templates() -> Vec<Value> {
        vec![
            json!({
                "uriTemplate": "debugger://sessions",
                "name": "Debug Sessions",
                "description": "List all active debugging sessions",
                "mimeType": "application/json"
            }),
            json!({
                "uriTemplate": "debugger://sessions/{sessionId}",
                "name": "Session Details",
                "description": "Get details for a specific debug session",
                "mimeType": "application/json"
            }),
            json!({
                "uriTemplate": "debugger://sessions/{sessionId}/stackTrace",
                "name": "Session Stack Trace",
                "description": "Get the call stack for a stopped debug session",
                "mimeType": "application/json"
            }),
            json!({
                "uriTemplate": "debugger://workflows",
                "name": "Common Workflows",
                "description": "Step-by-step debugging workflows with examples",
                "mimeType": "application/json"
            }),
            json!({
                "uriTemplate": "debugger://state-machine",
                "name": "State Machine",
                "description": "Complete session state machine with all transitions",
                "mimeType": "application/json"
            }),
            json!({
                "uriTemplate": "debugger://error-handling",
                "name": "Error Handling",
                "description": "Error codes, recovery strategies, and troubleshooting",
                "mimeType": "application/json"
            }),
        ]
    }
}

fn state_name(state: SessionStateKind) -> &'static str {
    match state {
        SessionStateKind::Running => "running",
        SessionStateKind::Stopped => "stopped",
        SessionStateKind::Reconnecting => "reconnecting",
        SessionStateKind::Terminated => "terminated",
    }
}
