//! Fake DAP adapter for integration testing: a minimal stand-in for
//! `netcoredbg --interpreter=vscode` that speaks real DAP framing and
//! answers each request this crate's `DapClient` actually sends.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};

#[derive(Debug, serde::Deserialize)]
struct Message {
    seq: Option<i64>,
    #[serde(rename = "type")]
    msg_type: String,
    command: Option<String>,
    arguments: Option<Value>,
}

struct FakeDapAdapter {
    seq: i64,
    breakpoints: HashMap<String, Vec<i64>>,
}

impl FakeDapAdapter {
    fn new() -> Self {
        Self {
            seq: 1,
            breakpoints: HashMap::new(),
        }
    }

    fn send_response(&mut self, request_seq: i64, command: &str, success: bool, body: Option<Value>) {
        let response = json!({
            "seq": self.seq,
            "type": "response",
            "request_seq": request_seq,
            "command": command,
            "success": success,
            "body": body
        });
        self.seq += 1;
        self.write_message(&response);
    }

    fn send_event(&mut self, event: &str, body: Option<Value>) {
        let event_msg = json!({
            "seq": self.seq,
            "type": "event",
            "event": event,
            "body": body
        });
        self.seq += 1;
        self.write_message(&event_msg);
    }

    fn write_message(&self, msg: &Value) {
        let content = serde_json::to_string(msg).unwrap();
        let headers = format!("Content-Length: {}\r\n\r\n", content.len());
        print!("{}{}", headers, content);
        io::stdout().flush().unwrap();
    }

    fn handle_initialize(&mut self, request_seq: i64) {
        let capabilities = json!({
            "supportsConfigurationDoneRequest": true,
            "supportsConditionalBreakpoints": true,
            "supportsEvaluateForHovers": true,
            "supportsSetVariable": true,
            "supportTerminateDebuggee": true,
            "supportsTerminateRequest": true,
        });
        self.send_response(request_seq, "initialize", true, Some(capabilities));
        self.send_event("initialized", None);
    }

    fn handle_launch(&mut self, request_seq: i64, _args: Option<Value>) {
        self.send_response(request_seq, "launch", true, None);
        self.send_event("thread", Some(json!({ "reason": "started", "threadId": 1 })));
    }

    fn handle_attach(&mut self, request_seq: i64, _args: Option<Value>) {
        self.send_response(request_seq, "attach", true, None);
        self.send_event("thread", Some(json!({ "reason": "started", "threadId": 1 })));
    }

    fn handle_set_breakpoints(&mut self, request_seq: i64, args: Option<Value>) {
        let Some(args) = args else {
            self.send_response(request_seq, "setBreakpoints", false, None);
            return;
        };

        let source_path = args
            .get("source")
            .and_then(|s| s.get("path"))
            .and_then(|p| p.as_str())
            .unwrap_or("unknown")
            .to_string();

        let breakpoints = args
            .get("breakpoints")
            .and_then(|b| b.as_array())
            .map(|arr| {
                arr.iter()
                    .enumerate()
                    .map(|(id, bp)| {
                        let line = bp.get("line").and_then(|l| l.as_i64()).unwrap_or(0);
                        let condition = bp.get("condition").and_then(|c| c.as_str());
                        self.breakpoints.entry(source_path.clone()).or_default().push(line);
                        let source = json!({ "path": source_path });
                        match condition {
                            Some(cond) => json!({ "id": id + 1, "verified": true, "line": line, "condition": cond, "source": source }),
                            None => json!({ "id": id + 1, "verified": true, "line": line, "source": source }),
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        self.send_response(
            request_seq,
            "setBreakpoints",
            true,
            Some(json!({ "breakpoints": breakpoints })),
        );
    }

    fn handle_configuration_done(&mut self, request_seq: i64) {
        self.send_response(request_seq, "configurationDone", true, None);
    }

    fn handle_continue(&mut self, request_seq: i64, _args: Option<Value>) {
        self.send_response(request_seq, "continue", true, Some(json!({ "allThreadsContinued": true })));
        self.send_event(
            "stopped",
            Some(json!({ "reason": "breakpoint", "threadId": 1, "allThreadsStopped": true })),
        );
    }

    fn handle_pause(&mut self, request_seq: i64, _args: Option<Value>) {
        self.send_response(request_seq, "pause", true, None);
        self.send_event("stopped", Some(json!({ "reason": "pause", "threadId": 1 })));
    }

    fn handle_step(&mut self, request_seq: i64, command: &str) {
        self.send_response(request_seq, command, true, None);
        self.send_event("stopped", Some(json!({ "reason": "step", "threadId": 1 })));
    }

    fn handle_threads(&mut self, request_seq: i64) {
        self.send_response(
            request_seq,
            "threads",
            true,
            Some(json!({ "threads": [{ "id": 1, "name": "Main Thread" }] })),
        );
    }

    fn handle_stack_trace(&mut self, request_seq: i64, _args: Option<Value>) {
        let stack_frames = vec![
            json!({ "id": 1, "name": "Program.Main", "source": { "name": "Program.cs", "path": "/test/Program.cs" }, "line": 10, "column": 1 }),
            json!({ "id": 2, "name": "<Module>", "source": { "name": "Program.cs", "path": "/test/Program.cs" }, "line": 1, "column": 1 }),
        ];
        self.send_response(
            request_seq,
            "stackTrace",
            true,
            Some(json!({ "stackFrames": stack_frames, "totalFrames": 2 })),
        );
    }

    fn handle_scopes(&mut self, request_seq: i64, _args: Option<Value>) {
        let scopes = vec![json!({ "name": "Locals", "variablesReference": 1000, "expensive": false })];
        self.send_response(request_seq, "scopes", true, Some(json!({ "scopes": scopes })));
    }

    fn handle_variables(&mut self, request_seq: i64, _args: Option<Value>) {
        let variables = vec![
            json!({ "name": "x", "value": "42", "type": "int", "variablesReference": 0 }),
            json!({ "name": "y", "value": "10", "type": "int", "variablesReference": 0 }),
        ];
        self.send_response(request_seq, "variables", true, Some(json!({ "variables": variables })));
    }

    fn handle_evaluate(&mut self, request_seq: i64, args: Option<Value>) {
        let Some(args) = args else {
            self.send_response(request_seq, "evaluate", false, None);
            return;
        };
        let expression = args.get("expression").and_then(|e| e.as_str()).unwrap_or("");
        let result = match expression {
            "x" => "42",
            "y" => "10",
            _ => "null",
        };
        self.send_response(
            request_seq,
            "evaluate",
            true,
            Some(json!({ "result": result, "type": "int", "variablesReference": 0 })),
        );
    }

    fn handle_terminate(&mut self, request_seq: i64, _args: Option<Value>) {
        self.send_response(request_seq, "terminate", true, None);
        self.send_event("terminated", None);
        self.send_event("exited", Some(json!({ "exitCode": 0 })));
    }

    fn handle_disconnect(&mut self, request_seq: i64, _args: Option<Value>) {
        self.send_response(request_seq, "disconnect", true, None);
        self.send_event("terminated", None);
        self.send_event("exited", Some(json!({ "exitCode": 0 })));
    }

    fn handle_request(&mut self, msg: Message) {
        let request_seq = msg.seq.unwrap_or(0);
        let command = msg.command.as_deref().unwrap_or("");

        match command {
            "initialize" => self.handle_initialize(request_seq),
            "launch" => self.handle_launch(request_seq, msg.arguments),
            "attach" => self.handle_attach(request_seq, msg.arguments),
            "setBreakpoints" => self.handle_set_breakpoints(request_seq, msg.arguments),
            "configurationDone" => self.handle_configuration_done(request_seq),
            "continue" => self.handle_continue(request_seq, msg.arguments),
            "pause" => self.handle_pause(request_seq, msg.arguments),
            "next" | "stepIn" | "stepOut" => self.handle_step(request_seq, command),
            "threads" => self.handle_threads(request_seq),
            "stackTrace" => self.handle_stack_trace(request_seq, msg.arguments),
            "scopes" => self.handle_scopes(request_seq, msg.arguments),
            "variables" => self.handle_variables(request_seq, msg.arguments),
            "evaluate" => self.handle_evaluate(request_seq, msg.arguments),
            "terminate" => self.handle_terminate(request_seq, msg.arguments),
            "disconnect" => self.handle_disconnect(request_seq, msg.arguments),
            _ => {
                eprintln!("fake_dap_adapter: unknown command {}", command);
                self.send_response(request_seq, command, false, None);
            }
        }
    }

    fn run(&mut self) {
        let stdin = io::stdin();
        let mut reader = stdin.lock();

        loop {
            let mut headers = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    return;
                }
                if line == "\r\n" || line == "\n" {
                    break;
                }
                headers.push_str(&line);
            }

            let content_length: usize = headers
                .lines()
                .find(|line| line.starts_with("Content-Length:"))
                .and_then(|line| line.split(':').nth(1))
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0);

            if content_length == 0 {
                continue;
            }

            let mut buffer = vec![0u8; content_length];
            io::Read::read_exact(&mut reader, &mut buffer).unwrap();
            let content = String::from_utf8(buffer).unwrap();

            if let Ok(msg) = serde_json::from_str::<Message>(&content) {
                if msg.msg_type == "request" {
                    self.handle_request(msg);
                }
            }
        }
    }
}

fn main() {
    let mut adapter = FakeDapAdapter::new();
    adapter.run();
}
