//! `JsonRpcMessage`'s `#[serde(untagged)]` decoding: request vs. response vs.
//! notification must be told apart purely by which fields are present on
//! the wire, since MCP's stdio transport is just one line of JSON per
//! message with no outer discriminant.

use dotnet_debugger_mcp::mcp::protocol::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
use serde_json::json;

#[test]
fn a_request_line_with_method_and_id_parses_as_request() {
    let line = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list", "params": {}}).to_string();
    let msg: JsonRpcMessage = serde_json::from_str(&line).unwrap();
    match msg {
        JsonRpcMessage::Request(req) => assert_eq!(req.method, "tools/list"),
        other => panic!("expected Request, got {:?}", other),
    }
}

#[test]
fn a_response_line_with_result_and_no_method_parses_as_response() {
    let line = json!({"jsonrpc": "2.0", "id": 1, "result": {"ok": true}}).to_string();
    let msg: JsonRpcMessage = serde_json::from_str(&line).unwrap();
    match msg {
        JsonRpcMessage::Response(resp) => {
            assert_eq!(resp.result, Some(json!({"ok": true})));
            assert!(resp.error.is_none());
        }
        other => panic!("expected Response, got {:?}", other),
    }
}

#[test]
fn a_notification_line_with_method_and_no_id_parses_as_notification() {
    let line = json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string();
    let msg: JsonRpcMessage = serde_json::from_str(&line).unwrap();
    match msg {
        JsonRpcMessage::Notification(notif) => assert_eq!(notif.method, "notifications/initialized"),
        other => panic!("expected Notification, got {:?}", other),
    }
}

#[test]
fn an_error_response_round_trips_through_the_wire_shape() {
    let line = json!({
        "jsonrpc": "2.0",
        "id": 7,
        "error": { "code": -32601, "message": "Method not found" }
    })
    .to_string();
    let msg: JsonRpcMessage = serde_json::from_str(&line).unwrap();
    match msg {
        JsonRpcMessage::Response(resp) => {
            let err = resp.error.expect("expected an error object");
            assert_eq!(err.code, -32601);
            assert_eq!(err.message, "Method not found");
        }
        other => panic!("expected Response, got {:?}", other),
    }
}

#[test]
fn serializing_a_request_omits_absent_params() {
    let req = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        id: json!(1),
        method: "resources/list".to_string(),
        params: None,
    };
    let s = serde_json::to_string(&JsonRpcMessage::Request(req)).unwrap();
    assert!(!s.contains("params"));
}

#[test]
fn serializing_a_response_omits_absent_error() {
    let resp = JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id: json!(1),
        result: Some(json!({"tools": []})),
        error: None,
    };
    let s = serde_json::to_string(&JsonRpcMessage::Response(resp)).unwrap();
    assert!(!s.contains("\"error\""));
}
