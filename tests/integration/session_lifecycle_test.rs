//! Multiple sessions through the Tool Router: id derivation on creation,
//! default-session promotion, explicit selection, and removal — the same
//! surface an MCP client drives through `tools/call`.

#[path = "../helpers/mod.rs"]
mod helpers;

use dotnet_debugger_mcp::manager::SessionManager;
use dotnet_debugger_mcp::mcp::tools::ToolsHandler;
use serde_json::json;
use std::sync::Arc;

fn handler() -> ToolsHandler {
    helpers::install_fake_command_env();
    ToolsHandler::new(Arc::new(SessionManager::new()))
}

#[tokio::test]
async fn two_launches_get_distinct_well_known_ids_and_first_is_default() {
    let handler = handler();

    let api = handler
        .handle_tool("launch", json!({"program": "/app/bin/Debug/net8.0/Orders.Api.dll"}))
        .await
        .unwrap();
    assert!(api.contains("session 'api'"));

    let worker = handler
        .handle_tool("launch", json!({"program": "/app/bin/Debug/net8.0/Orders.Worker.dll"}))
        .await
        .unwrap();
    assert!(worker.contains("session 'worker'"));

    let listing = handler.handle_tool("list_sessions", json!({})).await.unwrap();
    assert!(listing.contains("api (default)"));
    assert!(listing.contains("worker"));
    assert!(!listing.contains("worker (default)"));
}

#[tokio::test]
async fn select_session_changes_the_default_for_unqualified_calls() {
    let handler = handler();
    handler.handle_tool("launch", json!({"program": "/app/bin/Debug/net8.0/Orders.Api.dll"})).await.unwrap();
    handler.handle_tool("launch", json!({"program": "/app/bin/Debug/net8.0/Orders.Worker.dll"})).await.unwrap();

    handler.handle_tool("select_session", json!({"sessionId": "worker"})).await.expect("select_session failed");

    let status = handler.handle_tool("status", json!({})).await.unwrap();
    assert!(status.contains("Session 'worker'"));
}

#[tokio::test]
async fn terminate_session_promotes_the_remaining_default() {
    let handler = handler();
    handler.handle_tool("launch", json!({"program": "/app/bin/Debug/net8.0/Orders.Api.dll"})).await.unwrap();
    handler.handle_tool("launch", json!({"program": "/app/bin/Debug/net8.0/Orders.Worker.dll"})).await.unwrap();

    handler.handle_tool("terminate_session", json!({"sessionId": "api"})).await.expect("terminate_session failed");

    let status = handler.handle_tool("status", json!({})).await.unwrap();
    assert!(status.contains("Session 'worker'"), "expected worker to be promoted to default, got: {}", status);
}

#[tokio::test]
async fn a_collision_on_a_well_known_suffix_is_counter_suffixed() {
    let handler = handler();
    let first = handler.handle_tool("launch", json!({"program": "/app/bin/Debug/net8.0/Orders.Api.dll"})).await.unwrap();
    let second = handler.handle_tool("launch", json!({"program": "/app/bin/Debug/net8.0/Billing.Api.dll"})).await.unwrap();

    assert!(first.contains("session 'api'"));
    assert!(second.contains("session 'api-2'"));
}

#[tokio::test]
async fn operating_on_an_unknown_session_id_errors() {
    let handler = handler();
    let err = handler
        .handle_tool("status", json!({"sessionId": "does-not-exist"}))
        .await
        .unwrap_err();
    assert!(matches!(err, dotnet_debugger_mcp::Error::SessionNotFound(_)));
}
