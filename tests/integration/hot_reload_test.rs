//! End to end against `fake_rebuild_driver`: launches a watch session,
//! confirms the debugger attaches to the discovered debuggee, triggers a
//! rebuild, and confirms the session reattaches to the new process instead
//! of going terminated.

#[path = "../helpers/mod.rs"]
mod helpers;

use dotnet_debugger_mcp::manager::SessionManager;
use dotnet_debugger_mcp::mcp::tools::ToolsHandler;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn session_id_from(launch_result: &str) -> String {
    launch_result
        .rsplit('\'')
        .nth(1)
        .expect("unexpected launch_watch result format")
        .to_string()
}

#[tokio::test]
async fn watch_session_attaches_and_survives_a_rebuild() {
    helpers::install_fake_command_env();
    let project_dir = tempdir().expect("failed to create scratch project dir");

    let handler = ToolsHandler::new(Arc::new(SessionManager::new()));
    let launch_result = handler
        .handle_tool("launch_watch", json!({"projectPath": project_dir.path().to_string_lossy()}))
        .await
        .expect("launch_watch failed");
    let session_id = session_id_from(&launch_result);

    // Give the driver time to spawn the fake debuggee and the controller
    // time to discover and attach to it.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let status_before = handler
        .handle_tool("status", json!({"sessionId": session_id}))
        .await
        .expect("status failed");
    assert!(
        status_before.contains("running") || status_before.contains("stopped"),
        "expected an attached session, got: {}",
        status_before
    );

    // Trigger a rebuild: the driver kills its debuggee and spawns a fresh
    // one, forcing the controller's reconnect path.
    std::fs::write(project_dir.path().join(".rebuild-trigger"), b"").expect("failed to write trigger file");
    tokio::time::sleep(Duration::from_secs(4)).await;

    let status_after = handler
        .handle_tool("status", json!({"sessionId": session_id}))
        .await
        .expect("status failed");
    assert!(
        !status_after.contains("terminated"),
        "session should have reattached after rebuild, got: {}",
        status_after
    );

    handler
        .handle_tool("stop_watch", json!({"sessionId": session_id}))
        .await
        .expect("stop_watch failed");

    let listing = handler.handle_tool("list_sessions", json!({})).await.expect("list_sessions failed");
    assert!(
        !listing.contains(&session_id),
        "stop_watch should remove the session from the registry, got: {}",
        listing
    );
}

#[tokio::test]
async fn watch_controller_rejects_a_nonexistent_project_directory() {
    helpers::install_fake_command_env();
    let handler = ToolsHandler::new(Arc::new(SessionManager::new()));
    let err = handler
        .handle_tool("launch_watch", json!({"projectPath": "/no/such/project/dir"}))
        .await
        .unwrap_err();
    assert!(matches!(err, dotnet_debugger_mcp::Error::Configuration(_)));
}
