//! Exercises `DapTransport`'s real `Content-Length` framing across an actual
//! process boundary, spawning `fake_dap_adapter` the same way `DapClient::spawn`
//! spawns `netcoredbg`. The in-crate unit tests in `dap::client` cover request/
//! response semantics against a mock transport; this covers the wire framing
//! those mocks bypass entirely.

#[path = "../helpers/mod.rs"]
mod helpers;

use dotnet_debugger_mcp::dap::client::DapClient;
use dotnet_debugger_mcp::dap::types::{Source, SourceBreakpoint};
use std::time::Duration;

async fn spawn_fake_adapter() -> DapClient {
    let path = helpers::fake_dap_adapter_path();
    DapClient::spawn(&path.to_string_lossy(), &[]).await.expect("failed to spawn fake adapter")
}

#[tokio::test]
async fn initialize_round_trips_capabilities_over_real_framing() {
    let client = spawn_fake_adapter().await;
    let caps = tokio::time::timeout(Duration::from_secs(5), client.initialize())
        .await
        .expect("initialize timed out")
        .expect("initialize failed");

    assert!(caps.supports_configuration_done_request);
    assert!(caps.supports_conditional_breakpoints);
    assert!(caps.supports_terminate_request);
}

#[tokio::test]
async fn set_breakpoints_round_trips_a_large_body_across_multiple_reads() {
    let client = spawn_fake_adapter().await;
    client.initialize().await.expect("initialize failed");

    // A body large enough that the transport likely needs more than one
    // underlying read to assemble the declared Content-Length.
    let breakpoints: Vec<SourceBreakpoint> = (1..=200)
        .map(|line| SourceBreakpoint { line, condition: None })
        .collect();

    let source = Source {
        name: Some("Program.cs".to_string()),
        path: Some("/test/Program.cs".to_string()),
    };

    let echoed = tokio::time::timeout(Duration::from_secs(5), client.set_breakpoints(source, breakpoints))
        .await
        .expect("setBreakpoints timed out")
        .expect("setBreakpoints failed");

    assert_eq!(echoed.len(), 200);
    assert!(echoed.iter().all(|bp| bp.verified));
}

#[tokio::test]
async fn stopped_event_arrives_after_continue_over_real_framing() {
    let client = spawn_fake_adapter().await;
    client.initialize().await.expect("initialize failed");

    client.continue_execution(1).await.expect("continue failed");
    client
        .wait_for_event("stopped", Duration::from_secs(5))
        .await
        .expect("did not observe 'stopped' event over real framing");
}

#[tokio::test]
async fn shutdown_prefers_terminate_and_completes_cleanly() {
    let client = spawn_fake_adapter().await;
    let caps = client.initialize().await.expect("initialize failed");
    client.shutdown_with_timeout(&caps).await.expect("shutdown failed");
}
