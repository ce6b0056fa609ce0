//! `SystemProcessProbe` against the real OS: the in-module tests in
//! `process.rs` cover the `ps`/`ss` output parsers in isolation; this
//! exercises the actual `Command::new` calls.

use dotnet_debugger_mcp::process::{ProcessProbe, SystemProcessProbe};
use std::net::TcpListener;

#[tokio::test]
async fn list_processes_includes_the_current_process() {
    let probe = SystemProcessProbe::new();
    let procs = probe.list_processes().await.expect("list_processes failed");
    let my_pid = std::process::id();
    assert!(
        procs.iter().any(|p| p.pid == my_pid),
        "expected to find pid {} among {} listed processes",
        my_pid,
        procs.len()
    );
}

#[tokio::test]
async fn is_alive_is_true_for_self_and_false_for_an_unlikely_pid() {
    let probe = SystemProcessProbe::new();
    assert!(probe.is_alive(std::process::id()).await);
    assert!(!probe.is_alive(u32::MAX - 1).await);
}

#[tokio::test]
async fn tcp_ports_busy_detects_a_bound_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind ephemeral port");
    let port = listener.local_addr().unwrap().port();

    let probe = SystemProcessProbe::new();
    let busy = probe.tcp_ports_busy(&[port]).await.expect("tcp_ports_busy failed");
    assert!(busy.contains(&port), "expected port {} to be reported busy", port);

    drop(listener);
}

#[tokio::test]
async fn tcp_ports_busy_excludes_an_unbound_port() {
    // Find a free ephemeral port, then release it immediately so nothing
    // listens on it for the probe to see.
    let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind ephemeral port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let probe = SystemProcessProbe::new();
    let busy = probe.tcp_ports_busy(&[port]).await.expect("tcp_ports_busy failed");
    assert!(!busy.contains(&port));
}
