//! OS process-tree enumeration, liveness checks, and TCP port-state queries,
//! grounding the Watch Controller's discovery and cleanup phases in one
//! reusable module instead of scattering `Command::new("ps")` calls through
//! `watch.rs`.

use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::process::Command;

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub command: String,
}

/// Wraps the OS-facing operations the Watch Controller needs, so tests can
/// inject a fake implementation instead of shelling out — the same way
/// `DapTransport` is wrapped behind `DapTransportTrait` for `mockall`.
#[async_trait]
pub trait ProcessProbe: Send + Sync {
    async fn list_processes(&self) -> Result<Vec<ProcessInfo>>;
    async fn is_alive(&self, pid: u32) -> bool;
    async fn tcp_ports_busy(&self, ports: &[u16]) -> Result<HashSet<u16>>;
}

/// Shells out to `ps`, `kill -0`, and `ss`.
pub struct SystemProcessProbe;

impl SystemProcessProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessProbe for SystemProcessProbe {
    async fn list_processes(&self) -> Result<Vec<ProcessInfo>> {
        let output = Command::new("ps")
            .args(["-e", "-o", "pid=,ppid=,args="])
            .output()
            .await
            .map_err(|e| Error::Process(format!("failed to run ps: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ps_output(&stdout))
    }

    async fn is_alive(&self, pid: u32) -> bool {
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn tcp_ports_busy(&self, ports: &[u16]) -> Result<HashSet<u16>> {
        let output = Command::new("ss")
            .args(["-Htan"])
            .output()
            .await
            .map_err(|e| Error::Process(format!("failed to run ss: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_ss_busy_ports(&stdout, ports))
    }
}

/// Parses `ps -e -o pid=,ppid=,args=` output. Splits only the first two
/// whitespace runs — `args` itself may contain spaces, so it is never safe
/// to split on every run of whitespace or by fixed column offsets.
fn parse_ps_output(stdout: &str) -> Vec<ProcessInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let mut parts = line.splitn(3, char::is_whitespace);
            let pid: u32 = parts.next()?.parse().ok()?;
            let rest = parts.next()?;
            let mut rest_parts = rest.splitn(2, char::is_whitespace);
            let ppid: u32 = rest_parts.next()?.parse().ok()?;
            let command = line
                .trim_start()
                .splitn(3, char::is_whitespace)
                .nth(2)
                .unwrap_or("")
                .trim()
                .to_string();
            let _ = rest_parts;
            Some(ProcessInfo { pid, ppid, command })
        })
        .collect()
}

/// Parses `ss -Htan` output (no header line): state is column 1, local
/// address:port is column 4. Classifies a tracked port as busy if its state
/// is `LISTEN` or `TIME-WAIT`.
fn parse_ss_busy_ports(stdout: &str, ports: &[u16]) -> HashSet<u16> {
    let wanted: HashSet<u16> = ports.iter().copied().collect();
    let mut busy = HashSet::new();

    for line in stdout.lines() {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 4 {
            continue;
        }
        let state = cols[0];
        if state != "LISTEN" && state != "TIME-WAIT" {
            continue;
        }
        let local_addr = cols[3];
        if let Some(port) = local_addr.rsplit(':').next().and_then(|p| p.parse::<u16>().ok()) {
            if wanted.contains(&port) {
                busy.insert(port);
            }
        }
    }

    busy
}
