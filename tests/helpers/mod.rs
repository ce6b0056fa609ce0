//! Shared plumbing for locating the fake DAP adapter / rebuild driver
//! binaries built from `tests/bin/`. Those are registered as `[[test]]`
//! targets with `harness = false` rather than `[[bin]]` targets, so Cargo
//! does not expose them via `CARGO_BIN_EXE_<name>` — only binary and
//! example targets get that treatment. Instead we find them the way the
//! test harness itself is found: they land as siblings of the current test
//! binary in `target/<profile>/deps/`, with a `-<hash>` suffix appended.

use std::path::PathBuf;

fn deps_dir() -> PathBuf {
    std::env::current_exe()
        .expect("failed to resolve current test binary path")
        .parent()
        .expect("test binary has no parent directory")
        .to_path_buf()
}

fn find_sibling_binary(name: &str) -> PathBuf {
    let dir = deps_dir();
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", dir.display(), e))
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().is_none()
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|stem| stem == name || stem.starts_with(&format!("{name}-")))
                    .unwrap_or(false)
        })
        .collect();

    // Prefer the most recently built artifact if more than one hash exists.
    candidates.sort_by_key(|p| {
        std::fs::metadata(p)
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });

    candidates.pop().unwrap_or_else(|| {
        panic!(
            "could not find `{name}` binary in {}; run the full test suite with `cargo test` so it gets built",
            dir.display()
        )
    })
}

/// Absolute path to the compiled `fake_dap_adapter` test binary.
pub fn fake_dap_adapter_path() -> PathBuf {
    find_sibling_binary("fake_dap_adapter")
}

/// Absolute path to the compiled `fake_rebuild_driver` test binary.
pub fn fake_rebuild_driver_path() -> PathBuf {
    find_sibling_binary("fake_rebuild_driver")
}

/// Set the env vars this crate reads to override its external debugger/
/// watch-driver commands, pointing both at the fake binaries above.
pub fn install_fake_command_env() {
    std::env::set_var(
        "DOTNET_DEBUGGER_ADAPTER_COMMAND",
        fake_dap_adapter_path().as_os_str(),
    );
    std::env::set_var(
        "DOTNET_DEBUGGER_WATCH_DRIVER_COMMAND",
        fake_rebuild_driver_path().as_os_str(),
    );
}
