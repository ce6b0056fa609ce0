//! Session configuration: the immutable-after-creation launch/attach/watch
//! record a Session needs to `restart` itself or hand state to a Watch
//! Controller, per the data model in SPEC_FULL §3.

use std::collections::BTreeMap;

/// How a session's debuggee was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Launch,
    Attach,
    Watch,
}

/// Program identifier: a DLL path, a live process id, or a watched project
/// directory — exactly one of the three per SPEC_FULL §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramIdentifier {
    Program(String),
    Process(u32),
    Watch(String),
}

impl ProgramIdentifier {
    /// The `program:<pid>` / `watch:<path>` / bare-path string form used as
    /// input to Session Manager id derivation.
    pub fn as_manager_hint(&self) -> String {
        match self {
            ProgramIdentifier::Program(p) => p.clone(),
            ProgramIdentifier::Process(pid) => format!("process:{}", pid),
            ProgramIdentifier::Watch(path) => format!("watch:{}", path),
        }
    }
}

/// Launch/attach/watch configuration, saved so a Session can `restart`
/// itself or a Watch Controller can reattach with the same shape.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub program: ProgramIdentifier,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    pub stop_at_entry: bool,
    pub mode: SessionMode,
    pub launch_profile: Option<String>,
    pub explicit_env: BTreeMap<String, String>,
    pub resolved_env: BTreeMap<String, String>,
    pub process_id: Option<u32>,
    pub start_time: Option<u64>,
}

impl SessionConfig {
    pub fn for_launch(program: String, args: Vec<String>, cwd: Option<String>, stop_at_entry: bool) -> Self {
        Self {
            program: ProgramIdentifier::Program(program),
            args,
            cwd,
            stop_at_entry,
            mode: SessionMode::Launch,
            launch_profile: None,
            explicit_env: BTreeMap::new(),
            resolved_env: BTreeMap::new(),
            process_id: None,
            start_time: None,
        }
    }

    pub fn for_attach(process_id: u32) -> Self {
        Self {
            program: ProgramIdentifier::Process(process_id),
            args: Vec::new(),
            cwd: None,
            stop_at_entry: false,
            mode: SessionMode::Attach,
            launch_profile: None,
            explicit_env: BTreeMap::new(),
            resolved_env: BTreeMap::new(),
            process_id: Some(process_id),
            start_time: None,
        }
    }

    pub fn for_watch(project_path: String, args: Vec<String>, launch_profile: Option<String>) -> Self {
        Self {
            program: ProgramIdentifier::Watch(project_path),
            args,
            cwd: None,
            stop_at_entry: false,
            mode: SessionMode::Watch,
            launch_profile,
            explicit_env: BTreeMap::new(),
            resolved_env: BTreeMap::new(),
            process_id: None,
            start_time: None,
        }
    }
}
