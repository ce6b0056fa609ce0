//! Process-singleton session registry: maps session ids to [`Session`]s,
//! tracks a nullable default, and derives human-readable ids from program
//! paths — per SPEC_FULL §4.5.

use crate::session::Session;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

const WELL_KNOWN_SUFFIXES: &[&str] =
    &["api", "worker", "web", "service", "server", "client", "app", "host"];
const MAX_COLLISION_ATTEMPTS: usize = 1000;

pub struct SessionManager {
    sessions: RwLock<BTreeMap<String, Arc<Session>>>,
    default_session_id: RwLock<Option<String>>,
    anonymous_counter: AtomicU64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            default_session_id: RwLock::new(None),
            anonymous_counter: AtomicU64::new(0),
        }
    }

    /// Creates a new session. If `explicit_id` is given (a caller-supplied
    /// `sessionId` argument), it is used verbatim, failing if already taken;
    /// otherwise the id is derived from `program_hint` (a DLL path, project
    /// directory, or similar identifier), or an anonymous `session-<n>` id
    /// if no hint was given either. The first session created becomes the
    /// default.
    pub async fn create_session(
        &self,
        program_hint: Option<&str>,
        explicit_id: Option<&str>,
    ) -> Result<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let id = match explicit_id {
            Some(id) => {
                if sessions.contains_key(id) {
                    return Err(Error::InvalidRequest(format!("session '{}' already exists", id)));
                }
                id.to_string()
            }
            None => self.derive_id(program_hint, &sessions)?,
        };
        let session = Arc::new(Session::new(id.clone()));
        sessions.insert(id.clone(), session.clone());

        let mut default_id = self.default_session_id.write().await;
        if default_id.is_none() {
            *default_id = Some(id.clone());
        }

        info!(session_id = %id, "session created");
        Ok(session)
    }

    pub async fn get_session(&self, id: Option<&str>) -> Result<Arc<Session>> {
        let sessions = self.sessions.read().await;
        match id {
            Some(id) => sessions
                .get(id)
                .cloned()
                .ok_or_else(|| Error::SessionNotFound(format_known_ids(id, &sessions))),
            None => {
                let default_id = self.default_session_id.read().await;
                match default_id.as_ref() {
                    Some(id) => sessions
                        .get(id)
                        .cloned()
                        .ok_or_else(|| Error::Internal(format!("default session {} vanished", id))),
                    None => Err(Error::SessionNotFound("no active debug sessions".to_string())),
                }
            }
        }
    }

    pub async fn list_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn default_session_id(&self) -> Option<String> {
        self.default_session_id.read().await.clone()
    }

    pub async fn select_session(&self, id: &str) -> Result<()> {
        let sessions = self.sessions.read().await;
        if !sessions.contains_key(id) {
            return Err(Error::SessionNotFound(format_known_ids(id, &sessions)));
        }
        drop(sessions);
        *self.default_session_id.write().await = Some(id.to_string());
        Ok(())
    }

    /// Terminates and removes a session; if it was the default, promotes
    /// any remaining session (arbitrary but deterministic: the next key in
    /// id order).
    pub async fn remove_session(&self, id: &str) -> Result<()> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions
                .remove(id)
                .ok_or_else(|| Error::SessionNotFound(format_known_ids(id, &sessions)))?
        };
        session.terminate().await;

        let mut default_id = self.default_session_id.write().await;
        if default_id.as_deref() == Some(id) {
            let sessions = self.sessions.read().await;
            *default_id = sessions.keys().next().cloned();
        }
        info!(session_id = %id, "session removed");
        Ok(())
    }

    fn derive_id(&self, program_hint: Option<&str>, existing: &BTreeMap<String, Arc<Session>>) -> Result<String> {
        let Some(hint) = program_hint else {
            return Ok(format!("session-{}", self.anonymous_counter.fetch_add(1, Ordering::SeqCst) + 1));
        };

        let stem = Path::new(hint)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(hint)
            .to_string();

        let last_segment = stem.rsplit('.').next().unwrap_or(&stem).to_lowercase();
        if WELL_KNOWN_SUFFIXES.contains(&last_segment.as_str()) {
            return collide_suffix(&last_segment, existing);
        }

        collide_suffix(&kebab_case(&stem), existing)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn collide_suffix(base: &str, existing: &BTreeMap<String, Arc<Session>>) -> Result<String> {
    if !existing.contains_key(base) {
        return Ok(base.to_string());
    }
    for n in 2..=MAX_COLLISION_ATTEMPTS {
        let candidate = format!("{}-{}", base, n);
        if !existing.contains_key(&candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::Configuration(format!(
        "could not derive a unique session id from '{}'",
        base
    )))
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

fn format_known_ids(requested: &str, sessions: &BTreeMap<String, Arc<Session>>) -> String {
    let known: Vec<&str> = sessions.keys().map(|s| s.as_str()).collect();
    format!("session '{}' not found (known: [{}])", requested, known.join(", "))
}
