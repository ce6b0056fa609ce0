use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("DAP error: {0}")]
    Dap(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("No running debug session (transport not attached): {0}")]
    NotRunning(String),

    #[error("Session is reconnecting after a rebuild; please retry shortly")]
    Reconnecting,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// JSON-RPC-style error code for the ambient tool/RPC transport harness.
    pub fn error_code(&self) -> i32 {
        match self {
            Error::SessionNotFound(_) => -32001,
            Error::Dap(_) => -32002,
            Error::Process(_) => -32003,
            Error::NotRunning(_) => -32004,
            Error::Reconnecting => -32005,
            Error::Configuration(_) => -32006,
            Error::Timeout(_) => -32007,
            Error::InvalidRequest(_) => -32600,
            Error::MethodNotFound(_) => -32601,
            Error::Internal(_) => -32603,
            Error::Io(_) | Error::Json(_) => -32603,
        }
    }
}
