// ── Core error types ──
//
// Login and device-list failures never surface here: those report through
// boolean results and logs. `CoreError` covers construction-time mistakes
// and collaborator (session store) failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session store error: {message}")]
    SessionStore { message: String },

    #[error(transparent)]
    Api(#[from] vesync_api::Error),
}

impl CoreError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn session_store(message: impl Into<String>) -> Self {
        Self::SessionStore {
            message: message.into(),
        }
    }
}
