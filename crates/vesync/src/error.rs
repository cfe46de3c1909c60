//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use vesync_config::ConfigError;
use vesync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Login failed for profile '{profile}'")]
    #[diagnostic(
        code(vesync::login_failed),
        help(
            "Check the e-mail and password, or set the account country with --country-code.\n\
             Rerun with -v to see why the server rejected the login."
        )
    )]
    LoginFailed { profile: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(vesync::no_credentials),
        help(
            "Pass --username and set VESYNC_PASSWORD, or run:\n\
             vesync config set --username <email> && vesync config set-password"
        )
    )]
    NoCredentials { profile: String },

    #[error("No cached session for profile '{profile}'")]
    #[diagnostic(code(vesync::no_session), help("Run: vesync login"))]
    NoSession { profile: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not fetch the device list")]
    #[diagnostic(
        code(vesync::device_list_failed),
        help(
            "The session may belong to another region or the service may be down.\n\
             Try: vesync login --force"
        )
    )]
    DeviceListFailed,

    #[error("Could not reach the VeSync API: {reason}")]
    #[diagnostic(code(vesync::connection_failed))]
    ConnectionFailed { reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vesync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vesync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: vesync config set {name} --username <email>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(vesync::config))]
    Config(Box<figment::Error>),

    #[error("Failed to write configuration: {message}")]
    #[diagnostic(code(vesync::config_write))]
    ConfigWrite { message: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(
        code(vesync::keyring),
        help("Set VESYNC_PASSWORD or password_env in the profile instead.")
    )]
    Keyring { message: String },

    #[error("Session store error: {message}")]
    #[diagnostic(code(vesync::session_store))]
    SessionStore { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(vesync::json))]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LoginFailed { .. } | Self::NoCredentials { .. } | Self::NoSession { .. } => {
                exit_code::AUTH
            }
            Self::DeviceListFailed | Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Library errors → CliError ────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Serialization(e) => Self::ConfigWrite {
                message: e.to_string(),
            },
            ConfigError::Io(e) => Self::Io(e),
            ConfigError::Json(e) => Self::Json(e),
            ConfigError::Keyring(e) => Self::Keyring {
                message: e.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => Self::Validation {
                field: "configuration".into(),
                reason: message,
            },
            CoreError::SessionStore { message } => Self::SessionStore { message },
            CoreError::Api(e) => Self::ConnectionFailed {
                reason: e.to_string(),
            },
        }
    }
}
