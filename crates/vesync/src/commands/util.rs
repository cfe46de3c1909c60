//! Shared helpers for account-bound commands.

use std::sync::Arc;

use tracing::debug;

use vesync_core::{Manager, SessionStore};

use crate::config::Context;
use crate::error::CliError;

/// Build a manager for the active profile and make sure it holds a session.
///
/// A cached session for the same account is reused without a network call;
/// otherwise a fresh login runs and its session is cached.
pub async fn connect(ctx: &Context) -> Result<Manager, CliError> {
    let username = ctx.username()?;
    let store = Arc::new(ctx.session_store());

    let cached = match store.load().await {
        Ok(Some(session)) => session.is_valid() && session.belongs_to(&username),
        Ok(None) => false,
        Err(e) => {
            debug!(error = %e, "ignoring unreadable session file");
            false
        }
    };

    let manager = Manager::builder(ctx.manager_config(!cached)?)
        .session_store(store)
        .build()?;

    if cached && manager.restore_session().await {
        debug!("using cached session");
        return Ok(manager);
    }

    if manager.login().await {
        Ok(manager)
    } else {
        Err(CliError::LoginFailed {
            profile: ctx.profile_name.clone(),
        })
    }
}

/// Shorten a token for display.
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}... ({} chars)", token.chars().count())
}

/// Render epoch seconds as RFC 3339.
pub fn format_epoch_secs(secs: Option<i64>) -> String {
    secs.and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map_or_else(|| "-".into(), |dt| dt.to_rfc3339())
}

/// Render epoch milliseconds as RFC 3339.
pub fn format_epoch_millis(millis: Option<i64>) -> String {
    millis
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map_or_else(|| "-".into(), |dt| dt.to_rfc3339())
}
