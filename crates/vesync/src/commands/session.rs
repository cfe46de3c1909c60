//! `vesync session`: inspect or drop the cached session.

use serde::Serialize;

use vesync_core::{Session, SessionStore};

use crate::cli::{GlobalOpts, SessionArgs, SessionCommand};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::util;

/// Session as shown to the user; the token never leaves redacted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    account_id: String,
    username: Option<String>,
    region: Option<String>,
    country_code: Option<String>,
    api_base_url: Option<String>,
    auth_flow_used: String,
    token: String,
    issued_at: String,
    expires_at: String,
    last_validated_at: String,
}

impl From<&Session> for SessionView {
    fn from(s: &Session) -> Self {
        Self {
            account_id: s.account_id.clone(),
            username: s.username.clone(),
            region: s.region.map(|r| r.to_string()),
            country_code: s.country_code.clone(),
            api_base_url: s.api_base_url.clone(),
            auth_flow_used: serde_json::to_value(s.auth_flow_used)
                .ok()
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default(),
            token: util::redact(&s.token),
            issued_at: util::format_epoch_secs(s.issued_at),
            expires_at: util::format_epoch_secs(s.expires_at),
            last_validated_at: util::format_epoch_millis(s.last_validated_at),
        }
    }
}

pub async fn handle(args: SessionArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::load(global)?;
    let store = ctx.session_store();

    match args.command {
        SessionCommand::Path => {
            output::print_output(&store.path().display().to_string(), global.quiet);
            Ok(())
        }
        SessionCommand::Clear => {
            store.clear().await?;
            if !global.quiet {
                eprintln!("Cached session for '{}' removed", ctx.profile_name);
            }
            Ok(())
        }
        SessionCommand::Show => {
            let session = store
                .load()
                .await?
                .filter(Session::is_valid)
                .ok_or_else(|| CliError::NoSession {
                    profile: ctx.profile_name.clone(),
                })?;
            let view = SessionView::from(&session);
            let color = output::should_color(&global.color);
            let dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());

            let rendered = output::render_single(
                &global.output,
                &view,
                |v| {
                    output::detail_lines(
                        &[
                            ("Account", v.account_id.clone()),
                            ("User", dash(&v.username)),
                            ("Region", dash(&v.region)),
                            ("Country", dash(&v.country_code)),
                            ("Base URL", dash(&v.api_base_url)),
                            ("Flow", v.auth_flow_used.clone()),
                            ("Token", v.token.clone()),
                            ("Issued", v.issued_at.clone()),
                            ("Expires", v.expires_at.clone()),
                            ("Validated", v.last_validated_at.clone()),
                        ],
                        color,
                    )
                },
                |v| v.account_id.clone(),
            )?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }
    }
}
