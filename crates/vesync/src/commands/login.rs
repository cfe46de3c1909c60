//! `vesync login`: authenticate and cache the session.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::{debug, warn};

use vesync_core::{Manager, SessionStore};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginSummary {
    account_id: String,
    username: String,
    region: String,
    api_base_url: String,
    cached: bool,
}

pub async fn handle(args: LoginArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ctx = Context::load(global)?;
    let username = ctx.username()?;
    let store = Arc::new(ctx.session_store());

    if args.force {
        if let Err(e) = store.clear().await {
            warn!(error = %e, "could not remove cached session");
        }
    }

    let cached = !args.force
        && matches!(
            store.load().await,
            Ok(Some(ref s)) if s.is_valid() && s.belongs_to(&username)
        );

    let config = ctx.manager_config(!cached)?;
    let password = config.password.clone();
    let manager = Manager::builder(config).session_store(store).build()?;

    let from_cache = cached && manager.restore_session().await;
    if !from_cache && !manager.login().await {
        return Err(CliError::LoginFailed {
            profile: ctx.profile_name.clone(),
        });
    }

    if args.remember && !password.expose_secret().is_empty() {
        vesync_config::store_password(&ctx.profile_name, password.expose_secret())?;
        debug!(profile = %ctx.profile_name, "password stored in keyring");
    }

    let session = manager.session().await.ok_or_else(|| CliError::NoSession {
        profile: ctx.profile_name.clone(),
    })?;
    let summary = LoginSummary {
        account_id: session.account_id,
        username,
        region: manager.current_region().await.to_string(),
        api_base_url: manager.api_base_url().await,
        cached: from_cache,
    };

    let color = output::should_color(&global.color);
    let rendered = output::render_single(
        &global.output,
        &summary,
        |s| {
            let status = if s.cached { "cached session" } else { "logged in" };
            output::detail_lines(
                &[
                    ("Status", output::paint_status(status, color)),
                    ("Account", s.account_id.clone()),
                    ("User", s.username.clone()),
                    ("Region", s.region.clone()),
                    ("Base URL", s.api_base_url.clone()),
                ],
                color,
            )
        },
        |s| s.account_id.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
