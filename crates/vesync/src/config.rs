//! CLI configuration -- thin wrapper around `vesync_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--username, --region, --api-url, etc.) and the interactive password
//! prompt.

use std::io::IsTerminal;

use secrecy::SecretString;
use tracing::debug;

use vesync_config::{ConfigError, FileSessionStore};
use vesync_core::ManagerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use vesync_config::{Config, Defaults, Profile, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// Layer CLI flag overrides on top of a profile.
pub fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref username) = global.username {
        profile.username = Some(username.clone());
    }
    if let Some(ref region) = global.region {
        profile.region = Some(region.clone());
    }
    if let Some(ref country_code) = global.country_code {
        profile.country_code = Some(country_code.clone());
    }
    if let Some(ref api_url) = global.api_url {
        profile.api_url = Some(api_url.clone());
    }
    if let Some(ref session_file) = global.session_file {
        profile.session_file = Some(session_file.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
}

/// Everything a command needs to build a `Manager`.
pub struct Context {
    pub profile_name: String,
    pub profile: Profile,
    pub defaults: Defaults,
}

impl Context {
    /// Load config, pick the active profile, and apply flag overrides.
    ///
    /// An explicitly named profile must exist; the implicit default may be
    /// absent when flags and env vars carry the account.
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let cfg = load_config()?;
        let profile_name = active_profile_name(global, &cfg);

        let mut profile = match cfg.profiles.get(&profile_name) {
            Some(profile) => profile.clone(),
            None if global.profile.is_some() => {
                let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
                names.sort();
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: if names.is_empty() {
                        "(none)".into()
                    } else {
                        names.join(", ")
                    },
                });
            }
            None => Profile::default(),
        };
        apply_overrides(&mut profile, global);

        Ok(Self {
            profile_name,
            profile,
            defaults: cfg.defaults,
        })
    }

    pub fn session_store(&self) -> FileSessionStore {
        FileSessionStore::new(vesync_config::profile_session_path(
            &self.profile,
            &self.profile_name,
        ))
    }

    pub fn username(&self) -> Result<String, CliError> {
        Ok(vesync_config::resolve_username(
            &self.profile,
            &self.profile_name,
        )?)
    }

    /// Resolve the password, prompting on a terminal when nothing is configured.
    pub fn password(&self, username: &str) -> Result<SecretString, CliError> {
        match vesync_config::resolve_password(&self.profile, &self.profile_name) {
            Ok(password) => Ok(password),
            Err(ConfigError::NoCredentials { .. }) if std::io::stdin().is_terminal() => {
                let password = rpassword::prompt_password(format!("Password for {username}: "))?;
                Ok(SecretString::from(password))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Build the manager configuration.
    ///
    /// With `password_required` unset, a missing password is tolerated: the
    /// caller holds a cached session and only needs the password if that
    /// session has to be replaced.
    pub fn manager_config(&self, password_required: bool) -> Result<ManagerConfig, CliError> {
        let username = self.username()?;
        let password = if password_required {
            self.password(&username)?
        } else {
            match vesync_config::resolve_password(&self.profile, &self.profile_name) {
                Ok(password) => password,
                Err(_) => {
                    debug!("no password configured; relying on the cached session");
                    SecretString::from(String::new())
                }
            }
        };
        Ok(vesync_config::build_manager_config(
            &self.profile,
            &self.defaults,
            username,
            password,
        )?)
    }
}
