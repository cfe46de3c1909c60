//! `vesync config`: inspect and edit the configuration file.

use serde::Serialize;

use crate::cli::{ConfigArgs, ConfigCommand, ConfigSetArgs, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

/// Profile as shown to the user; plaintext passwords are masked.
#[derive(Debug, Serialize)]
struct ProfileView<'a> {
    name: &'a str,
    default: bool,
    #[serde(flatten)]
    profile: Profile,
}

fn masked(profile: &Profile) -> Profile {
    let mut profile = profile.clone();
    if profile.password.is_some() {
        profile.password = Some("********".into());
    }
    profile
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => show(global),
        ConfigCommand::Profiles => profiles(global),
        ConfigCommand::Set(set_args) => set(&set_args, global),
        ConfigCommand::SetPassword => set_password(global),
    }
}

fn show(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config()?;
    let name = config::active_profile_name(global, &cfg);
    let mut profile = cfg.profiles.get(&name).map(masked).unwrap_or_default();
    config::apply_overrides(&mut profile, global);

    let view = ProfileView {
        name: &name,
        default: cfg.default_profile.as_deref() == Some(name.as_str()),
        profile,
    };
    let rendered = output::render_single(
        &global.output,
        &view,
        |v| toml::to_string_pretty(&v.profile).unwrap_or_default(),
        |v| v.name.to_owned(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn profiles(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config()?;
    let mut names: Vec<&String> = cfg.profiles.keys().collect();
    names.sort();

    let default = cfg.default_profile.as_deref();
    let lines: Vec<String> = names
        .into_iter()
        .map(|name| {
            if Some(name.as_str()) == default {
                format!("{name} (default)")
            } else {
                name.clone()
            }
        })
        .collect();
    output::print_output(&lines.join("\n"), global.quiet);
    Ok(())
}

fn set(args: &ConfigSetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg: Config = config::load_config()?;
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| config::active_profile_name(global, &cfg));

    if let Some(ref region) = global.region {
        vesync_config::parse_region(region)?;
    }

    let profile = cfg.profiles.entry(name.clone()).or_default();
    config::apply_overrides(profile, global);
    if args.default {
        cfg.default_profile = Some(name.clone());
    }

    config::save_config(&cfg)?;
    if !global.quiet {
        eprintln!(
            "Profile '{name}' saved to {}",
            config::config_path().display()
        );
    }
    Ok(())
}

fn set_password(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config()?;
    let name = config::active_profile_name(global, &cfg);
    let password = rpassword::prompt_password(format!("Password for profile '{name}': "))?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "must not be empty".into(),
        });
    }
    vesync_config::store_password(&name, &password)?;
    if !global.quiet {
        eprintln!("Password for '{name}' stored in the system keyring");
    }
    Ok(())
}
