#![allow(clippy::unwrap_used)]
// Config loading, credential resolution, and session file tests.

use std::path::Path;

use figment::Jail;
use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;

use vesync_config::{
    Config, FileSessionStore, Profile, load_config_from, profile_to_manager_config,
    resolve_password, save_config_to,
};
use vesync_core::{AuthFlow, Region, Session, SessionStore};

// ── Loading ─────────────────────────────────────────────────────────

#[test]
fn test_missing_file_yields_defaults() {
    Jail::expect_with(|_jail| {
        let config = load_config_from(Path::new("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.timeout, 30);
        assert_eq!(config.defaults.retry_attempts, 3);
        assert!(config.profiles.is_empty());
        Ok(())
    });
}

#[test]
fn test_file_and_env_are_merged() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
                default_profile = "home"

                [defaults]
                timeout = 10

                [profiles.home]
                username = "user@example.com"
                region = "EU"
                country_code = "DE"

                [profiles.home.exclude]
                models = ["ESW15-USA"]
                name_patterns = ["^garage"]
            "#,
        )?;
        jail.set_env("VESYNC_DEFAULTS__UPDATE_INTERVAL", "600");

        let config = load_config_from(Path::new("config.toml")).unwrap();
        assert_eq!(config.profile_name(None), "home");
        assert_eq!(config.defaults.timeout, 10);
        assert_eq!(config.defaults.update_interval, 600);

        let home = &config.profiles["home"];
        assert_eq!(home.region.as_deref(), Some("EU"));
        assert_eq!(home.exclude.models, ["ESW15-USA"]);
        assert_eq!(home.exclude.name_patterns, ["^garage"]);
        Ok(())
    });
}

#[test]
fn test_invalid_toml_is_an_error() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[defaults]\ntimeout = \"soon\"\n")?;
        assert!(load_config_from(Path::new("config.toml")).is_err());
        Ok(())
    });
}

#[test]
fn test_save_then_load() {
    Jail::expect_with(|_jail| {
        let mut config = Config::default();
        config.profiles.insert(
            "work".into(),
            Profile {
                username: Some("work@example.com".into()),
                country_code: Some("CA".into()),
                ..Profile::default()
            },
        );
        save_config_to(&config, Path::new("nested/config.toml")).unwrap();

        let loaded = load_config_from(Path::new("nested/config.toml")).unwrap();
        assert_eq!(loaded.profiles["work"], config.profiles["work"]);
        Ok(())
    });
}

// ── Credentials ─────────────────────────────────────────────────────

#[test]
fn test_password_env_beats_global_env_and_plaintext() {
    Jail::expect_with(|jail| {
        jail.set_env("HOME_VESYNC_PW", "from-profile-env");
        jail.set_env("VESYNC_PASSWORD", "from-global-env");
        let profile = Profile {
            password_env: Some("HOME_VESYNC_PW".into()),
            password: Some("plaintext".into()),
            ..Profile::default()
        };
        let pw = resolve_password(&profile, "jail-profile").unwrap();
        assert_eq!(pw.expose_secret(), "from-profile-env");
        Ok(())
    });
}

#[test]
fn test_global_env_password() {
    Jail::expect_with(|jail| {
        jail.set_env("VESYNC_PASSWORD", "from-global-env");
        let profile = Profile {
            password: Some("plaintext".into()),
            ..Profile::default()
        };
        let pw = resolve_password(&profile, "jail-profile").unwrap();
        assert_eq!(pw.expose_secret(), "from-global-env");
        Ok(())
    });
}

#[test]
fn test_profile_to_manager_config() {
    Jail::expect_with(|jail| {
        jail.set_env("VESYNC_PASSWORD", "secret");
        let profile = Profile {
            username: Some("user@example.com".into()),
            region: Some("jp".into()),
            api_url: Some("https://proxy.example.com".into()),
            ..Profile::default()
        };
        let config = profile_to_manager_config(&profile, "jail-profile", &Default::default())
            .unwrap();
        assert_eq!(config.username, "user@example.com");
        assert_eq!(config.region, Some(Region::Jp));
        assert_eq!(config.api_url.as_deref(), Some("https://proxy.example.com"));
        assert_eq!(config.password.expose_secret(), "secret");
        Ok(())
    });
}

// ── Session file ────────────────────────────────────────────────────

fn sample_session() -> Session {
    Session {
        token: "tk".into(),
        account_id: "42".into(),
        country_code: Some("US".into()),
        region: Some(Region::Us),
        api_base_url: Some("https://smartapi.vesync.com".into()),
        auth_flow_used: AuthFlow::New,
        last_validated_at: Some(1_700_000_000_000),
        username: Some("user@example.com".into()),
        ..Session::default()
    }
}

#[tokio::test]
async fn test_session_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path().join("sessions/home.json"));

    assert_eq!(store.load().await.unwrap(), None);

    store.save(&sample_session()).await.unwrap();
    assert!(store.path().exists());
    assert!(!dir.path().join("sessions/home.json.tmp").exists());
    assert_eq!(store.load().await.unwrap(), Some(sample_session()));

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert!(raw.contains("\"accountId\": \"42\""));
    assert!(raw.contains("\"apiBaseUrl\""));

    store.clear().await.unwrap();
    assert_eq!(store.load().await.unwrap(), None);
    store.clear().await.unwrap();
}

#[tokio::test]
async fn test_corrupt_session_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = FileSessionStore::new(&path);
    assert!(store.load().await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_session_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path().join("session.json"));
    store.save(&sample_session()).await.unwrap();

    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
