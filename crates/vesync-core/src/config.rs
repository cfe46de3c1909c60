// ── Runtime manager configuration ──
//
// Describes *how* to reach an account. Carries credentials and tuning but
// never touches disk; `vesync-config` or the host builds one and hands it in.

use std::time::Duration;

use secrecy::SecretString;

use vesync_api::transport::TlsMode;
use vesync_api::{Endpoints, Region, RetryPolicy};

use crate::exclusion::Exclusions;

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Configuration for one VeSync account.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Account e-mail.
    pub username: String,
    pub password: SecretString,
    /// IANA zone name; invalid values fall back to the default zone.
    pub time_zone: String,
    /// Explicit region to start logins from.
    pub region: Option<Region>,
    /// Explicit country code; selects the starting region when `region` is unset.
    pub country_code: Option<String>,
    /// Explicit base URL. Sticky: region logic never replaces it.
    pub api_url: Option<String>,
    /// Regional host table.
    pub endpoints: Endpoints,
    /// Devices skipped by the detail refresh in `update`.
    pub exclusions: Exclusions,
    pub retry: RetryPolicy,
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Minimum spacing between two `update` runs.
    pub update_interval: Duration,
    pub page_size: u32,
}

impl ManagerConfig {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            time_zone: vesync_api::request::DEFAULT_TIME_ZONE.to_owned(),
            region: None,
            country_code: None,
            api_url: None,
            endpoints: Endpoints::default(),
            exclusions: Exclusions::default(),
            retry: RetryPolicy::default(),
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// The region logins start from when no session says otherwise.
    pub fn initial_region(&self) -> Region {
        self.region
            .or_else(|| {
                self.country_code
                    .as_deref()
                    .map(vesync_api::region::region_from_country_code)
            })
            .unwrap_or_default()
    }

    /// `true` if the caller pinned the region or country explicitly.
    pub fn has_region_override(&self) -> bool {
        self.region.is_some() || self.country_code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ManagerConfig {
        ManagerConfig::new("a@b.c", SecretString::from("pw".to_owned()))
    }

    #[test]
    fn initial_region_prefers_explicit_region() {
        let mut cfg = config();
        assert_eq!(cfg.initial_region(), Region::Us);
        assert!(!cfg.has_region_override());

        cfg.country_code = Some("NL".into());
        assert_eq!(cfg.initial_region(), Region::Eu);

        cfg.region = Some(Region::Jp);
        assert_eq!(cfg.initial_region(), Region::Jp);
    }
}
