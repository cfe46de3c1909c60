// Regional endpoint resolution
//
// VeSync partitions accounts across regional clusters. A token issued by
// one cluster is rejected by the others, so the base URL that authenticated
// must be remembered verbatim. This module only holds the static tables and
// pure lookups; the precedence of overrides is applied by `resolve_base_url`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// US cluster host. Also serves CA, MX and JP accounts.
pub const US_API_BASE_URL: &str = "https://smartapi.vesync.com";

/// EU cluster host.
pub const EU_API_BASE_URL: &str = "https://smartapi.vesync.eu";

/// Countries whose accounts live on the EU cluster.
const EU_COUNTRY_CODES: &[&str] = &[
    "AD", "AT", "BE", "BG", "CH", "CY", "CZ", "DE", "DK", "EE", "ES", "FI", "FR", "GB", "GR",
    "HR", "HU", "IE", "IS", "IT", "LI", "LT", "LU", "LV", "MC", "MT", "NL", "NO", "PL", "PT",
    "RO", "SE", "SI", "SK", "SM", "UK", "VA",
];

/// A VeSync account region.
///
/// Serialized as its upper-case code (`"US"`, `"EU"`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    #[default]
    Us,
    Eu,
    Ca,
    Mx,
    Jp,
}

impl Region {
    /// Regional base URL. Every region has an entry; US is the fallback.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Eu => EU_API_BASE_URL,
            Self::Us | Self::Ca | Self::Mx | Self::Jp => US_API_BASE_URL,
        }
    }

    /// The primary cluster this region is served by.
    pub fn primary(self) -> Region {
        match self {
            Self::Eu => Self::Eu,
            Self::Us | Self::Ca | Self::Mx | Self::Jp => Self::Us,
        }
    }

    /// The other primary region, used for blind cross-region switches.
    ///
    /// Only meaningful between the two primary clusters: any US-cluster
    /// region toggles to EU, EU toggles to US.
    pub fn alternate(self) -> Region {
        match self.primary() {
            Self::Eu => Self::Us,
            _ => Self::Eu,
        }
    }
}

/// Map a country code to its region. Unknown or empty codes map to US.
pub fn region_from_country_code(code: &str) -> Region {
    let code = code.trim().to_ascii_uppercase();
    match code.as_str() {
        "CA" => Region::Ca,
        "MX" => Region::Mx,
        "JP" => Region::Jp,
        c if EU_COUNTRY_CODES.contains(&c) => Region::Eu,
        _ => Region::Us,
    }
}

/// Best-effort reverse lookup of a base URL.
///
/// Returns `None` for any host that is not a known VeSync cluster, which
/// marks the URL as a custom override that region switching must not touch.
pub fn region_from_api_base_url(base_url: &str) -> Option<Region> {
    let host = url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))?;

    if host == "vesync.eu" || host.ends_with(".vesync.eu") {
        Some(Region::Eu)
    } else if host == "vesync.com" || host.ends_with(".vesync.com") {
        Some(Region::Us)
    } else {
        None
    }
}

/// Regional base URL for `region`.
pub fn endpoint_for(region: Region) -> &'static str {
    region.endpoint()
}

/// `true` if `base_url` points at one of the known regional hosts.
pub fn is_known_endpoint(base_url: &str) -> bool {
    region_from_api_base_url(base_url).is_some()
}

/// The regional host table.
///
/// Owned by whoever drives requests (normally the manager) so the hosts can
/// be pointed elsewhere without process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub us: String,
    pub eu: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            us: US_API_BASE_URL.to_owned(),
            eu: EU_API_BASE_URL.to_owned(),
        }
    }
}

impl Endpoints {
    /// Base URL serving `region`.
    pub fn for_region(&self, region: Region) -> &str {
        match region.primary() {
            Region::Eu => self.eu.trim_end_matches('/'),
            _ => self.us.trim_end_matches('/'),
        }
    }

    /// Region served by `base_url`, or `None` for a custom host.
    pub fn region_of(&self, base_url: &str) -> Option<Region> {
        let url = base_url.trim_end_matches('/');
        if url == self.us.trim_end_matches('/') {
            Some(Region::Us)
        } else if url == self.eu.trim_end_matches('/') {
            Some(Region::Eu)
        } else {
            region_from_api_base_url(base_url)
        }
    }

    /// `true` if `base_url` is one of the regional hosts.
    pub fn is_known(&self, base_url: &str) -> bool {
        self.region_of(base_url).is_some()
    }

    /// Pick the base URL for a request from the precedence chain:
    /// override > country code override > stored session URL > region > US.
    pub fn resolve(&self, hints: &EndpointHints<'_>) -> String {
        if let Some(url) = hints.api_url_override {
            return url.trim_end_matches('/').to_owned();
        }
        if let Some(code) = hints.country_code_override {
            return self
                .for_region(region_from_country_code(code))
                .to_owned();
        }
        if let Some(url) = hints.session_base_url {
            return url.trim_end_matches('/').to_owned();
        }
        self.for_region(hints.region.unwrap_or_default()).to_owned()
    }
}

/// Inputs to base URL selection, highest precedence first.
#[derive(Debug, Clone, Default)]
pub struct EndpointHints<'a> {
    /// Caller-supplied URL override. Sticky, never auto-changed.
    pub api_url_override: Option<&'a str>,
    /// Caller-supplied country code.
    pub country_code_override: Option<&'a str>,
    /// Base URL that last authenticated successfully.
    pub session_base_url: Option<&'a str>,
    /// Stored or derived region.
    pub region: Option<Region>,
}

/// [`Endpoints::resolve`] against the default host table.
pub fn resolve_base_url(hints: &EndpointHints<'_>) -> String {
    Endpoints::default().resolve(hints)
}
