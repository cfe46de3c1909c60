// Authentication engine
//
// One `login` call runs up to `RetryPolicy::attempts` attempts. Each attempt
// tries the two-step flow against the starting region, switches once to the
// alternate primary region on a cross-region rejection, and falls back to
// the single-call legacy login when the new flow fails for any other
// reason. Credential and app-version rejections end the whole call at once.
//
//   attempt ─► new flow (region A) ─┬─ ok ──────────────────────► session
//                                   ├─ bad credentials ─────────► fatal
//                                   ├─ cross-region ─► new flow (region B)
//                                   │                   └─ cross-region ─► fatal (ambiguous)
//                                   └─ other failure ─► legacy ─┬─ ok ─► session
//                                                               └─ fail ─► backoff, next attempt

mod legacy;
mod new_flow;

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::codes::CodeClass;
use crate::region::{self, Endpoints, Region};
use crate::request::RequestBuilder;
use crate::token::TokenHints;
use crate::transport::{ApiClient, ApiResponse};

pub const AUTH_BY_PASSWORD_PATH: &str = "/globalPlatform/api/accountAuth/v1/authByPWDOrOTM";
pub const LOGIN_BY_AUTHORIZE_CODE_PATH: &str =
    "/user/api/accountManage/v1/loginByAuthorizeCode4Vesync";
pub const LEGACY_LOGIN_PATH: &str = "/cloud/v1/user/login";

// ── Public types ─────────────────────────────────────────────────────

/// Which protocol variant produced a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthFlow {
    #[default]
    New,
    Legacy,
}

/// Outer retry budget for one `login` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    /// Delay after the first failed attempt; doubles after each further one.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (zero-based): `initial * 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Inputs for one login call.
#[derive(Debug, Clone, Copy)]
pub struct LoginParams<'a> {
    pub username: &'a str,
    pub password: &'a SecretString,
    /// Country code sent as `userCountryCode`.
    pub country_code: Option<&'a str>,
    /// Region whose endpoint is tried first.
    pub region: Region,
    /// Explicit base URL. When set, region switching is disabled.
    pub api_url_override: Option<&'a str>,
}

/// A freshly issued session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub account_id: String,
    pub country_code: Option<String>,
    pub region: Region,
    /// The exact base URL that issued the token.
    pub api_base_url: String,
    pub flow: AuthFlow,
    pub hints: TokenHints,
}

/// Why a login call gave up.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("invalid credentials (code {code}): {message}")]
    InvalidCredentials { code: i64, message: String },

    #[error(
        "account region is ambiguous: cross-region rejection from {attempted:?}; \
         configure a country code"
    )]
    AmbiguousRegion { attempted: Vec<Region> },

    #[error("client version rejected by server (code {code})")]
    AppVersionTooLow { code: i64 },

    #[error("login failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: String },
}

impl LoginError {
    /// `true` if retrying with the same inputs cannot succeed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Exhausted { .. })
    }
}

// ── Internal step outcomes ───────────────────────────────────────────

/// Region information attached to a cross-region rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionHint {
    /// Continuation token for an in-place step 2 retry.
    pub biz_token: Option<String>,
    /// Country code suggested by the server.
    pub country_code: Option<String>,
    /// Region suggested by the server.
    pub region: Option<Region>,
}

impl RegionHint {
    pub fn from_result(result: Option<&Value>) -> Self {
        let field = |name: &str| {
            result
                .and_then(|r| r.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        let region = field("currentRegion").and_then(|r| Region::from_str(&r).ok());
        Self {
            biz_token: field("bizToken"),
            country_code: field("countryCode"),
            region,
        }
    }

    /// Server-suggested region: explicit region first, then country code.
    pub fn suggested_region(&self) -> Option<Region> {
        self.region.or_else(|| {
            self.country_code
                .as_deref()
                .map(region::region_from_country_code)
        })
    }
}

enum Step<T> {
    Done(T),
    CrossRegion(RegionHint),
    Fatal(LoginError),
    Failed(String),
}

/// Map a response onto the step outcome, yielding the `result` object on success.
fn interpret(resp: &ApiResponse, step: &str) -> Step<Value> {
    if !resp.is_answered() {
        return Step::Failed(format!("{step}: no response from server"));
    }
    let Some(ref payload) = resp.payload else {
        return Step::Failed(format!("{step}: non-JSON response (HTTP {})", resp.status));
    };

    let code = resp.code().unwrap_or_default();
    let message = resp.msg().unwrap_or_default().to_owned();
    match resp.class() {
        CodeClass::Success if (200..300).contains(&resp.status) => match payload.get("result") {
            Some(result) => Step::Done(result.clone()),
            None => Step::Failed(format!(
                "{step}: success without result (keys: {:?})",
                payload_keys(payload)
            )),
        },
        CodeClass::Success => Step::Failed(format!("{step}: HTTP {}", resp.status)),
        CodeClass::CrossRegion => Step::CrossRegion(RegionHint::from_result(resp.result())),
        CodeClass::Credentials => Step::Fatal(LoginError::InvalidCredentials { code, message }),
        CodeClass::AppVersionTooLow => Step::Fatal(LoginError::AppVersionTooLow { code }),
        CodeClass::TokenExpired | CodeClass::Other => match resp.code() {
            Some(code) => Step::Failed(format!("{step}: error {code}: {message}")),
            None => Step::Failed(format!(
                "{step}: response without code (HTTP {}, keys: {:?})",
                resp.status,
                payload_keys(payload)
            )),
        },
    }
}

fn payload_keys(value: &Value) -> Vec<&str> {
    value
        .as_object()
        .map(|o| o.keys().map(String::as_str).collect())
        .unwrap_or_default()
}

/// String-or-number field from a result object.
fn id_field(result: &Value, name: &str) -> Option<String> {
    match result.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build a session from a token-bearing `result`, or describe what is missing.
fn session_from_result(
    result: &Value,
    base_url: &str,
    region: Region,
    flow: AuthFlow,
) -> Result<AuthSession, String> {
    let token = id_field(result, "token");
    let account_id = id_field(result, "accountID");
    let (Some(token), Some(account_id)) = (token, account_id) else {
        return Err(format!(
            "response missing token or accountID (keys: {:?})",
            payload_keys(result)
        ));
    };

    Ok(AuthSession {
        hints: TokenHints::decode_lossy(&token),
        token,
        account_id,
        country_code: id_field(result, "countryCode"),
        region,
        api_base_url: base_url.trim_end_matches('/').to_owned(),
        flow,
    })
}

// ── Engine ───────────────────────────────────────────────────────────

enum AttemptError {
    Fatal(LoginError),
    Retryable(String),
}

/// Runs the login protocol. Stateless between calls.
#[derive(Debug, Clone)]
pub struct Authenticator {
    client: ApiClient,
    requests: RequestBuilder,
    endpoints: Endpoints,
}

impl Authenticator {
    pub fn new(client: ApiClient, requests: RequestBuilder) -> Self {
        Self {
            client,
            requests,
            endpoints: Endpoints::default(),
        }
    }

    /// Replace the regional host table.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn requests(&self) -> &RequestBuilder {
        &self.requests
    }

    /// Log in, retrying failed attempts with exponential backoff.
    ///
    /// Fatal rejections (credentials, app version, ambiguous region) return
    /// immediately without consuming the retry budget.
    pub async fn login(
        &self,
        params: &LoginParams<'_>,
        policy: &RetryPolicy,
    ) -> Result<AuthSession, LoginError> {
        let attempts = policy.attempts.max(1);
        let mut last = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = policy.backoff(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis(), "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(params).await {
                Ok(session) => {
                    log_region_mismatch(&session);
                    info!(
                        region = %session.region,
                        flow = ?session.flow,
                        base_url = %session.api_base_url,
                        "login successful"
                    );
                    return Ok(session);
                }
                Err(AttemptError::Fatal(e)) => {
                    if matches!(e, LoginError::AmbiguousRegion { .. }) {
                        error!(error = %e, "login aborted; set a country code for this account");
                    } else {
                        warn!(error = %e, "login rejected");
                    }
                    return Err(e);
                }
                Err(AttemptError::Retryable(reason)) => {
                    warn!(attempt = attempt + 1, of = attempts, %reason, "login attempt failed");
                    last = reason;
                }
            }
        }

        Err(LoginError::Exhausted { attempts, last })
    }

    /// One attempt: new flow with at most one region switch, then legacy.
    async fn attempt(&self, params: &LoginParams<'_>) -> Result<AuthSession, AttemptError> {
        let fallback_url: String;
        let fallback_region: Region;

        if let Some(url) = params.api_url_override {
            let region = self.endpoints.region_of(url).unwrap_or(params.region);
            match self.new_flow(url, region, params, params.country_code).await {
                Step::Done(session) => return Ok(session),
                Step::Fatal(e) => return Err(AttemptError::Fatal(e)),
                Step::CrossRegion(hint) => {
                    warn!(
                        url,
                        suggested = ?hint.suggested_region(),
                        "cross-region rejection from override URL; override is not switched"
                    );
                }
                Step::Failed(reason) => debug!(%reason, "new flow failed against override URL"),
            }
            fallback_url = url.to_owned();
            fallback_region = region;
        } else {
            let mut attempted: Vec<Region> = Vec::new();
            let mut region = params.region;
            let mut country_code = params.country_code.map(str::to_owned);

            loop {
                attempted.push(region);
                let url = self.endpoints.for_region(region).to_owned();
                match self
                    .new_flow(&url, region, params, country_code.as_deref())
                    .await
                {
                    Step::Done(session) => return Ok(session),
                    Step::Fatal(e) => return Err(AttemptError::Fatal(e)),
                    Step::CrossRegion(hint) => {
                        let next = region.alternate();
                        if attempted.iter().any(|r| r.primary() == next.primary()) {
                            return Err(AttemptError::Fatal(LoginError::AmbiguousRegion {
                                attempted,
                            }));
                        }
                        if let Some(code) = hint.country_code {
                            country_code = Some(code);
                        }
                        info!(from = %region, to = %next, "cross-region rejection, switching region");
                        region = next;
                    }
                    Step::Failed(reason) => {
                        debug!(%region, %reason, "new flow failed");
                        fallback_url = url;
                        fallback_region = region;
                        break;
                    }
                }
            }
        }

        match self
            .legacy_login(&fallback_url, fallback_region, params)
            .await
        {
            Step::Done(session) => Ok(session),
            Step::Fatal(e) => Err(AttemptError::Fatal(e)),
            Step::CrossRegion(hint) => Err(AttemptError::Retryable(format!(
                "legacy login: cross-region rejection (suggested {:?})",
                hint.suggested_region()
            ))),
            Step::Failed(reason) => Err(AttemptError::Retryable(reason)),
        }
    }
}

fn log_region_mismatch(session: &AuthSession) {
    if let Some(ref code) = session.country_code {
        let derived = region::region_from_country_code(code);
        if derived.primary() != session.region.primary() {
            info!(
                country_code = %code,
                derived = %derived,
                region = %session.region,
                "account country does not match the region that authenticated"
            );
        }
    }
}
