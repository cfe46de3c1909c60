// Credential & request builder
//
// Builds the JSON bodies and headers the VeSync app sends. Bodies are pure
// functions of their inputs (trace id included) so they can be asserted on
// directly; only `trace_id()` reads the clock.

use md5::{Digest, Md5};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tracing::debug;

pub const APP_VERSION: &str = "5.6.60";
pub const PHONE_BRAND: &str = "SM N9005";
pub const PHONE_OS: &str = "Android";
pub const CLIENT_TYPE: &str = "vesyncApp";
pub const USER_TYPE: &str = "1";
pub const APP_ID: &str = "eldodkfj";
pub const DEFAULT_TIME_ZONE: &str = "America/New_York";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_COUNTRY_CODE: &str = "US";

pub const DEVICE_LIST_PATH: &str = "/cloud/v1/deviceManaged/devices";

const MAX_TIME_ZONE_LEN: usize = 64;

/// Lowercase hex MD5 of the password, as the vendor protocol requires.
pub fn hash_password(password: &str) -> String {
    hex::encode(Md5::digest(password.as_bytes()))
}

/// Trace id for a new request: current epoch seconds.
pub fn trace_id() -> String {
    chrono::Utc::now().timestamp().to_string()
}

/// `true` if `tz` is a plausible IANA zone name.
pub fn is_valid_time_zone(tz: &str) -> bool {
    !tz.is_empty()
        && tz.len() <= MAX_TIME_ZONE_LEN
        && tz
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '+' | '-'))
}

/// Validated time zone, or the default when `tz` is unusable.
pub fn sanitize_time_zone(tz: &str) -> String {
    let tz = tz.trim();
    if is_valid_time_zone(tz) {
        tz.to_owned()
    } else {
        debug!(time_zone = tz, "invalid time zone, using default");
        DEFAULT_TIME_ZONE.to_owned()
    }
}

/// Builds request bodies and headers for one app instance.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    terminal_id: String,
    time_zone: String,
    language: String,
}

impl RequestBuilder {
    /// `terminal_id` is the per-process app instance identifier; the time
    /// zone is sanitized on the way in.
    pub fn new(terminal_id: impl Into<String>, time_zone: &str) -> Self {
        Self {
            terminal_id: terminal_id.into(),
            time_zone: sanitize_time_zone(time_zone),
            language: DEFAULT_LANGUAGE.to_owned(),
        }
    }

    pub fn terminal_id(&self) -> &str {
        &self.terminal_id
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }

    // ── New flow ─────────────────────────────────────────────────────

    /// Step 1 of the new flow: exchange credentials for an authorize code.
    pub fn auth_by_password(
        &self,
        email: &str,
        password: &SecretString,
        country_code: Option<&str>,
        trace_id: &str,
    ) -> Value {
        let mut body = self.account_body("authByPWDOrOTM", trace_id);
        body.insert("email".into(), json!(email));
        body.insert(
            "password".into(),
            json!(hash_password(password.expose_secret())),
        );
        body.insert("authProtocolType".into(), json!("generic"));
        body.insert("sourceAppID".into(), json!(APP_ID));
        body.insert("appID".into(), json!(APP_ID));
        body.insert(
            "userCountryCode".into(),
            json!(country_code.unwrap_or(DEFAULT_COUNTRY_CODE)),
        );
        Value::Object(body)
    }

    /// Step 2 of the new flow: exchange the authorize code for a token.
    ///
    /// `biz_token` is the continuation token handed back by a cross-region
    /// rejection; when present the request asks the server to honour the
    /// last region it suggested.
    pub fn login_by_authorize_code(
        &self,
        authorize_code: &str,
        biz_token: Option<&str>,
        country_code: Option<&str>,
        trace_id: &str,
    ) -> Value {
        let mut body = self.account_body("loginByAuthorizeCode4Vesync", trace_id);
        body.insert("authorizeCode".into(), json!(authorize_code));
        body.insert("emailSubscriptions".into(), json!(false));
        body.insert(
            "userCountryCode".into(),
            json!(country_code.unwrap_or(DEFAULT_COUNTRY_CODE)),
        );
        if let Some(biz_token) = biz_token {
            body.insert("bizToken".into(), json!(biz_token));
            body.insert("regionChange".into(), json!("lastRegion"));
        }
        Value::Object(body)
    }

    // ── Legacy flow ──────────────────────────────────────────────────

    /// Single-call username/password login.
    pub fn legacy_login(&self, email: &str, password: &SecretString, trace_id: &str) -> Value {
        let mut body = self.app_body("login", trace_id);
        body.insert("email".into(), json!(email));
        body.insert(
            "password".into(),
            json!(hash_password(password.expose_secret())),
        );
        body.insert("devToken".into(), json!(""));
        body.insert("userType".into(), json!(USER_TYPE));
        Value::Object(body)
    }

    // ── Authenticated calls ──────────────────────────────────────────

    /// Common body for calls made with a session token.
    pub fn authenticated_body(
        &self,
        method: &str,
        token: &str,
        account_id: &str,
        trace_id: &str,
    ) -> Map<String, Value> {
        let mut body = self.app_body(method, trace_id);
        body.insert("token".into(), json!(token));
        body.insert("accountID".into(), json!(account_id));
        body
    }

    /// One page of the account's device list.
    pub fn device_list(
        &self,
        token: &str,
        account_id: &str,
        page_no: u32,
        page_size: u32,
        trace_id: &str,
    ) -> Value {
        let mut body = self.authenticated_body("devices", token, account_id, trace_id);
        body.insert("pageNo".into(), json!(page_no));
        body.insert("pageSize".into(), json!(page_size));
        Value::Object(body)
    }

    /// Headers for calls made with a session token.
    pub fn headers(&self, token: &str, account_id: &str) -> HeaderMap {
        let pairs = [
            ("accept-language", self.language.as_str()),
            ("accountid", account_id),
            ("appversion", APP_VERSION),
            ("content-type", "application/json"),
            ("tk", token),
            ("tz", self.time_zone.as_str()),
        ];

        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    headers.insert(HeaderName::from_static(name), v);
                }
                Err(_) => debug!(header = name, "skipping header with invalid value"),
            }
        }
        headers
    }

    // ── Shared fields ────────────────────────────────────────────────

    fn account_body(&self, method: &str, trace_id: &str) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("acceptLanguage".into(), json!(self.language));
        body.insert("accountID".into(), json!(""));
        body.insert("clientInfo".into(), json!(PHONE_BRAND));
        body.insert("clientType".into(), json!(CLIENT_TYPE));
        body.insert("clientVersion".into(), json!(format!("VeSync {APP_VERSION}")));
        body.insert("debugMode".into(), json!(false));
        body.insert("method".into(), json!(method));
        body.insert("osInfo".into(), json!(PHONE_OS));
        body.insert("terminalId".into(), json!(self.terminal_id));
        body.insert("timeZone".into(), json!(self.time_zone));
        body.insert("token".into(), json!(""));
        body.insert("traceId".into(), json!(trace_id));
        body
    }

    fn app_body(&self, method: &str, trace_id: &str) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("acceptLanguage".into(), json!(self.language));
        body.insert("appVersion".into(), json!(APP_VERSION));
        body.insert("phoneBrand".into(), json!(PHONE_BRAND));
        body.insert("phoneOS".into(), json!(PHONE_OS));
        body.insert("method".into(), json!(method));
        body.insert("terminalId".into(), json!(self.terminal_id));
        body.insert("timeZone".into(), json!(self.time_zone));
        body.insert("traceId".into(), json!(trace_id));
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn builder() -> RequestBuilder {
        RequestBuilder::new("2abc", "Europe/Berlin")
    }

    #[test]
    fn password_digest_is_lowercase_hex_md5() {
        assert_eq!(hash_password("password"), "5f4dcc3b5aa765d61d8327deb882cf99");
        assert_eq!(hash_password(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn time_zone_validation() {
        assert!(is_valid_time_zone("America/New_York"));
        assert!(is_valid_time_zone("Etc/GMT+5"));
        assert!(!is_valid_time_zone(""));
        assert!(!is_valid_time_zone("Europe/Berlin; rm -rf"));
        assert_eq!(sanitize_time_zone("bad zone!"), DEFAULT_TIME_ZONE);
        assert_eq!(sanitize_time_zone(" Asia/Tokyo "), "Asia/Tokyo");
    }

    #[test]
    fn step_one_body_hashes_password() {
        let password = SecretString::from("password".to_owned());
        let body = builder().auth_by_password("a@b.c", &password, Some("DE"), "1700000000");

        assert_eq!(body["method"], "authByPWDOrOTM");
        assert_eq!(body["email"], "a@b.c");
        assert_eq!(body["password"], "5f4dcc3b5aa765d61d8327deb882cf99");
        assert_eq!(body["userCountryCode"], "DE");
        assert_eq!(body["terminalId"], "2abc");
        assert_eq!(body["timeZone"], "Europe/Berlin");
        assert_eq!(body["traceId"], "1700000000");
    }

    #[test]
    fn step_two_body_carries_biz_token_only_when_present() {
        let plain = builder().login_by_authorize_code("code-1", None, None, "1");
        assert_eq!(plain["authorizeCode"], "code-1");
        assert_eq!(plain["userCountryCode"], DEFAULT_COUNTRY_CODE);
        assert!(plain.get("bizToken").is_none());
        assert!(plain.get("regionChange").is_none());

        let retry = builder().login_by_authorize_code("code-1", Some("biz"), Some("FR"), "1");
        assert_eq!(retry["bizToken"], "biz");
        assert_eq!(retry["regionChange"], "lastRegion");
        assert_eq!(retry["userCountryCode"], "FR");
    }

    #[test]
    fn legacy_body() {
        let password = SecretString::from("password".to_owned());
        let body = builder().legacy_login("a@b.c", &password, "9");
        assert_eq!(body["method"], "login");
        assert_eq!(body["userType"], USER_TYPE);
        assert_eq!(body["appVersion"], APP_VERSION);
        assert_eq!(body["password"], "5f4dcc3b5aa765d61d8327deb882cf99");
    }

    #[test]
    fn device_list_body_and_headers() {
        let b = builder();
        let body = b.device_list("tok", "acct", 2, 50, "5");
        assert_eq!(body["method"], "devices");
        assert_eq!(body["token"], "tok");
        assert_eq!(body["accountID"], "acct");
        assert_eq!(body["pageNo"], 2);
        assert_eq!(body["pageSize"], 50);

        let headers = b.headers("tok", "acct");
        assert_eq!(headers.get("tk").and_then(|v| v.to_str().ok()), Some("tok"));
        assert_eq!(
            headers.get("accountid").and_then(|v| v.to_str().ok()),
            Some("acct")
        );
        assert_eq!(
            headers.get("tz").and_then(|v| v.to_str().ok()),
            Some("Europe/Berlin")
        );
    }

    #[test]
    fn headers_skip_unencodable_values() {
        let headers = builder().headers("tok\nen", "acct");
        assert!(headers.get("tk").is_none());
        assert!(headers.get("accountid").is_some());
    }
}
