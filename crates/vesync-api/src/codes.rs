// Vendor response codes
//
// Every VeSync response carries a numeric `code`; zero is success. The
// non-zero codes that change control flow are grouped into classes here so
// the login engine and the manager can branch on a single enum.

use serde_json::Value;

/// Account data lives on a different regional cluster.
pub const CROSS_REGION_CODES: &[i64] = &[-11_260_022, -11_261_022];

/// Wrong password, unknown account, or locked account.
pub const CREDENTIAL_ERROR_CODES: &[i64] = &[
    -11_201_000,
    -11_202_000,
    -11_201_022,
    -11_202_022,
    -11_203_000,
];

/// Bearer token is no longer accepted.
pub const TOKEN_EXPIRED_CODES: &[i64] = &[4_001_004, -11_001_000];

/// The advertised app version is rejected by the server.
pub const APP_VERSION_TOO_LOW_CODE: i64 = -11_012_022;

const TOKEN_EXPIRED_MESSAGE: &str = "token expired";

/// Control-flow class of a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeClass {
    Success,
    CrossRegion,
    Credentials,
    TokenExpired,
    AppVersionTooLow,
    Other,
}

/// Classify a `code` / `msg` pair from a response envelope.
pub fn classify(code: i64, msg: Option<&str>) -> CodeClass {
    if code == 0 {
        CodeClass::Success
    } else if CROSS_REGION_CODES.contains(&code) {
        CodeClass::CrossRegion
    } else if CREDENTIAL_ERROR_CODES.contains(&code) {
        CodeClass::Credentials
    } else if TOKEN_EXPIRED_CODES.contains(&code) || msg.is_some_and(is_token_expired_message) {
        CodeClass::TokenExpired
    } else if code == APP_VERSION_TOO_LOW_CODE {
        CodeClass::AppVersionTooLow
    } else {
        CodeClass::Other
    }
}

/// Classify a raw response payload. A payload without a numeric `code`
/// classifies as [`CodeClass::Other`].
pub fn classify_payload(payload: &Value) -> CodeClass {
    match response_code(payload) {
        Some(code) => classify(code, response_msg(payload)),
        None => CodeClass::Other,
    }
}

/// The envelope's numeric `code`, accepting numeric strings.
pub fn response_code(payload: &Value) -> Option<i64> {
    match payload.get("code")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The envelope's `msg`, if present.
pub fn response_msg(payload: &Value) -> Option<&str> {
    payload.get("msg").and_then(Value::as_str)
}

fn is_token_expired_message(msg: &str) -> bool {
    msg.to_ascii_lowercase().contains(TOKEN_EXPIRED_MESSAGE)
}
