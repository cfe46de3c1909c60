// HTTP transport
//
// One request, one response. `ApiClient::call` never returns an error:
// network failures fold into an empty `ApiResponse` (no payload, status 0)
// so every caller handles "no answer" the same way. Recovery (re-login,
// region switch) is layered on top by the login engine and the manager.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::codes::{self, CodeClass};
use crate::error::Error;
use crate::request::APP_VERSION;

const USER_AGENT: &str = concat!("vesync-rs/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (test servers, intercepting proxies).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        Ok(builder.build()?)
    }
}

// ── Request / response ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
}

/// An endpoint-relative request. The base URL is supplied per call.
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            method: HttpMethod::Post,
            body: Some(body),
            headers: HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Normalized result of one exchange.
///
/// `status == 0` with no payload means the server never answered; treat it
/// as a transient failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub payload: Option<Value>,
    pub status: u16,
}

impl ApiResponse {
    /// The "no answer" result.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_answered(&self) -> bool {
        self.status != 0
    }

    /// The envelope's `code`, if the payload had one.
    pub fn code(&self) -> Option<i64> {
        self.payload.as_ref().and_then(codes::response_code)
    }

    pub fn msg(&self) -> Option<&str> {
        self.payload.as_ref().and_then(codes::response_msg)
    }

    pub fn class(&self) -> CodeClass {
        self.payload
            .as_ref()
            .map_or(CodeClass::Other, codes::classify_payload)
    }

    /// The envelope's `result` object.
    pub fn result(&self) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get("result"))
    }

    /// HTTP 2xx and `code == 0`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.class() == CodeClass::Success
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Thin wrapper around `reqwest::Client` that speaks the VeSync envelope.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Perform one exchange against `base_url`.
    pub async fn call(&self, base_url: &str, request: &ApiRequest) -> ApiResponse {
        let url = format!("{}{}", base_url.trim_end_matches('/'), request.path);
        let url = match url::Url::parse(&url) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = %url, error = %e, "invalid request URL");
                return ApiResponse::empty();
            }
        };

        debug!(method = ?request.method, %url, "sending request");

        let mut builder = match request.method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self.http.post(url),
            HttpMethod::Put => self.http.put(url),
        };
        builder = builder
            .header("appversion", APP_VERSION)
            .headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    error = %e,
                    timeout = e.is_timeout(),
                    connect = e.is_connect(),
                    "request failed without a response"
                );
                return ApiResponse::empty();
            }
        };

        let status = resp.status().as_u16();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(status, error = %e, "failed to read response body");
                return ApiResponse {
                    payload: None,
                    status,
                };
            }
        };

        let payload = match serde_json::from_str::<Value>(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                let preview = body.chars().take(200).collect::<String>();
                warn!(status, error = %e, body = ?preview, "response is not JSON");
                None
            }
        };

        trace!(status, code = ?payload.as_ref().and_then(codes::response_code), "response received");
        ApiResponse { payload, status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_response_is_unanswered() {
        let resp = ApiResponse::empty();
        assert!(!resp.is_answered());
        assert!(!resp.is_success());
        assert_eq!(resp.class(), CodeClass::Other);
    }

    #[test]
    fn success_requires_zero_code_and_2xx() {
        let ok = ApiResponse {
            payload: Some(json!({ "code": 0, "result": { "a": 1 } })),
            status: 200,
        };
        assert!(ok.is_success());
        assert_eq!(ok.result().and_then(|r| r.get("a")), Some(&json!(1)));

        let server_error = ApiResponse {
            payload: Some(json!({ "code": 0 })),
            status: 500,
        };
        assert!(!server_error.is_success());

        let api_error = ApiResponse {
            payload: Some(json!({ "code": -11_201_000, "msg": "password error" })),
            status: 200,
        };
        assert!(!api_error.is_success());
        assert_eq!(api_error.class(), CodeClass::Credentials);
        assert_eq!(api_error.msg(), Some("password error"));
    }
}
