// Token hints
//
// VeSync tokens are JWT-shaped. The middle segment is decoded (never
// verified) to read `iat` / `exp`; the values are informational only and
// never used to expire a session locally.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::Error;

/// Timestamps read from a token's claims, in epoch seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenHints {
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
}

#[derive(Deserialize)]
struct Claims {
    iat: Option<i64>,
    exp: Option<i64>,
}

impl TokenHints {
    /// Decode the claims segment of a JWT-shaped token.
    pub fn decode(token: &str) -> Result<Self, Error> {
        let mut segments = token.split('.');
        let (Some(_header), Some(claims), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Error::Token("expected three dot-separated segments".into()));
        };

        let raw = URL_SAFE_NO_PAD
            .decode(claims.trim_end_matches('='))
            .map_err(|e| Error::Token(format!("claims are not base64url: {e}")))?;
        let claims: Claims = serde_json::from_slice(&raw)
            .map_err(|e| Error::Token(format!("claims are not JSON: {e}")))?;

        Ok(Self {
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    /// Like [`decode`](Self::decode), but yields empty hints for opaque tokens.
    pub fn decode_lossy(token: &str) -> Self {
        Self::decode(token).unwrap_or_default()
    }
}
