// ── Session snapshot and persistence seam ──
//
// `Session` is the serializable identity of one authenticated account. Field
// names are camelCase on the wire so a snapshot written by another client
// hydrates unchanged. Stores are pluggable; this crate ships only an
// in-memory one, `vesync-config` adds the file-backed store.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;

use vesync_api::{AuthFlow, Region};

use crate::error::CoreError;

/// Serializable session state.
///
/// `token` and `account_id` default to empty so a damaged snapshot still
/// deserializes; [`Session::is_valid`] is the gate for hydration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// Unknown region names deserialize as `None`.
    #[serde(
        default,
        deserialize_with = "lenient_region",
        skip_serializing_if = "Option::is_none"
    )]
    pub region: Option<Region>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub auth_flow_used: AuthFlow,
    /// Epoch seconds, from the token claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    /// Epoch seconds, from the token claims. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Epoch milliseconds of the last call the server accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated_at: Option<i64>,
    /// Account the session belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Session {
    /// Both identity fields are present.
    pub fn is_valid(&self) -> bool {
        !self.token.trim().is_empty() && !self.account_id.trim().is_empty()
    }

    /// `true` if the snapshot names no account or names `username`.
    pub fn belongs_to(&self, username: &str) -> bool {
        self.username
            .as_deref()
            .is_none_or(|u| u.trim().eq_ignore_ascii_case(username.trim()))
    }
}

fn lenient_region<'de, D>(deserializer: D) -> Result<Option<Region>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|r| r.parse().ok()))
}

// ── Stores ───────────────────────────────────────────────────────────

/// Persistence for session snapshots.
///
/// The manager calls `save` after every successful login and `clear` on
/// logout. Failures are logged by the manager and never fail the login.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>, CoreError>;
    async fn save(&self, session: &Session) -> Result<(), CoreError>;
    async fn clear(&self) -> Result<(), CoreError>;
}

/// Process-local store. Useful for tests and short-lived hosts.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }

    /// Current contents without going through the trait.
    pub async fn snapshot(&self) -> Option<Session> {
        self.slot.lock().await.clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>, CoreError> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<(), CoreError> {
        *self.slot.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CoreError> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn deserializes_camel_case_snapshot() {
        let raw = json!({
            "token": "tk",
            "accountId": "42",
            "countryCode": "DE",
            "region": "EU",
            "apiBaseUrl": "https://smartapi.vesync.eu",
            "authFlowUsed": "legacy",
            "expiresAt": 1_900_000_000_i64,
        });
        let session: Session = serde_json::from_value(raw).unwrap();
        assert_eq!(session.account_id, "42");
        assert_eq!(session.region, Some(Region::Eu));
        assert_eq!(session.auth_flow_used, AuthFlow::Legacy);
        assert_eq!(session.expires_at, Some(1_900_000_000));
        assert!(session.is_valid());
    }

    #[test]
    fn unknown_region_is_dropped_not_rejected() {
        let raw = json!({ "token": "tk", "accountId": "1", "region": "AU" });
        let session: Session = serde_json::from_value(raw).unwrap();
        assert_eq!(session.region, None);
    }

    #[test]
    fn missing_identity_is_invalid() {
        let session: Session = serde_json::from_value(json!({ "token": "tk" })).unwrap();
        assert!(!session.is_valid());
        assert!(!Session::default().is_valid());
    }

    #[test]
    fn ownership_check_ignores_case() {
        let mut session = Session::default();
        assert!(session.belongs_to("anyone@example.com"));
        session.username = Some("User@Example.com".into());
        assert!(session.belongs_to("user@example.com"));
        assert!(!session.belongs_to("other@example.com"));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        let session = Session {
            token: "tk".into(),
            account_id: "1".into(),
            ..Session::default()
        };
        store.save(&session).await.unwrap();
        assert_eq!(store.snapshot().await, Some(session));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
