// ── Manager ──
//
// Owns one account's mutable state: token, account id, the sticky base URL,
// and the device list. Every mutation goes through `ManagerInner::state`,
// so a login, a hydration, or a region switch is observed as a whole.
// Concurrent `login` calls share one in-flight attempt.

use std::sync::{Arc, LazyLock, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use vesync_api::auth::RegionHint;
use vesync_api::codes::CodeClass;
use vesync_api::region::{self, EndpointHints};
use vesync_api::request::{self, DEVICE_LIST_PATH};
use vesync_api::{
    ApiClient, ApiRequest, ApiResponse, AuthFlow, AuthSession, Authenticator, Endpoints,
    LoginParams, Region, RequestBuilder, TokenHints, TransportConfig,
};

use crate::config::ManagerConfig;
use crate::device::{DetailRefresher, DeviceListPage, DeviceRecord};
use crate::error::CoreError;
use crate::exclusion::ExclusionFilter;
use crate::session::{Session, SessionStore};

const MAX_DEVICE_PAGES: u32 = 50;

static APP_INSTANCE_ID: LazyLock<String> =
    LazyLock::new(|| format!("2{}", uuid::Uuid::new_v4().simple()));

/// Terminal id sent with logins. Generated once per process.
pub fn app_instance_id() -> &'static str {
    &APP_INSTANCE_ID
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ── CallOptions ──────────────────────────────────────────────────

/// Recovery applied by [`Manager::call_api`]. Each recovery replays the
/// request at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Log in again and replay on a token-expired response.
    pub reauth_on_expiry: bool,
    /// Switch region and replay on a cross-region response.
    pub follow_region: bool,
}

impl CallOptions {
    pub const PLAIN: Self = Self {
        reauth_on_expiry: false,
        follow_region: false,
    };

    pub const RECOVERING: Self = Self {
        reauth_on_expiry: true,
        follow_region: true,
    };
}

// ── Account state ────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct AccountState {
    token: Option<String>,
    account_id: Option<String>,
    country_code: Option<String>,
    region: Region,
    /// URL that issued the current token.
    api_base_url: Option<String>,
    /// Caller-pinned URL. Region logic never writes this.
    api_url_override: Option<String>,
    auth_flow_used: Option<AuthFlow>,
    issued_at: Option<i64>,
    expires_at: Option<i64>,
    last_validated_at: Option<i64>,
    enabled: bool,
}

impl AccountState {
    fn credentials(&self) -> Option<(String, String)> {
        match (&self.token, &self.account_id) {
            (Some(token), Some(account_id)) => Some((token.clone(), account_id.clone())),
            _ => None,
        }
    }

    /// The configured region or country override is folded into `region`
    /// and `api_base_url` at construction and hydration; a URL issued by a
    /// login on this manager is never second-guessed.
    fn base_url(&self, endpoints: &Endpoints) -> String {
        endpoints.resolve(&EndpointHints {
            api_url_override: self.api_url_override.as_deref(),
            country_code_override: None,
            session_base_url: self.api_base_url.as_deref(),
            region: Some(self.region),
        })
    }

    fn apply_login(&mut self, auth: &AuthSession, validated_at: i64) {
        self.token = Some(auth.token.clone());
        self.account_id = Some(auth.account_id.clone());
        if auth.country_code.is_some() {
            self.country_code.clone_from(&auth.country_code);
        }
        self.region = auth.region;
        self.api_base_url = Some(auth.api_base_url.clone());
        self.auth_flow_used = Some(auth.flow);
        self.issued_at = auth.hints.issued_at;
        self.expires_at = auth.hints.expires_at;
        self.last_validated_at = Some(validated_at);
        self.enabled = true;
    }

    fn clear_session(&mut self) {
        self.token = None;
        self.account_id = None;
        self.api_base_url = None;
        self.auth_flow_used = None;
        self.issued_at = None;
        self.expires_at = None;
        self.last_validated_at = None;
        self.enabled = false;
    }

    fn snapshot(&self, username: &str, endpoints: &Endpoints) -> Option<Session> {
        let (token, account_id) = self.credentials()?;
        Some(Session {
            token,
            account_id,
            country_code: self.country_code.clone(),
            region: Some(self.region),
            api_base_url: Some(self.base_url(endpoints)),
            auth_flow_used: self.auth_flow_used.unwrap_or_default(),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            last_validated_at: self.last_validated_at,
            username: Some(username.to_owned()),
        })
    }
}

// ── Manager ──────────────────────────────────────────────────────

type PendingLogin = Shared<BoxFuture<'static, bool>>;

/// Entry point for one VeSync account.
///
/// Cheaply cloneable via `Arc<ManagerInner>`; clones share state.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    config: ManagerConfig,
    auth: Authenticator,
    client: ApiClient,
    exclusions: ExclusionFilter,
    /// Normalized `config.api_url`; survives logout.
    pinned_url: Option<String>,
    state: RwLock<AccountState>,
    pending_login: Mutex<Option<PendingLogin>>,
    devices: RwLock<Vec<DeviceRecord>>,
    last_update: Mutex<Option<Instant>>,
    session_store: Option<Arc<dyn SessionStore>>,
    detail_refresher: Option<Arc<dyn DetailRefresher>>,
}

/// Builder for [`Manager`] with optional collaborators.
pub struct ManagerBuilder {
    config: ManagerConfig,
    session_store: Option<Arc<dyn SessionStore>>,
    detail_refresher: Option<Arc<dyn DetailRefresher>>,
}

impl ManagerBuilder {
    /// Persist sessions after every successful login.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Per-device detail fetch run by [`Manager::update`].
    pub fn detail_refresher(mut self, refresher: Arc<dyn DetailRefresher>) -> Self {
        self.detail_refresher = Some(refresher);
        self
    }

    pub fn build(self) -> Result<Manager, CoreError> {
        let mut config = self.config;

        if config.username.trim().is_empty() {
            return Err(CoreError::config("username is required"));
        }

        let time_zone = request::sanitize_time_zone(&config.time_zone);
        if time_zone != config.time_zone.trim() {
            warn!(
                time_zone = %config.time_zone,
                fallback = %time_zone,
                "invalid time zone, using default"
            );
        }
        config.time_zone = time_zone;

        let api_url_override = match config.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                url::Url::parse(url)
                    .map_err(|e| CoreError::config(format!("invalid API URL {url:?}: {e}")))?;
                Some(url.trim_end_matches('/').to_owned())
            }
            _ => None,
        };

        let exclusions = ExclusionFilter::compile(&config.exclusions)?;

        let transport = TransportConfig {
            tls: config.tls.clone(),
            timeout: config.timeout,
        };
        let client = ApiClient::new(&transport)?;
        let requests = RequestBuilder::new(app_instance_id(), &config.time_zone);
        let auth =
            Authenticator::new(client.clone(), requests).with_endpoints(config.endpoints.clone());

        let state = AccountState {
            region: config.initial_region(),
            country_code: config.country_code.clone(),
            api_url_override: api_url_override.clone(),
            ..AccountState::default()
        };

        Ok(Manager {
            inner: Arc::new(ManagerInner {
                config,
                auth,
                client,
                exclusions,
                pinned_url: api_url_override,
                state: RwLock::new(state),
                pending_login: Mutex::new(None),
                devices: RwLock::new(Vec::new()),
                last_update: Mutex::new(None),
                session_store: self.session_store,
                detail_refresher: self.detail_refresher,
            }),
        })
    }
}

impl Manager {
    /// Create a manager with no session store or detail refresher.
    /// Does not log in.
    pub fn new(config: ManagerConfig) -> Result<Self, CoreError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ManagerConfig) -> ManagerBuilder {
        ManagerBuilder {
            config,
            session_store: None,
            detail_refresher: None,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn app_instance_id(&self) -> &'static str {
        app_instance_id()
    }

    // ── Login ────────────────────────────────────────────────────

    /// Log in, or join a login already in flight.
    ///
    /// Every caller that overlaps an in-flight attempt gets that attempt's
    /// result; the network sequence and the persistence hook run once.
    pub async fn login(&self) -> bool {
        let pending = {
            let mut slot = self.inner.pending_login.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    debug!("joining in-flight login");
                    pending.clone()
                }
                None => {
                    let weak: Weak<ManagerInner> = Arc::downgrade(&self.inner);
                    let pending = async move {
                        let Some(inner) = weak.upgrade() else {
                            return false;
                        };
                        let manager = Manager { inner };
                        let ok = manager.login_once().await;
                        // Free the slot before resolving: a caller arriving
                        // after this point must start a fresh attempt.
                        *manager.inner.pending_login.lock().await = None;
                        ok
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    async fn login_once(&self) -> bool {
        let config = &self.inner.config;
        let (override_url, region, country_code) = {
            let state = self.inner.state.read().await;
            (
                state.api_url_override.clone(),
                state.region,
                state.country_code.clone(),
            )
        };

        let params = LoginParams {
            username: &config.username,
            password: &config.password,
            country_code: country_code.as_deref(),
            region,
            api_url_override: override_url.as_deref(),
        };

        info!(username = %config.username, %region, "logging in");
        match self.inner.auth.login(&params, &config.retry).await {
            Ok(auth) => {
                let snapshot = {
                    let mut state = self.inner.state.write().await;
                    state.apply_login(&auth, now_ms());
                    state.snapshot(&config.username, &config.endpoints)
                };
                info!(
                    region = %auth.region,
                    base_url = %auth.api_base_url,
                    flow = ?auth.flow,
                    "login succeeded"
                );
                if let Some(session) = snapshot {
                    self.persist(&session).await;
                }
                true
            }
            Err(e) => {
                self.inner.state.write().await.enabled = false;
                warn!(error = %e, "login failed");
                false
            }
        }
    }

    async fn persist(&self, session: &Session) {
        let Some(store) = &self.inner.session_store else {
            return;
        };
        match store.save(session).await {
            Ok(()) => debug!("session persisted"),
            Err(e) => warn!(error = %e, "failed to persist session"),
        }
    }

    /// Drop the session, forget cached devices, and clear the session store.
    ///
    /// A URL override adopted from a hydrated session is dropped too; only
    /// the configured one is kept.
    pub async fn logout(&self) {
        {
            let mut state = self.inner.state.write().await;
            state.clear_session();
            state.api_url_override.clone_from(&self.inner.pinned_url);
        }
        self.inner.devices.write().await.clear();
        *self.inner.last_update.lock().await = None;
        if let Some(store) = &self.inner.session_store {
            if let Err(e) = store.clear().await {
                warn!(error = %e, "failed to clear stored session");
            }
        }
        info!("logged out");
    }

    // ── Session hydration ────────────────────────────────────────

    /// Adopt a previously persisted session without a network call.
    ///
    /// Region: an explicit region/country override wins, then the session's
    /// region, its country code, its base URL, then US. A stored base URL
    /// that is not a regional host becomes the URL override.
    pub async fn hydrate_session(&self, session: &Session) -> bool {
        let config = &self.inner.config;
        let endpoints = &config.endpoints;
        let mut state = self.inner.state.write().await;

        if !session.is_valid() {
            warn!("stored session lacks token or account id; a fresh login is required");
            state.clear_session();
            return false;
        }

        let stored_url = session
            .api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| u.trim_end_matches('/').to_owned());

        let mut known_url = None;
        if let Some(url) = stored_url {
            if endpoints.is_known(&url) {
                known_url = Some(url);
            } else if state.api_url_override.is_none() {
                info!(base_url = %url, "stored base URL is not a regional host; keeping it as override");
                state.api_url_override = Some(url);
            }
        }

        let region = if config.has_region_override() {
            let pinned = config.initial_region();
            let stored = known_url.as_deref().and_then(|u| endpoints.region_of(u));
            if let Some(stored) = stored.filter(|r| r.primary() != pinned.primary()) {
                info!(
                    stored = %stored,
                    configured = %pinned,
                    "stored base URL serves another region; using the configured region"
                );
                known_url = None;
            }
            pinned
        } else {
            session
                .region
                .or_else(|| {
                    session
                        .country_code
                        .as_deref()
                        .map(region::region_from_country_code)
                })
                .or_else(|| known_url.as_deref().and_then(|u| endpoints.region_of(u)))
                .unwrap_or_default()
        };

        let hints = if session.issued_at.is_none() && session.expires_at.is_none() {
            TokenHints::decode_lossy(&session.token)
        } else {
            TokenHints {
                issued_at: session.issued_at,
                expires_at: session.expires_at,
            }
        };

        state.token = Some(session.token.trim().to_owned());
        state.account_id = Some(session.account_id.trim().to_owned());
        state.country_code = config
            .country_code
            .clone()
            .or_else(|| session.country_code.clone());
        state.region = region;
        state.api_base_url = known_url;
        state.auth_flow_used = Some(session.auth_flow_used);
        state.issued_at = hints.issued_at;
        state.expires_at = hints.expires_at;
        state.last_validated_at = session.last_validated_at;
        state.enabled = true;

        info!(
            %region,
            base_url = %state.base_url(endpoints),
            "session hydrated"
        );
        true
    }

    /// Load the stored session and hydrate from it.
    ///
    /// A session recorded for a different username is ignored.
    pub async fn restore_session(&self) -> bool {
        let Some(store) = &self.inner.session_store else {
            return false;
        };
        match store.load().await {
            Ok(Some(session)) if !session.belongs_to(&self.inner.config.username) => {
                info!("stored session belongs to another account; ignoring it");
                false
            }
            Ok(Some(session)) => self.hydrate_session(&session).await,
            Ok(None) => {
                debug!("no stored session");
                false
            }
            Err(e) => {
                warn!(error = %e, "failed to load stored session");
                false
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Snapshot of the current session, if logged in.
    pub async fn session(&self) -> Option<Session> {
        self.inner
            .state
            .read()
            .await
            .snapshot(&self.inner.config.username, &self.inner.config.endpoints)
    }

    pub async fn is_enabled(&self) -> bool {
        self.inner.state.read().await.enabled
    }

    pub async fn current_region(&self) -> Region {
        self.inner.state.read().await.region
    }

    pub async fn country_code(&self) -> Option<String> {
        self.inner.state.read().await.country_code.clone()
    }

    /// Base URL business calls go to right now.
    pub async fn api_base_url(&self) -> String {
        self.inner
            .state
            .read()
            .await
            .base_url(&self.inner.config.endpoints)
    }

    pub async fn api_url_override(&self) -> Option<String> {
        self.inner.state.read().await.api_url_override.clone()
    }

    /// Set the region the next login starts from. Never touches the URL
    /// override or the URL of the current session.
    pub async fn set_region(&self, region: Region) {
        let mut state = self.inner.state.write().await;
        if state.region != region {
            debug!(from = %state.region, to = %region, "region changed");
        }
        state.region = region;
    }

    /// Devices from the last successful [`get_devices`](Self::get_devices).
    pub async fn devices(&self) -> Vec<DeviceRecord> {
        self.inner.devices.read().await.clone()
    }

    // ── Authenticated calls ──────────────────────────────────────

    /// Send `request` with the session token against the active base URL.
    ///
    /// With no session and `reauth_on_expiry` set, logs in first. Cross-region
    /// and token-expired responses are recovered according to `options`.
    pub async fn call_api(&self, request: ApiRequest, options: CallOptions) -> ApiResponse {
        let has_session = self.inner.state.read().await.credentials().is_some();
        if !has_session && options.reauth_on_expiry && !self.login().await {
            return ApiResponse::empty();
        }

        let mut resp = self.send(&request).await;

        if options.follow_region && resp.class() == CodeClass::CrossRegion {
            resp = self.follow_region(&request, resp).await;
        }

        if options.reauth_on_expiry && resp.class() == CodeClass::TokenExpired {
            info!(path = %request.path, "token expired; logging in again");
            if !self.login().await {
                return resp;
            }
            resp = self.send(&request).await;
            if resp.class() == CodeClass::TokenExpired {
                warn!(path = %request.path, "token rejected again after a fresh login");
            }
        }

        resp
    }

    async fn send(&self, request: &ApiRequest) -> ApiResponse {
        let (base_url, credentials) = {
            let state = self.inner.state.read().await;
            (
                state.base_url(&self.inner.config.endpoints),
                state.credentials(),
            )
        };
        let Some((token, account_id)) = credentials else {
            warn!(path = %request.path, "not logged in; request not sent");
            return ApiResponse::empty();
        };

        let mut request = request.clone();
        let mut headers = self.inner.auth.requests().headers(&token, &account_id);
        for (name, value) in &request.headers {
            headers.insert(name.clone(), value.clone());
        }
        request.headers = headers;

        // Replays must carry the current token, not the one the body was built with.
        if let Some(Value::Object(body)) = request.body.as_mut() {
            if body.contains_key("token") {
                body.insert("token".into(), Value::String(token));
            }
            if body.contains_key("accountID") {
                body.insert("accountID".into(), Value::String(account_id));
            }
        }

        let resp = self.inner.client.call(&base_url, &request).await;
        if resp.is_success() {
            self.inner.state.write().await.last_validated_at = Some(now_ms());
        }
        resp
    }

    async fn follow_region(&self, request: &ApiRequest, resp: ApiResponse) -> ApiResponse {
        let endpoints = &self.inner.config.endpoints;
        let (original_region, original_url, original_country) = {
            let state = self.inner.state.read().await;
            if state.api_url_override.is_some() {
                debug!("cross-region response with a pinned URL; not switching");
                return resp;
            }
            (
                state.region,
                state.api_base_url.clone(),
                state.country_code.clone(),
            )
        };

        let hint = RegionHint::from_result(resp.result());
        let suggested = hint.suggested_region();
        let target = suggested.unwrap_or_else(|| original_region.alternate());

        info!(
            from = %original_region,
            to = %target,
            suggested = suggested.is_some(),
            "cross-region response; switching endpoint"
        );
        {
            let mut state = self.inner.state.write().await;
            state.region = target;
            state.api_base_url = Some(endpoints.for_region(target).to_owned());
            if hint.country_code.is_some() {
                state.country_code.clone_from(&hint.country_code);
            }
        }

        let replay = self.send(request).await;

        if suggested.is_none() && !replay.is_success() {
            warn!(region = %original_region, "region toggle did not help; reverting");
            let mut state = self.inner.state.write().await;
            state.region = original_region;
            state.api_base_url = original_url;
            state.country_code = original_country;
        }
        replay
    }

    // ── Devices ──────────────────────────────────────────────────

    /// Fetch the full device list, page by page.
    ///
    /// Pages are requested until one comes back short or `total` is reached.
    /// The cached list is only replaced when every page succeeded.
    pub async fn get_devices(&self) -> bool {
        let page_size = self.inner.config.page_size.max(1);
        let mut devices = Vec::new();
        let mut exhausted = true;

        for page_no in 1..=MAX_DEVICE_PAGES {
            let Some((token, account_id)) = self.inner.state.read().await.credentials() else {
                warn!("not logged in; cannot fetch devices");
                return false;
            };
            let body = self.inner.auth.requests().device_list(
                &token,
                &account_id,
                page_no,
                page_size,
                &request::trace_id(),
            );
            let resp = self
                .call_api(ApiRequest::post(DEVICE_LIST_PATH, body), CallOptions::RECOVERING)
                .await;

            if !resp.is_success() {
                warn!(
                    page_no,
                    status = resp.status,
                    code = ?resp.code(),
                    msg = ?resp.msg(),
                    "device list request failed"
                );
                return false;
            }

            let page: DeviceListPage = match resp.result().cloned().map(serde_json::from_value) {
                Some(Ok(page)) => page,
                Some(Err(e)) => {
                    warn!(page_no, error = %e, "unexpected device list shape");
                    return false;
                }
                None => DeviceListPage::default(),
            };

            let received = page.list.as_ref().map_or(0, Vec::len);
            devices.extend(page.list.unwrap_or_default());
            debug!(page_no, received, total = ?page.total, "device page");

            let short = received < page_size as usize;
            let complete = page.total.is_some_and(|total| devices.len() >= total);
            if short || complete {
                exhausted = false;
                break;
            }
        }

        if exhausted {
            warn!(
                pages = MAX_DEVICE_PAGES,
                count = devices.len(),
                "device list truncated at the page limit"
            );
        }

        info!(count = devices.len(), "device list refreshed");
        *self.inner.devices.write().await = devices;
        true
    }

    /// Refresh the device list and per-device details, at most once per
    /// `update_interval`. A skipped run counts as success.
    pub async fn update(&self) -> bool {
        let interval = self.inner.config.update_interval;
        if let Some(last) = *self.inner.last_update.lock().await {
            if last.elapsed() < interval {
                debug!(?interval, "update skipped; last run too recent");
                return true;
            }
        }

        if !self.get_devices().await {
            return false;
        }

        if let Some(refresher) = &self.inner.detail_refresher {
            let devices = self.devices().await;
            let mut details = Vec::new();
            let mut skipped = 0usize;
            for device in &devices {
                if self.inner.exclusions.is_excluded(device) {
                    skipped += 1;
                    continue;
                }
                match refresher.refresh(self, device).await {
                    Some(detail) => details.push((device.cid.clone(), detail)),
                    None => debug!(cid = %device.cid, "no details returned"),
                }
            }
            debug!(refreshed = details.len(), skipped, "device details refreshed");

            let mut cached = self.inner.devices.write().await;
            for (cid, detail) in details {
                if let Some(device) = cached.iter_mut().find(|d| d.cid == cid) {
                    device.details = Some(detail);
                }
            }
        }

        *self.inner.last_update.lock().await = Some(Instant::now());
        true
    }
}
