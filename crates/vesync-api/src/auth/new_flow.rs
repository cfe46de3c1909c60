// Two-step login
//
// Step 1 trades the hashed password for an authorize code; step 2 trades
// the code for a token on the same base URL. A cross-region rejection at
// step 2 that carries a continuation token is retried once in place before
// the caller considers a full region switch.

use serde_json::Value;
use tracing::{debug, info};

use super::{
    AUTH_BY_PASSWORD_PATH, AuthFlow, AuthSession, Authenticator, LOGIN_BY_AUTHORIZE_CODE_PATH,
    LoginParams, RegionHint, Step, interpret, session_from_result,
};
use crate::region::Region;
use crate::request;
use crate::transport::ApiRequest;

/// Authorize code issued by step 1.
struct Grant {
    authorize_code: String,
}

impl Authenticator {
    pub(super) async fn new_flow(
        &self,
        base_url: &str,
        region: Region,
        params: &LoginParams<'_>,
        country_code: Option<&str>,
    ) -> Step<AuthSession> {
        let grant = match self.authorize(base_url, params, country_code).await {
            Step::Done(grant) => grant,
            Step::CrossRegion(hint) => return Step::CrossRegion(hint),
            Step::Fatal(e) => return Step::Fatal(e),
            Step::Failed(reason) => return Step::Failed(reason),
        };

        let body = self.requests.login_by_authorize_code(
            &grant.authorize_code,
            None,
            country_code,
            &request::trace_id(),
        );
        let hint = match self.exchange(base_url, region, body).await {
            Step::CrossRegion(hint) => hint,
            other => return other,
        };

        // Narrow retry: same base URL, the rejection's continuation token
        // substituted. Without one, the caller switches region instead.
        let Some(biz_token) = hint.biz_token.clone() else {
            return Step::CrossRegion(hint);
        };
        let retry_country = hint.country_code.as_deref().or(country_code);
        info!(
            base_url,
            country_code = ?retry_country,
            "cross-region rejection at token exchange, retrying with continuation token"
        );

        let body = self.requests.login_by_authorize_code(
            &grant.authorize_code,
            Some(&biz_token),
            retry_country,
            &request::trace_id(),
        );
        match self.exchange(base_url, region, body).await {
            Step::CrossRegion(retry_hint) => Step::CrossRegion(RegionHint {
                biz_token: retry_hint.biz_token,
                country_code: retry_hint.country_code.or(hint.country_code),
                region: retry_hint.region.or(hint.region),
            }),
            other => other,
        }
    }

    /// Step 1.
    async fn authorize(
        &self,
        base_url: &str,
        params: &LoginParams<'_>,
        country_code: Option<&str>,
    ) -> Step<Grant> {
        debug!(base_url, "requesting authorize code");
        let body = self.requests.auth_by_password(
            params.username,
            params.password,
            country_code,
            &request::trace_id(),
        );
        let resp = self
            .client
            .call(base_url, &ApiRequest::post(AUTH_BY_PASSWORD_PATH, body))
            .await;

        match interpret(&resp, "authorize") {
            Step::Done(result) => {
                let field = |name: &str| {
                    result
                        .get(name)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                };
                match field("authorizeCode") {
                    Some(authorize_code) => Step::Done(Grant { authorize_code }),
                    None => Step::Failed(format!(
                        "authorize: success without authorizeCode (keys: {:?})",
                        super::payload_keys(&result)
                    )),
                }
            }
            Step::CrossRegion(hint) => Step::CrossRegion(hint),
            Step::Fatal(e) => Step::Fatal(e),
            Step::Failed(reason) => Step::Failed(reason),
        }
    }

    /// Step 2.
    async fn exchange(&self, base_url: &str, region: Region, body: Value) -> Step<AuthSession> {
        debug!(base_url, "exchanging authorize code for token");
        let resp = self
            .client
            .call(
                base_url,
                &ApiRequest::post(LOGIN_BY_AUTHORIZE_CODE_PATH, body),
            )
            .await;

        match interpret(&resp, "token exchange") {
            Step::Done(result) => {
                match session_from_result(&result, base_url, region, AuthFlow::New) {
                    Ok(session) => Step::Done(session),
                    Err(reason) => Step::Failed(format!("token exchange: {reason}")),
                }
            }
            Step::CrossRegion(hint) => Step::CrossRegion(hint),
            Step::Fatal(e) => Step::Fatal(e),
            Step::Failed(reason) => Step::Failed(reason),
        }
    }
}
