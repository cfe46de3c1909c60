// Legacy login
//
// Single call, username + hashed password, used only after the two-step
// flow has failed for a reason other than credentials or region.

use tracing::debug;

use super::{
    AuthFlow, AuthSession, Authenticator, LEGACY_LOGIN_PATH, LoginParams, Step, interpret,
    session_from_result,
};
use crate::region::Region;
use crate::request;
use crate::transport::ApiRequest;

impl Authenticator {
    pub(super) async fn legacy_login(
        &self,
        base_url: &str,
        region: Region,
        params: &LoginParams<'_>,
    ) -> Step<AuthSession> {
        debug!(base_url, "falling back to legacy login");
        let body = self
            .requests
            .legacy_login(params.username, params.password, &request::trace_id());
        let resp = self
            .client
            .call(base_url, &ApiRequest::post(LEGACY_LOGIN_PATH, body))
            .await;

        match interpret(&resp, "legacy login") {
            Step::Done(result) => {
                match session_from_result(&result, base_url, region, AuthFlow::Legacy) {
                    Ok(session) => Step::Done(session),
                    Err(reason) => Step::Failed(format!("legacy login: {reason}")),
                }
            }
            Step::CrossRegion(hint) => Step::CrossRegion(hint),
            Step::Fatal(e) => Step::Fatal(e),
            Step::Failed(reason) => Step::Failed(reason),
        }
    }
}
