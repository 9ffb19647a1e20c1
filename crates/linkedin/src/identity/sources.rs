use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::markup::identity_from_html;
use super::record::{IdentityQuery, IdentityRecord, ProfileSummary, ResolutionStage, StageError};
use crate::client::{ApiRequest, ApiResponse, ApiSession};
use crate::error::Result;
use crate::response::ApiResult;
use crate::retry::{Recover, RetryPolicy, RetrySettings, RetryStatuses, get_with_retry};
use crate::urn::{id_from_urn, member_id_from_urn, urn_tail};
use crate::utils::json_get_str;

const MINI_PROFILE_DECORATION: &str = "com.linkedin.voyager.dash.deco.identity.profile.WebTopCardCore";
const COOKIES_EXPIRED: &str = "Cookies are expired";

/// One way of turning an [`IdentityQuery`] into an [`IdentityRecord`].
#[async_trait]
pub trait IdentitySource: Send + Sync {
    fn stage(&self) -> ResolutionStage;

    async fn lookup(
        &self,
        query: &IdentityQuery,
    ) -> std::result::Result<IdentityRecord, StageError>;
}

/// Session, retry settings and recovery hook shared by the built-in sources.
pub struct SourceContext<S: ?Sized> {
    session: Arc<S>,
    retry: RetrySettings,
    recover: Option<Arc<dyn Recover>>,
}

impl<S: ?Sized> Clone for SourceContext<S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            retry: self.retry.clone(),
            recover: self.recover.clone(),
        }
    }
}

impl<S> SourceContext<S>
where
    S: ApiSession + ?Sized,
{
    pub fn new(session: Arc<S>, policy: RetryPolicy, recover: Option<Arc<dyn Recover>>) -> Self {
        Self {
            session,
            retry: RetrySettings::new(policy, RetryStatuses::none()),
            recover,
        }
    }

    fn with_statuses(&self, retry_on: RetryStatuses) -> Self {
        let mut ctx = self.clone();
        ctx.retry.retry_on = retry_on;
        ctx
    }

    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        get_with_retry(
            self.session.as_ref(),
            request,
            &self.retry,
            self.recover.as_deref(),
        )
        .await
    }

    /// Fetch and fold transport failures and non-200 answers into a
    /// [`StageError`]; `notes` annotates well-known failure statuses.
    async fn fetch_ok(
        &self,
        stage: ResolutionStage,
        key: &str,
        request: &ApiRequest,
        notes: fn(u16) -> Option<&'static str>,
    ) -> std::result::Result<ApiResponse, StageError> {
        let response = self
            .fetch(request)
            .await
            .map_err(|e| StageError::from_error(stage, key, &e))?;

        if response.status != 200 {
            let mut result = ApiResult::from_response(stage.api_name(), Some(key), &response);
            if let Some(note) = notes(response.status) {
                result = result.with_notes(note);
            }
            debug!(%stage, status = response.status, "Stage request failed");
            return Err(StageError::from_result(result));
        }

        Ok(response)
    }
}

fn parse_json(
    stage: ResolutionStage,
    key: &str,
    response: &ApiResponse,
) -> std::result::Result<Value, StageError> {
    response
        .json_value()
        .map_err(|e| StageError::internal(stage, key, format!("invalid JSON: {e}")))
}

/// Identity from `elements[0]` of a mini profile answer.
pub fn identity_from_mini_profile(data: &Value) -> Option<IdentityRecord> {
    let profile = data.get("elements")?.get(0)?;
    let public_id = json_get_str(profile, &["publicIdentifier"])?;
    let hash_id = json_get_str(profile, &["entityUrn"]).and_then(urn_tail)?;
    let member_id = json_get_str(profile, &["objectUrn"]).and_then(member_id_from_urn)?;
    Some(IdentityRecord {
        public_id: public_id.to_string(),
        hash_id: hash_id.to_string(),
        member_id,
    })
}

/// The identifier fields of a profile view answer, named the way that
/// endpoint names them.
pub fn summary_from_profile_view(data: &Value) -> Option<ProfileSummary> {
    let mini = data.get("profile")?.get("miniProfile")?;
    let entity_urn = json_get_str(mini, &["entityUrn"])?;
    Some(ProfileSummary {
        public_id: json_get_str(mini, &["publicIdentifier"])?.to_string(),
        profile_id: id_from_urn(entity_urn)?.to_string(),
        member_urn: json_get_str(mini, &["objectUrn"])?.to_string(),
    })
}

impl ProfileSummary {
    pub fn into_identity(self) -> Option<IdentityRecord> {
        let member_id = member_id_from_urn(&self.member_urn)?;
        Some(IdentityRecord {
            public_id: self.public_id,
            hash_id: self.profile_id,
            member_id,
        })
    }
}

/// Lightweight `identity/dash/profiles` lookup.
pub struct MiniProfileSource<S: ?Sized> {
    ctx: SourceContext<S>,
    decoration_index: u32,
}

impl<S: ApiSession + ?Sized> MiniProfileSource<S> {
    pub fn new(ctx: &SourceContext<S>, decoration_index: u32) -> Self {
        Self {
            ctx: ctx.with_statuses(RetryStatuses::new([401, 403])),
            decoration_index,
        }
    }

    pub fn request(&self, key: &str) -> ApiRequest {
        ApiRequest::api("/identity/dash/profiles")
            .query("q", "memberIdentity")
            .query("memberIdentity", key)
            .query(
                "decorationId",
                format!("{MINI_PROFILE_DECORATION}-{}", self.decoration_index),
            )
    }
}

#[async_trait]
impl<S: ApiSession + ?Sized> IdentitySource for MiniProfileSource<S> {
    fn stage(&self) -> ResolutionStage {
        ResolutionStage::MiniProfile
    }

    async fn lookup(
        &self,
        query: &IdentityQuery,
    ) -> std::result::Result<IdentityRecord, StageError> {
        let stage = self.stage();
        let key = query.key();
        let response = self
            .ctx
            .fetch_ok(stage, key, &self.request(key), |status| {
                (status == 401).then_some(COOKIES_EXPIRED)
            })
            .await?;

        let data = parse_json(stage, key, &response)?;
        identity_from_mini_profile(&data)
            .ok_or_else(|| StageError::internal(stage, key, "mini profile without identifiers"))
    }
}

/// Full `identity/profiles/<key>/profileView` lookup.
pub struct ProfileViewSource<S: ?Sized> {
    ctx: SourceContext<S>,
}

impl<S: ApiSession + ?Sized> ProfileViewSource<S> {
    pub fn new(ctx: &SourceContext<S>) -> Self {
        Self {
            ctx: ctx.with_statuses(RetryStatuses::new([401, 403, 999])),
        }
    }

    pub fn request(&self, key: &str) -> ApiRequest {
        ApiRequest::api(format!("/identity/profiles/{key}/profileView"))
    }
}

#[async_trait]
impl<S: ApiSession + ?Sized> IdentitySource for ProfileViewSource<S> {
    fn stage(&self) -> ResolutionStage {
        ResolutionStage::ProfileView
    }

    async fn lookup(
        &self,
        query: &IdentityQuery,
    ) -> std::result::Result<IdentityRecord, StageError> {
        let stage = self.stage();
        let key = query.key();
        let response = self
            .ctx
            .fetch_ok(stage, key, &self.request(key), |status| match status {
                999 => Some(COOKIES_EXPIRED),
                403 => Some("Cookies are expired or the profile cannot be accessed"),
                _ => None,
            })
            .await?;

        let data = parse_json(stage, key, &response)?;
        summary_from_profile_view(&data)
            .and_then(ProfileSummary::into_identity)
            .ok_or_else(|| StageError::internal(stage, key, "profile view without identifiers"))
    }
}

/// Scrapes the public profile page. Brittle by nature; disable it through
/// [`ResolverConfig::profile_html`](crate::config::ResolverConfig).
pub struct ProfileHtmlSource<S: ?Sized> {
    ctx: SourceContext<S>,
}

impl<S: ApiSession + ?Sized> ProfileHtmlSource<S> {
    pub fn new(ctx: &SourceContext<S>) -> Self {
        Self {
            ctx: ctx.with_statuses(RetryStatuses::new([999])),
        }
    }

    pub fn request(&self, key: &str) -> ApiRequest {
        ApiRequest::site(format!("/in/{key}/"))
    }
}

#[async_trait]
impl<S: ApiSession + ?Sized> IdentitySource for ProfileHtmlSource<S> {
    fn stage(&self) -> ResolutionStage {
        ResolutionStage::ProfileHtml
    }

    async fn lookup(
        &self,
        query: &IdentityQuery,
    ) -> std::result::Result<IdentityRecord, StageError> {
        let stage = self.stage();
        let key = query.key();
        let response = self
            .ctx
            .fetch_ok(stage, key, &self.request(key), |status| {
                (status == 999).then_some(COOKIES_EXPIRED)
            })
            .await?;

        identity_from_html(&response.body)
            .map_err(|e| StageError::internal(stage, key, e.to_string()))
    }
}
