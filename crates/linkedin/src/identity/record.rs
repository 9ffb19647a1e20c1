use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::LinkedinError;
use crate::response::ApiResult;
use crate::retry::HasStatus;

/// The stable identifier triple of a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Vanity name used in profile URLs.
    pub public_id: String,
    /// `ACoAA...` id from `urn:li:fsd_profile:<hash_id>`.
    pub hash_id: String,
    /// Numeric id from `urn:li:member:<member_id>`.
    pub member_id: u64,
}

/// Any one identifier a member can be looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityQuery {
    PublicId(String),
    HashId(String),
    /// Short-lived hash id, e.g. from search results.
    TempHashId(String),
}

impl IdentityQuery {
    pub fn key(&self) -> &str {
        match self {
            Self::PublicId(id) | Self::HashId(id) | Self::TempHashId(id) => id,
        }
    }

    /// First non-empty identifier, in public / hash / temporary order.
    pub fn from_parts(
        public_id: Option<&str>,
        hash_id: Option<&str>,
        temp_hash_id: Option<&str>,
    ) -> Option<Self> {
        let non_empty = |id: Option<&str>| id.filter(|id| !id.is_empty()).map(str::to_string);
        non_empty(public_id)
            .map(Self::PublicId)
            .or_else(|| non_empty(hash_id).map(Self::HashId))
            .or_else(|| non_empty(temp_hash_id).map(Self::TempHashId))
    }
}

impl fmt::Display for IdentityQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionStage {
    MiniProfile,
    ProfileView,
    ProfileHtml,
}

impl ResolutionStage {
    pub const ALL: [ResolutionStage; 3] = [Self::MiniProfile, Self::ProfileView, Self::ProfileHtml];

    pub fn api_name(&self) -> &'static str {
        match self {
            Self::MiniProfile => "mini profile API",
            Self::ProfileView => "profile v2 API",
            Self::ProfileHtml => "profile HTML API",
        }
    }
}

/// Why one resolution stage did not produce an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message} (status {status})")]
pub struct StageError {
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StageError {
    /// Status recorded when a stage fails locally (parsing, transport).
    pub const INTERNAL_STATUS: u16 = 500;

    pub fn from_result(result: ApiResult) -> Self {
        Self {
            status: result.status,
            message: result.message,
            notes: result.notes,
            data: result.data,
        }
    }

    pub fn internal(stage: ResolutionStage, key: &str, reason: impl Into<String>) -> Self {
        let result = ApiResult::new(
            stage.api_name(),
            Some(key),
            Self::INTERNAL_STATUS,
            Some(Value::String(reason.into())),
        );
        Self::from_result(result)
    }

    /// Capture a transport or session error. Errors with an obvious status
    /// keep it.
    pub fn from_error(stage: ResolutionStage, key: &str, err: &LinkedinError) -> Self {
        let status = match err {
            LinkedinError::Unauthorized => 401,
            LinkedinError::RateLimited { status }
            | LinkedinError::ServiceUnavailable { status }
            | LinkedinError::AuthFailure { status }
            | LinkedinError::Api { status, .. } => *status,
            _ => Self::INTERNAL_STATUS,
        };
        let result = ApiResult::new(
            stage.api_name(),
            Some(key),
            status,
            Some(Value::String(err.to_string())),
        );
        Self::from_result(result)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionStatus {
    Unavailable,
}

impl ResolutionStatus {
    pub fn code(&self) -> u16 {
        match self {
            Self::Unavailable => 503,
        }
    }
}

/// Every enabled stage failed.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("identity resolution {status} for {key}: {} stage(s) failed", .errors.len())]
pub struct ResolutionFailure {
    pub key: String,
    pub status: ResolutionStatus,
    pub errors: BTreeMap<ResolutionStage, StageError>,
}

impl ResolutionFailure {
    pub fn unavailable(
        key: impl Into<String>,
        errors: BTreeMap<ResolutionStage, StageError>,
    ) -> Self {
        Self {
            key: key.into(),
            status: ResolutionStatus::Unavailable,
            errors,
        }
    }

    /// The failure in the normalized result shape, the stage map as payload.
    pub fn to_api_result(&self) -> ApiResult {
        let data = serde_json::to_value(&self.errors).unwrap_or(Value::Null);
        ApiResult::new(
            super::RESOLVER_API_NAME,
            Some(&self.key),
            self.status.code(),
            Some(data),
        )
    }
}

impl HasStatus for ResolutionFailure {
    fn status(&self) -> u16 {
        self.status.code()
    }
}

/// The three identifiers as the profile view endpoint names them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub public_id: String,
    pub profile_id: String,
    pub member_urn: String,
}
