//! Recovery of a member's `{public_id, hash_id, member_id}` triple.

pub mod markup;
mod record;
mod resolver;
mod sources;

/// Name the resolver reports itself under in [`ApiResult`](crate::response::ApiResult) messages.
pub const RESOLVER_API_NAME: &str = "user IDs retrieval API";

pub use record::{
    IdentityQuery, IdentityRecord, ProfileSummary, ResolutionFailure, ResolutionStage,
    ResolutionStatus, StageError,
};
pub use resolver::{IdentityResolver, ResolvedIdentity};
pub use sources::{
    IdentitySource, MiniProfileSource, ProfileHtmlSource, ProfileViewSource, SourceContext,
    identity_from_mini_profile, summary_from_profile_view,
};
