use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::record::{
    IdentityQuery, IdentityRecord, ResolutionFailure, ResolutionStage, StageError,
};
use super::sources::{
    IdentitySource, MiniProfileSource, ProfileHtmlSource, ProfileViewSource, SourceContext,
};
use crate::client::ApiSession;
use crate::config::ResolverConfig;
use crate::retry::Recover;

struct StageSlot {
    enabled: bool,
    source: Box<dyn IdentitySource>,
}

/// A successful resolution and how it came about.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    pub identity: IdentityRecord,
    /// Stage that produced the identity.
    pub stage: ResolutionStage,
    /// Failures of the stages tried before it.
    pub stage_errors: BTreeMap<ResolutionStage, StageError>,
}

/// Cascading lookup of a member's identifier triple.
///
/// Stages run in registration order; a stage runs only when every enabled
/// stage before it failed. Disabled stages are skipped without a trace in
/// the error map.
#[derive(Default)]
pub struct IdentityResolver {
    stages: Vec<StageSlot>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, source: impl IdentitySource + 'static, enabled: bool) -> Self {
        self.stages.push(StageSlot {
            enabled,
            source: Box::new(source),
        });
        self
    }

    /// Mini profile, then profile view, then profile page markup.
    pub fn for_session<S>(
        session: Arc<S>,
        config: &ResolverConfig,
        recover: Option<Arc<dyn Recover>>,
    ) -> Self
    where
        S: ApiSession + ?Sized + 'static,
    {
        let ctx = SourceContext::new(session, config.retry, recover);
        Self::new()
            .with_stage(
                MiniProfileSource::new(&ctx, config.decoration_index),
                config.mini_profile,
            )
            .with_stage(ProfileViewSource::new(&ctx), config.profile_view)
            .with_stage(ProfileHtmlSource::new(&ctx), config.profile_html)
    }

    pub fn enabled_stages(&self) -> Vec<ResolutionStage> {
        self.stages
            .iter()
            .filter(|slot| slot.enabled)
            .map(|slot| slot.source.stage())
            .collect()
    }

    pub async fn resolve(
        &self,
        query: &IdentityQuery,
    ) -> Result<IdentityRecord, ResolutionFailure> {
        self.resolve_detailed(query)
            .await
            .map(|resolved| resolved.identity)
    }

    #[instrument(skip(self), fields(key = %query))]
    pub async fn resolve_detailed(
        &self,
        query: &IdentityQuery,
    ) -> Result<ResolvedIdentity, ResolutionFailure> {
        let mut errors = BTreeMap::new();

        for slot in self.stages.iter().filter(|slot| slot.enabled) {
            let stage = slot.source.stage();
            match slot.source.lookup(query).await {
                Ok(identity) => {
                    debug!(%stage, ?identity, "Resolved identity");
                    return Ok(ResolvedIdentity {
                        identity,
                        stage,
                        stage_errors: errors,
                    });
                }
                Err(e) => {
                    warn!(%stage, status = e.status, error = %e, "Identity stage failed");
                    errors.insert(stage, e);
                }
            }
        }

        info!(failed = errors.len(), "Identity resolution unavailable");
        Err(ResolutionFailure::unavailable(query.key(), errors))
    }
}
