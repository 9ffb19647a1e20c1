//! The [`Linkedin`] facade.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument};

use crate::client::SessionClient;
use crate::config::ClientConfig;
use crate::error::{LinkedinError, Result};
use crate::identity::{
    IdentityQuery, IdentityRecord, IdentityResolver, ResolutionFailure, ResolvedIdentity,
};
use crate::pagination::{
    FeedPost, FeedSource, JobSearch, JsonPageSource, SearchQuery, SourceConfig, fetch_paginated,
};
use crate::retry::{Recover, RetryPolicy, RetrySettings, RetryStatuses, with_retry};

/// Session, identity resolution and listings behind one handle.
pub struct Linkedin {
    client: Arc<SessionClient>,
    resolver: IdentityResolver,
    resolution_retry: RetryPolicy,
    listing_retry: RetrySettings,
}

impl Linkedin {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::with_client(Arc::new(SessionClient::new(config)?)))
    }

    pub fn with_client(client: Arc<SessionClient>) -> Self {
        let recover: Arc<dyn Recover> = client.clone();
        let resolver =
            IdentityResolver::for_session(client.clone(), &client.config().resolver, Some(recover));
        Self {
            client,
            resolver,
            resolution_retry: RetryPolicy::disabled(),
            listing_retry: RetrySettings::new(
                RetryPolicy::disabled(),
                RetryStatuses::new([401, 403, 999]),
            ),
        }
    }

    /// Build and authenticate, reusing a fresh cached session if there is one.
    pub async fn connect(config: ClientConfig, username: &str, password: &str) -> Result<Self> {
        let linkedin = Self::new(config)?;
        linkedin.authenticate(username, password, true).await?;
        Ok(linkedin)
    }

    /// Retry a whole resolution that came back unavailable, logging in again
    /// in between.
    pub fn with_resolution_retry(mut self, policy: RetryPolicy) -> Self {
        self.resolution_retry = policy;
        self
    }

    /// Retry individual listing pages whose status signals a dead session.
    pub fn with_listing_retry(mut self, settings: RetrySettings) -> Self {
        self.listing_retry = settings;
        self
    }

    pub fn with_resolver(mut self, resolver: IdentityResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn client(&self) -> &Arc<SessionClient> {
        &self.client
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        allow_cache: bool,
    ) -> Result<()> {
        self.client
            .authenticate(username, password, allow_cache)
            .await
    }

    pub async fn resolve_identity(&self, query: &IdentityQuery) -> Result<IdentityRecord> {
        Ok(self.resolve_identity_detailed(query).await?.identity)
    }

    #[instrument(skip(self), fields(key = %query))]
    pub async fn resolve_identity_detailed(
        &self,
        query: &IdentityQuery,
    ) -> Result<ResolvedIdentity> {
        let unavailable = RetryStatuses::new([503]);
        let outcome = with_retry(
            &self.resolution_retry,
            |outcome: &std::result::Result<ResolvedIdentity, ResolutionFailure>| {
                outcome
                    .as_ref()
                    .is_err_and(|failure| unavailable.matches(failure))
            },
            Some(self.client.as_ref() as &dyn Recover),
            || {
                let resolver = &self.resolver;
                async move { Ok(resolver.resolve_detailed(query).await) }
            },
        )
        .await?;

        outcome.map_err(LinkedinError::from)
    }

    async fn collect(
        &self,
        config: SourceConfig,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        let recover: Arc<dyn Recover> = self.client.clone();
        let source = JsonPageSource::new(
            self.client.clone(),
            config.with_retry(self.listing_retry.clone()),
        )
        .with_recover(recover);
        fetch_paginated(&source, limit, offset).await
    }

    pub async fn search(
        &self,
        query: &SearchQuery,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        self.collect(SourceConfig::search(query), limit, offset)
            .await
    }

    pub async fn search_people(
        &self,
        keywords: Option<&str>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        let query = SearchQuery::people(keywords.map(str::to_owned));
        self.search(&query, limit, offset).await
    }

    pub async fn search_jobs(
        &self,
        search: &JobSearch,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        self.collect(SourceConfig::job_search(search), limit, offset)
            .await
    }

    pub async fn profile_updates(
        &self,
        profile_id: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        self.collect(SourceConfig::profile_updates(profile_id), limit, offset)
            .await
    }

    pub async fn company_updates(
        &self,
        universal_name: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        self.collect(SourceConfig::company_updates(universal_name), limit, offset)
            .await
    }

    pub async fn post_reactions(
        &self,
        activity_id: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        self.collect(SourceConfig::post_reactions(activity_id), limit, offset)
            .await
    }

    pub async fn profile_posts(
        &self,
        hash_id: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        self.collect(SourceConfig::profile_posts(hash_id), limit, offset)
            .await
    }

    pub async fn post_comments(
        &self,
        activity_id: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        self.collect(SourceConfig::post_comments(activity_id), limit, offset)
            .await
    }

    /// Chronological, promotion-free home feed.
    pub async fn feed_posts(&self, limit: Option<usize>, offset: usize) -> Result<Vec<FeedPost>> {
        let recover: Arc<dyn Recover> = self.client.clone();
        FeedSource::new(self.client.clone())
            .with_site_base_url(self.client.config().site_base_url.clone())
            .with_retry(self.listing_retry.clone(), Some(recover))
            .fetch(limit, offset)
            .await
    }

    /// Copy the cached cookie record of the current user to a timestamped
    /// file next to it. `Ok(None)` when nothing is cached.
    pub async fn backup_cookies(&self) -> Result<Option<PathBuf>> {
        let username = self.client.username().ok_or(LinkedinError::NotAuthenticated)?;
        let repository = self.client.repository();
        let Some(cookies) = repository.load_raw(&username).await? else {
            return Ok(None);
        };
        let path = repository.backup(&cookies, &username, Utc::now()).await?;
        info!(path = %path.display(), "Cookie record backed up");
        Ok(Some(path))
    }
}
