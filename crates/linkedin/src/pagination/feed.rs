//! The member's own home feed.
//!
//! The feed endpoint answers in the normalized layout: the chronological
//! order lives in `data.*elements` as bare URNs while the renderable
//! details sit unordered in `included`, mixed with promoted entries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::json_source::NORMALIZED_JSON;
use super::state::{Page, PageState};
use crate::client::{ApiRequest, ApiSession};
use crate::config::DEFAULT_SITE_BASE_URL;
use crate::error::{LinkedinError, Result};
use crate::response::MAX_TEXT_DATA_LEN;
use crate::retry::{Recover, RetrySettings, get_with_retry};
use crate::urn::activity_urn;
use crate::utils::{json_array, json_get_str, json_get_str_owned, truncate_text};

pub const FEED_PAGE_SIZE: usize = 100;
pub const DEFAULT_FEED_LIMIT: usize = 100;

const PROMOTED_MARKER: &str = "Promoted";

/// One renderable feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPost {
    /// `urn:li:activity:<n>` the entry is about.
    pub urn: String,
    pub author_name: Option<String>,
    pub author_profile: Option<String>,
    /// Relative age as displayed, e.g. `3h •`.
    pub age: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub promoted: bool,
}

/// Raw `data.*elements` of a feed page, in feed order. Not every element
/// carries an activity URN; pagination still counts all of them.
pub fn feed_elements(data: &Value) -> Vec<String> {
    json_array(data, "/data/*elements")
        .iter()
        .map(|element| element.as_str().unwrap_or_default().to_owned())
        .collect()
}

/// Activity URNs of `data.*elements`, in feed order.
pub fn feed_urns(data: &Value) -> Vec<String> {
    feed_elements(data)
        .iter()
        .filter_map(|element| activity_urn(element))
        .map(str::to_owned)
        .collect()
}

/// Renderable entries among `included`. Entities without an actor or
/// without an activity URN are social details, counters and the like.
pub fn feed_posts(data: &Value, site_base_url: &str) -> Vec<FeedPost> {
    json_array(data, "/included")
        .iter()
        .filter_map(|entity| feed_post(entity, site_base_url))
        .collect()
}

fn feed_post(entity: &Value, site_base_url: &str) -> Option<FeedPost> {
    let actor = entity.get("actor")?;
    let urn = json_get_str(entity, &["entityUrn"])
        .and_then(activity_urn)
        .or_else(|| json_get_str(entity, &["updateMetadata", "urn"]).and_then(activity_urn))?;

    let description = json_get_str(actor, &["description", "text"]);
    let age = json_get_str(actor, &["subDescription", "text"]);
    let promoted = [description, age]
        .into_iter()
        .flatten()
        .any(|text| text.contains(PROMOTED_MARKER));

    Some(FeedPost {
        urn: urn.to_string(),
        author_name: json_get_str_owned(actor, &["name", "text"]),
        author_profile: json_get_str_owned(actor, &["navigationContext", "actionTarget"]),
        age: age.map(str::to_owned),
        content: json_get_str_owned(entity, &["commentary", "text", "text"]),
        url: format!("{}/feed/update/{urn}", site_base_url.trim_end_matches('/')),
        promoted,
    })
}

/// Order `posts` the way `urns` lists them.
///
/// Promoted entries are dropped first. Each URN takes the first remaining
/// post with the same activity URN; URNs without a post are skipped and
/// posts no URN asked for are left out.
pub fn reconcile_feed(urns: &[String], posts: Vec<FeedPost>) -> Vec<FeedPost> {
    let mut pool: Vec<FeedPost> = posts.into_iter().filter(|post| !post.promoted).collect();
    let mut ordered = Vec::with_capacity(urns.len().min(pool.len()));

    for urn in urns {
        let Some(key) = activity_urn(urn) else {
            continue;
        };
        if let Some(index) = pool.iter().position(|post| post.urn == key) {
            ordered.push(pool.remove(index));
        }
    }

    ordered
}

/// Pages `/feed/updatesV2?q=chronFeed` and reconciles the result.
pub struct FeedSource<S: ?Sized> {
    session: Arc<S>,
    site_base_url: String,
    retry: RetrySettings,
    recover: Option<Arc<dyn Recover>>,
}

impl<S> FeedSource<S>
where
    S: ApiSession + ?Sized,
{
    pub fn new(session: Arc<S>) -> Self {
        Self {
            session,
            site_base_url: DEFAULT_SITE_BASE_URL.to_string(),
            retry: RetrySettings::default(),
            recover: None,
        }
    }

    pub fn with_site_base_url(mut self, url: impl Into<String>) -> Self {
        self.site_base_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings, recover: Option<Arc<dyn Recover>>) -> Self {
        self.retry = retry;
        self.recover = recover;
        self
    }

    /// Up to `limit` (default 100) non-promoted posts in feed order.
    #[instrument(skip(self))]
    pub async fn fetch(&self, limit: Option<usize>, offset: usize) -> Result<Vec<FeedPost>> {
        let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT);
        let mut state = PageState::new(FEED_PAGE_SIZE, Some(limit), offset, false);
        let mut elements = Vec::new();
        let mut posts = Vec::new();

        while let Some(page) = state.next_request() {
            let request = ApiRequest::api("/feed/updatesV2")
                .query("count", page.count)
                .query("q", "chronFeed")
                .query("start", page.start)
                .header("accept", NORMALIZED_JSON);
            let response = get_with_retry(
                self.session.as_ref(),
                &request,
                &self.retry,
                self.recover.as_deref(),
            )
            .await?;

            if !response.is_success() {
                return Err(LinkedinError::from_status(
                    response.status,
                    truncate_text(&response.body, MAX_TEXT_DATA_LEN),
                ));
            }

            let data = response.json_value()?;
            posts.extend(feed_posts(&data, &self.site_base_url));
            state.advance(Page::new(feed_elements(&data)), &mut elements);
        }

        let ordered = reconcile_feed(&elements, posts);
        debug!(elements = elements.len(), posts = ordered.len(), "Feed reconciled");
        Ok(ordered)
    }
}

/// [`FeedSource::fetch`] with default settings.
pub async fn fetch_feed_posts<S>(
    session: Arc<S>,
    limit: Option<usize>,
    offset: usize,
) -> Result<Vec<FeedPost>>
where
    S: ApiSession + ?Sized,
{
    FeedSource::new(session).fetch(limit, offset).await
}
