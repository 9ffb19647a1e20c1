//! Paginated JSON endpoints described as data.
//!
//! Every listing endpoint of the platform follows the same loop: ask for
//! `start`/`count` (sometimes a continuation token), pull a list out of the
//! answer, repeat. [`SourceConfig`] captures what differs between them and
//! [`JsonPageSource`] runs it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::source::PageSource;
use super::state::{Page, PageRequest};
use crate::client::{ApiRequest, ApiSession};
use crate::error::{LinkedinError, Result};
use crate::response::{MAX_TEXT_DATA_LEN, is_ok_status};
use crate::retry::{Recover, RetrySettings, get_with_retry};
use crate::urn::profile_urn;
use crate::utils::{json_array, truncate_text};

pub const MAX_SEARCH_COUNT: usize = 49;
pub const MAX_UPDATE_COUNT: usize = 100;
pub const MAX_POST_COUNT: usize = 100;
pub const REACTIONS_PAGE_SIZE: usize = 10;

/// `accept` header asking for the normalized (`included`) answer layout.
pub const NORMALIZED_JSON: &str = "application/vnd.linkedin.normalized+json+2.1";

const SEARCH_CLUSTERS_QUERY_ID: &str = "voyagerSearchDashClusters.b0928897b71bd00a5a7291755dcd64f0";
const JOB_CARDS_DECORATION: &str =
    "com.linkedin.voyager.dash.deco.jobs.search.JobSearchCardsCollection-174";
const REACTIONS_DECORATION: &str =
    "com.linkedin.voyager.dash.deco.social.ReactionsByTypeWithProfileActions-13";

const COLLECTION_RESPONSE_TYPE: &str = "com.linkedin.restli.common.CollectionResponse";
const SEARCH_CLUSTER_TYPE: &str = "com.linkedin.voyager.dash.search.SearchClusterViewModel";
const SEARCH_ITEM_TYPE: &str = "com.linkedin.voyager.dash.search.SearchItem";
const ENTITY_RESULT_TYPE: &str = "com.linkedin.voyager.dash.search.EntityResultViewModel";
const JOB_POSTING_TYPE: &str = "com.linkedin.voyager.dash.jobs.JobPosting";

/// Pulls the page's items out of a decoded answer.
pub type Extractor = fn(&Value) -> Vec<Value>;

/// How consecutive pages are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// `start`/`count` only.
    Offset,
    /// `start`/`count` plus an opaque token read from `pointer` in each
    /// answer and sent back as `param`.
    Token {
        pointer: &'static str,
        param: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestShape {
    /// Plain API path with fixed parameters; `start` and `count` are appended.
    Query {
        path: String,
        params: Vec<(String, String)>,
        safe: &'static str,
    },
    /// The graphql search clusters query. It only takes `start`; the page
    /// size is fixed server side.
    SearchClusters {
        keywords: Option<String>,
        filters: String,
    },
}

/// One search filter, rendered as `(key:K,value:List(V1,V2))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub key: String,
    pub values: Vec<String>,
}

impl SearchFilter {
    pub fn new<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn render(&self) -> String {
        format!("(key:{},value:List({}))", self.key, self.values.join(","))
    }
}

/// Input of the global search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub keywords: Option<String>,
    pub filters: Vec<SearchFilter>,
}

impl SearchQuery {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: Some(keywords.into()),
            filters: Vec::new(),
        }
    }

    /// Search restricted to member profiles.
    pub fn people(keywords: Option<String>) -> Self {
        Self {
            keywords,
            filters: vec![SearchFilter::new("resultType", ["PEOPLE"])],
        }
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters_param(&self) -> String {
        let rendered: Vec<String> = self.filters.iter().map(SearchFilter::render).collect();
        format!("List({})", rendered.join(","))
    }
}

/// Input of the job search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSearch {
    pub keywords: Option<String>,
    pub location: Option<String>,
    /// `selectedFilters` entries, e.g. `("company", ["1035"])`.
    pub filters: Vec<(String, Vec<String>)>,
    /// Maximum posting age in seconds.
    pub listed_at: u64,
}

impl Default for JobSearch {
    fn default() -> Self {
        Self {
            keywords: None,
            location: None,
            filters: Vec::new(),
            listed_at: 24 * 60 * 60,
        }
    }
}

impl JobSearch {
    pub fn new(keywords: impl Into<String>) -> Self {
        Self {
            keywords: Some(keywords.into()),
            ..Self::default()
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_filter<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.filters
            .push((key.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// The `query` parameter:
    /// `(origin:...,keywords:K,locationFallback:L,selectedFilters:(...),
    /// spellCorrectionEnabled:true)`.
    pub fn query_param(&self) -> String {
        let mut parts = vec!["origin:JOB_SEARCH_PAGE_QUERY_EXPANSION".to_string()];
        if let Some(keywords) = &self.keywords {
            parts.push(format!("keywords:{keywords}"));
        }
        if let Some(location) = &self.location {
            parts.push(format!("locationFallback:{location}"));
        }

        let mut selected: Vec<String> = self
            .filters
            .iter()
            .map(|(key, values)| format!("{key}:List({})", values.join(",")))
            .collect();
        selected.push(format!("timePostedRange:List(r{})", self.listed_at));
        parts.push(format!("selectedFilters:({})", selected.join(",")));
        parts.push("spellCorrectionEnabled:true".to_string());

        format!("({})", parts.join(","))
    }
}

/// Everything that distinguishes one paginated endpoint from another.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub name: &'static str,
    pub shape: RequestShape,
    pub page_size: usize,
    pub cursor: Cursor,
    pub accept: Option<&'static str>,
    pub extract: Extractor,
    pub retry: RetrySettings,
}

impl SourceConfig {
    fn query(
        name: &'static str,
        path: &str,
        params: Vec<(&str, String)>,
        page_size: usize,
    ) -> Self {
        Self {
            name,
            shape: RequestShape::Query {
                path: path.to_string(),
                params: params
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                safe: "",
            },
            page_size,
            cursor: Cursor::Offset,
            accept: None,
            extract: elements,
            retry: RetrySettings::default(),
        }
    }

    /// Global search over the graphql clusters endpoint.
    pub fn search(query: &SearchQuery) -> Self {
        Self {
            name: "search",
            shape: RequestShape::SearchClusters {
                keywords: query.keywords.clone(),
                filters: query.filters_param(),
            },
            page_size: MAX_SEARCH_COUNT,
            cursor: Cursor::Offset,
            accept: None,
            extract: search_entity_results,
            retry: RetrySettings::default(),
        }
    }

    pub fn job_search(search: &JobSearch) -> Self {
        let mut config = Self::query(
            "job search",
            "/voyagerJobsDashJobCards",
            vec![
                ("decorationId", JOB_CARDS_DECORATION.to_string()),
                ("q", "jobSearch".to_string()),
                ("query", search.query_param()),
            ],
            MAX_SEARCH_COUNT,
        );
        if let RequestShape::Query { safe, .. } = &mut config.shape {
            *safe = "(),:";
        }
        config.accept = Some(NORMALIZED_JSON);
        config.extract = job_postings;
        config
    }

    /// Activity of a member, keyed by public id or hash id.
    pub fn profile_updates(profile_id: &str) -> Self {
        Self::query(
            "profile updates",
            "/feed/updates",
            vec![
                ("profileId", profile_id.to_string()),
                ("q", "memberShareFeed".to_string()),
                ("moduleKey", "member-share".to_string()),
            ],
            MAX_UPDATE_COUNT,
        )
    }

    pub fn company_updates(universal_name: &str) -> Self {
        Self::query(
            "company updates",
            "/feed/updates",
            vec![
                ("companyUniversalName", universal_name.to_string()),
                ("q", "companyFeedByUniversalName".to_string()),
                ("moduleKey", "member-share".to_string()),
            ],
            MAX_UPDATE_COUNT,
        )
    }

    /// Reactions to the activity with numeric id `activity_id`.
    pub fn post_reactions(activity_id: &str) -> Self {
        Self::query(
            "post reactions",
            "/voyagerSocialDashReactions",
            vec![
                ("decorationId", REACTIONS_DECORATION.to_string()),
                ("q", "reactionType".to_string()),
                ("threadUrn", format!("urn:li:activity:{activity_id}")),
            ],
            REACTIONS_PAGE_SIZE,
        )
    }

    /// Posts authored by the member with hash id `hash_id`.
    pub fn profile_posts(hash_id: &str) -> Self {
        let mut config = Self::query(
            "profile posts",
            "/identity/profileUpdatesV2",
            vec![
                ("q", "memberShareFeed".to_string()),
                ("moduleKey", "member-shares:phone".to_string()),
                ("includeLongTermHistory", "true".to_string()),
                ("profileUrn", profile_urn(hash_id)),
            ],
            MAX_POST_COUNT,
        );
        config.cursor = Cursor::Token {
            pointer: "/metadata/paginationToken",
            param: "paginationToken",
        };
        config
    }

    /// Comments under the activity with numeric id `activity_id`.
    pub fn post_comments(activity_id: &str) -> Self {
        let mut config = Self::query(
            "post comments",
            "/feed/comments",
            vec![
                ("q", "comments".to_string()),
                ("sortOrder", "RELEVANCE".to_string()),
                ("updateId", format!("activity:{activity_id}")),
            ],
            MAX_POST_COUNT,
        );
        config.cursor = Cursor::Token {
            pointer: "/metadata/paginationToken",
            param: "paginationToken",
        };
        config
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// The request for one page.
    pub fn request(&self, page: &PageRequest) -> ApiRequest {
        let mut request = match &self.shape {
            RequestShape::Query { path, params, safe } => ApiRequest::api(path.as_str())
                .queries(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .query("count", page.count)
                .query("start", page.start)
                .safe(*safe),
            RequestShape::SearchClusters { keywords, filters } => {
                let keywords = keywords
                    .as_deref()
                    .map(|k| format!("keywords:{k},"))
                    .unwrap_or_default();
                ApiRequest::api("/graphql").raw_query(format!(
                    "variables=(start:{},origin:GLOBAL_SEARCH_HEADER,query:({keywords}flagshipSearchIntent:SEARCH_SRP,queryParameters:{filters},includeFiltersInResponse:false))&queryId={SEARCH_CLUSTERS_QUERY_ID}",
                    page.start
                ))
            }
        };

        if let Cursor::Token { param, .. } = self.cursor
            && let Some(token) = &page.token
        {
            request = request.query(param, token);
        }
        if let Some(accept) = self.accept {
            request = request.header("accept", accept);
        }
        request
    }
}

/// `elements` of a collection answer.
pub fn elements(data: &Value) -> Vec<Value> {
    json_array(data, "/elements").to_vec()
}

/// `entityResult` of every search item across all clusters.
pub fn search_entity_results(data: &Value) -> Vec<Value> {
    let Some(clusters) = data.pointer("/data/searchDashClustersByAll") else {
        return Vec::new();
    };
    if type_of(clusters) != Some(COLLECTION_RESPONSE_TYPE) {
        return Vec::new();
    }

    json_array(clusters, "/elements")
        .iter()
        .filter(|cluster| type_of(cluster) == Some(SEARCH_CLUSTER_TYPE))
        .flat_map(|cluster| json_array(cluster, "/items"))
        .filter(|item| type_of(item) == Some(SEARCH_ITEM_TYPE))
        .filter_map(|item| item.pointer("/item/entityResult"))
        .filter(|entity| type_of(entity) == Some(ENTITY_RESULT_TYPE))
        .cloned()
        .collect()
}

/// Job postings among the `included` entities of a normalized answer.
pub fn job_postings(data: &Value) -> Vec<Value> {
    json_array(data, "/included")
        .iter()
        .filter(|entity| entity.get("$type").and_then(Value::as_str) == Some(JOB_POSTING_TYPE))
        .cloned()
        .collect()
}

fn type_of(value: &Value) -> Option<&str> {
    value.get("_type").and_then(Value::as_str)
}

/// A [`SourceConfig`] bound to a session.
pub struct JsonPageSource<S: ?Sized> {
    session: Arc<S>,
    config: SourceConfig,
    recover: Option<Arc<dyn Recover>>,
}

impl<S> JsonPageSource<S>
where
    S: ApiSession + ?Sized,
{
    pub fn new(session: Arc<S>, config: SourceConfig) -> Self {
        Self {
            session,
            config,
            recover: None,
        }
    }

    pub fn with_recover(mut self, recover: Arc<dyn Recover>) -> Self {
        self.recover = Some(recover);
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }
}

#[async_trait]
impl<S> PageSource for JsonPageSource<S>
where
    S: ApiSession + ?Sized,
{
    type Item = Value;

    fn name(&self) -> &str {
        self.config.name
    }

    fn page_size(&self) -> usize {
        self.config.page_size
    }

    fn uses_token(&self) -> bool {
        matches!(self.config.cursor, Cursor::Token { .. })
    }

    async fn fetch_page(&self, page: &PageRequest) -> Result<Page<Value>> {
        let request = self.config.request(page);
        let response = get_with_retry(
            self.session.as_ref(),
            &request,
            &self.config.retry,
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
        // Some endpoints wrap failures in a 200 with a `status` field.
        if let Some(status) = data.get("status").and_then(Value::as_u64)
            && let Ok(status) = u16::try_from(status)
            && !is_ok_status(status)
        {
            return Err(LinkedinError::from_status(
                status,
                data.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default(),
            ));
        }

        let items = (self.config.extract)(&data);
        let token = match self.config.cursor {
            Cursor::Token { pointer, .. } => data
                .pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_owned),
            Cursor::Offset => None,
        };
        debug!(
            source = self.config.name,
            start = page.start,
            received = items.len(),
            "Fetched page"
        );

        Ok(Page::new(items).with_token(token))
    }
}
