//! Bounded accumulation of paged listings.

mod feed;
mod json_source;
mod source;
mod state;

pub use feed::{
    DEFAULT_FEED_LIMIT, FEED_PAGE_SIZE, FeedPost, FeedSource, feed_elements, feed_posts, feed_urns,
    fetch_feed_posts, reconcile_feed,
};
pub use json_source::{
    Cursor, Extractor, JobSearch, JsonPageSource, MAX_POST_COUNT, MAX_SEARCH_COUNT,
    MAX_UPDATE_COUNT, NORMALIZED_JSON, REACTIONS_PAGE_SIZE, RequestShape, SearchFilter,
    SearchQuery, SourceConfig, elements, job_postings, search_entity_results,
};
pub use source::{PageSource, fetch_paginated};
pub use state::{MAX_REPEATED_REQUESTS, Page, PageRequest, PageState};
