//! Resilient retrieval core for the LinkedIn Voyager API.
//!
//! Session and cookie lifecycle, retry with re-authentication, cascading
//! identity resolution and bounded pagination. Every network operation is
//! async but the crate never issues two requests at once.
pub mod api;
pub mod client;
pub mod config;
pub mod cookies;
pub mod error;
pub mod identity;
pub mod pagination;
pub mod response;
pub mod retry;
pub mod urn;
mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::Linkedin;
pub use client::{ApiRequest, ApiResponse, ApiSession, SessionClient};
pub use config::{ClientConfig, EvasionConfig, ResolverConfig};
pub use cookies::{CookieRepository, CookieSet, StoredCookie};
pub use error::{LinkedinError, Result};
pub use identity::{IdentityQuery, IdentityRecord, IdentityResolver, ResolutionFailure};
pub use pagination::{PageSource, fetch_paginated};
pub use response::ApiResult;
pub use retry::{Recover, RetryPolicy, RetryStatuses, with_retry};
