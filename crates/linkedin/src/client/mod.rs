//! HTTP session layer.

mod evasion;
mod http;
mod metadata;
mod session;

use async_trait::async_trait;

pub use evasion::evade;
pub use http::{
    ApiRequest, ApiResponse, GRAPHQL_SAFE_CHARS, RequestBody, Target, encode_component,
    encode_query,
};
pub use metadata::{ClientMetadata, parse_metadata};
pub use session::SessionClient;

use crate::cookies::CookieSet;
use crate::error::Result;

/// Minimal capability the higher-level services are built on.
#[async_trait]
pub trait ApiSession: Send + Sync {
    async fn get(&self, request: ApiRequest) -> Result<ApiResponse>;

    async fn post(&self, request: ApiRequest) -> Result<ApiResponse>;

    fn cookies(&self) -> CookieSet;
}
