use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::evasion::evade;
use super::http::{ApiRequest, ApiResponse, RequestBody};
use super::metadata::{ClientMetadata, parse_metadata};
use super::ApiSession;
use crate::config::ClientConfig;
use crate::cookies::{CookieRepository, CookieSet, SESSION_COOKIE};
use crate::error::{LinkedinError, Result};
use crate::retry::Recover;

const CSRF_TOKEN_HEADER: &str = "csrf-token";

const API_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/83.0.4103.116 Safari/537.36";

/// Headers sent with every Voyager API call.
fn api_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(API_USER_AGENT),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-AU,en-GB;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(
        HeaderName::from_static("x-li-lang"),
        HeaderValue::from_static("en_US"),
    );
    headers.insert(
        HeaderName::from_static("x-restli-protocol-version"),
        HeaderValue::from_static("2.0.0"),
    );
    headers
}

/// Headers of the mobile login flow.
fn auth_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-li-user-agent"),
        HeaderValue::from_static(
            "LIAuthLibrary:0.0.3 com.linkedin.android:4.1.881 Asus_ASUS_Z01QD:android_9",
        ),
    );
    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static("ANDROID OS"),
    );
    headers.insert(
        HeaderName::from_static("x-user-language"),
        HeaderValue::from_static("en"),
    );
    headers.insert(
        HeaderName::from_static("x-user-locale"),
        HeaderValue::from_static("en_US"),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-us"),
    );
    headers
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    credentials: Option<Credentials>,
    cookies: CookieSet,
    csrf_token: Option<String>,
    metadata: ClientMetadata,
}

impl SessionState {
    fn adopt(&mut self, cookies: CookieSet) {
        self.csrf_token = cookies.csrf_token();
        self.cookies = cookies;
    }
}

/// Authenticated HTTP session against the platform.
///
/// All methods take `&self`: the mutable session lives behind a lock so a
/// retry hook can re-authenticate the very client an operation is using.
/// The lock is never held across an await.
pub struct SessionClient {
    config: ClientConfig,
    http: Client,
    repository: CookieRepository,
    site_base_url: String,
    api_base_url: String,
    state: RwLock<SessionState>,
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("site_base_url", &self.site_base_url)
            .field("api_base_url", &self.api_base_url)
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder().pool_max_idle_per_host(5);

        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)?;
            builder = builder.proxy(proxy);
            info!(proxy_url = %proxy_url, "Using configured proxy");
        }

        let http = builder.build()?;
        Ok(Self::with_http_client(config, http))
    }

    /// Build around an existing `reqwest::Client`.
    pub fn with_http_client(config: ClientConfig, http: Client) -> Self {
        Self {
            repository: CookieRepository::new(config.cookies_dir.clone()),
            site_base_url: config.site_base_url.trim_end_matches('/').to_string(),
            api_base_url: config.api_base_url(),
            state: RwLock::new(SessionState::default()),
            http,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn repository(&self) -> &CookieRepository {
        &self.repository
    }

    pub fn username(&self) -> Option<String> {
        self.state
            .read()
            .credentials
            .as_ref()
            .map(|c| c.username.clone())
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.state.read().csrf_token.clone()
    }

    pub fn metadata(&self) -> ClientMetadata {
        self.state.read().metadata.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().csrf_token.is_some()
    }

    /// Adopt an externally obtained cookie jar, e.g. one exported from a browser.
    pub fn set_cookies(&self, cookies: CookieSet) {
        self.state.write().adopt(cookies);
    }

    /// Establish a session for `username`.
    ///
    /// With `allow_cache` a fresh cached session is reused; a stale or missing
    /// one falls through to a full login whose cookies are then cached.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        allow_cache: bool,
    ) -> Result<()> {
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };

        if allow_cache && !self.config.refresh_cookies {
            match self.repository.get(username).await {
                Ok(Some(cookies)) => {
                    info!("Using cached session cookies");
                    {
                        let mut state = self.state.write();
                        state.adopt(cookies);
                        state.credentials = Some(credentials);
                    }
                    self.refresh_metadata().await;
                    return Ok(());
                }
                Ok(None) => debug!("No cached session"),
                Err(LinkedinError::SessionExpired) => info!("Cached session expired"),
                Err(e) => return Err(e),
            }
        }

        let cookies = self.login(&credentials).await?;
        self.repository.save(&cookies, username).await?;
        {
            let mut state = self.state.write();
            state.adopt(cookies);
            state.credentials = Some(credentials);
        }
        info!("Authenticated");
        self.refresh_metadata().await;
        Ok(())
    }

    /// Log in again with the last credentials, bypassing the cookie cache.
    pub async fn reauthenticate(&self) -> Result<()> {
        let credentials = self
            .state
            .read()
            .credentials
            .clone()
            .ok_or(LinkedinError::NotAuthenticated)?;
        warn!(username = %credentials.username, "Re-authenticating session");
        self.authenticate(&credentials.username, &credentials.password, false)
            .await
    }

    /// Anonymous cookies followed by the credential exchange.
    async fn login(&self, credentials: &Credentials) -> Result<CookieSet> {
        let url = format!("{}/uas/authenticate", self.site_base_url);

        debug!("Requesting anonymous session cookies");
        let response = self.http.get(&url).headers(auth_headers()).send().await?;
        let mut cookies = CookieSet::new();
        cookies.merge_set_cookie_headers(response.headers(), Utc::now());

        let session_id = cookies
            .value(SESSION_COOKIE)
            .ok_or(LinkedinError::MissingField(SESSION_COOKIE))?
            .to_string();

        let response = self
            .http
            .post(&url)
            .headers(auth_headers())
            .header(COOKIE, cookies.to_header())
            .form(&[
                ("session_key", credentials.username.as_str()),
                ("session_password", credentials.password.as_str()),
                ("JSESSIONID", session_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if let Ok(data) = serde_json::from_str::<Value>(&body)
            && let Some(login_result) = data.get("login_result").and_then(Value::as_str)
            && login_result != "PASS"
        {
            warn!(login_result, "Login challenged");
            return Err(LinkedinError::AuthenticationChallenge(login_result.to_string()));
        }
        if status == 401 {
            return Err(LinkedinError::Unauthorized);
        }
        if status != 200 {
            return Err(LinkedinError::AuthFailure { status });
        }

        cookies.merge_set_cookie_headers(&headers, Utc::now());
        Ok(cookies)
    }

    /// Scrape instance metadata from the site root. Failures are logged only.
    pub async fn refresh_metadata(&self) {
        if !self.config.fetch_metadata {
            return;
        }
        match self.fetch_metadata().await {
            Ok(metadata) => self.state.write().metadata = metadata,
            Err(e) => warn!(error = %e, "Failed to fetch client metadata"),
        }
    }

    pub async fn fetch_metadata(&self) -> Result<ClientMetadata> {
        let response = self
            .send(Method::GET, ApiRequest::site(""), auth_headers())
            .await?;
        let metadata = parse_metadata(&response.body);
        debug!(
            has_application_instance = metadata.client_application_instance.is_some(),
            has_page_instance = metadata.client_page_instance_id.is_some(),
            "Fetched client metadata"
        );
        Ok(metadata)
    }

    /// `GET /graphql` with `variables=(k:v,...)` and `queryId`.
    pub async fn get_graphql<K, V>(
        &self,
        variables: impl IntoIterator<Item = (K, V)>,
        query_id: &str,
    ) -> Result<ApiResponse>
    where
        K: fmt::Display,
        V: fmt::Display,
    {
        ApiSession::get(self, ApiRequest::graphql(variables, query_id))
            .await
    }

    async fn dispatch(&self, method: Method, request: ApiRequest) -> Result<ApiResponse> {
        evade(&self.config.evasion).await;
        self.send(method, request, api_headers()).await
    }

    async fn send(
        &self,
        method: Method,
        request: ApiRequest,
        mut headers: HeaderMap,
    ) -> Result<ApiResponse> {
        let url = request.url(&self.site_base_url, &self.api_base_url);

        {
            let state = self.state.read();
            if !state.cookies.is_empty() {
                match HeaderValue::from_str(&state.cookies.to_header()) {
                    Ok(value) => {
                        headers.insert(COOKIE, value);
                    }
                    Err(e) => debug!(error = %e, "Failed to build Cookie header"),
                }
            }
            if let Some(token) = &state.csrf_token
                && let Ok(value) = HeaderValue::from_str(token)
            {
                headers.insert(HeaderName::from_static(CSRF_TOKEN_HEADER), value);
            }
        }

        for (name, value) in &request.headers {
            match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => debug!(header = %name, "Invalid header; skipping"),
            }
        }

        debug!(%method, %url, "Sending request");
        let mut builder = self.http.request(method, &url).headers(headers);
        builder = match request.body {
            Some(RequestBody::Json(body)) => builder.json(&body),
            Some(RequestBody::Form(fields)) => builder.form(&fields),
            Some(RequestBody::Text(body)) => builder.body(body),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        {
            let mut state = self.state.write();
            state.cookies.merge_set_cookie_headers(&headers, Utc::now());
            state.csrf_token = state.cookies.csrf_token();
        }

        debug!(status, len = body.len(), "Received response");
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl ApiSession for SessionClient {
    async fn get(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.dispatch(Method::GET, request).await
    }

    async fn post(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.dispatch(Method::POST, request).await
    }

    fn cookies(&self) -> CookieSet {
        self.state.read().cookies.clone()
    }
}

#[async_trait]
impl Recover for SessionClient {
    async fn recover(&self) -> Result<()> {
        self.reauthenticate().await
    }
}
