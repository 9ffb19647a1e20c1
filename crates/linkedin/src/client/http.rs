use std::fmt::Display;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;

/// Characters left unescaped in graphql query strings.
pub const GRAPHQL_SAFE_CHARS: &str = ":+()";

/// Which base URL a request path is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// `{site}{api_path}{path}`
    Api,
    /// `{site}{path}`
    Site,
    /// `path` is already a full URL.
    Absolute,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
    Text(String),
}

/// A request against the platform, independent of the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub target: Target,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Characters that stay unescaped when `query` is encoded.
    pub safe: &'static str,
    /// Pre-encoded query appended verbatim after `query`.
    pub raw_query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    fn new(target: Target, path: impl Into<String>) -> Self {
        Self {
            target,
            path: path.into(),
            query: Vec::new(),
            safe: "",
            raw_query: None,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn api(path: impl Into<String>) -> Self {
        Self::new(Target::Api, path)
    }

    pub fn site(path: impl Into<String>) -> Self {
        Self::new(Target::Site, path)
    }

    pub fn absolute(url: impl Into<String>) -> Self {
        Self::new(Target::Absolute, url)
    }

    /// `GET /graphql?variables=(k:v,...)&queryId=<id>`.
    pub fn graphql<K, V>(variables: impl IntoIterator<Item = (K, V)>, query_id: &str) -> Self
    where
        K: Display,
        V: Display,
    {
        let variables = variables
            .into_iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(",");

        Self::api("/graphql")
            .query("variables", format!("({variables})"))
            .query("queryId", query_id)
            .safe(GRAPHQL_SAFE_CHARS)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn queries<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: ToString,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    pub fn safe(mut self, safe: &'static str) -> Self {
        self.safe = safe;
        self
    }

    pub fn raw_query(mut self, raw: impl Into<String>) -> Self {
        self.raw_query = Some(raw.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Some(RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    /// The encoded query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        let encoded = encode_query(&self.query, self.safe);
        match (&self.raw_query, encoded.is_empty()) {
            (Some(raw), true) => raw.clone(),
            (Some(raw), false) => format!("{encoded}&{raw}"),
            (None, _) => encoded,
        }
    }

    /// Resolve against the configured base URLs.
    pub fn url(&self, site_base: &str, api_base: &str) -> String {
        let base = match self.target {
            Target::Api => api_base,
            Target::Site => site_base,
            Target::Absolute => "",
        };
        let query = self.query_string();
        if query.is_empty() {
            format!("{base}{}", self.path)
        } else {
            format!("{base}{}?{query}", self.path)
        }
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Form-style encoding: spaces become `+`, characters in `safe` stay as-is.
pub fn encode_component(input: &str, safe: &str) -> String {
    let mut encoded = urlencoding::encode(input).replace("%20", "+");
    for c in safe.chars() {
        if c.is_ascii() {
            encoded = encoded.replace(&format!("%{:02X}", c as u8), &c.to_string());
        }
    }
    encoded
}

pub fn encode_query(pairs: &[(String, String)], safe: &str) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k, safe), encode_component(v, safe)))
        .collect::<Vec<_>>()
        .join("&")
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn json_value(&self) -> Result<Value> {
        self.json()
    }
}
