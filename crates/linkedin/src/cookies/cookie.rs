use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Session cookie. Its value doubles as the CSRF token.
pub const SESSION_COOKIE: &str = "JSESSIONID";

/// A single cookie as persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Expiry as a unix timestamp in seconds. `None` for session-only cookies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

impl StoredCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
        }
    }

    pub fn with_expires(mut self, expires: i64) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Parse one `Set-Cookie` header value. `now` anchors `Max-Age`.
    pub fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = StoredCookie::new(name, value.trim());
        let mut max_age = None;

        for attr in parts {
            let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
            let val = val.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "domain" => cookie.domain = Some(val.to_string()),
                "path" => cookie.path = Some(val.to_string()),
                "expires" => cookie.expires = parse_cookie_date(val),
                "max-age" => max_age = val.parse::<i64>().ok(),
                _ => {}
            }
        }

        // Max-Age wins over Expires.
        if let Some(age) = max_age {
            cookie.expires = Some(now.timestamp() + age);
        }

        Some(cookie)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|exp| exp <= now.timestamp())
    }
}

fn parse_cookie_date(value: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.timestamp());
    }
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// The cookie jar of one authenticated session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieSet {
    cookies: Vec<StoredCookie>,
}

impl CookieSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredCookie> {
        self.cookies.iter()
    }

    pub fn get(&self, name: &str) -> Option<&StoredCookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|c| c.value.as_str())
    }

    /// Insert or replace the cookie with the same name.
    pub fn insert(&mut self, cookie: StoredCookie) {
        match self.cookies.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<StoredCookie> {
        let idx = self.cookies.iter().position(|c| c.name == name)?;
        Some(self.cookies.remove(idx))
    }

    /// Absorb every `Set-Cookie` header of a response.
    pub fn merge_set_cookie_headers(&mut self, headers: &HeaderMap, now: DateTime<Utc>) {
        for header in headers.get_all(SET_COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            if let Some(cookie) = StoredCookie::parse_set_cookie(raw, now) {
                debug!(name = %cookie.name, "Storing cookie");
                self.insert(cookie);
            }
        }
    }

    /// Value for the `Cookie` request header.
    pub fn to_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// CSRF token derived from the session cookie, surrounding quotes removed.
    pub fn csrf_token(&self) -> Option<String> {
        self.value(SESSION_COOKIE)
            .map(|v| v.trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    }

    /// A jar is fresh when its session cookie exists, carries an expiry
    /// and that expiry is still in the future.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.get(SESSION_COOKIE).is_some_and(|c| {
            !c.value.trim_matches('"').is_empty()
                && c.expires.is_some_and(|exp| exp > now.timestamp())
        })
    }
}

impl FromIterator<StoredCookie> for CookieSet {
    fn from_iter<I: IntoIterator<Item = StoredCookie>>(iter: I) -> Self {
        let mut set = CookieSet::new();
        for cookie in iter {
            set.insert(cookie);
        }
        set
    }
}
