use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::utils::capture_group_1;

static APPLICATION_INSTANCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta[^>]*name="applicationInstance"[^>]*content="([^"]*)""#).unwrap()
});

static PAGE_INSTANCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta[^>]*name="clientPageInstanceId"[^>]*content="([^"]*)""#).unwrap()
});

/// Instance metadata scraped from the site root, needed by write operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_application_instance: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_page_instance_id: Option<String>,
}

impl ClientMetadata {
    pub fn is_empty(&self) -> bool {
        self.client_application_instance.is_none() && self.client_page_instance_id.is_none()
    }
}

fn unescape_attr(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Extract [`ClientMetadata`] from the site root HTML. Missing or malformed
/// tags leave the corresponding field empty.
pub fn parse_metadata(html: &str) -> ClientMetadata {
    let client_application_instance = capture_group_1(&APPLICATION_INSTANCE_REGEX, html)
        .map(unescape_attr)
        .and_then(|raw| match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(error = %e, "Malformed applicationInstance metadata");
                None
            }
        });

    let client_page_instance_id = capture_group_1(&PAGE_INSTANCE_REGEX, html)
        .map(unescape_attr)
        .filter(|id| !id.is_empty());

    ClientMetadata {
        client_application_instance,
        client_page_instance_id,
    }
}
