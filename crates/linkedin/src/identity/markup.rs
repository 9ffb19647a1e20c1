//! Identifier scraping from a public profile page.
//!
//! The page embeds the profile as entity-encoded JSON-ish text; once `&quot;`
//! is stripped the identifiers sit next to stable markers.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::record::IdentityRecord;
use crate::utils::capture_group_1;

/// `memberIdentity` values starting with this belong to automation accounts.
const PROBE_PREFIX: &str = "AEM";

static MEMBER_IDENTITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"memberIdentity\\u003D([^\\]+)").unwrap());

static VANITY_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"vanityName:([^)]+)").unwrap());

static PROFILE_URN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"urn:li:fsd_profile:([^,]+)\]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("Could not find public ID from HTML")]
    PublicId,
    #[error("Could not find hash ID from HTML")]
    HashId,
    #[error("Could not find member ID from HTML")]
    MemberId,
}

fn strip_entities(html: &str) -> String {
    html.replace("&quot;", "")
}

pub fn public_id_from_html(html: &str) -> Result<String, MarkupError> {
    let parsed = strip_entities(html);

    if let Some(id) = MEMBER_IDENTITY_REGEX
        .captures_iter(&parsed)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|id| !id.starts_with(PROBE_PREFIX))
    {
        return Ok(id.to_string());
    }

    capture_group_1(&VANITY_NAME_REGEX, &parsed)
        .and_then(|raw| raw.rsplit(':').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(MarkupError::PublicId)
}

pub fn hash_id_from_html(html: &str) -> Result<String, MarkupError> {
    let parsed = strip_entities(html);
    capture_group_1(&PROFILE_URN_REGEX, &parsed)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(MarkupError::HashId)
}

/// Member id paired with `hash_id` by an `objectUrn:urn:li:member:` marker.
pub fn member_id_from_html(html: &str, hash_id: &str) -> Result<u64, MarkupError> {
    let parsed = strip_entities(html);
    let re = Regex::new(&format!(
        r"\({}(.+),objectUrn:urn:li:member:(\d+)",
        regex::escape(hash_id)
    ))
    .map_err(|_| MarkupError::MemberId)?;

    re.captures(&parsed)
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or(MarkupError::MemberId)
}

/// All three identifiers, hash id first since the member id hangs off it.
pub fn identity_from_html(html: &str) -> Result<IdentityRecord, MarkupError> {
    let hash_id = hash_id_from_html(html)?;
    let public_id = public_id_from_html(html)?;
    let member_id = member_id_from_html(html, &hash_id)?;
    Ok(IdentityRecord {
        public_id,
        hash_id,
        member_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<code>{&quot;data&quot;:{&quot;*elements&quot;:[&quot;urn:li:fsd_profile:ACoAAB1]&quot;,x],
        &quot;url&quot;:&quot;/voyager/api/identity/dash/profiles?q\u003DmemberIdentity\u0026memberIdentity\u003DAEMprobe\u0026x&quot;,
        &quot;url&quot;:&quot;/voyager/api/identity/dash/profiles?q\u003DmemberIdentity\u0026memberIdentity\u003Dada-lovelace\u0026decorationId&quot;,
        (ACoAAB1,abc,objectUrn:urn:li:member:42,entityUrn:...)</code>"#;

    #[test]
    fn test_identity_from_html() {
        let identity = identity_from_html(PAGE).unwrap();
        assert_eq!(
            identity,
            IdentityRecord {
                public_id: "ada-lovelace".into(),
                hash_id: "ACoAAB1".into(),
                member_id: 42,
            }
        );
    }

    #[test]
    fn test_public_id_skips_automation_values() {
        let html = r"memberIdentity\u003DAEMxyz\u0026";
        assert_eq!(public_id_from_html(html), Err(MarkupError::PublicId));
    }

    #[test]
    fn test_public_id_vanity_fallback() {
        let html = "(vanityName:grace-hopper)";
        assert_eq!(public_id_from_html(html).unwrap(), "grace-hopper");
    }

    #[test]
    fn test_missing_markers() {
        assert_eq!(hash_id_from_html("<html></html>"), Err(MarkupError::HashId));
        assert_eq!(
            member_id_from_html("(ACoAAB1,objectUrn:urn:li:member:x)", "ACoAAB1"),
            Err(MarkupError::MemberId)
        );
        assert_eq!(
            identity_from_html("<html></html>").unwrap_err().to_string(),
            "Could not find hash ID from HTML"
        );
    }

    #[test]
    fn test_member_id_escapes_hash() {
        // A hash id with regex metacharacters must be matched literally.
        let html = "(a.b+c,x,objectUrn:urn:li:member:7";
        assert_eq!(member_id_from_html(html, "a.b+c").unwrap(), 7);
        assert!(member_id_from_html("(axbbc,x,objectUrn:urn:li:member:7", "a.b+c").is_err());
    }
}
