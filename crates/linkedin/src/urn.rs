//! Helpers for the `urn:li:<type>:<id>` identifiers used across the API.

use std::sync::LazyLock;

use regex::Regex;

static ACTIVITY_URN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"urn:li:activity:\d+").unwrap());

/// Fourth colon-separated segment of a URN.
///
/// `urn:li:fs_miniProfile:<id>` yields `<id>`.
pub fn id_from_urn(urn: &str) -> Option<&str> {
    urn.split(':').nth(3).filter(|id| !id.is_empty())
}

/// Last colon-separated segment of a URN.
///
/// Works for both `urn:li:fsd_profile:ACoAAA...` and `urn:li:member:123`.
pub fn urn_tail(urn: &str) -> Option<&str> {
    urn.rsplit(':').next().filter(|id| !id.is_empty() && *id != urn)
}

/// Numeric member id from a `urn:li:member:<n>` URN.
pub fn member_id_from_urn(urn: &str) -> Option<u64> {
    urn_tail(urn).and_then(|tail| tail.parse().ok())
}

/// The `urn:li:activity:<n>` embedded in a feed update URN such as
/// `urn:li:fs_feedUpdate:(V2&FOLLOW_FEED,urn:li:activity:123)`.
pub fn activity_urn(raw: &str) -> Option<&str> {
    ACTIVITY_URN_REGEX.find(raw).map(|m| m.as_str())
}

pub fn profile_urn(hash_id: &str) -> String {
    format!("urn:li:fsd_profile:{hash_id}")
}
