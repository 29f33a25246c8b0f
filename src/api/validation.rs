//! Input validation helpers: recipient addresses and DFG-Viewer URL
//! unwrapping.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

static DFG_VIEWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://dfg-viewer\.de/").unwrap());

static DFG_METS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"set\[mets\]=(http[^&]+)").unwrap());

static DFG_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tx_dlf\[id\]=(http.+)").unwrap());

/// Deliverable-address shape check for notification recipients
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(address)
}

/// Resolve the METS URL out of a submission.
///
/// Plain URLs pass through. DFG-Viewer URLs carry the METS location as a
/// query parameter; `None` when a viewer URL references no METS document.
pub fn resolve_mets_url(raw: &str) -> Option<String> {
    if !DFG_VIEWER_RE.is_match(raw) {
        return Some(raw.to_string());
    }
    let decoded = urlencoding::decode(raw).ok()?;
    DFG_METS_RE
        .captures(&decoded)
        .or_else(|| DFG_ID_RE.captures(&decoded))
        .map(|captures| captures[1].to_string())
}
