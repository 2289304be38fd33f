//! Hop-by-hop header sanitization.
//!
//! # Responsibilities
//! - Strip hop-by-hop and proxy-specific fields before a request is forwarded
//! - Leave every other field, and its value order, untouched

use axum::http::{HeaderMap, HeaderName};

/// Fields that only describe the client-to-proxy leg.
pub const HOP_BY_HOP: [&str; 9] = [
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "connection",
    "keep-alive",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Whether `name` is one of the fields removed by [`strip_hop_by_hop`].
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    // HeaderName is always lowercase.
    HOP_BY_HOP.contains(&name.as_str())
}

/// Remove hop-by-hop fields from `headers` in place.
///
/// `HeaderMap::remove` swaps the last entry into the removed slot, so the map
/// is rebuilt instead to keep the remaining fields in their original order.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    if !headers.keys().any(is_hop_by_hop) {
        return;
    }

    let original = std::mem::take(headers);
    let mut current: Option<HeaderName> = None;
    for (name, value) in original {
        if let Some(name) = name {
            current = Some(name);
        }
        if let Some(name) = current.as_ref().filter(|n| !is_hop_by_hop(n)) {
            headers.append(name.clone(), value);
        }
    }
}
