//! Header hygiene for requests relayed between the BFF and its upstreams.
//!
//! Hop-by-hop headers belong to a single connection and are dropped before a
//! message is relayed in either direction. A `Via` entry records the relay.

use http::Version;
use http::header::{
    CONNECTION, CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue, HOST, PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE, VIA,
};

static HOP_BY_HOP_NAMES: &[HeaderName] = &[
    CONNECTION,
    TRANSFER_ENCODING,
    TE,
    TRAILER,
    UPGRADE,
    PROXY_AUTHORIZATION,
    PROXY_AUTHENTICATE,
];

pub fn is_http1(v: Version) -> bool {
    matches!(v, Version::HTTP_09 | Version::HTTP_10 | Version::HTTP_11)
}

fn version_label(version: Version) -> Option<&'static str> {
    match version {
        Version::HTTP_09 => Some("0.9"),
        Version::HTTP_10 => Some("1.0"),
        Version::HTTP_11 => Some("1.1"),
        Version::HTTP_2 => Some("2"),
        Version::HTTP_3 => Some("3"),
        _ => None,
    }
}

/// Appends `<version> <pseudonym>` to the Via header, creating it if absent.
pub fn add_via_header(headers: &mut HeaderMap, version: Version, pseudonym: &str) {
    let Some(version_str) = version_label(version) else {
        tracing::debug!(?version, "unknown HTTP version, skipping Via header");
        return;
    };

    let entry = format!("{version_str} {pseudonym}");
    let combined = match headers.get(VIA).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {entry}"),
        None => entry,
    };

    if let Ok(value) = HeaderValue::from_str(&combined) {
        headers.insert(VIA, value);
    }
}

/// Strips connection-scoped headers from an HTTP/1.x message.
///
/// Besides the standard hop-by-hop set this drops any header named in the
/// Connection value, and `keep-alive` for HTTP/1.0 and older. HTTP/2 and
/// HTTP/3 carry no hop-by-hop headers so they pass through untouched.
pub fn filter_hop_by_hop(headers: &mut HeaderMap, version: Version) -> &mut HeaderMap {
    if !is_http1(version) {
        return headers;
    }

    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| HeaderName::from_bytes(token.as_bytes()).ok())
        .collect();

    for name in HOP_BY_HOP_NAMES.iter().chain(listed.iter()) {
        headers.remove(name);
    }

    if matches!(version, Version::HTTP_09 | Version::HTTP_10) {
        headers.remove(HeaderName::from_static("keep-alive"));
    }

    headers
}

/// Prepares headers of a message whose body is about to be re-framed.
///
/// Removes hop-by-hop headers plus Host and Content-Length, which the
/// outgoing client or server recomputes for the new connection.
pub fn normalize_relayed_headers(headers: &mut HeaderMap, version: Version) -> &mut HeaderMap {
    filter_hop_by_hop(headers, version);
    headers.remove(HOST);
    headers.remove(CONTENT_LENGTH);
    headers
}
