//! Header rewriting between the caller and the upstream.

use std::collections::HashSet;
use std::net::IpAddr;

use authn_cache_sdk::Identity;
use http::header::{AUTHORIZATION, CONNECTION, HOST, HeaderName, InvalidHeaderValue};
use http::{HeaderMap, HeaderValue};

pub const IMPERSONATE_USER: &str = "impersonate-user";
pub const IMPERSONATE_GROUP: &str = "impersonate-group";
pub const IMPERSONATE_UID: &str = "impersonate-uid";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

const IMPERSONATE_EXTRA_PREFIX: &str = "impersonate-extra-";

const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove everything the caller must not pass through: hop-by-hop headers,
/// its credential, `Host`, and any impersonation headers it tried to set.
pub(crate) fn strip_inbound(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    headers.remove(AUTHORIZATION);
    headers.remove(HOST);
    headers.remove(IMPERSONATE_USER);
    headers.remove(IMPERSONATE_GROUP);
    headers.remove(IMPERSONATE_UID);

    let extras: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(IMPERSONATE_EXTRA_PREFIX))
        .cloned()
        .collect();
    for name in extras {
        headers.remove(name);
    }
}

/// Remove connection-scoped headers, including those `Connection` names.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let mut blocked: HashSet<HeaderName> = HOP_BY_HOP_HEADERS
        .iter()
        .copied()
        .map(HeaderName::from_static)
        .collect();
    for value in headers.get_all(CONNECTION) {
        let Ok(raw) = value.to_str() else {
            continue;
        };
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if let Ok(name) = HeaderName::from_bytes(token.to_ascii_lowercase().as_bytes()) {
                blocked.insert(name);
            }
        }
    }
    for name in blocked {
        headers.remove(name);
    }
}

/// Add `Impersonate-User` and one `Impersonate-Group` per group.
///
/// # Errors
///
/// Fails if the username or a group is not a valid header value.
pub(crate) fn add_impersonation(
    headers: &mut HeaderMap,
    identity: &Identity,
) -> Result<(), InvalidHeaderValue> {
    headers.insert(IMPERSONATE_USER, HeaderValue::from_str(&identity.username)?);
    for group in &identity.groups {
        headers.append(IMPERSONATE_GROUP, HeaderValue::from_str(group)?);
    }
    Ok(())
}

/// Append `peer` to `X-Forwarded-For`.
pub(crate) fn append_forwarded_for(headers: &mut HeaderMap, peer: IpAddr) {
    let forwarded = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{prior}, {peer}"),
        _ => peer.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
