//! Caller credential extraction.

use authn_cache_sdk::{AuthenticatorId, TokenCredentialRequest};
use http::HeaderMap;
use http::header::AUTHORIZATION;

/// Bearer value of the `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(str::trim))
        .filter(|token| !token.is_empty())
}

/// Turn the caller's bearer token into a token credential request.
///
/// A bearer that decodes to a token credential request carries its own
/// authenticator reference. Any other bearer is a plain token for
/// `default_authenticator`. Returns `None` when there is no bearer, or a
/// plain token and no default.
pub fn extract(
    headers: &HeaderMap,
    default_authenticator: Option<&AuthenticatorId>,
) -> Option<TokenCredentialRequest> {
    let bearer = bearer_token(headers)?;
    if let Some(request) = TokenCredentialRequest::from_encoded_bearer(bearer) {
        return Some(request);
    }
    default_authenticator.map(|id| TokenCredentialRequest::new(bearer, id.clone()))
}
