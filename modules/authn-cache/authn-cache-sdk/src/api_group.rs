//! API group naming.
//!
//! Every API group this system serves is defined under [`DEFAULT_SUFFIX`].
//! A deployment may choose another suffix so that several installations can
//! coexist in one cluster; [`make`] rewrites a group to the configured one.

/// Suffix all built-in API groups are defined with.
pub const DEFAULT_SUFFIX: &str = "concierge.dev";

/// Group of the token credential exchange.
pub const LOGIN_GROUP: &str = "login.concierge.dev";

/// Group of the authenticator kinds.
pub const AUTHENTICATION_GROUP: &str = "authentication.concierge.dev";

/// Version served for the login group.
pub const LOGIN_VERSION: &str = "v1alpha1";

/// Replace the default suffix of `base_group` with `suffix`.
///
/// Returns `None` if `base_group` does not end in `.` + [`DEFAULT_SUFFIX`]
/// or `suffix` is empty.
#[must_use]
pub fn make(base_group: &str, suffix: &str) -> Option<String> {
    if suffix.is_empty() {
        return None;
    }
    let prefix = base_group
        .strip_suffix(DEFAULT_SUFFIX)?
        .strip_suffix('.')
        .filter(|prefix| !prefix.is_empty())?;
    Some(format!("{prefix}.{suffix}"))
}

/// `apiVersion` string for the login group under `suffix`.
#[must_use]
pub fn login_api_version(suffix: &str) -> Option<String> {
    make(LOGIN_GROUP, suffix).map(|group| format!("{group}/{LOGIN_VERSION}"))
}
