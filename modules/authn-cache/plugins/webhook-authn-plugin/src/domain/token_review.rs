//! `authentication.k8s.io/v1` `TokenReview` wire types.

use authn_cache_sdk::{AuthenticatorError, Identity};
use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "authentication.k8s.io/v1";
pub const KIND: &str = "TokenReview";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenReviewRequest<'a> {
    api_version: &'static str,
    kind: &'static str,
    spec: TokenReviewSpec<'a>,
}

#[derive(Serialize)]
struct TokenReviewSpec<'a> {
    token: &'a str,
}

impl<'a> TokenReviewRequest<'a> {
    #[must_use]
    pub fn new(token: &'a str) -> Self {
        Self {
            api_version: API_VERSION,
            kind: KIND,
            spec: TokenReviewSpec { token },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenReviewResponse {
    #[serde(default)]
    pub status: TokenReviewStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenReviewStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl TokenReviewStatus {
    /// Interpret the review outcome.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when the webhook did not authenticate the token
    /// or authenticated it without a username.
    pub fn into_identity(self) -> Result<Identity, AuthenticatorError> {
        if !self.authenticated {
            let reason = if self.error.is_empty() {
                "token rejected by webhook".to_owned()
            } else {
                self.error
            };
            return Err(AuthenticatorError::Unauthorized(reason));
        }
        if self.user.username.is_empty() {
            return Err(AuthenticatorError::Unauthorized(
                "webhook authenticated the token without a username".to_owned(),
            ));
        }
        Ok(Identity::new(self.user.username, self.user.groups))
    }
}
