//! Service implementation for the JWT authenticator plugin.

use std::fmt;

use authn_cache_sdk::{AuthenticatorError, Identity};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::Value;
use tracing::debug;

use super::error::JwtConfigError;
use crate::config::{ClaimMappings, JwtAuthNPluginConfig};

/// Validates JWTs against one issuer, audience and key.
pub struct Service {
    key: DecodingKey,
    validation: Validation,
    claims: ClaimMappings,
}

impl Service {
    /// Build an authenticator from plugin configuration.
    ///
    /// # Errors
    ///
    /// Fails if issuer or audience is empty, the key field matching the
    /// algorithm is missing, or the key cannot be parsed.
    pub fn from_config(cfg: &JwtAuthNPluginConfig) -> Result<Self, JwtConfigError> {
        if cfg.issuer.is_empty() {
            return Err(JwtConfigError::MissingIssuer);
        }
        if cfg.audience.is_empty() {
            return Err(JwtConfigError::MissingAudience);
        }

        let key = decoding_key(cfg)?;

        let mut validation = Validation::new(cfg.algorithm);
        validation.set_issuer(&[cfg.issuer.as_str()]);
        validation.set_audience(&[cfg.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = cfg.leeway_seconds;

        Ok(Self {
            key,
            validation,
            claims: cfg.claims.clone(),
        })
    }

    /// Verify `token` and extract the identity.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when the signature, `exp`, `nbf`, `iss` or
    /// `aud` check fails, or when the username claim is missing or empty.
    pub fn validate(&self, token: &str) -> Result<Identity, AuthenticatorError> {
        let data = decode::<Value>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "jwt rejected");
            AuthenticatorError::Unauthorized(format!("invalid token: {e}"))
        })?;
        let claims = data.claims;

        let username = claims
            .get(&self.claims.username)
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                AuthenticatorError::Unauthorized(format!(
                    "token has no `{}` claim",
                    self.claims.username
                ))
            })?;

        let groups = match claims.get(&self.claims.groups) {
            Some(Value::String(group)) => vec![group.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };

        Ok(Identity::new(username, groups))
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("algorithms", &self.validation.algorithms)
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

fn decoding_key(cfg: &JwtAuthNPluginConfig) -> Result<DecodingKey, JwtConfigError> {
    match cfg.algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            let secret = cfg
                .secret
                .as_deref()
                .ok_or(JwtConfigError::MissingKey { field: "secret" })?;
            Ok(DecodingKey::from_secret(secret.as_bytes()))
        }
        other => {
            let pem = cfg
                .public_key_pem
                .as_deref()
                .ok_or(JwtConfigError::MissingKey {
                    field: "public_key_pem",
                })?
                .as_bytes();
            let key = match other {
                Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem)?,
                Algorithm::EdDSA => DecodingKey::from_ed_pem(pem)?,
                _ => DecodingKey::from_rsa_pem(pem)?,
            };
            Ok(key)
        }
    }
}
