//! Service implementation for the webhook authenticator plugin.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use authn_cache_sdk::{AuthenticatorError, Identity};
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Request, Uri};
use http_body_util::{BodyExt, Full, Limited};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use rustls::ClientConfig;
use tracing::warn;

use super::error::WebhookConfigError;
use super::token_review::{TokenReviewRequest, TokenReviewResponse};
use crate::config::WebhookAuthNPluginConfig;

const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Webhook token authenticator.
pub struct Service {
    endpoint: Uri,
    client: HttpsClient,
    timeout: Duration,
}

impl Service {
    /// Build an authenticator from plugin configuration.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint is not an absolute `http(s)` URL, the CA data is
    /// not base64 PEM, or the timeout is zero.
    pub fn from_config(cfg: &WebhookAuthNPluginConfig) -> Result<Self, WebhookConfigError> {
        let endpoint = parse_endpoint(&cfg.endpoint)?;
        if cfg.timeout_seconds == 0 {
            return Err(WebhookConfigError::ZeroTimeout);
        }

        let roots = dynamiccert::root_store(cfg.certificate_authority_data.as_deref())
            .map_err(|e| WebhookConfigError::InvalidCertificateAuthority(e.to_string()))?;
        let tls = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self {
            endpoint,
            client: Client::builder(TokioExecutor::new()).build(connector),
            timeout: Duration::from_secs(cfg.timeout_seconds),
        })
    }

    /// Submit `token` for review.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the token is empty or the webhook rejects it
    /// - `Unavailable` on transport failure, timeout, or a non-2xx reply
    /// - `Internal` if the reply is not a `TokenReview`
    pub async fn review(&self, token: &str) -> Result<Identity, AuthenticatorError> {
        if token.is_empty() {
            return Err(AuthenticatorError::Unauthorized("empty token".to_owned()));
        }

        let body = serde_json::to_vec(&TokenReviewRequest::new(token))
            .map_err(|e| AuthenticatorError::Internal(format!("encoding TokenReview: {e}")))?;
        let request = Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| AuthenticatorError::Internal(format!("building request: {e}")))?;

        let exchange = async {
            let response = self.client.request(request).await.map_err(|e| {
                AuthenticatorError::Unavailable(format!("webhook request failed: {e}"))
            })?;
            let status = response.status();
            let body = Limited::new(response.into_body(), MAX_RESPONSE_BYTES)
                .collect()
                .await
                .map_err(|e| {
                    AuthenticatorError::Unavailable(format!("reading webhook response: {e}"))
                })?
                .to_bytes();
            Ok::<_, AuthenticatorError>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                AuthenticatorError::Unavailable(format!(
                    "webhook did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if !status.is_success() {
            warn!(endpoint = %self.endpoint, status = %status, "webhook returned an error status");
            return Err(AuthenticatorError::Unavailable(format!(
                "webhook returned HTTP {status}"
            )));
        }

        let review: TokenReviewResponse = serde_json::from_slice(&body)
            .map_err(|e| AuthenticatorError::Internal(format!("decoding TokenReview: {e}")))?;
        review.status.into_identity()
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Uri, WebhookConfigError> {
    let invalid = |reason: &str| WebhookConfigError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        reason: reason.to_owned(),
    };

    let uri: Uri = endpoint.parse().map_err(|_| invalid("not a URL"))?;
    if uri.host().is_none() {
        return Err(invalid("missing host"));
    }
    match uri.scheme_str() {
        Some("https") => {}
        Some("http") => {
            warn!(endpoint, "webhook endpoint is not using TLS; tokens will be sent in clear text");
        }
        _ => return Err(invalid("scheme must be https")),
    }
    Ok(uri)
}
