//! The impersonating request handler.
//!
//! Each request moves through
//! `Received -> Authenticating -> Authenticated -> Proxying -> Completed | UpstreamError`
//! or `Authenticating -> Unauthenticated -> Rejected`. No state survives the
//! request: the authenticator is resolved from the cache on every call and
//! the upstream exchange is dropped with the inbound request.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use authn_cache_sdk::{AuthenticatorId, TokenCredentialRequestAuthenticator};
use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::{IntoResponse, Response};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::credential;
use crate::headers;
use crate::status::Status;
use crate::upstream::Upstream;

/// Authenticates callers and forwards their requests upstream as themselves.
pub struct ImpersonationProxy {
    authenticator: Arc<dyn TokenCredentialRequestAuthenticator>,
    default_authenticator: Option<AuthenticatorId>,
    upstream: Upstream,
}

impl ImpersonationProxy {
    #[must_use]
    pub fn new(
        authenticator: Arc<dyn TokenCredentialRequestAuthenticator>,
        default_authenticator: Option<AuthenticatorId>,
        upstream: Upstream,
    ) -> Self {
        Self {
            authenticator,
            default_authenticator,
            upstream,
        }
    }

    /// Router that sends every path and method through [`Self::handle`].
    #[must_use]
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// Authenticate `request` and forward it upstream.
    ///
    /// `peer` is appended to `X-Forwarded-For` when known.
    #[tracing::instrument(
        skip_all,
        fields(method = %request.method(), path = %request.uri().path())
    )]
    pub async fn handle(&self, request: Request, peer: Option<SocketAddr>) -> Response {
        let Some(credential) =
            credential::extract(request.headers(), self.default_authenticator.as_ref())
        else {
            debug!("request carries no usable credential");
            return Status::unauthorized().into_response();
        };

        let identity = match self
            .authenticator
            .authenticate_token_credential_request(&credential)
            .await
        {
            Ok(identity) if !identity.username.is_empty() => identity,
            Ok(_) => {
                debug!(authenticator = %credential.authenticator(), "identity has no username");
                return Status::unauthorized().into_response();
            }
            Err(e) if e.is_unauthenticated() => {
                debug!(error = %e, "authentication rejected");
                return Status::unauthorized().into_response();
            }
            Err(e) => {
                warn!(error = %e, "authenticator could not decide");
                return Status::unauthorized().into_response();
            }
        };
        drop(credential);

        let (mut parts, body) = request.into_parts();
        let target = match self.upstream.target(&parts.uri) {
            Ok(target) => target,
            Err(e) => {
                error!(error = %e, "could not build upstream URI");
                return Status::internal_error("invalid upstream URI").into_response();
            }
        };

        headers::strip_inbound(&mut parts.headers);
        if let Err(e) = headers::add_impersonation(&mut parts.headers, &identity) {
            error!(error = %e, username = %identity.username, "identity is not a valid header value");
            return Status::internal_error("identity cannot be encoded").into_response();
        }
        if let Some(peer) = peer {
            headers::append_forwarded_for(&mut parts.headers, peer.ip());
        }

        let mut outbound = http::Request::new(body);
        *outbound.method_mut() = parts.method;
        *outbound.uri_mut() = target;
        *outbound.headers_mut() = parts.headers;

        debug!(username = %identity.username, groups = identity.groups.len(), "proxying");
        match self.upstream.send(outbound).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                headers::strip_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, Body::new(body))
            }
            Err(e) => {
                error!(error = %e, upstream = %self.upstream.base(), "upstream request failed");
                Status::bad_gateway(format!("upstream request failed: {e}")).into_response()
            }
        }
    }
}

impl fmt::Debug for ImpersonationProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpersonationProxy")
            .field("default_authenticator", &self.default_authenticator)
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}

async fn proxy_handler(State(proxy): State<Arc<ImpersonationProxy>>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    proxy.handle(request, peer).await
}
