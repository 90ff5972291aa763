//! Connection to the cluster API server.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use http::header::AUTHORIZATION;
use http::uri::PathAndQuery;
use http::{HeaderValue, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use rustls::ClientConfig;
use tracing::warn;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// HTTP client bound to one upstream base URL.
#[derive(Clone)]
pub struct Upstream {
    base: Uri,
    client: HttpsClient,
    bearer: Option<HeaderValue>,
}

impl Upstream {
    /// # Errors
    ///
    /// Fails if the URL is not absolute `http(s)`, the CA data is not base64
    /// PEM, or the bearer token file cannot be read.
    pub async fn from_config(cfg: &UpstreamConfig) -> Result<Self, ProxyError> {
        let bearer = match &cfg.bearer_token_file {
            Some(path) => Some(read_bearer(path).await?),
            None => None,
        };
        Self::new(cfg, bearer)
    }

    fn new(cfg: &UpstreamConfig, bearer: Option<HeaderValue>) -> Result<Self, ProxyError> {
        let base = parse_base(&cfg.url)?;
        let roots = dynamiccert::root_store(cfg.certificate_authority_data.as_deref())
            .map_err(|e| ProxyError::InvalidCertificateAuthority(e.to_string()))?;
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
            base,
            client: Client::builder(TokioExecutor::new()).build(connector),
            bearer,
        })
    }

    #[must_use]
    pub fn base(&self) -> &Uri {
        &self.base
    }

    /// Upstream URI for an inbound request URI: the inbound path joined under
    /// the base path, with the inbound query.
    ///
    /// # Errors
    ///
    /// Fails if the joined URI is not valid.
    pub fn target(&self, inbound: &Uri) -> Result<Uri, http::Error> {
        let base_path = self.base.path().trim_end_matches('/');
        let path = inbound.path();
        let joined = match inbound.query() {
            Some(query) => format!("{base_path}{path}?{query}"),
            None => format!("{base_path}{path}"),
        };

        let mut parts = self.base.clone().into_parts();
        parts.path_and_query = Some(PathAndQuery::try_from(joined)?);
        Ok(Uri::from_parts(parts)?)
    }

    /// Send `request` upstream, adding the proxy's own credential if one is
    /// configured. The request URI must already point at the upstream.
    ///
    /// # Errors
    ///
    /// Returns the client error on connection, TLS or protocol failure.
    pub async fn send(
        &self,
        mut request: Request<Body>,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        if let Some(bearer) = &self.bearer {
            request.headers_mut().insert(AUTHORIZATION, bearer.clone());
        }
        self.client.request(request).await
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("base", &self.base)
            .field("bearer", &self.bearer.is_some())
            .finish_non_exhaustive()
    }
}

fn parse_base(url: &str) -> Result<Uri, ProxyError> {
    let invalid = |reason: &str| ProxyError::InvalidUpstream {
        url: url.to_owned(),
        reason: reason.to_owned(),
    };

    let uri: Uri = url.parse().map_err(|_| invalid("not a URL"))?;
    if uri.host().is_none() {
        return Err(invalid("missing host"));
    }
    if uri.query().is_some() {
        return Err(invalid("must not carry a query"));
    }
    match uri.scheme_str() {
        Some("https") => {}
        Some("http") => warn!(upstream = %uri, "upstream is not using TLS"),
        _ => return Err(invalid("scheme must be https")),
    }
    Ok(uri)
}

async fn read_bearer(path: &Path) -> Result<HeaderValue, ProxyError> {
    let token = tokio::fs::read_to_string(path).await?;
    let token = token.trim();
    if token.is_empty() {
        return Err(ProxyError::InvalidBearerToken(format!(
            "{} is empty",
            path.display()
        )));
    }
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ProxyError::InvalidBearerToken(e.to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}
