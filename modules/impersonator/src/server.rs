//! TLS listener for the impersonation proxy.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::ConnectInfo;
use dynamiccert::{DynamicCertProvider, tls_server_config};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, info, warn};

use crate::error::ProxyError;

/// ALPN protocols offered to callers.
pub const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// How long a new connection may take to complete the TLS handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Serves a router over TLS with the certificate a provider currently holds.
///
/// Every handshake reads the provider; while it is unset handshakes are
/// refused, and a new certificate applies to the next handshake.
pub struct ProxyServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    handshake_timeout: Duration,
}

impl ProxyServer {
    /// Bind `address`.
    ///
    /// # Errors
    ///
    /// Fails if the address does not parse, cannot be bound, or the TLS
    /// configuration cannot be built.
    pub async fn bind(
        address: &str,
        provider: &Arc<DynamicCertProvider>,
        router: Router,
    ) -> Result<Self, ProxyError> {
        let address: SocketAddr = address
            .parse()
            .map_err(|_| ProxyError::InvalidBindAddress(address.to_owned()))?;
        let listener = TcpListener::bind(address).await?;
        Self::from_listener(listener, provider, router)
    }

    /// # Errors
    ///
    /// Fails if the TLS configuration cannot be built.
    pub fn from_listener(
        listener: TcpListener,
        provider: &Arc<DynamicCertProvider>,
        router: Router,
    ) -> Result<Self, ProxyError> {
        let tls = tls_server_config(provider, Vec::from(ALPN_PROTOCOLS.map(<[u8]>::to_vec)))?;
        Ok(Self {
            listener,
            acceptor: TlsAcceptor::from(Arc::new(tls)),
            router,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// # Errors
    ///
    /// Fails if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, ProxyError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `cancel` fires, one task per connection.
    /// Open connections finish their in-flight requests and close.
    pub async fn serve(self, cancel: CancellationToken) {
        if let Ok(address) = self.listener.local_addr() {
            info!(%address, "impersonation proxy listening");
        }

        loop {
            let (stream, peer) = tokio::select! {
                () = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            tokio::spawn(serve_connection(
                stream,
                peer,
                self.acceptor.clone(),
                self.router.clone(),
                self.handshake_timeout,
                cancel.clone(),
            ));
        }

        info!("impersonation proxy stopped accepting connections");
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    router: Router,
    handshake_timeout: Duration,
    cancel: CancellationToken,
) {
    let handshake = tokio::time::timeout(handshake_timeout, acceptor.accept(stream));
    let tls = tokio::select! {
        () = cancel.cancelled() => return,
        accepted = handshake => match accepted {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => {
                debug!(%peer, error = %e, "TLS handshake failed");
                return;
            }
            Err(_) => {
                debug!(%peer, "TLS handshake timed out");
                return;
            }
        },
    };

    let service = hyper::service::service_fn(move |mut request: hyper::Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().oneshot(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(tls), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        () = cancel.cancelled() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };
    if let Err(e) = result {
        debug!(%peer, error = %e, "connection closed with error");
    }
}
