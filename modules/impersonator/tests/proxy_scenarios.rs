#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use authn_cache::AuthenticatorCache;
use authn_cache_sdk::{AuthenticatorId, TokenCredentialRequest, api_group};
use axum::Router;
use axum::body::Body;
use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use impersonator::{ImpersonationProxy, Upstream, UpstreamConfig};
use serde_json::{Value, json};
use static_authn_plugin::{StaticAuthNPluginConfig, StaticAuthenticator};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower::ServiceExt;

fn webhook_id() -> AuthenticatorId {
    AuthenticatorId::new("webhook", "group.example.com", "primary")
}

fn jwt_id() -> AuthenticatorId {
    AuthenticatorId::new("JWTAuthenticator", "authentication.concierge.dev", "idp")
}

fn static_tokens(tokens: &Value) -> Arc<StaticAuthenticator> {
    let cfg: StaticAuthNPluginConfig =
        serde_json::from_value(json!({"mode": "static_tokens", "tokens": tokens})).unwrap();
    Arc::new(StaticAuthenticator::from_config(&cfg))
}

fn cache() -> Arc<AuthenticatorCache> {
    let cache = Arc::new(AuthenticatorCache::new());
    cache.store(
        webhook_id(),
        static_tokens(&json!([
            {"token": "good-token", "identity": {"username": "alice", "groups": ["devs", "admins"]}},
        ])),
    );
    cache.store(
        jwt_id(),
        static_tokens(&json!([
            {"token": "id-token", "identity": {"username": "bob", "groups": []}},
        ])),
    );
    cache
}

/// Upstream stub that echoes what it received.
struct Stub {
    url: String,
    hits: Arc<AtomicUsize>,
}

async fn echo(State(hits): State<Arc<AtomicUsize>>, request: axum::extract::Request) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    let mut headers = serde_json::Map::new();
    for name in parts.headers.keys() {
        let values = parts
            .headers
            .get_all(name)
            .iter()
            .map(|v| Value::from(v.to_str().unwrap()))
            .collect();
        headers.insert(name.as_str().to_owned(), Value::Array(values));
    }

    let status = if parts.uri.path().ends_with("/missing") {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    let reply = json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "headers": headers,
        "body": String::from_utf8(body.to_vec()).unwrap(),
    });
    (status, [("x-upstream", "stub")], Json(reply)).into_response()
}

async fn start_stub() -> Stub {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .fallback(echo)
        .with_state(Arc::clone(&hits));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Stub {
        url: format!("http://{address}"),
        hits,
    }
}

async fn proxy_router(upstream: UpstreamConfig) -> Router {
    let upstream = Upstream::from_config(&upstream).await.unwrap();
    Arc::new(ImpersonationProxy::new(cache(), Some(webhook_id()), upstream)).router()
}

async fn proxy_for(stub: &Stub) -> Router {
    proxy_router(UpstreamConfig {
        url: stub.url.clone(),
        ..UpstreamConfig::default()
    })
    .await
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_values(echoed: &Value, name: &str) -> Vec<String> {
    echoed["headers"][name]
        .as_array()
        .map(|values| {
            values
                .iter()
                .map(|v| v.as_str().unwrap().to_owned())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn authenticated_request_is_forwarded_as_the_caller() {
    let stub = start_stub().await;
    let router = proxy_for(&stub).await;

    let peer: SocketAddr = "10.1.2.3:40000".parse().unwrap();
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/v1/namespaces/default/configmaps?fieldManager=kubectl")
        .header(AUTHORIZATION, "Bearer good-token")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"kind":"ConfigMap"}"#))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-upstream"], "stub");

    let echoed = json_body(response).await;
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["path"], "/api/v1/namespaces/default/configmaps");
    assert_eq!(echoed["query"], "fieldManager=kubectl");
    assert_eq!(echoed["body"], r#"{"kind":"ConfigMap"}"#);
    assert_eq!(header_values(&echoed, "impersonate-user"), vec!["alice"]);
    assert_eq!(
        header_values(&echoed, "impersonate-group"),
        vec!["admins", "devs"]
    );
    assert_eq!(header_values(&echoed, "x-forwarded-for"), vec!["10.1.2.3"]);
    assert!(header_values(&echoed, "authorization").is_empty());
    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bad_token_is_rejected_without_reaching_upstream() {
    let stub = start_stub().await;
    let router = proxy_for(&stub).await;

    for authorization in [Some("Bearer bad-token"), Some("Basic YWxpY2U6cHc="), None] {
        let mut request = Request::builder().uri("/api/v1/pods");
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }
        let response = router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{}",
            authorization.unwrap_or("no header")
        );
        let status = json_body(response).await;
        assert_eq!(status["kind"], "Status");
        assert_eq!(status["reason"], "Unauthorized");
        assert_eq!(status["code"], 401);
    }
    assert_eq!(stub.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn forged_impersonation_headers_are_replaced() {
    let stub = start_stub().await;
    let router = proxy_for(&stub).await;

    let request = Request::builder()
        .uri("/api/v1/secrets")
        .header(AUTHORIZATION, "Bearer good-token")
        .header("impersonate-user", "root")
        .header("impersonate-group", "system:masters")
        .header("impersonate-uid", "0")
        .header("impersonate-extra-scopes", "everything")
        .body(Body::empty())
        .unwrap();

    let echoed = json_body(router.oneshot(request).await.unwrap()).await;
    assert_eq!(header_values(&echoed, "impersonate-user"), vec!["alice"]);
    assert_eq!(
        header_values(&echoed, "impersonate-group"),
        vec!["admins", "devs"]
    );
    assert!(header_values(&echoed, "impersonate-uid").is_empty());
    assert!(header_values(&echoed, "impersonate-extra-scopes").is_empty());
}

#[tokio::test]
async fn encoded_credential_request_selects_its_authenticator() {
    let stub = start_stub().await;
    let router = proxy_for(&stub).await;

    let api_version = api_group::login_api_version(api_group::DEFAULT_SUFFIX).unwrap();
    let bearer = TokenCredentialRequest::new("id-token", jwt_id())
        .to_encoded_bearer(&api_version)
        .unwrap();
    let request = Request::builder()
        .uri("/version")
        .header(AUTHORIZATION, format!("Bearer {bearer}"))
        .body(Body::empty())
        .unwrap();

    let echoed = json_body(router.oneshot(request).await.unwrap()).await;
    assert_eq!(header_values(&echoed, "impersonate-user"), vec!["bob"]);
    assert!(header_values(&echoed, "impersonate-group").is_empty());
}

#[tokio::test]
async fn upstream_status_passes_through() {
    let stub = start_stub().await;
    let router = proxy_for(&stub).await;

    let request = Request::builder()
        .uri("/api/v1/namespaces/missing")
        .header(AUTHORIZATION, "Bearer good-token")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn proxy_uses_its_own_upstream_credential() {
    let stub = start_stub().await;
    let mut token_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(token_file, "proxy-service-account").unwrap();

    let router = proxy_router(UpstreamConfig {
        url: stub.url.clone(),
        certificate_authority_data: None,
        bearer_token_file: Some(token_file.path().to_path_buf()),
    })
    .await;

    let request = Request::builder()
        .uri("/api")
        .header(AUTHORIZATION, "Bearer good-token")
        .body(Body::empty())
        .unwrap();

    let echoed = json_body(router.oneshot(request).await.unwrap()).await;
    assert_eq!(
        header_values(&echoed, "authorization"),
        vec!["Bearer proxy-service-account"]
    );
    assert_eq!(header_values(&echoed, "impersonate-user"), vec!["alice"]);
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = closed.local_addr().unwrap();
    drop(closed);

    let router = proxy_router(UpstreamConfig {
        url: format!("http://{address}"),
        ..UpstreamConfig::default()
    })
    .await;

    let request = Request::builder()
        .uri("/api")
        .header(AUTHORIZATION, "Bearer good-token")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let status = json_body(response).await;
    assert_eq!(status["code"], 502);
    assert_eq!(status["status"], "Failure");
}

#[tokio::test]
async fn deleted_authenticator_stops_authenticating() {
    let stub = start_stub().await;
    let cache = cache();
    let upstream = Upstream::from_config(&UpstreamConfig {
        url: stub.url.clone(),
        ..UpstreamConfig::default()
    })
    .await
    .unwrap();
    let authenticator = Arc::clone(&cache);
    let router =
        Arc::new(ImpersonationProxy::new(authenticator, Some(webhook_id()), upstream)).router();

    let request = || {
        Request::builder()
            .uri("/api")
            .header(AUTHORIZATION, "Bearer good-token")
            .body(Body::empty())
            .unwrap()
    };

    let response = router.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(cache.delete(&webhook_id()));
    let response = router.oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
}

/// Sets its flag when the handler future holding it is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct SlowUpstream {
    started: Arc<Notify>,
    dropped: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

async fn slow(State(state): State<SlowUpstream>) -> &'static str {
    let _flag = DropFlag(Arc::clone(&state.dropped));
    state.started.notify_one();
    tokio::time::sleep(Duration::from_secs(30)).await;
    state.finished.store(true, Ordering::SeqCst);
    "too late"
}

#[tokio::test]
async fn dropping_the_caller_cancels_the_upstream_request() {
    let state = SlowUpstream::default();
    let app = Router::new()
        .route("/slow", get(slow))
        .route("/fast", get(|| async { "quick" }))
        .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let router = proxy_router(UpstreamConfig {
        url: format!("http://{address}"),
        ..UpstreamConfig::default()
    })
    .await;
    let request = |path: &str| {
        Request::builder()
            .uri(path)
            .header(AUTHORIZATION, "Bearer good-token")
            .body(Body::empty())
            .unwrap()
    };

    let in_flight = tokio::spawn(router.clone().oneshot(request("/slow")));
    tokio::time::timeout(Duration::from_secs(5), state.started.notified())
        .await
        .expect("upstream never saw the request");
    in_flight.abort();
    assert!(in_flight.await.unwrap_err().is_cancelled());

    tokio::time::timeout(Duration::from_secs(5), async {
        while !state.dropped.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("upstream handler kept running after the caller went away");
    assert!(!state.finished.load(Ordering::SeqCst));

    let response = router.oneshot(request("/fast")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
