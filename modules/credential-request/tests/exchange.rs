#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use authn_cache::AuthenticatorCache;
use authn_cache_sdk::{AuthenticatorId, TokenCredentialRequest};
use certauthority::{CertificateAuthority, DynamicCertAuthority, Subject};
use credential_request::{AggregatedServerConfig, CreateOptions, CredentialRequestError};
use dynamiccert::DynamicCertProvider;
use openssl::x509::X509;
use static_authn_plugin::{StaticAuthNPluginConfig, StaticAuthenticator};

fn static_id() -> AuthenticatorId {
    AuthenticatorId::new("StaticAuthenticator", "authentication.concierge.dev", "dev")
}

fn cache() -> Arc<AuthenticatorCache> {
    let cfg: StaticAuthNPluginConfig = serde_json::from_value(serde_json::json!({
        "mode": "static_tokens",
        "tokens": [
            {"token": "good-token", "identity": {"username": "alice", "groups": ["admins"]}},
        ],
    }))
    .unwrap();

    let cache = Arc::new(AuthenticatorCache::new());
    cache.store(static_id(), Arc::new(StaticAuthenticator::from_config(&cfg)));
    cache
}

#[tokio::test]
async fn exchange_through_cache_and_dynamic_signer() {
    let signer = Arc::new(DynamicCertProvider::new("signer"));
    let cfg = AggregatedServerConfig::new(
        Arc::new(DynamicCertProvider::new("serving")),
        cache(),
        Arc::new(DynamicCertAuthority::new(Arc::clone(&signer))),
        "concierge.dev",
    )
    .unwrap();
    let service = cfg.credential_request_service();
    let request = TokenCredentialRequest::new("good-token", static_id());

    let err = service
        .create(&request, CreateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CredentialRequestError::ServiceUnavailable(_)));

    let ca = CertificateAuthority::new(&Subject::new("cluster signer"), Duration::from_secs(3600))
        .unwrap();
    signer
        .set(
            ca.ca_bundle_pem().as_bytes(),
            ca.private_key_pem().unwrap().as_bytes(),
            Some("cluster signer"),
        )
        .unwrap();

    let status = service
        .create(&request, CreateOptions::default())
        .await
        .unwrap();
    let credential = status.credential.unwrap();

    let root = X509::from_pem(ca.ca_bundle_pem().as_bytes()).unwrap();
    let leaf = X509::from_pem(credential.client_certificate_data.as_bytes()).unwrap();
    assert!(leaf.verify(&root.public_key().unwrap()).unwrap());
}

#[tokio::test]
async fn unknown_token_and_deleted_authenticator_fail_authentication() {
    let cache = cache();
    let authenticator = Arc::clone(&cache);
    let ca = Arc::new(
        CertificateAuthority::new(&Subject::new("cluster signer"), Duration::from_secs(3600))
            .unwrap(),
    );
    let cfg = AggregatedServerConfig::new(
        Arc::new(DynamicCertProvider::new("serving")),
        authenticator,
        ca,
        "concierge.dev",
    )
    .unwrap();
    let service = cfg.credential_request_service();

    let status = service
        .create(
            &TokenCredentialRequest::new("bad-token", static_id()),
            CreateOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(status.message.as_deref(), Some("authentication failed"));

    assert!(cache.delete(&static_id()));
    let status = service
        .create(
            &TokenCredentialRequest::new("good-token", static_id()),
            CreateOptions::default(),
        )
        .await
        .unwrap();
    assert!(!status.is_success());
}
