//! Builds every component from configuration and runs until cancelled.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, bail};
use authn_cache::AuthenticatorCache;
use authn_cache_sdk::api_group::{self, AUTHENTICATION_GROUP};
use authn_cache_sdk::{Authenticator, AuthenticatorId};
use certauthority::DynamicCertAuthority;
use credential_request::AggregatedServerConfig;
use dynamiccert::DynamicCertProvider;
use impersonator::config::SERVING_CERT_NAME;
use impersonator::{ImpersonationProxy, ProxyServer, ServingCertManager, Upstream};
use jwt_authn_plugin::{JwtAuthNPluginConfig, JwtAuthenticator};
use serde_json::Value;
use static_authn_plugin::{StaticAuthNPluginConfig, StaticAuthenticator};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use webhook_authn_plugin::{WebhookAuthNPluginConfig, WebhookAuthenticator};

use crate::config::{AppConfig, AuthenticatorEntry, KeyPairFiles, PluginKind};

const SERVING_PROVIDER_NAME: &str = "concierge-serving-cert";
const SIGNING_PROVIDER_NAME: &str = "concierge-signing-key";

/// Run the concierge until `cancel` fires.
///
/// # Errors
///
/// Fails on any startup error: invalid authenticator settings, unreadable
/// key files, an invalid API group suffix, or a proxy that cannot bind.
pub async fn run(config: AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let cache = Arc::new(AuthenticatorCache::new());
    seed_authenticators(&cache, &config)?;

    let serving = Arc::new(DynamicCertProvider::new(SERVING_PROVIDER_NAME));
    if let Some(files) = &config.serving_certificate {
        load_key_pair(&serving, files)?;
    }
    let signer = Arc::new(DynamicCertProvider::new(SIGNING_PROVIDER_NAME));
    match &config.signing_key {
        Some(files) => load_key_pair(&signer, files)?,
        None => warn!("no signing key configured, credential requests will be refused"),
    }

    let aggregated = AggregatedServerConfig::new(
        serving,
        cache.clone(),
        Arc::new(DynamicCertAuthority::new(signer)),
        &config.api_group_suffix,
    )
    .context("invalid API group suffix")?;
    info!(
        api_version = %aggregated.api_version(),
        etcd_path_prefix = %aggregated.etcd_path_prefix,
        bind_port = aggregated.bind_port,
        "login API capabilities ready"
    );

    let proxy_certs = Arc::new(DynamicCertProvider::new(SERVING_CERT_NAME));
    let mut cert_manager = ServingCertManager::new(
        Arc::clone(&proxy_certs),
        config.impersonator.serving_certificate,
    )
    .context("invalid impersonation proxy serving certificate settings")?;
    cert_manager
        .issue()
        .context("failed to issue impersonation proxy serving certificate")?;
    let renewal = tokio::spawn(cert_manager.run_renewal(cancel.clone()));

    let upstream = Upstream::from_config(&config.impersonator.upstream)
        .await
        .context("invalid upstream settings")?;
    let proxy = Arc::new(ImpersonationProxy::new(
        cache,
        config.impersonator.default_authenticator,
        upstream,
    ));
    let server = ProxyServer::bind(&config.impersonator.bind_address, &proxy_certs, proxy.router())
        .await
        .with_context(|| {
            format!(
                "failed to bind impersonation proxy to {}",
                config.impersonator.bind_address
            )
        })?;

    server.serve(cancel).await;
    renewal.await.context("serving certificate renewal task failed")?;
    info!("concierge stopped");
    Ok(())
}

/// Build every configured authenticator and store it under its id.
fn seed_authenticators(cache: &AuthenticatorCache, config: &AppConfig) -> anyhow::Result<()> {
    let group = api_group::make(AUTHENTICATION_GROUP, &config.api_group_suffix)
        .with_context(|| format!("invalid API group suffix '{}'", config.api_group_suffix))?;

    let mut seen = HashSet::new();
    for entry in &config.authenticators {
        let id = AuthenticatorId::new(entry.kind.resource_kind(), group.as_str(), entry.name.as_str());
        if !seen.insert(id.clone()) {
            bail!("authenticator {id} is configured more than once");
        }
        let authenticator =
            build_authenticator(entry).with_context(|| format!("invalid authenticator {id}"))?;
        info!(authenticator = %id, "registered authenticator");
        cache.store(id, authenticator);
    }
    Ok(())
}

fn build_authenticator(entry: &AuthenticatorEntry) -> anyhow::Result<Arc<dyn Authenticator>> {
    let settings = Value::Object(entry.settings.clone());
    let authenticator: Arc<dyn Authenticator> = match entry.kind {
        PluginKind::Static => {
            let cfg: StaticAuthNPluginConfig = serde_json::from_value(settings)?;
            Arc::new(StaticAuthenticator::from_config(&cfg))
        }
        PluginKind::Webhook => {
            let cfg: WebhookAuthNPluginConfig = serde_json::from_value(settings)?;
            Arc::new(WebhookAuthenticator::from_config(&cfg)?)
        }
        PluginKind::Jwt => {
            let cfg: JwtAuthNPluginConfig = serde_json::from_value(settings)?;
            Arc::new(JwtAuthenticator::from_config(&cfg)?)
        }
    };
    Ok(authenticator)
}

fn load_key_pair(provider: &DynamicCertProvider, files: &KeyPairFiles) -> anyhow::Result<()> {
    let cert = std::fs::read(&files.certificate_file)
        .with_context(|| format!("failed to read {}", files.certificate_file.display()))?;
    let key = std::fs::read(&files.private_key_file)
        .with_context(|| format!("failed to read {}", files.private_key_file.display()))?;
    provider
        .set(&cert, &key, None)
        .with_context(|| format!("invalid key pair for {}", provider.name()))?;
    info!(provider = %provider.name(), "loaded key pair");
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(value: &Value) -> AuthenticatorEntry {
        serde_json::from_value(value.clone()).unwrap()
    }

    fn config(suffix: &str, authenticators: Vec<AuthenticatorEntry>) -> AppConfig {
        AppConfig {
            api_group_suffix: suffix.to_owned(),
            authenticators,
            ..AppConfig::default()
        }
    }

    #[test]
    fn seeds_every_kind_under_the_suffixed_group() {
        let cfg = config(
            "auth.example.com",
            vec![
                entry(&json!({"type": "static", "name": "dev"})),
                entry(&json!({
                    "type": "webhook",
                    "name": "primary",
                    "endpoint": "https://idp.example.com/authenticate",
                })),
                entry(&json!({
                    "type": "jwt",
                    "name": "corp-idp",
                    "issuer": "https://idp.example.com",
                    "audience": "concierge",
                    "algorithm": "HS256",
                    "secret": "shared-secret",
                })),
            ],
        );
        let cache = AuthenticatorCache::new();
        seed_authenticators(&cache, &cfg).unwrap();

        let group = "authentication.auth.example.com";
        let mut keys = cache.keys();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                AuthenticatorId::new("JWTAuthenticator", group, "corp-idp"),
                AuthenticatorId::new("StaticAuthenticator", group, "dev"),
                AuthenticatorId::new("WebhookAuthenticator", group, "primary"),
            ]
        );
    }

    #[test]
    fn invalid_plugin_settings_fail_startup() {
        let unknown_field = config(
            "concierge.dev",
            vec![entry(&json!({"type": "static", "name": "dev", "mod": "accept_all"}))],
        );
        assert!(seed_authenticators(&AuthenticatorCache::new(), &unknown_field).is_err());

        let missing_issuer = config(
            "concierge.dev",
            vec![entry(&json!({"type": "jwt", "name": "idp", "secret": "s"}))],
        );
        let err = seed_authenticators(&AuthenticatorCache::new(), &missing_issuer).unwrap_err();
        assert!(err.to_string().contains("invalid authenticator"));
    }

    #[test]
    fn duplicate_authenticators_are_rejected() {
        let cfg = config(
            "concierge.dev",
            vec![
                entry(&json!({"type": "static", "name": "dev"})),
                entry(&json!({"type": "static", "name": "dev"})),
            ],
        );
        let err = seed_authenticators(&AuthenticatorCache::new(), &cfg).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn empty_suffix_is_rejected() {
        assert!(seed_authenticators(&AuthenticatorCache::new(), &config("", Vec::new())).is_err());
    }

    #[test]
    fn missing_key_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DynamicCertProvider::new("signer");
        let files = KeyPairFiles {
            certificate_file: dir.path().join("ca.crt"),
            private_key_file: dir.path().join("ca.key"),
        };
        let err = load_key_pair(&provider, &files).unwrap_err();
        assert!(err.to_string().contains("ca.crt"));
        assert!(!provider.is_set());
    }
}
