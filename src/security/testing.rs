//! Shared fixtures for guard tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::policy::{
    AuthError, Authenticator, ClientIdentity, ClientType, ConfigProvider, GlobalPolicy, PolicyError, PolicyResolver,
    StaticTokenAuthenticator, TenantPolicyStore,
};
use crate::security::cors::CorsGuard;
use crate::security::trusted_host::TrustedHostGuard;

pub fn superadmin_token() -> &'static str {
    "root-token"
}

pub fn user_token() -> &'static str {
    "user-token"
}

pub fn authenticator() -> Arc<dyn Authenticator> {
    let clients = [
        (superadmin_token(), "ops", ClientType::Superadmin),
        (user_token(), "portal", ClientType::ApiUser),
    ]
    .into_iter()
    .map(|(token, id, client_type)| ClientConfig {
        token: token.into(),
        client_id: id.into(),
        client_type,
        tenant_code: String::new(),
    })
    .collect::<Vec<_>>();
    Arc::new(StaticTokenAuthenticator::new(&clients))
}

/// Guards whose global defaults are the given lists and with no tenant policies.
pub fn guards_for(trusted_hosts: &[&str], cors_origins: &[&str]) -> (TrustedHostGuard, CorsGuard) {
    let global = GlobalPolicy {
        trusted_hosts: trusted_hosts.iter().map(|s| s.to_string()).collect(),
        cors_origins: cors_origins.iter().map(|s| s.to_string()).collect(),
    };
    let store = Arc::new(TenantPolicyStore::new(&Default::default()));
    let policies = Arc::new(PolicyResolver::new(store, global));
    let auth = authenticator();
    (
        TrustedHostGuard::new(policies.clone(), auth.clone()),
        CorsGuard::new(policies, auth),
    )
}

/// A provider whose backend is always down.
pub struct FailingProvider;

#[async_trait]
impl ConfigProvider for FailingProvider {
    async fn trusted_hosts(&self, _: &str) -> Result<Vec<String>, PolicyError> {
        Err(PolicyError::Unavailable("connection reset".into()))
    }

    async fn cors_origins(&self, _: &str) -> Result<Vec<String>, PolicyError> {
        Err(PolicyError::Unavailable("connection reset".into()))
    }
}

/// An authenticator whose credential store is always down.
pub struct DownAuthenticator;

#[async_trait]
impl Authenticator for DownAuthenticator {
    async fn authenticate(&self, _: &str, _: &str) -> Result<Option<ClientIdentity>, AuthError> {
        Err(AuthError::Unavailable("credential store timeout".into()))
    }
}
