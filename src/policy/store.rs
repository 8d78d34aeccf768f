//! Tenant security policy storage.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use thiserror::Error;

use crate::config::TenantPolicyConfig;

/// Failure to read tenant configuration.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy backend unavailable: {0}")]
    Unavailable(String),
}

/// Source of per-tenant allow-lists.
///
/// Both lookups return an empty list when the tenant has no explicit
/// configuration; callers then fall back to the global default.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn trusted_hosts(&self, tenant_code: &str) -> Result<Vec<String>, PolicyError>;
    async fn cors_origins(&self, tenant_code: &str) -> Result<Vec<String>, PolicyError>;
}

/// A tenant's allow-lists, frozen at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantSecurityPolicy {
    pub trusted_hosts: Vec<String>,
    pub cors_origins: Vec<String>,
}

impl From<&TenantPolicyConfig> for TenantSecurityPolicy {
    fn from(cfg: &TenantPolicyConfig) -> Self {
        Self {
            trusted_hosts: cfg.trusted_hosts.clone(),
            cors_origins: cfg.cors_origins.clone(),
        }
    }
}

/// Process-wide fallback allow-lists, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPolicy {
    pub trusted_hosts: Vec<String>,
    pub cors_origins: Vec<String>,
}

impl Default for GlobalPolicy {
    fn default() -> Self {
        Self {
            trusted_hosts: vec!["*".to_string()],
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// In-memory tenant policies behind an atomically swapped snapshot.
///
/// Readers always see either the whole old map or the whole new one.
pub struct TenantPolicyStore {
    policies: ArcSwap<HashMap<String, TenantSecurityPolicy>>,
}

impl TenantPolicyStore {
    pub fn new(tenants: &HashMap<String, TenantPolicyConfig>) -> Self {
        Self {
            policies: ArcSwap::from_pointee(Self::build(tenants)),
        }
    }

    /// Swap in a new set of tenant policies.
    pub fn replace(&self, tenants: &HashMap<String, TenantPolicyConfig>) {
        self.policies.store(Arc::new(Self::build(tenants)));
        tracing::info!(tenants = tenants.len(), "Tenant security policies reloaded");
    }

    /// Current snapshot for a tenant, if one is configured.
    pub fn get(&self, tenant_code: &str) -> Option<TenantSecurityPolicy> {
        self.policies.load().get(tenant_code).cloned()
    }

    fn build(tenants: &HashMap<String, TenantPolicyConfig>) -> HashMap<String, TenantSecurityPolicy> {
        tenants
            .iter()
            .map(|(code, cfg)| (code.clone(), TenantSecurityPolicy::from(cfg)))
            .collect()
    }
}

#[async_trait]
impl ConfigProvider for TenantPolicyStore {
    async fn trusted_hosts(&self, tenant_code: &str) -> Result<Vec<String>, PolicyError> {
        Ok(self.get(tenant_code).map(|p| p.trusted_hosts).unwrap_or_default())
    }

    async fn cors_origins(&self, tenant_code: &str) -> Result<Vec<String>, PolicyError> {
        Ok(self.get(tenant_code).map(|p| p.cors_origins).unwrap_or_default())
    }
}

/// Tenant allow-list lookups with the global fallback applied.
pub struct PolicyResolver {
    provider: Arc<dyn ConfigProvider>,
    global: GlobalPolicy,
}

impl PolicyResolver {
    pub fn new(provider: Arc<dyn ConfigProvider>, global: GlobalPolicy) -> Self {
        Self { provider, global }
    }

    pub async fn trusted_hosts(&self, tenant_code: &str) -> Result<Vec<String>, PolicyError> {
        let tenant = self.provider.trusted_hosts(tenant_code).await?;
        Ok(effective(tenant, &self.global.trusted_hosts))
    }

    pub async fn cors_origins(&self, tenant_code: &str) -> Result<Vec<String>, PolicyError> {
        let tenant = self.provider.cors_origins(tenant_code).await?;
        Ok(effective(tenant, &self.global.cors_origins))
    }
}

/// Pick the tenant list when it has entries, otherwise the global default.
pub fn effective(tenant: Vec<String>, global: &[String]) -> Vec<String> {
    if tenant.is_empty() {
        global.to_vec()
    } else {
        tenant
    }
}
