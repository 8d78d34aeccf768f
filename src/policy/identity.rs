//! Client identities and bearer-token authentication.

use std::collections::HashMap;
use std::fmt;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ClientConfig;

/// Privilege tier of an authenticated client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    ApiUser,
    Admin,
    Superadmin,
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientType::ApiUser => "api_user",
            ClientType::Admin => "admin",
            ClientType::Superadmin => "superadmin",
        };
        f.write_str(s)
    }
}

/// A resolved client. Only an [`Authenticator`] hands these out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_type: ClientType,
    pub tenant_code: String,
}

impl ClientIdentity {
    pub fn is_superadmin(&self) -> bool {
        self.client_type == ClientType::Superadmin
    }
}

/// Infrastructure failure while resolving a token.
///
/// "Token not found" is not an error; it is `Ok(None)`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Resolves bearer tokens to client identities.
///
/// Implementations must be side-effect free and safe to call concurrently.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        token: &str,
        tenant_code: &str,
    ) -> Result<Option<ClientIdentity>, AuthError>;
}

/// Resolve an optional bearer token, treating infrastructure faults as "no identity".
pub async fn resolve_identity(
    authenticator: &dyn Authenticator,
    token: Option<&str>,
    tenant_code: &str,
) -> Option<ClientIdentity> {
    let token = token.filter(|t| !t.is_empty())?;
    match authenticator.authenticate(token, tenant_code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::error!(tenant = %tenant_code, error = %e, "Token resolution failed, continuing unauthenticated");
            None
        }
    }
}

/// Authenticator backed by the `clients` table of the configuration.
///
/// A client bound to a tenant resolves for that tenant or for the global
/// tenant (empty code). Superadmins resolve for every tenant.
pub struct StaticTokenAuthenticator {
    clients: ArcSwap<HashMap<String, ClientIdentity>>,
}

impl StaticTokenAuthenticator {
    pub fn new(clients: &[ClientConfig]) -> Self {
        Self {
            clients: ArcSwap::from_pointee(Self::index(clients)),
        }
    }

    /// Replace the token table with a freshly loaded one.
    pub fn reload(&self, clients: &[ClientConfig]) {
        self.clients.store(std::sync::Arc::new(Self::index(clients)));
        tracing::info!(clients = clients.len(), "Static client tokens reloaded");
    }

    fn index(clients: &[ClientConfig]) -> HashMap<String, ClientIdentity> {
        clients
            .iter()
            .map(|c| {
                (
                    c.token.clone(),
                    ClientIdentity {
                        client_id: c.client_id.clone(),
                        client_type: c.client_type,
                        tenant_code: c.tenant_code.clone(),
                    },
                )
            })
            .collect()
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(
        &self,
        token: &str,
        tenant_code: &str,
    ) -> Result<Option<ClientIdentity>, AuthError> {
        let clients = self.clients.load();
        let identity = clients.get(token).filter(|id| {
            id.is_superadmin()
                || tenant_code.is_empty()
                || id.tenant_code.is_empty()
                || id.tenant_code == tenant_code
        });
        Ok(identity.cloned())
    }
}
