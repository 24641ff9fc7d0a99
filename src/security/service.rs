use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use super::authentication::Authentication;
use super::authorization::{Authorization, SavedAuthorization};
use super::context::{SavedSecurityContext, SecurityContext};
use super::error::SecurityError;
use super::jwt_service::JwtSecurityService;
use super::role::{RoleAuthorization, RoleDefinition, ROLE_AUTHORIZATION_KIND};
use super::static_service::{StaticSecurityService, UserDefinition};

/// A provider that turns tokens into authentications
#[async_trait]
pub trait SecurityService: Send + Sync {
    fn id(&self) -> &str;

    /// `Ok(None)` when the token is not meant for this service
    async fn authenticate(&self, token: &str) -> Result<Option<Authentication>, SecurityError>;

    /// Rebuild an authorization this service saved earlier
    fn restore_authorization(&self, saved: &SavedAuthorization) -> Result<Arc<dyn Authorization>, SecurityError> {
        restore_role_authorization(saved)
    }
}

pub(crate) fn restore_role_authorization(saved: &SavedAuthorization) -> Result<Arc<dyn Authorization>, SecurityError> {
    if saved.kind != ROLE_AUTHORIZATION_KIND {
        return Err(SecurityError::NotRestorable(saved.kind.clone()));
    }
    let role: RoleDefinition = serde_json::from_value(saved.payload.clone())
        .map_err(|e| SecurityError::NotRestorable(e.to_string()))?;
    Ok(Arc::new(RoleAuthorization::new(role)?))
}

/// Roles by name, shared by the services that grant them
#[derive(Debug, Default)]
pub struct RoleCatalog {
    roles: HashMap<String, Arc<RoleAuthorization>>,
}

impl RoleCatalog {
    pub fn new(definitions: Vec<RoleDefinition>) -> Result<Self, SecurityError> {
        let mut roles = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            let name = definition.name.clone();
            if roles.insert(name.clone(), Arc::new(RoleAuthorization::new(definition)?)).is_some() {
                return Err(SecurityError::Configuration(format!("duplicate role '{}'", name)));
            }
        }
        Ok(Self { roles })
    }

    pub fn get(&self, name: &str) -> Result<Arc<RoleAuthorization>, SecurityError> {
        self.roles
            .get(name)
            .cloned()
            .ok_or_else(|| SecurityError::Configuration(format!("unknown role '{}'", name)))
    }

    pub fn resolve(&self, names: &[String]) -> Result<Vec<Arc<dyn Authorization>>, SecurityError> {
        names
            .iter()
            .map(|name| self.get(name).map(|role| role as Arc<dyn Authorization>))
            .collect()
    }
}

/// Security configuration file: roles plus statically known users
#[derive(Debug, Default, Deserialize)]
pub struct SecurityFile {
    #[serde(default)]
    pub roles: Vec<RoleDefinition>,
    #[serde(default)]
    pub users: Vec<UserDefinition>,
}

impl SecurityFile {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SecurityError> {
        serde_yaml::from_str(yaml).map_err(|e| SecurityError::Configuration(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SecurityError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SecurityError::Configuration(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }
}

/// Asks every configured service about a token and aggregates the answers
#[derive(Clone, Default)]
pub struct SecurityManager {
    services: Vec<Arc<dyn SecurityService>>,
}

impl std::fmt::Debug for SecurityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.services.iter().map(|s| s.id()).collect();
        f.debug_struct("SecurityManager").field("services", &ids).finish()
    }
}

impl SecurityManager {
    pub fn new(services: Vec<Arc<dyn SecurityService>>) -> Self {
        Self { services }
    }

    /// Static token service, plus a JWT service when a secret is configured
    pub fn from_file(file: SecurityFile, jwt_secret: Option<&str>) -> Result<Self, SecurityError> {
        let catalog = Arc::new(RoleCatalog::new(file.roles)?);
        let mut services: Vec<Arc<dyn SecurityService>> = vec![Arc::new(StaticSecurityService::new(
            "static",
            file.users,
            catalog.clone(),
        )?)];
        if let Some(secret) = jwt_secret.filter(|s| !s.is_empty()) {
            services.push(Arc::new(JwtSecurityService::new("jwt", secret, catalog)));
        }
        Ok(Self::new(services))
    }

    pub fn service_ids(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.id()).collect()
    }

    /// Context for one request. A missing token yields the anonymous context;
    /// a token no service accepts is rejected.
    pub async fn create_security_context(&self, token: Option<&str>) -> Result<SecurityContext, SecurityError> {
        let Some(token) = token else {
            return Ok(SecurityContext::anonymous());
        };

        let start = Instant::now();
        let mut authentications = Vec::new();
        for service in &self.services {
            if let Some(authentication) = service.authenticate(token).await? {
                tracing::debug!(
                    "Service '{}' authenticated user {:?}",
                    service.id(),
                    authentication.user_id
                );
                authentications.push(authentication);
            }
        }

        if authentications.is_empty() {
            tracing::info!("Token rejected by all {} security services", self.services.len());
            return Err(SecurityError::InvalidToken(
                "token not recognized by any security service".to_string(),
            ));
        }

        let context = SecurityContext::new(Some(token.to_string()), authentications);
        tracing::debug!(
            "Security context '{}' created in {:?}",
            context.id(),
            start.elapsed()
        );
        Ok(context)
    }

    /// Rebuild a context saved with [`SecurityContext::save`], without re-authenticating
    pub fn restore(&self, saved: &SavedSecurityContext) -> Result<SecurityContext, SecurityError> {
        let mut authentications = Vec::with_capacity(saved.authentications.len());
        for saved_auth in &saved.authentications {
            let service = self
                .services
                .iter()
                .find(|s| s.id() == saved_auth.security_service_id)
                .ok_or_else(|| SecurityError::UnknownService(saved_auth.security_service_id.clone()))?;
            let authorizations = saved_auth
                .authorizations
                .iter()
                .map(|a| service.restore_authorization(a))
                .collect::<Result<Vec<_>, _>>()?;
            authentications.push(Authentication {
                security_service_id: saved_auth.security_service_id.clone(),
                user_id: saved_auth.user_id.clone(),
                user_name: saved_auth.user_name.clone(),
                user_locale: saved_auth.user_locale.clone(),
                user_organization: saved_auth.user_organization.clone(),
                user_division: saved_auth.user_division.clone(),
                authorizations,
            });
        }
        Ok(SecurityContext::new(saved.token.clone(), authentications))
    }
}
