use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use super::authentication::Authentication;
use super::authorization::Authorization;
use super::error::SecurityError;
use super::service::{RoleCatalog, SecurityService};

/// A user known by a fixed token
#[derive(Debug, Clone, Deserialize)]
pub struct UserDefinition {
    pub token: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub division: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

struct StaticUser {
    definition: UserDefinition,
    authorizations: Vec<Arc<dyn Authorization>>,
}

/// Token lookup against users listed in the security file
pub struct StaticSecurityService {
    id: String,
    users: HashMap<String, StaticUser>,
}

impl StaticSecurityService {
    pub fn new(
        id: impl Into<String>,
        users: Vec<UserDefinition>,
        catalog: Arc<RoleCatalog>,
    ) -> Result<Self, SecurityError> {
        let mut by_token = HashMap::with_capacity(users.len());
        for definition in users {
            let authorizations = catalog.resolve(&definition.roles)?;
            by_token.insert(
                definition.token.clone(),
                StaticUser {
                    definition,
                    authorizations,
                },
            );
        }
        Ok(Self {
            id: id.into(),
            users: by_token,
        })
    }
}

#[async_trait]
impl SecurityService for StaticSecurityService {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authenticate(&self, token: &str) -> Result<Option<Authentication>, SecurityError> {
        let Some(user) = self.users.get(token) else {
            return Ok(None);
        };
        let user_def = &user.definition;
        Ok(Some(Authentication {
            security_service_id: self.id.clone(),
            user_id: user_def.user_id.clone(),
            user_name: user_def.name.clone(),
            user_locale: user_def.locale.clone(),
            user_organization: user_def.organization.clone(),
            user_division: user_def.division.clone(),
            authorizations: user.authorizations.clone(),
        }))
    }
}
