use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::authorization::{Authorization, SavedAuthorization};
use super::error::SecurityError;

/// Result of one security service accepting a token
#[derive(Debug, Clone, Default)]
pub struct Authentication {
    pub security_service_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_locale: Option<String>,
    pub user_organization: Option<String>,
    pub user_division: Option<String>,
    pub authorizations: Vec<Arc<dyn Authorization>>,
}

impl Authentication {
    pub fn new(security_service_id: impl Into<String>) -> Self {
        Self {
            security_service_id: security_service_id.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    #[must_use]
    pub fn with_authorization(mut self, authorization: Arc<dyn Authorization>) -> Self {
        self.authorizations.push(authorization);
        self
    }

    /// Short id derived from the authorization ids and the issuing service.
    /// Equal ids guarantee equal decisions.
    pub fn id(&self) -> String {
        self.authorizations
            .iter()
            .map(|a| format!("{}@{}", a.id(), self.security_service_id))
            .collect::<Vec<_>>()
            .join("|")
    }

    pub fn save(&self) -> Result<SavedAuthentication, SecurityError> {
        let authorizations = self
            .authorizations
            .iter()
            .map(|a| a.save())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SavedAuthentication {
            security_service_id: self.security_service_id.clone(),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            user_locale: self.user_locale.clone(),
            user_organization: self.user_organization.clone(),
            user_division: self.user_division.clone(),
            authorizations,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAuthentication {
    pub security_service_id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_locale: Option<String>,
    pub user_organization: Option<String>,
    pub user_division: Option<String>,
    pub authorizations: Vec<SavedAuthorization>,
}
