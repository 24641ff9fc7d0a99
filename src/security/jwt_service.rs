use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::authentication::Authentication;
use super::authorization::Authorization;
use super::error::SecurityError;
use super::service::{RoleCatalog, SecurityService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
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
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(sub: impl Into<String>, roles: Vec<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            name: None,
            locale: None,
            organization: None,
            division: None,
            roles,
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Signed-token service: roles travel in the token claims
pub struct JwtSecurityService {
    id: String,
    secret: String,
    catalog: Arc<RoleCatalog>,
}

impl JwtSecurityService {
    pub fn new(id: impl Into<String>, secret: impl Into<String>, catalog: Arc<RoleCatalog>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            catalog,
        }
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, SecurityError> {
        if self.secret.is_empty() {
            return Err(SecurityError::Configuration("JWT secret not configured".to_string()));
        }
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| SecurityError::ProviderFailure {
            service: self.id.clone(),
            message: e.to_string(),
        })
    }

    fn validate(&self, token: &str) -> Result<Claims, SecurityError> {
        let key = DecodingKey::from_secret(self.secret.as_bytes());
        decode::<Claims>(token, &key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| SecurityError::InvalidToken(format!("Invalid JWT token: {}", e)))
    }
}

fn looks_like_jwt(token: &str) -> bool {
    token.split('.').count() == 3
}

#[async_trait]
impl SecurityService for JwtSecurityService {
    fn id(&self) -> &str {
        &self.id
    }

    async fn authenticate(&self, token: &str) -> Result<Option<Authentication>, SecurityError> {
        if !looks_like_jwt(token) {
            return Ok(None);
        }
        let claims = self.validate(token)?;

        let mut authorizations: Vec<Arc<dyn Authorization>> = Vec::with_capacity(claims.roles.len());
        for role in &claims.roles {
            match self.catalog.get(role) {
                Ok(authorization) => authorizations.push(authorization),
                Err(_) => tracing::warn!("Ignoring unknown role '{}' in token for '{}'", role, claims.sub),
            }
        }

        Ok(Some(Authentication {
            security_service_id: self.id.clone(),
            user_id: Some(claims.sub),
            user_name: claims.name,
            user_locale: claims.locale,
            user_organization: claims.organization,
            user_division: claims.division,
            authorizations,
        }))
    }
}
