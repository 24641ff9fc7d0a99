use serde::Serialize;

use crate::middleware::{ApiResponse, Caller};

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub id: String,
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_locale: Option<String>,
    pub user_organization: Option<String>,
    pub user_division: Option<String>,
    pub security_services: Vec<String>,
}

/// GET /api/auth/whoami - user fields aggregated over every authentication
pub async fn whoami_get(Caller(security): Caller) -> ApiResponse<WhoAmI> {
    let owned = |value: Option<&str>| value.map(str::to_string);
    ApiResponse::success(WhoAmI {
        id: security.id().to_string(),
        authenticated: security.is_authenticated(),
        user_id: owned(security.user_id()),
        user_name: owned(security.user_name()),
        user_locale: owned(security.user_locale()),
        user_organization: owned(security.user_organization()),
        user_division: owned(security.user_division()),
        security_services: security
            .authentications()
            .iter()
            .map(|a| a.security_service_id.clone())
            .collect(),
    })
}
