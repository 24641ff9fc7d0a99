use serde::{Deserialize, Serialize};

use super::authentication::{Authentication, SavedAuthentication};
use super::authorization::{AccessKind, Authorization};
use super::error::SecurityError;
use crate::datastore::Feature;
use crate::filter::Filter;
use crate::geometry::{Bbox, Geometry};

/// Region in which an operation is allowed
#[derive(Debug, Clone, PartialEq)]
pub enum AuthorizedArea {
    /// No area restriction applies; the whole layer extent is allowed
    Unrestricted,
    Restricted(Geometry),
}

impl AuthorizedArea {
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, AuthorizedArea::Unrestricted)
    }

    /// Area as geometry, using `extent` when unrestricted
    pub fn to_geometry(&self, extent: &Bbox) -> Geometry {
        match self {
            AuthorizedArea::Unrestricted => extent.to_geometry(),
            AuthorizedArea::Restricted(area) => area.clone(),
        }
    }

    /// Whether a feature geometry falls inside the area. Features without
    /// geometry only pass an unrestricted area.
    pub fn admits(&self, geometry: Option<&Geometry>, partly_sufficient: bool) -> bool {
        match (self, geometry) {
            (AuthorizedArea::Unrestricted, _) => true,
            (AuthorizedArea::Restricted(_), None) => false,
            (AuthorizedArea::Restricted(area), Some(geometry)) => {
                if partly_sufficient {
                    area.intersects(geometry)
                } else {
                    area.covers(geometry)
                }
            }
        }
    }
}

/// Request-scoped aggregation of every authentication obtained for a token.
///
/// Permissions are the union of what the individual authorizations grant.
/// With no authentications every query denies.
#[derive(Debug, Clone, Default)]
pub struct SecurityContext {
    token: Option<String>,
    authentications: Vec<Authentication>,
    id: String,
    user_id: Option<String>,
    user_name: Option<String>,
    user_locale: Option<String>,
    user_organization: Option<String>,
    user_division: Option<String>,
}

impl SecurityContext {
    pub fn new(token: Option<String>, authentications: Vec<Authentication>) -> Self {
        let id = authentications
            .iter()
            .map(Authentication::id)
            .collect::<Vec<_>>()
            .join("|");
        let user_id = join_distinct(authentications.iter().map(|a| a.user_id.as_deref()));
        let user_division = join_distinct(authentications.iter().map(|a| a.user_division.as_deref()));
        let user_name = first_present(authentications.iter().map(|a| a.user_name.as_deref()));
        let user_locale = first_present(authentications.iter().map(|a| a.user_locale.as_deref()));
        let user_organization =
            first_present(authentications.iter().map(|a| a.user_organization.as_deref()));

        Self {
            token,
            authentications,
            id,
            user_id,
            user_name,
            user_locale,
            user_organization,
            user_division,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Identity of the combined policy; equal ids mean equal decisions
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn authentications(&self) -> &[Authentication] {
        &self.authentications
    }

    pub fn is_authenticated(&self) -> bool {
        !self.authentications.is_empty()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn user_locale(&self) -> Option<&str> {
        self.user_locale.as_deref()
    }

    pub fn user_organization(&self) -> Option<&str> {
        self.user_organization.as_deref()
    }

    pub fn user_division(&self) -> Option<&str> {
        self.user_division.as_deref()
    }

    fn authorizations(&self) -> impl Iterator<Item = &dyn Authorization> {
        self.authentications
            .iter()
            .flat_map(|a| a.authorizations.iter().map(|z| z.as_ref()))
    }

    pub fn is_tool_authorized(&self, tool_id: &str) -> bool {
        self.authorizations().any(|a| a.base().is_tool_authorized(tool_id))
    }

    pub fn is_command_authorized(&self, command: &str) -> bool {
        self.authorizations().any(|a| a.base().is_command_authorized(command))
    }

    pub fn is_layer_authorized(&self, layer_id: &str, kind: AccessKind) -> bool {
        self.authorizations().any(|a| a.base().is_layer_authorized(layer_id, kind))
    }

    pub fn is_layer_visible(&self, layer_id: &str) -> bool {
        self.is_layer_authorized(layer_id, AccessKind::Visible)
    }

    pub fn is_layer_update_authorized(&self, layer_id: &str) -> bool {
        self.is_layer_authorized(layer_id, AccessKind::Update)
    }

    pub fn is_layer_create_authorized(&self, layer_id: &str) -> bool {
        self.is_layer_authorized(layer_id, AccessKind::Create)
    }

    pub fn is_layer_delete_authorized(&self, layer_id: &str) -> bool {
        self.is_layer_authorized(layer_id, AccessKind::Delete)
    }

    /// Union of the areas granted for `kind` on the layer.
    ///
    /// An authorization that grants the operation without restricting the area
    /// lifts the restriction entirely.
    pub fn authorized_area(&self, layer_id: &str, kind: AccessKind) -> AuthorizedArea {
        let mut area = Geometry::empty();
        for authorization in self.authorizations() {
            if !authorization.base().is_layer_authorized(layer_id, kind) {
                continue;
            }
            match authorization.area().and_then(|a| a.authorized_area(layer_id, kind)) {
                Some(part) => area = area.union(part),
                None => return AuthorizedArea::Unrestricted,
            }
        }
        AuthorizedArea::Restricted(area)
    }

    pub fn visible_area(&self, layer_id: &str) -> AuthorizedArea {
        self.authorized_area(layer_id, AccessKind::Visible)
    }

    pub fn update_authorized_area(&self, layer_id: &str) -> AuthorizedArea {
        self.authorized_area(layer_id, AccessKind::Update)
    }

    pub fn create_authorized_area(&self, layer_id: &str) -> AuthorizedArea {
        self.authorized_area(layer_id, AccessKind::Create)
    }

    pub fn delete_authorized_area(&self, layer_id: &str) -> AuthorizedArea {
        self.authorized_area(layer_id, AccessKind::Delete)
    }

    /// Partial overlap is enough only if every area-capable authorization agrees
    pub fn is_partly_sufficient(&self, layer_id: &str, kind: AccessKind) -> bool {
        if !self.is_authenticated() {
            return false;
        }
        self.authorizations()
            .filter_map(|a| a.area())
            .all(|area| area.is_partly_sufficient(layer_id, kind))
    }

    pub fn is_partly_visible_sufficient(&self, layer_id: &str) -> bool {
        self.is_partly_sufficient(layer_id, AccessKind::Visible)
    }

    pub fn is_partly_update_authorized_sufficient(&self, layer_id: &str) -> bool {
        self.is_partly_sufficient(layer_id, AccessKind::Update)
    }

    pub fn is_partly_create_authorized_sufficient(&self, layer_id: &str) -> bool {
        self.is_partly_sufficient(layer_id, AccessKind::Create)
    }

    pub fn is_partly_delete_authorized_sufficient(&self, layer_id: &str) -> bool {
        self.is_partly_sufficient(layer_id, AccessKind::Delete)
    }

    /// Per-feature decision. Authorizations without feature capability decide
    /// by their layer permission alone.
    pub fn is_feature_authorized(&self, layer_id: &str, feature: &Feature, kind: AccessKind) -> bool {
        self.authorizations().any(|a| {
            a.base().is_layer_authorized(layer_id, kind)
                && a.feature()
                    .map_or(true, |f| f.is_feature_authorized(layer_id, feature, kind))
        })
    }

    pub fn is_feature_visible(&self, layer_id: &str, feature: &Feature) -> bool {
        self.is_feature_authorized(layer_id, feature, AccessKind::Visible)
    }

    pub fn is_feature_update_authorized(&self, layer_id: &str, feature: &Feature) -> bool {
        self.is_feature_authorized(layer_id, feature, AccessKind::Update)
    }

    pub fn is_feature_delete_authorized(&self, layer_id: &str, feature: &Feature) -> bool {
        self.is_feature_authorized(layer_id, feature, AccessKind::Delete)
    }

    pub fn is_feature_create_authorized(&self, layer_id: &str, feature: &Feature) -> bool {
        self.is_feature_authorized(layer_id, feature, AccessKind::Create)
    }

    /// Area check for one feature against the authorized area for `kind`
    pub fn is_feature_in_area(&self, layer_id: &str, feature: &Feature, kind: AccessKind) -> bool {
        self.authorized_area(layer_id, kind)
            .admits(feature.geometry.as_ref(), self.is_partly_sufficient(layer_id, kind))
    }

    /// Conjunction of the select filters every authorization imposes on the layer
    pub fn feature_filter(&self, layer_id: &str) -> Option<Filter> {
        let filters: Vec<Filter> = self
            .authorizations()
            .filter_map(|a| a.select_filter())
            .filter_map(|s| s.feature_filter(layer_id))
            .collect();
        if filters.is_empty() {
            None
        } else {
            Some(Filter::and_all(filters))
        }
    }

    pub fn is_attribute_readable(&self, layer_id: &str, feature: Option<&Feature>, attribute: &str) -> bool {
        self.authorizations().any(|a| {
            a.base().is_layer_visible(layer_id)
                && a.attribute()
                    .map_or(true, |attr| attr.is_attribute_readable(layer_id, feature, attribute))
        })
    }

    pub fn is_attribute_writable(&self, layer_id: &str, feature: Option<&Feature>, attribute: &str) -> bool {
        self.authorizations().any(|a| {
            a.base().is_layer_update_authorized(layer_id)
                && a.attribute()
                    .map_or(true, |attr| attr.is_attribute_writable(layer_id, feature, attribute))
        })
    }

    /// Serializable form for restoring the same policy outside this request
    pub fn save(&self) -> Result<SavedSecurityContext, SecurityError> {
        let authentications = self
            .authentications
            .iter()
            .map(Authentication::save)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SavedSecurityContext {
            token: self.token.clone(),
            authentications,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSecurityContext {
    pub token: Option<String>,
    pub authentications: Vec<SavedAuthentication>,
}

fn join_distinct<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let mut seen: Vec<&str> = Vec::new();
    for value in values.flatten() {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    if seen.is_empty() {
        None
    } else {
        Some(seen.join(", "))
    }
}

fn first_present<'a>(mut values: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    values.find_map(|v| v.map(str::to_string))
}
