use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::SecurityError;
use crate::datastore::Feature;
use crate::filter::Filter;
use crate::geometry::Geometry;

/// Operation an area or feature authorization is asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Visible,
    Update,
    Create,
    Delete,
}

/// Serialized form of an authorization, restorable by the service that issued it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedAuthorization {
    pub kind: String,
    pub payload: Value,
}

/// A set of permissions granted by one security service.
///
/// Capabilities beyond the base permissions are optional; an authorization
/// advertises one by returning `Some(self)` from the matching accessor.
pub trait Authorization: Send + Sync + Debug {
    /// Stable id: two authorizations with the same id make the same decisions
    fn id(&self) -> String;

    fn base(&self) -> &dyn BaseAuthorization;

    fn area(&self) -> Option<&dyn AreaAuthorization> {
        None
    }

    fn feature(&self) -> Option<&dyn FeatureAuthorization> {
        None
    }

    fn select_filter(&self) -> Option<&dyn VectorLayerSelectFilterAuthorization> {
        None
    }

    fn attribute(&self) -> Option<&dyn AttributeAuthorization> {
        None
    }

    fn save(&self) -> Result<SavedAuthorization, SecurityError> {
        Err(SecurityError::NotRestorable(self.id()))
    }
}

pub trait BaseAuthorization {
    fn is_tool_authorized(&self, tool_id: &str) -> bool;
    fn is_command_authorized(&self, command: &str) -> bool;
    fn is_layer_visible(&self, layer_id: &str) -> bool;
    fn is_layer_update_authorized(&self, layer_id: &str) -> bool;
    fn is_layer_create_authorized(&self, layer_id: &str) -> bool;
    fn is_layer_delete_authorized(&self, layer_id: &str) -> bool;

    fn is_layer_authorized(&self, layer_id: &str, kind: AccessKind) -> bool {
        match kind {
            AccessKind::Visible => self.is_layer_visible(layer_id),
            AccessKind::Update => self.is_layer_update_authorized(layer_id),
            AccessKind::Create => self.is_layer_create_authorized(layer_id),
            AccessKind::Delete => self.is_layer_delete_authorized(layer_id),
        }
    }
}

pub trait AreaAuthorization {
    /// Region in which `kind` is allowed on the layer; `None` means no restriction
    fn authorized_area(&self, layer_id: &str, kind: AccessKind) -> Option<Geometry>;

    /// Whether a feature partly inside the authorized area is enough
    fn is_partly_sufficient(&self, layer_id: &str, kind: AccessKind) -> bool;
}

pub trait FeatureAuthorization {
    fn is_feature_authorized(&self, layer_id: &str, feature: &Feature, kind: AccessKind) -> bool;
}

pub trait VectorLayerSelectFilterAuthorization {
    /// Extra filter for reading the layer; `None` when this authorization adds nothing
    fn feature_filter(&self, layer_id: &str) -> Option<Filter>;
}

pub trait AttributeAuthorization {
    fn is_attribute_readable(&self, layer_id: &str, feature: Option<&Feature>, attribute: &str) -> bool;
    fn is_attribute_writable(&self, layer_id: &str, feature: Option<&Feature>, attribute: &str) -> bool;
}
