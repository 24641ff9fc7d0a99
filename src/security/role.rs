use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::authorization::{
    AccessKind, AreaAuthorization, AttributeAuthorization, Authorization, BaseAuthorization,
    FeatureAuthorization, SavedAuthorization, VectorLayerSelectFilterAuthorization,
};
use super::error::SecurityError;
use crate::datastore::Feature;
use crate::filter::{Filter, FilterWhere};
use crate::geometry::Geometry;

pub const ROLE_AUTHORIZATION_KIND: &str = "role";

/// Wildcard matching every tool, command or layer
const ANY: &str = "*";

/// Permissions of a role on one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRule {
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub delete: bool,

    /// Area restrictions, keyed by operation; absent means no restriction
    #[serde(default)]
    pub areas: HashMap<AccessKind, Geometry>,
    /// Operations for which partial overlap with the area is enough
    #[serde(default)]
    pub partly_sufficient: Vec<AccessKind>,

    /// Select filter added to every read of the layer
    #[serde(default)]
    pub filter: Option<Value>,
    /// Features that may be seen, checked one by one
    #[serde(default)]
    pub visible_features: Option<Value>,
    /// Features that may be updated or deleted
    #[serde(default)]
    pub editable_features: Option<Value>,

    #[serde(default)]
    pub readable_attributes: Option<Vec<String>>,
    #[serde(default)]
    pub writable_attributes: Option<Vec<String>>,
}

fn yes() -> bool {
    true
}

impl Default for LayerRule {
    fn default() -> Self {
        Self {
            visible: true,
            update: false,
            create: false,
            delete: false,
            areas: HashMap::new(),
            partly_sufficient: Vec::new(),
            filter: None,
            visible_features: None,
            editable_features: None,
            readable_attributes: None,
            writable_attributes: None,
        }
    }
}

/// A named role, as configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub layers: HashMap<String, LayerRule>,
}

#[derive(Debug, Default)]
struct CompiledRule {
    filter: Option<Filter>,
    visible_features: Option<Filter>,
    editable_features: Option<Filter>,
}

/// Authorization granted by membership of a configured role
#[derive(Debug)]
pub struct RoleAuthorization {
    role: RoleDefinition,
    compiled: HashMap<String, CompiledRule>,
}

impl RoleAuthorization {
    pub fn new(role: RoleDefinition) -> Result<Self, SecurityError> {
        let mut compiled = HashMap::with_capacity(role.layers.len());
        for (layer_id, rule) in &role.layers {
            let parse = |expr: &Option<Value>| -> Result<Option<Filter>, SecurityError> {
                expr.as_ref()
                    .map(|e| FilterWhere::parse(e))
                    .transpose()
                    .map_err(|e| {
                        SecurityError::Configuration(format!(
                            "role '{}', layer '{}': {}",
                            role.name, layer_id, e
                        ))
                    })
            };
            compiled.insert(
                layer_id.clone(),
                CompiledRule {
                    filter: parse(&rule.filter)?,
                    visible_features: parse(&rule.visible_features)?,
                    editable_features: parse(&rule.editable_features)?,
                },
            );
        }
        Ok(Self { role, compiled })
    }

    pub fn role(&self) -> &RoleDefinition {
        &self.role
    }

    fn rule_key<'a>(&'a self, layer_id: &'a str) -> Option<&'a str> {
        if self.role.layers.contains_key(layer_id) {
            Some(layer_id)
        } else if self.role.layers.contains_key(ANY) {
            Some(ANY)
        } else {
            None
        }
    }

    fn rule(&self, layer_id: &str) -> Option<&LayerRule> {
        self.rule_key(layer_id).and_then(|key| self.role.layers.get(key))
    }

    fn compiled(&self, layer_id: &str) -> Option<&CompiledRule> {
        self.rule_key(layer_id).and_then(|key| self.compiled.get(key))
    }

    fn any_rule(&self, check: impl Fn(&LayerRule) -> bool) -> bool {
        self.role.layers.values().any(check)
    }
}

fn listed(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item == value || item == ANY)
}

impl Authorization for RoleAuthorization {
    fn id(&self) -> String {
        format!("{}:{}", ROLE_AUTHORIZATION_KIND, self.role.name)
    }

    fn base(&self) -> &dyn BaseAuthorization {
        self
    }

    fn area(&self) -> Option<&dyn AreaAuthorization> {
        self.any_rule(|r| !r.areas.is_empty())
            .then_some(self as &dyn AreaAuthorization)
    }

    fn feature(&self) -> Option<&dyn FeatureAuthorization> {
        self.any_rule(|r| r.visible_features.is_some() || r.editable_features.is_some())
            .then_some(self as &dyn FeatureAuthorization)
    }

    fn select_filter(&self) -> Option<&dyn VectorLayerSelectFilterAuthorization> {
        self.any_rule(|r| r.filter.is_some())
            .then_some(self as &dyn VectorLayerSelectFilterAuthorization)
    }

    fn attribute(&self) -> Option<&dyn AttributeAuthorization> {
        self.any_rule(|r| r.readable_attributes.is_some() || r.writable_attributes.is_some())
            .then_some(self as &dyn AttributeAuthorization)
    }

    fn save(&self) -> Result<SavedAuthorization, SecurityError> {
        let payload = serde_json::to_value(&self.role)
            .map_err(|e| SecurityError::Configuration(e.to_string()))?;
        Ok(SavedAuthorization {
            kind: ROLE_AUTHORIZATION_KIND.to_string(),
            payload,
        })
    }
}

impl BaseAuthorization for RoleAuthorization {
    fn is_tool_authorized(&self, tool_id: &str) -> bool {
        listed(&self.role.tools, tool_id)
    }

    fn is_command_authorized(&self, command: &str) -> bool {
        listed(&self.role.commands, command)
    }

    fn is_layer_visible(&self, layer_id: &str) -> bool {
        self.rule(layer_id).map_or(false, |r| r.visible)
    }

    fn is_layer_update_authorized(&self, layer_id: &str) -> bool {
        self.rule(layer_id).map_or(false, |r| r.update)
    }

    fn is_layer_create_authorized(&self, layer_id: &str) -> bool {
        self.rule(layer_id).map_or(false, |r| r.create)
    }

    fn is_layer_delete_authorized(&self, layer_id: &str) -> bool {
        self.rule(layer_id).map_or(false, |r| r.delete)
    }
}

impl AreaAuthorization for RoleAuthorization {
    fn authorized_area(&self, layer_id: &str, kind: AccessKind) -> Option<Geometry> {
        self.rule(layer_id).and_then(|r| r.areas.get(&kind).cloned())
    }

    fn is_partly_sufficient(&self, layer_id: &str, kind: AccessKind) -> bool {
        self.rule(layer_id)
            .map_or(false, |r| r.partly_sufficient.contains(&kind))
    }
}

impl FeatureAuthorization for RoleAuthorization {
    fn is_feature_authorized(&self, layer_id: &str, feature: &Feature, kind: AccessKind) -> bool {
        let Some(compiled) = self.compiled(layer_id) else {
            return false;
        };
        let filter = match kind {
            AccessKind::Visible => compiled.visible_features.as_ref(),
            AccessKind::Update | AccessKind::Delete => compiled.editable_features.as_ref(),
            AccessKind::Create => None,
        };
        filter.map_or(true, |f| f.matches(feature))
    }
}

impl VectorLayerSelectFilterAuthorization for RoleAuthorization {
    fn feature_filter(&self, layer_id: &str) -> Option<Filter> {
        self.compiled(layer_id).and_then(|c| c.filter.clone())
    }
}

impl AttributeAuthorization for RoleAuthorization {
    fn is_attribute_readable(&self, layer_id: &str, _feature: Option<&Feature>, attribute: &str) -> bool {
        match self.rule(layer_id) {
            Some(rule) => rule
                .readable_attributes
                .as_ref()
                .map_or(true, |attrs| listed(attrs, attribute)),
            None => false,
        }
    }

    fn is_attribute_writable(&self, layer_id: &str, _feature: Option<&Feature>, attribute: &str) -> bool {
        match self.rule(layer_id) {
            Some(rule) => rule
                .writable_attributes
                .as_ref()
                .map_or(true, |attrs| listed(attrs, attribute)),
            None => false,
        }
    }
}
