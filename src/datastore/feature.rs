use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::geometry::Geometry;

/// A raw feature as produced by a datastore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn new(id: impl Into<String>, attributes: Map<String, Value>, geometry: Option<Geometry>) -> Self {
        Self {
            id: id.into(),
            attributes,
            geometry,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Attribute rendered as display text; missing and null values render empty
    pub fn attribute_text(&self, name: &str) -> String {
        match self.attributes.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}
