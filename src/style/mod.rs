use serde::{Deserialize, Serialize};

use crate::datastore::Feature;

/// How a feature label is computed from its attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelFormula {
    /// Plain attribute reference
    Attribute(String),
    /// Several attributes joined; empty values are skipped
    Concat {
        attributes: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// Template with `${attribute}` placeholders mixed with literal text
    Format(String),
}

fn default_separator() -> String {
    " ".to_string()
}

impl LabelFormula {
    pub fn evaluate(&self, feature: &Feature) -> String {
        match self {
            LabelFormula::Attribute(name) => feature.attribute_text(name),
            LabelFormula::Concat { attributes, separator } => attributes
                .iter()
                .map(|name| feature.attribute_text(name))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(separator),
            LabelFormula::Format(template) => render_template(template, feature),
        }
    }
}

fn render_template(template: &str, feature: &Feature) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                out.push_str(&feature.attribute_text(name.trim()));
                rest = &rest[start + 2 + end + 1..];
            }
            None => {
                // Unterminated placeholder is kept literally
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// A named style of a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedStyle {
    pub id: String,
    #[serde(default)]
    pub label: Option<LabelFormula>,
    /// Fill colour as `#rrggbb`
    #[serde(default = "default_fill")]
    pub fill_color: String,
    #[serde(default = "default_stroke")]
    pub stroke_color: String,
}

fn default_fill() -> String {
    "#3388ff".to_string()
}

fn default_stroke() -> String {
    "#1f3d7a".to_string()
}

impl NamedStyle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            fill_color: default_fill(),
            stroke_color: default_stroke(),
        }
    }

    pub fn with_label(mut self, label: LabelFormula) -> Self {
        self.label = Some(label);
        self
    }
}

/// Parse `#rrggbb` into RGBA; malformed colours fall back to opaque black
pub fn parse_color(hex: &str) -> [u8; 4] {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return [0, 0, 0, 255];
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).unwrap_or(0);
    [channel(0), channel(2), channel(4), 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn city() -> Feature {
        let attributes: Map<String, Value> = json!({"name": "Leuven", "country": "BE", "population": 102000})
            .as_object()
            .cloned()
            .unwrap();
        Feature::new("1", attributes, None)
    }

    #[test]
    fn test_attribute_label() {
        assert_eq!(LabelFormula::Attribute("name".into()).evaluate(&city()), "Leuven");
    }

    #[test]
    fn test_concat_label_skips_missing() {
        let formula = LabelFormula::Concat {
            attributes: vec!["name".into(), "missing".into(), "country".into()],
            separator: ", ".into(),
        };
        assert_eq!(formula.evaluate(&city()), "Leuven, BE");
    }

    #[test]
    fn test_format_label() {
        let formula = LabelFormula::Format("${name} (${population} inhabitants)".into());
        assert_eq!(formula.evaluate(&city()), "Leuven (102000 inhabitants)");
    }

    #[test]
    fn test_yaml_shape() {
        let formula: LabelFormula = serde_yaml::from_str("format: \"${name}!\"").unwrap();
        assert_eq!(formula, LabelFormula::Format("${name}!".into()));
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff8000"), [255, 128, 0, 255]);
        assert_eq!(parse_color("nope"), [0, 0, 0, 255]);
    }
}
