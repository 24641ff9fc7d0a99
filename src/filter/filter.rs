use serde::Serialize;
use serde_json::Value;

use super::types::{FilterOp, SpatialOp};
use crate::datastore::Feature;
use crate::geometry::Geometry;

/// In-memory feature filter expression.
///
/// Built from JSON (see [`super::FilterWhere`]) or from search criteria, combined with
/// the security filter of the current principal, and evaluated feature by feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Matches every feature
    Include,
    /// Matches nothing
    Exclude,
    Compare {
        attribute: String,
        op: FilterOp,
        value: Value,
    },
    Ids(Vec<String>),
    Spatial {
        op: SpatialOp,
        geometry: Geometry,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Filter::Include
    }
}

impl Filter {
    pub fn compare(attribute: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Filter::Compare {
            attribute: attribute.into(),
            op,
            value,
        }
    }

    pub fn is_include(&self) -> bool {
        matches!(self, Filter::Include)
    }

    /// Conjunction that keeps `Include` out of the tree
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::Include, f) | (f, Filter::Include) => f,
            (Filter::Exclude, _) | (_, Filter::Exclude) => Filter::Exclude,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    pub fn and_all(filters: impl IntoIterator<Item = Filter>) -> Filter {
        filters.into_iter().fold(Filter::Include, Filter::and)
    }

    pub fn or_all(filters: impl IntoIterator<Item = Filter>) -> Filter {
        let filters: Vec<Filter> = filters.into_iter().collect();
        if filters.iter().any(Filter::is_include) {
            return Filter::Include;
        }
        match filters.len() {
            0 => Filter::Include,
            1 => filters.into_iter().next().unwrap_or_default(),
            _ => Filter::Or(filters),
        }
    }

    /// Canonical text form, stable for identical filters; used in cache identities
    pub fn to_key_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        match self {
            Filter::Include => true,
            Filter::Exclude => false,
            Filter::Compare { attribute, op, value } => {
                let actual = feature.attribute(attribute);
                compare(*op, actual.unwrap_or(&Value::Null), value, actual.is_some())
            }
            Filter::Ids(ids) => ids.iter().any(|id| *id == feature.id),
            Filter::Spatial { op, geometry } => match &feature.geometry {
                None => false,
                Some(feature_geometry) => match op {
                    SpatialOp::Intersects => geometry.intersects(feature_geometry),
                    SpatialOp::Within => geometry.covers(feature_geometry),
                    SpatialOp::Contains => feature_geometry.covers(geometry),
                },
            },
            Filter::And(filters) => filters.iter().all(|f| f.matches(feature)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(feature)),
            Filter::Not(inner) => !inner.matches(feature),
        }
    }
}

fn compare(op: FilterOp, actual: &Value, expected: &Value, present: bool) -> bool {
    match op {
        FilterOp::Eq => values_equal(actual, expected),
        FilterOp::Ne => !values_equal(actual, expected),
        FilterOp::Gt => ordering(actual, expected).map_or(false, |o| o.is_gt()),
        FilterOp::Gte => ordering(actual, expected).map_or(false, |o| o.is_ge()),
        FilterOp::Lt => ordering(actual, expected).map_or(false, |o| o.is_lt()),
        FilterOp::Lte => ordering(actual, expected).map_or(false, |o| o.is_le()),
        FilterOp::Like => match (actual.as_str(), expected.as_str()) {
            (Some(text), Some(pattern)) => like(text, pattern),
            _ => false,
        },
        FilterOp::ILike => match (actual.as_str(), expected.as_str()) {
            (Some(text), Some(pattern)) => like(&text.to_lowercase(), &pattern.to_lowercase()),
            _ => false,
        },
        FilterOp::In => match expected {
            Value::Array(values) => values.iter().any(|v| values_equal(actual, v)),
            v => values_equal(actual, v),
        },
        FilterOp::NIn => match expected {
            Value::Array(values) => !values.iter().any(|v| values_equal(actual, v)),
            v => !values_equal(actual, v),
        },
        FilterOp::Between => match expected.as_array().map(Vec::as_slice) {
            Some([low, high]) => {
                ordering(actual, low).map_or(false, |o| o.is_ge())
                    && ordering(actual, high).map_or(false, |o| o.is_le())
            }
            _ => false,
        },
        FilterOp::Null => actual.is_null() == expected.as_bool().unwrap_or(true),
        FilterOp::Exists => present == expected.as_bool().unwrap_or(true),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn ordering(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL LIKE matching: `%` any run, `_` any single character
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((bp, bt)) = backtrack {
            p = bp + 1;
            t = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}
