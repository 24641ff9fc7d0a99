use serde::{Deserialize, Serialize};

use super::error::FilterError;

/// Attribute comparison operators, named the way they appear in JSON filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$like")] Like,
    #[serde(rename = "$ilike")] ILike,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,
    #[serde(rename = "$between")] Between,

    #[serde(rename = "$null")] Null,
    #[serde(rename = "$exists")] Exists,
}

impl FilterOp {
    /// Map a JSON operator key (`$gte`) or a search-criterion operator (`>=`)
    pub fn from_key(key: &str) -> Result<Self, FilterError> {
        Ok(match key.trim().to_ascii_lowercase().as_str() {
            "$eq" | "=" | "==" => FilterOp::Eq,
            "$ne" | "$neq" | "<>" | "!=" => FilterOp::Ne,
            "$gt" | ">" => FilterOp::Gt,
            "$gte" | ">=" => FilterOp::Gte,
            "$lt" | "<" => FilterOp::Lt,
            "$lte" | "<=" => FilterOp::Lte,
            "$like" | "like" => FilterOp::Like,
            "$ilike" | "ilike" => FilterOp::ILike,
            "$in" | "in" => FilterOp::In,
            "$nin" | "not in" => FilterOp::NIn,
            "$between" | "between" => FilterOp::Between,
            "$null" | "is null" => FilterOp::Null,
            "$exists" | "exists" => FilterOp::Exists,
            _ => return Err(FilterError::UnsupportedOperator(key.to_string())),
        })
    }
}

/// Spatial predicates for search-by-location, keyed by their numeric query type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialOp {
    /// Feature geometry intersects the search geometry
    Intersects,
    /// Feature geometry lies within the search geometry
    Within,
    /// Feature geometry contains the search geometry
    Contains,
}

impl SpatialOp {
    pub const QUERY_INTERSECTS: u8 = 1;
    pub const QUERY_WITHIN: u8 = 3;
    pub const QUERY_CONTAINS: u8 = 4;

    pub fn from_code(code: u8) -> Result<Self, FilterError> {
        match code {
            Self::QUERY_INTERSECTS => Ok(SpatialOp::Intersects),
            Self::QUERY_WITHIN => Ok(SpatialOp::Within),
            Self::QUERY_CONTAINS => Ok(SpatialOp::Contains),
            other => Err(FilterError::UnknownQueryType(other)),
        }
    }
}

/// How multiple search criteria are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BooleanOperator {
    #[default]
    And,
    Or,
}

impl BooleanOperator {
    pub fn parse(value: &str) -> Result<Self, FilterError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AND" | "" => Ok(BooleanOperator::And),
            "OR" => Ok(BooleanOperator::Or),
            _ => Err(FilterError::UnknownBooleanOperator(value.to_string())),
        }
    }
}

/// One `(attribute, operator, value)` triple of a feature search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriterion {
    pub attribute_name: String,
    pub operator: String,
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_aliases() {
        assert_eq!(FilterOp::from_key(">=").unwrap(), FilterOp::Gte);
        assert_eq!(FilterOp::from_key("$gte").unwrap(), FilterOp::Gte);
        assert_eq!(FilterOp::from_key("LIKE").unwrap(), FilterOp::Like);
        assert!(FilterOp::from_key("$regex").is_err());
    }

    #[test]
    fn test_unknown_query_type() {
        assert_eq!(SpatialOp::from_code(3).unwrap(), SpatialOp::Within);
        assert_eq!(SpatialOp::from_code(2), Err(FilterError::UnknownQueryType(2)));
    }

    #[test]
    fn test_boolean_operator() {
        assert_eq!(BooleanOperator::parse("or").unwrap(), BooleanOperator::Or);
        assert!(BooleanOperator::parse("XOR").is_err());
    }
}
