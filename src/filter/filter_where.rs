use serde_json::Value;

use super::error::FilterError;
use super::filter::Filter;
use super::types::{BooleanOperator, FilterOp, SearchCriterion};

/// Parser for JSON filter expressions.
///
/// ```json
/// { "$and": [ { "kind": "road" }, { "lanes": { "$gte": 2 } } ], "$id": ["1", "2"] }
/// ```
pub struct FilterWhere;

impl FilterWhere {
    /// Parse a JSON expression; `null` means no restriction
    pub fn parse(where_data: &Value) -> Result<Filter, FilterError> {
        match where_data {
            Value::Null => Ok(Filter::Include),
            Value::Bool(true) => Ok(Filter::Include),
            Value::Bool(false) => Ok(Filter::Exclude),
            Value::Object(obj) => {
                let mut conditions = Vec::new();
                for (key, value) in obj {
                    if key.starts_with('$') {
                        conditions.push(Self::parse_logical_operator(key, value)?);
                    } else {
                        conditions.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(Filter::and_all(conditions))
            }
            _ => Err(FilterError::InvalidExpression(
                "filter must be an object, a boolean or null".to_string(),
            )),
        }
    }

    /// Build a filter from search criteria combined with `boolean_operator`
    pub fn from_criteria(
        criteria: &[SearchCriterion],
        boolean_operator: BooleanOperator,
    ) -> Result<Filter, FilterError> {
        let mut filters = Vec::with_capacity(criteria.len());
        for criterion in criteria {
            if criterion.attribute_name.trim().is_empty() {
                return Err(FilterError::InvalidExpression(
                    "criterion attribute name cannot be empty".to_string(),
                ));
            }
            let op = FilterOp::from_key(&criterion.operator)?;
            filters.push(Filter::compare(criterion.attribute_name.clone(), op, criterion.value.clone()));
        }
        if filters.is_empty() {
            return Ok(Filter::Include);
        }
        Ok(match boolean_operator {
            BooleanOperator::And => Filter::and_all(filters),
            BooleanOperator::Or => Filter::or_all(filters),
        })
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Filter, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let parts = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { Filter::and_all(parts) } else { Filter::or_all(parts) })
            }
            "$not" => Ok(Filter::Not(Box::new(Self::parse(value)?))),
            "$id" => match value {
                Value::Array(ids) => Ok(Filter::Ids(ids.iter().map(id_string).collect())),
                single => Ok(Filter::Ids(vec![id_string(single)])),
            },
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Filter>, FilterError> {
        if let Value::Object(obj) = value {
            let mut out = Vec::with_capacity(obj.len());
            for (op_key, op_val) in obj {
                let operator = FilterOp::from_key(op_key)?;
                if operator == FilterOp::Between
                    && op_val.as_array().map_or(true, |values| values.len() != 2)
                {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires exactly 2 values".to_string(),
                    ));
                }
                out.push(Filter::compare(field, operator, op_val.clone()));
            }
            Ok(out)
        } else {
            // Implicit equality: { field: value }
            Ok(vec![Filter::compare(field, FilterOp::Eq, value.clone())])
        }
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_include() {
        assert_eq!(FilterWhere::parse(&Value::Null).unwrap(), Filter::Include);
    }

    #[test]
    fn test_implicit_equality_and_operators() {
        let filter = FilterWhere::parse(&json!({"kind": "road", "lanes": {"$gte": 2}})).unwrap();
        match filter {
            Filter::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected conjunction, got {:?}", other),
        }
    }

    #[test]
    fn test_ids_accept_numbers() {
        let filter = FilterWhere::parse(&json!({"$id": [1, "2"]})).unwrap();
        assert_eq!(filter, Filter::Ids(vec!["1".to_string(), "2".to_string()]));
    }

    #[test]
    fn test_invalid_operator_rejected() {
        assert!(matches!(
            FilterWhere::parse(&json!({"kind": {"$regex": "r.*"}})),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(FilterWhere::parse(&json!([1, 2])).is_err());
        assert!(FilterWhere::parse(&json!({"rank": {"$between": [1]}})).is_err());
    }

    #[test]
    fn test_criteria_or() {
        let criteria = vec![
            SearchCriterion { attribute_name: "kind".into(), operator: "=".into(), value: json!("road") },
            SearchCriterion { attribute_name: "kind".into(), operator: "=".into(), value: json!("rail") },
        ];
        let filter = FilterWhere::from_criteria(&criteria, BooleanOperator::Or).unwrap();
        assert!(matches!(filter, Filter::Or(ref parts) if parts.len() == 2));
    }
}
