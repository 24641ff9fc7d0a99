use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid filter expression: {0}")]
    InvalidExpression(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Unknown boolean operator: {0}")]
    UnknownBooleanOperator(String),

    #[error("Unknown query type: {0}")]
    UnknownQueryType(u8),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}
