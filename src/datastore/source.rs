use async_trait::async_trait;
use thiserror::Error;

use super::feature::Feature;
use crate::filter::Filter;

#[derive(Debug, Error, Clone)]
pub enum DatastoreError {
    #[error("Datastore unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid datastore query: {0}")]
    InvalidQuery(String),
}

/// Offset/limit window applied by the datastore itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: usize,
}

/// Query handed to a feature source: filter first, then the optional window
#[derive(Debug, Clone, Default)]
pub struct FeatureQuery {
    pub filter: Filter,
    pub window: Option<Window>,
}

/// Produces candidate features in a stable natural order
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn query(&self, query: &FeatureQuery) -> Result<Vec<Feature>, DatastoreError>;
}
