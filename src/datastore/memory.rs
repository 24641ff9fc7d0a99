use async_trait::async_trait;

use super::feature::Feature;
use super::source::{DatastoreError, FeatureQuery, FeatureSource};

/// Feature source over an in-memory list; insertion order is the natural order
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeatureSource {
    features: Vec<Feature>,
}

impl InMemoryFeatureSource {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[async_trait]
impl FeatureSource for InMemoryFeatureSource {
    async fn query(&self, query: &FeatureQuery) -> Result<Vec<Feature>, DatastoreError> {
        let matching = self.features.iter().filter(|f| query.filter.matches(f));
        let features = match query.window {
            Some(window) => matching
                .skip(window.offset)
                .take(window.limit)
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        };
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::Window;
    use crate::filter::{Filter, FilterOp};
    use serde_json::{json, Map};

    fn numbered(n: usize) -> InMemoryFeatureSource {
        InMemoryFeatureSource::new(
            (1..=n)
                .map(|i| {
                    let mut attributes = Map::new();
                    attributes.insert("n".into(), json!(i));
                    Feature::new(i.to_string(), attributes, None)
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_window_applies_after_filter() {
        let source = numbered(10);
        let query = FeatureQuery {
            filter: Filter::compare("n", FilterOp::Gt, json!(2)),
            window: Some(Window { offset: 1, limit: 2 }),
        };
        let ids: Vec<String> = source.query(&query).await.unwrap().into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["4", "5"]);
    }

    #[tokio::test]
    async fn test_natural_order_preserved() {
        let source = numbered(5);
        let ids: Vec<String> = source
            .query(&FeatureQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }
}
