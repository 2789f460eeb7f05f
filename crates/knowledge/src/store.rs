//! Flat, exact nearest-neighbour store.
//!
//! Every search is a linear scan over all items. Results are ordered by
//! distance with ties broken by insertion order, so equal inputs always give
//! equal rankings.

use crate::types::{EmbeddedItem, SearchHit};
use crate::vector_index::{DistanceMetric, VectorIndex};
use estate_core::{AppError, AppResult};

/// In-memory vector store with exact search.
#[derive(Debug, Clone, Default)]
pub struct FlatVectorStore {
    metric: DistanceMetric,
    dimensions: Option<usize>,
    items: Vec<EmbeddedItem>,
}

impl FlatVectorStore {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            dimensions: None,
            items: Vec::new(),
        }
    }

    /// A store that only accepts vectors of `dimensions` length.
    pub fn with_dimensions(metric: DistanceMetric, dimensions: usize) -> Self {
        Self {
            metric,
            dimensions: Some(dimensions),
            items: Vec::new(),
        }
    }

    /// Rebuild a store from previously stored items.
    pub fn from_items(
        metric: DistanceMetric,
        items: impl IntoIterator<Item = EmbeddedItem>,
    ) -> AppResult<Self> {
        let mut store = Self::new(metric);
        for item in items {
            store.insert(item)?;
        }
        Ok(store)
    }

    pub fn items(&self) -> &[EmbeddedItem] {
        &self.items
    }
}

impl VectorIndex for FlatVectorStore {
    fn insert(&mut self, item: EmbeddedItem) -> AppResult<()> {
        let dims = item.dimensions();
        if dims == 0 {
            return Err(AppError::Knowledge("Cannot store an empty vector".to_string()));
        }
        if item.vector.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Knowledge(
                "Cannot store a vector with non-finite values".to_string(),
            ));
        }

        match self.dimensions {
            Some(expected) if expected != dims => {
                return Err(AppError::Knowledge(format!(
                    "Dimension mismatch: store holds {}-dimensional vectors, got {}",
                    expected, dims
                )));
            }
            Some(_) => {}
            None => self.dimensions = Some(dims),
        }

        self.items.push(item);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<SearchHit>> {
        if self.items.is_empty() {
            return Err(AppError::EmptyStore);
        }
        if let Some(expected) = self.dimensions {
            if query.len() != expected {
                return Err(AppError::Knowledge(format!(
                    "Query has {} dimensions, store holds {}",
                    query.len(),
                    expected
                )));
            }
        }

        let mut scored: Vec<(usize, f32)> = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| (index, self.metric.distance(query, &item.vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, (index, distance))| SearchHit {
                rank: rank + 1,
                distance,
                item: self.items[index].source.clone(),
            })
            .collect();

        tracing::debug!(
            "Flat search over {} items returned {} hits",
            self.items.len(),
            hits.len()
        );

        Ok(hits)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guidelines::GuidelineChunk;
    use crate::types::ItemSource;

    fn item(label: &str, vector: Vec<f32>) -> EmbeddedItem {
        EmbeddedItem::new(
            vector,
            ItemSource::Guideline(GuidelineChunk {
                text: label.to_string(),
                section: "General".to_string(),
                offset: 0,
                page: 1,
                position: 0,
            }),
        )
    }

    fn label(hit: &SearchHit) -> &str {
        &hit.item.as_guideline().unwrap().text
    }

    fn store() -> FlatVectorStore {
        FlatVectorStore::from_items(
            DistanceMetric::Euclidean,
            vec![
                item("far", vec![10.0, 10.0]),
                item("near", vec![1.0, 0.0]),
                item("mid", vec![3.0, 0.0]),
                item("origin", vec![0.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_distance() {
        let hits = store().search(&[0.0, 0.0], 3).unwrap();
        let labels: Vec<&str> = hits.iter().map(label).collect();
        assert_eq!(labels, vec!["origin", "near", "mid"]);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_search_never_exceeds_k_or_len() {
        let store = store();
        for k in 0..8 {
            let hits = store.search(&[2.0, 1.0], k).unwrap();
            assert_eq!(hits.len(), k.min(store.len()));
            assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        }
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let store = FlatVectorStore::from_items(
            DistanceMetric::Euclidean,
            vec![
                item("first", vec![1.0, 0.0]),
                item("second", vec![0.0, 1.0]),
                item("third", vec![-1.0, 0.0]),
            ],
        )
        .unwrap();

        let hits = store.search(&[0.0, 0.0], 3).unwrap();
        let labels: Vec<&str> = hits.iter().map(label).collect();
        assert_eq!(labels, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_inner_product_prefers_aligned_vectors() {
        let store = FlatVectorStore::from_items(
            DistanceMetric::InnerProduct,
            vec![item("opposite", vec![-1.0, 0.0]), item("aligned", vec![1.0, 0.0])],
        )
        .unwrap();

        let hits = store.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(label(&hits[0]), "aligned");
    }

    #[test]
    fn test_empty_store_search_fails() {
        let store = FlatVectorStore::new(DistanceMetric::Euclidean);
        assert!(matches!(
            store.search(&[1.0], 5),
            Err(AppError::EmptyStore)
        ));
    }

    #[test]
    fn test_dimension_is_fixed_by_first_insert() {
        let mut store = FlatVectorStore::new(DistanceMetric::Euclidean);
        store.insert(item("a", vec![1.0, 2.0])).unwrap();
        assert_eq!(store.dimensions(), Some(2));

        assert!(store.insert(item("b", vec![1.0, 2.0, 3.0])).is_err());
        assert!(store.search(&[1.0], 1).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fixed_dimensions_and_bad_vectors() {
        let mut store = FlatVectorStore::with_dimensions(DistanceMetric::Euclidean, 3);
        assert!(store.insert(item("short", vec![1.0, 2.0])).is_err());
        assert!(store.insert(item("empty", vec![])).is_err());
        assert!(store.insert(item("nan", vec![f32::NAN, 0.0, 0.0])).is_err());
        assert!(store.is_empty());
    }
}
