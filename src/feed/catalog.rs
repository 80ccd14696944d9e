use std::path::Path;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::models::Reel;

use super::{FeedPage, FeedRequest, FeedSource};

const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FeedOrder {
    /// Pages follow catalog order and end with the catalog.
    #[default]
    Sequential,
    /// Every page is a random sample; the feed never runs out.
    Shuffled,
}

/// Feed backed by a fixed reel catalog held in memory.
#[derive(Debug, Clone)]
pub struct CatalogFeed {
    reels: Vec<Reel>,
    order: FeedOrder,
}

impl CatalogFeed {
    pub fn new(reels: Vec<Reel>, order: FeedOrder) -> Self {
        Self { reels, order }
    }

    /// Load a JSON array of reels.
    pub fn from_path(path: &Path, order: FeedOrder) -> Result<Self, ViewerError> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            ViewerError::Catalog(format!("failed to read {}: {err}", path.display()))
        })?;
        let reels: Vec<Reel> = serde_json::from_str(&contents)?;
        log_info!("Loaded {} reels from {}", reels.len(), path.display());
        Ok(Self::new(reels, order))
    }

    pub fn len(&self) -> usize {
        self.reels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reels.is_empty()
    }

    fn sequential_page(&self, request: &FeedRequest) -> FeedPage {
        let start = request.current_index.min(self.reels.len());
        let end = start.saturating_add(request.batch_size).min(self.reels.len());
        FeedPage {
            reels: self.reels[start..end].to_vec(),
            has_more: end < self.reels.len(),
        }
    }

    fn sampled_page(&self, request: &FeedRequest) -> FeedPage {
        let mut rng = rand::thread_rng();
        let reels = if self.reels.len() <= request.batch_size {
            self.reels.clone()
        } else {
            self.reels
                .choose_multiple(&mut rng, request.batch_size)
                .cloned()
                .collect()
        };
        FeedPage {
            reels,
            has_more: !self.reels.is_empty(),
        }
    }
}

#[async_trait]
impl FeedSource for CatalogFeed {
    async fn fetch_batch(&self, request: &FeedRequest) -> Result<FeedPage, ViewerError> {
        let page = match self.order {
            FeedOrder::Sequential => self.sequential_page(request),
            FeedOrder::Shuffled => self.sampled_page(request),
        };
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(count: usize, order: FeedOrder) -> CatalogFeed {
        let reels = (0..count)
            .map(|i| Reel::new(format!("reel-{i}"), 10.0))
            .collect();
        CatalogFeed::new(reels, order)
    }

    fn request(current_index: usize, batch_size: usize) -> FeedRequest {
        FeedRequest {
            session_id: "session".into(),
            current_index,
            batch_size,
        }
    }

    #[tokio::test]
    async fn sequential_pages_end_with_catalog() {
        let feed = catalog(12, FeedOrder::Sequential);

        let first = feed.fetch_batch(&request(0, 5)).await.unwrap();
        assert_eq!(first.reels.len(), 5);
        assert!(first.has_more);

        let last = feed.fetch_batch(&request(10, 5)).await.unwrap();
        assert_eq!(last.reels.len(), 2);
        assert_eq!(last.reels[0].label, "reel-10");
        assert!(!last.has_more);

        let past = feed.fetch_batch(&request(40, 5)).await.unwrap();
        assert!(past.reels.is_empty());
        assert!(!past.has_more);
    }

    #[tokio::test]
    async fn shuffled_pages_sample_distinct_reels() {
        let feed = catalog(20, FeedOrder::Shuffled);
        let page = feed.fetch_batch(&request(100, 5)).await.unwrap();

        let mut labels: Vec<_> = page.reels.iter().map(|r| r.label.clone()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), 5);
        assert!(page.has_more);

        let small = catalog(3, FeedOrder::Shuffled);
        assert_eq!(small.fetch_batch(&request(0, 5)).await.unwrap().reels.len(), 3);

        let empty = catalog(0, FeedOrder::Shuffled);
        let page = empty.fetch_batch(&request(0, 5)).await.unwrap();
        assert!(page.reels.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn missing_catalog_file_is_a_catalog_error() {
        let path = std::env::temp_dir().join("reelpulse-missing-catalog.json");
        let err = CatalogFeed::from_path(&path, FeedOrder::Sequential).unwrap_err();
        assert!(matches!(err, ViewerError::Catalog(_)));
    }
}
