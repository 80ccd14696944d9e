//! Feed-paging collaborator.

mod catalog;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ViewerError;
use crate::models::Reel;

pub use catalog::{CatalogFeed, FeedOrder};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedRequest {
    pub session_id: String,
    /// Absolute feed index of the first reel wanted.
    pub current_index: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FeedPage {
    pub reels: Vec<Reel>,
    pub has_more: bool,
}

/// Source of reel pages. Implementations report transport problems as
/// [`ViewerError::FetchFailure`]; an empty page is not an error.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_batch(&self, request: &FeedRequest) -> Result<FeedPage, ViewerError>;
}
