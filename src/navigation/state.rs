use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::models::Reel;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum NavState {
    Loading,
    Ready { current_index: usize },
    Empty,
    Error { message: String },
}

impl NavState {
    pub fn current_index(&self) -> Option<usize> {
        match self {
            NavState::Ready { current_index } => Some(*current_index),
            _ => None,
        }
    }
}

/// Why a navigation request was ignored. Refusals never change state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    #[error("no reel is active")]
    NotReady,
    #[error("reel {0} is already active")]
    Unchanged(usize),
    #[error("reel {target} is behind the loaded window starting at {window_start}")]
    BeforeWindow { target: usize, window_start: usize },
    #[error("reel {target} is past the end of the feed")]
    FeedExhausted { target: usize },
}

/// Contiguous slice `[start_index, start_index + len)` of the logical feed.
#[derive(Debug, Clone, Default)]
pub struct BatchWindow {
    items: Vec<Arc<Reel>>,
    start_index: usize,
    has_more: bool,
}

impl BatchWindow {
    pub fn new(items: Vec<Arc<Reel>>, start_index: usize, has_more: bool) -> Self {
        Self {
            items,
            start_index,
            has_more,
        }
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// One past the last materialized index.
    pub fn end_index(&self) -> usize {
        self.start_index + self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start_index && index < self.end_index()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Reel>> {
        index
            .checked_sub(self.start_index)
            .and_then(|offset| self.items.get(offset))
    }
}
