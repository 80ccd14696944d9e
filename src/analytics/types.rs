use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Running statistics for one viewing session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionAnalytics {
    /// Highest index completed (ratio over the threshold) plus one.
    pub reels_watched: usize,
    /// Most recent navigation speeds, oldest first.
    pub scroll_speeds: Vec<f64>,
    /// Seconds from session start to the first forward jump.
    pub time_to_first_skip: Option<f64>,
    pub watch_completion_ratios: BTreeMap<usize, f64>,
    pub total_replays: u64,
    pub total_skips: u64,
    pub total_pauses: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReelCompletion {
    pub reel_index: usize,
    pub ratio: f64,
}

/// Read-only projection for presentation layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsReport {
    pub reels_watched: usize,
    pub total_replays: u64,
    pub total_skips: u64,
    pub total_pauses: u64,
    pub time_to_first_skip: Option<f64>,
    pub total_likes: u32,
    /// Explicit and completion rewatches across all reels.
    pub total_rewatches: u32,
    /// Reels whose latest snapshot is flagged as skipped.
    pub skipped_reels: usize,
    pub completions: Vec<ReelCompletion>,
    /// Distinct tags of liked reels, sorted.
    pub liked_tags: Vec<String>,
    pub scroll_speeds: Vec<f64>,
}
