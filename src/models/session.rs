use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Finalized session summary, produced once at teardown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reels_watched: usize,
    /// Seconds.
    pub session_length: f64,
    pub avg_scroll_speed: f64,
    pub time_to_first_skip: Option<f64>,
    /// Average completion ratio over every reel that reported one.
    pub watch_completion_ratio: f64,
    pub total_replays: u64,
    pub total_skips: u64,
    pub total_pauses: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionPost {
    pub session_id: String,
    pub session: SessionRecord,
}
