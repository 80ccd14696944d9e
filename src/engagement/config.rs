use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for per-reel engagement tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngagementConfig {
    /// Scheduler tick period driving the watch timer.
    pub tick_interval_ms: u64,

    /// Pauses and scroll gaps longer than this count as hesitation.
    pub hesitation_threshold_secs: f64,

    /// Scroll events faster than this (events per second) are "quick".
    pub quick_scroll_speed: f64,
    /// Number of most recent scroll events considered for the quick-scroll rate.
    pub quick_scroll_window: usize,
    /// Scroll events retained per reel.
    pub scroll_history_cap: usize,

    /// A reel watched for less than this fraction of its duration counts as abandoned.
    pub skip_fraction: f64,

    /// Count pause-window and scroll-gap hesitation events.
    pub track_hesitation: bool,
    /// Count implicit rewatches while a completed reel keeps looping.
    pub track_local_rewatches: bool,
    pub local_rewatch_period_secs: f64,
}

impl EngagementConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            hesitation_threshold_secs: 1.5,
            quick_scroll_speed: 2.0,
            quick_scroll_window: 10,
            scroll_history_cap: 50,
            skip_fraction: 0.1,
            track_hesitation: true,
            track_local_rewatches: true,
            local_rewatch_period_secs: 1.0,
        }
    }
}
