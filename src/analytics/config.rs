use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Completion ratio at which a reel counts as watched.
    pub completion_threshold: f64,
    /// Navigation speeds retained for the session average.
    pub scroll_speed_cap: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            completion_threshold: 0.95,
            scroll_speed_cap: 10,
        }
    }
}
