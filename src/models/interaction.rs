use serde::{Deserialize, Serialize};

/// Rates derived from one reel's engagement state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EngagementRates {
    pub hesitation_rate: f64,
    pub quick_scroll_rate: f64,
    pub attention_retention: f64,
    pub rewatch_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct EngagementMetrics {
    pub engagement: EngagementRates,
    pub engagement_rate: f64,
}

/// Point-in-time summary of one reel's engagement.
///
/// `seq` increases with every snapshot the navigation controller emits, so a
/// consumer can drop anything older than what it already applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionSnapshot {
    #[serde(default)]
    pub seq: u64,
    pub reel_index: usize,
    pub watch_time: f64,
    pub completed: bool,
    pub likes: u32,
    pub rewatches: u32,
    pub local_rewatches: u32,
    pub pauses: u32,
    pub percentage_watched: f64,
    pub was_skipped: bool,
    pub metrics: EngagementMetrics,
}

impl InteractionSnapshot {
    /// Completion ratio of the reel, 1.0 meaning watched once end to end.
    pub fn completion_ratio(&self) -> f64 {
        self.percentage_watched / 100.0
    }

    /// Explicit and implicit replays together.
    pub fn replays(&self) -> u64 {
        u64::from(self.rewatches) + u64::from(self.local_rewatches)
    }
}

/// Interaction as posted to the persistence service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRecord {
    #[serde(flatten)]
    pub snapshot: InteractionSnapshot,
    pub scroll_speed: f64,
    /// Seconds since the session started.
    pub session_duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionPost {
    pub session_id: String,
    pub interaction: InteractionRecord,
}
