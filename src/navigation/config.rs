use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    /// Reels requested per feed page.
    pub batch_size: usize,
    /// Move to the next reel shortly after the active one completes.
    pub auto_advance_on_complete: bool,
    pub auto_advance_delay_ms: u64,
}

impl NavigationConfig {
    pub fn auto_advance_delay(&self) -> Duration {
        Duration::from_millis(self.auto_advance_delay_ms)
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            auto_advance_on_complete: true,
            auto_advance_delay_ms: 1_000,
        }
    }
}
