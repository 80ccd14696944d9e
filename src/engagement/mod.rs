mod config;
pub mod metrics;
mod state;
mod tracker;

pub use config::EngagementConfig;
pub use state::EngagementState;
pub use tracker::{EngagementTracker, TrackerUpdate};
