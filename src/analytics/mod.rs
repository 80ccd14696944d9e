mod aggregator;
mod config;
mod types;

pub use aggregator::Aggregator;
pub use config::AnalyticsConfig;
pub use types::{AnalyticsReport, ReelCompletion, SessionAnalytics};
