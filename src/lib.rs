//! Engagement engine for a short-form reel viewer.
//!
//! The synchronous core lives in [`engagement`], [`analytics`] and
//! [`navigation`]; [`viewer::ViewerController`] hosts it on tokio together
//! with a [`feed::FeedSource`] and a [`telemetry::TelemetrySink`].

pub mod analytics;
pub mod db;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod models;
pub mod navigation;
pub mod settings;
pub mod telemetry;
pub mod utils;
pub mod viewer;

pub use db::Database;
pub use error::ViewerError;
pub use feed::{CatalogFeed, FeedOrder, FeedSource};
pub use settings::{SettingsStore, ViewerSettings};
pub use telemetry::{RecordingSink, TelemetrySink};
pub use utils::logging::init_logging;
pub use viewer::{ViewerController, ViewerSnapshot};
