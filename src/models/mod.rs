mod interaction;
mod reel;
mod session;

pub use interaction::{
    EngagementMetrics, EngagementRates, InteractionPost, InteractionRecord, InteractionSnapshot,
};
pub use reel::{Reel, ReelInfo};
pub use session::{SessionPost, SessionRecord};
