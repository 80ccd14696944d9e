use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::{InteractionPost, SessionPost};

use super::TelemetrySink;

/// Keeps every post in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    interactions: Mutex<Vec<InteractionPost>>,
    sessions: Mutex<Vec<SessionPost>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn interactions(&self) -> Vec<InteractionPost> {
        self.interactions.lock().await.clone()
    }

    pub async fn sessions(&self) -> Vec<SessionPost> {
        self.sessions.lock().await.clone()
    }
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn record_interaction(&self, post: &InteractionPost) -> Result<()> {
        self.interactions.lock().await.push(post.clone());
        Ok(())
    }

    async fn record_session(&self, post: &SessionPost) -> Result<()> {
        self.sessions.lock().await.push(post.clone());
        Ok(())
    }
}
