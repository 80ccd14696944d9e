//! Interaction and session persistence collaborator.
//!
//! Posting is fire-and-forget: failures are logged and the local state is
//! never rolled back.

mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::error::ViewerError;
use crate::models::{InteractionPost, SessionPost};

pub use memory::RecordingSink;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record_interaction(&self, post: &InteractionPost) -> Result<()>;
    async fn record_session(&self, post: &SessionPost) -> Result<()>;
}

fn report_failure(what: &str, session_id: &str, err: anyhow::Error) {
    let err = ViewerError::PersistenceFailure(format!("{err:#}"));
    log_error!("Dropping {what} for session {session_id}: {err}");
}

/// Post an interaction on a background task.
pub fn dispatch_interaction(sink: Arc<dyn TelemetrySink>, post: InteractionPost) -> JoinHandle<()> {
    tokio::spawn(async move {
        match sink.record_interaction(&post).await {
            Ok(()) => log_debug!(
                "Saved interaction for reel {} in session {}",
                post.interaction.snapshot.reel_index,
                post.session_id
            ),
            Err(err) => report_failure("interaction", &post.session_id, err),
        }
    })
}

/// Post the finalized session on a background task.
pub fn dispatch_session(sink: Arc<dyn TelemetrySink>, post: SessionPost) -> JoinHandle<()> {
    tokio::spawn(async move {
        match sink.record_session(&post).await {
            Ok(()) => log_debug!("Saved session {}", post.session_id),
            Err(err) => report_failure("session", &post.session_id, err),
        }
    })
}
