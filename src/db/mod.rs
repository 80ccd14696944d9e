//! SQLite-backed telemetry store.
//!
//! A dedicated worker thread owns the connection; async callers hand it
//! closures through [`Database::execute`] and await the reply.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
mod repositories;

use crate::models::{InteractionPost, SessionPost};
use crate::telemetry::TelemetrySink;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum WorkerMessage {
    Run(Job),
    Stop,
}

/// Owns the worker thread; stopping it on drop flushes every queued job first.
struct Worker {
    jobs: mpsc::Sender<WorkerMessage>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    fn stop(&self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };

        if let Err(err) = self.jobs.send(WorkerMessage::Stop) {
            error!("Telemetry DB worker already gone: {err}");
        }
        if let Err(err) = handle.join() {
            error!("Telemetry DB worker panicked: {err:?}");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open SQLite database {}", path.display()))?;

    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        error!("Failed to enable WAL mode: {err}");
    }
    if let Err(err) = conn.pragma_update(None, "synchronous", "NORMAL") {
        error!("Failed to relax synchronous mode: {err}");
    }

    migrations::run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn run_worker(
    path: PathBuf,
    jobs: mpsc::Receiver<WorkerMessage>,
    ready: mpsc::Sender<Result<()>>,
) {
    let mut conn = match open_connection(&path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Ok(message) = jobs.recv() {
        match message {
            WorkerMessage::Run(job) => job(&mut conn),
            WorkerMessage::Stop => break,
        }
    }

    info!("Telemetry DB worker stopped");
}

/// Cheap-to-clone handle to the telemetry database.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Open (or create) the database at `path` and migrate it before returning.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let worker_path = path.clone();

        let thread = thread::Builder::new()
            .name("reelpulse-db".into())
            .spawn(move || run_worker(worker_path, jobs_rx, ready_tx))
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Telemetry database ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Run `job` on the worker thread and await its result.
    pub async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let message = WorkerMessage::Run(Box::new(move |conn| {
            if reply_tx.send(job(conn)).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        self.worker
            .jobs
            .send(message)
            .map_err(|err| anyhow!("telemetry DB worker is not running: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("telemetry DB worker terminated unexpectedly"))?
    }
}

#[async_trait]
impl TelemetrySink for Database {
    async fn record_interaction(&self, post: &InteractionPost) -> Result<()> {
        self.upsert_interaction(post).await
    }

    async fn record_session(&self, post: &SessionPost) -> Result<()> {
        self.upsert_session(post).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{InteractionRecord, InteractionSnapshot};

    pub(crate) fn temp_database(label: &str) -> (Database, PathBuf) {
        let path = std::env::temp_dir().join(format!(
            "reelpulse-{label}-{}.sqlite3",
            uuid::Uuid::new_v4()
        ));
        let db = Database::new(path.clone()).unwrap();
        (db, path)
    }

    #[tokio::test]
    async fn database_acts_as_telemetry_sink() {
        let (db, path) = temp_database("sink");
        assert_eq!(db.path(), path.as_path());

        let sink: Arc<dyn TelemetrySink> = Arc::new(db.clone());
        sink.record_interaction(&InteractionPost {
            session_id: "s".into(),
            interaction: InteractionRecord {
                snapshot: InteractionSnapshot {
                    reel_index: 2,
                    watch_time: 1.5,
                    ..Default::default()
                },
                scroll_speed: 0.0,
                session_duration: 1.5,
            },
        })
        .await
        .unwrap();

        let rows = db.get_interactions_for_session("s").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].interaction.snapshot.reel_index, 2);

        drop(sink);
        drop(db);
        let _ = std::fs::remove_file(path);
    }
}
