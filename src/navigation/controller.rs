use std::sync::Arc;
use std::time::Instant;

use crate::analytics::Aggregator;
use crate::engagement::{EngagementConfig, EngagementTracker, TrackerUpdate};
use crate::error::ViewerError;
use crate::feed::{FeedPage, FeedRequest};
use crate::models::{InteractionSnapshot, Reel};

use super::{is_non_sequential, BatchWindow, NavState, NavigationConfig, Refusal};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// The outgoing reel's final snapshot and the speed of the navigation that left it.
#[derive(Debug, Clone)]
pub struct Departure {
    pub snapshot: InteractionSnapshot,
    pub scroll_speed: f64,
}

#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    Refused(Refusal),
    /// Moved inside the loaded window.
    Moved {
        from: usize,
        to: usize,
        departure: Option<Departure>,
    },
    /// Target lies past the window; the caller must perform `request` and hand
    /// the result to [`NavigationController::apply_fetch`].
    Fetching {
        from: usize,
        to: usize,
        departure: Option<Departure>,
        request: FeedRequest,
    },
}

/// Owns the active index, the batch window and the active reel's tracker.
///
/// All entry points take the caller's notion of `now` and the session's
/// [`Aggregator`]; every snapshot produced here is stamped with the next
/// sequence number and folded before it is returned.
#[derive(Debug)]
pub struct NavigationController {
    session_id: String,
    config: NavigationConfig,
    engagement: EngagementConfig,
    state: NavState,
    window: BatchWindow,
    tracker: Option<EngagementTracker>,
    /// Start index of the fetch in flight, or of the one that failed last.
    pending_start: Option<usize>,
    last_navigation: Instant,
    next_seq: u64,
}

impl NavigationController {
    pub fn new(
        session_id: impl Into<String>,
        config: NavigationConfig,
        engagement: EngagementConfig,
        now: Instant,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            config,
            engagement,
            state: NavState::Loading,
            window: BatchWindow::default(),
            tracker: None,
            pending_start: None,
            last_navigation: now,
            next_seq: 0,
        }
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    pub fn window(&self) -> &BatchWindow {
        &self.window
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.current_index()
    }

    pub fn active_reel(&self) -> Option<&Arc<Reel>> {
        self.tracker.as_ref().map(|tracker| tracker.reel())
    }

    pub fn active_tracker(&self) -> Option<&EngagementTracker> {
        self.tracker.as_ref()
    }

    fn request(&self, start: usize) -> FeedRequest {
        FeedRequest {
            session_id: self.session_id.clone(),
            current_index: start,
            batch_size: self.config.batch_size,
        }
    }

    /// Request for the first page of the session.
    pub fn begin(&mut self) -> FeedRequest {
        self.state = NavState::Loading;
        self.pending_start = Some(0);
        self.request(0)
    }

    /// Re-issue the fetch that failed. Only valid from `Error`.
    pub fn retry(&mut self) -> Option<FeedRequest> {
        if !matches!(self.state, NavState::Error { .. }) {
            return None;
        }
        let start = self.pending_start.unwrap_or_else(|| self.window.end_index());
        self.pending_start = Some(start);
        self.state = NavState::Loading;
        Some(self.request(start))
    }

    pub fn apply_fetch(
        &mut self,
        result: Result<FeedPage, ViewerError>,
        now: Instant,
        aggregator: &mut Aggregator,
    ) -> &NavState {
        if self.state != NavState::Loading {
            log_warn!("Ignoring feed result while {:?}", self.state);
            return &self.state;
        }
        let start = self.pending_start.unwrap_or_else(|| self.window.end_index());

        match result {
            Ok(page) if page.reels.is_empty() => {
                log_info!("Feed returned no reels at index {start}");
                self.pending_start = None;
                self.window = BatchWindow::new(Vec::new(), start, page.has_more);
                self.state = NavState::Empty;
            }
            Ok(page) => {
                log_info!(
                    "Loaded {} reels at index {start} (has_more={})",
                    page.reels.len(),
                    page.has_more
                );
                self.pending_start = None;
                let items = page.reels.into_iter().map(Arc::new).collect();
                self.window = BatchWindow::new(items, start, page.has_more);
                self.select(start, now, aggregator);
            }
            Err(err) => {
                log_warn!("Feed fetch at index {start} failed: {err}");
                self.state = NavState::Error {
                    message: err.to_string(),
                };
            }
        }

        &self.state
    }

    fn select(&mut self, index: usize, now: Instant, aggregator: &mut Aggregator) {
        let Some(reel) = self.window.get(index).cloned() else {
            return;
        };
        aggregator.note_reel(index, &reel.tags);
        self.tracker = Some(EngagementTracker::activate(
            reel,
            index,
            self.engagement.clone(),
            now,
        ));
        self.state = NavState::Ready {
            current_index: index,
        };
    }

    fn stamp(&mut self, snapshot: &mut InteractionSnapshot) {
        self.next_seq += 1;
        snapshot.seq = self.next_seq;
    }

    fn commit(&mut self, mut update: TrackerUpdate, aggregator: &mut Aggregator) -> TrackerUpdate {
        self.stamp(&mut update.snapshot);
        aggregator.fold(update.snapshot.clone());
        update
    }

    pub fn can_step_forward(&self) -> bool {
        match self.current_index() {
            Some(current) => current + 1 < self.window.end_index() || self.window.has_more(),
            None => false,
        }
    }

    pub fn can_step_back(&self) -> bool {
        matches!(self.current_index(), Some(current) if current > 0)
    }

    pub fn step_forward(&mut self, now: Instant, aggregator: &mut Aggregator) -> AdvanceOutcome {
        match self.current_index() {
            Some(current) => self.advance(current + 1, now, aggregator),
            None => AdvanceOutcome::Refused(Refusal::NotReady),
        }
    }

    pub fn step_back(&mut self, now: Instant, aggregator: &mut Aggregator) -> AdvanceOutcome {
        match self.current_index() {
            Some(0) => AdvanceOutcome::Refused(Refusal::BeforeWindow {
                target: 0,
                window_start: self.window.start_index(),
            }),
            Some(current) => self.advance(current - 1, now, aggregator),
            None => AdvanceOutcome::Refused(Refusal::NotReady),
        }
    }

    fn check_target(&self, target: usize) -> Result<usize, Refusal> {
        let from = self.current_index().ok_or(Refusal::NotReady)?;
        if target == from {
            return Err(Refusal::Unchanged(target));
        }
        if target < self.window.start_index() {
            return Err(Refusal::BeforeWindow {
                target,
                window_start: self.window.start_index(),
            });
        }
        if target >= self.window.end_index() && !self.window.has_more() {
            return Err(Refusal::FeedExhausted { target });
        }
        Ok(from)
    }

    pub fn advance(
        &mut self,
        target: usize,
        now: Instant,
        aggregator: &mut Aggregator,
    ) -> AdvanceOutcome {
        let from = match self.check_target(target) {
            Ok(from) => from,
            Err(refusal) => {
                log_debug!("Navigation refused: {refusal}");
                return AdvanceOutcome::Refused(refusal);
            }
        };

        let elapsed = now.saturating_duration_since(self.last_navigation).as_secs_f64();
        self.last_navigation = now;
        let scroll_speed = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };

        let departure = self.tracker.take().map(|tracker| {
            let mut snapshot = tracker.deactivate(now);
            snapshot.was_skipped = is_non_sequential(from, target);
            self.stamp(&mut snapshot);
            aggregator.fold(snapshot.clone());
            Departure {
                snapshot,
                scroll_speed,
            }
        });

        aggregator.record_navigation(from, target, scroll_speed, now);

        if self.window.contains(target) {
            self.select(target, now, aggregator);
            return AdvanceOutcome::Moved {
                from,
                to: target,
                departure,
            };
        }

        let start = self.window.end_index();
        log_info!("Reel {target} is past the window, fetching from {start}");
        self.pending_start = Some(start);
        self.state = NavState::Loading;
        AdvanceOutcome::Fetching {
            from,
            to: target,
            departure,
            request: self.request(start),
        }
    }

    /// Scheduler tick. Returns the reel index when this tick completed it.
    pub fn tick(&mut self, now: Instant, aggregator: &mut Aggregator) -> Option<usize> {
        let update = self.tracker.as_mut()?.tick(now);
        self.commit(update, aggregator).completed_index()
    }

    /// User actions settle the clock too; a returned update whose
    /// [`TrackerUpdate::completed_index`] is set carries the reel's one
    /// completion signal, exactly as [`NavigationController::tick`] would.
    pub fn like(&mut self, now: Instant, aggregator: &mut Aggregator) -> Option<TrackerUpdate> {
        let update = self.tracker.as_mut()?.on_like(now)?;
        Some(self.commit(update, aggregator))
    }

    pub fn toggle_pause(
        &mut self,
        now: Instant,
        aggregator: &mut Aggregator,
    ) -> Option<TrackerUpdate> {
        let update = self.tracker.as_mut()?.on_pause_toggle(now);
        Some(self.commit(update, aggregator))
    }

    pub fn rewatch(&mut self, now: Instant, aggregator: &mut Aggregator) -> Option<TrackerUpdate> {
        let update = self.tracker.as_mut()?.on_rewatch(now);
        Some(self.commit(update, aggregator))
    }

    pub fn record_scroll(
        &mut self,
        now: Instant,
        aggregator: &mut Aggregator,
    ) -> Option<TrackerUpdate> {
        let update = self.tracker.as_mut()?.record_scroll(now);
        Some(self.commit(update, aggregator))
    }

    /// End the active reel's tracking at session teardown.
    pub fn finish(&mut self, now: Instant, aggregator: &mut Aggregator) -> Option<InteractionSnapshot> {
        let mut snapshot = self.tracker.take()?.deactivate(now);
        self.stamp(&mut snapshot);
        aggregator.fold(snapshot.clone());
        Some(snapshot)
    }
}
