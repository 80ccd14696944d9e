use std::{
    sync::{Arc, MutexGuard},
    time::Instant,
};

use chrono::Utc;
use serde::Serialize;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::analytics::{Aggregator, AnalyticsReport};
use crate::engagement::TrackerUpdate;
use crate::error::ViewerError;
use crate::feed::{FeedPage, FeedRequest, FeedSource};
use crate::models::{
    InteractionPost, InteractionRecord, InteractionSnapshot, Reel, SessionPost, SessionRecord,
};
use crate::navigation::{AdvanceOutcome, Departure, NavState, NavigationController, Refusal};
use crate::settings::ViewerSettings;
use crate::telemetry::{dispatch_interaction, dispatch_session, TelemetrySink};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// What a presentation layer needs to draw the current frame.
#[derive(Debug, Clone, Serialize)]
pub struct ViewerSnapshot {
    pub state: NavState,
    pub reel: Option<Reel>,
    pub interaction: Option<InteractionSnapshot>,
    pub is_paused: bool,
    pub window_start: usize,
    pub window_len: usize,
    pub has_more: bool,
}

struct ViewerCore {
    nav: NavigationController,
    aggregator: Aggregator,
    closed: bool,
}

/// Async host around the synchronous viewer core.
///
/// Every mutation goes through one mutex; fetches and telemetry posts run
/// with it released. Posts are registered while the mutex is still held, so
/// `close` always waits for every departure a navigation produced.
#[derive(Clone)]
pub struct ViewerController {
    session_id: String,
    settings: ViewerSettings,
    core: Arc<Mutex<ViewerCore>>,
    feed: Arc<dyn FeedSource>,
    sink: Arc<dyn TelemetrySink>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    posts: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>>,
    cancel: CancellationToken,
}

/// Current time on tokio's clock, so paused-time tests drive the core too.
fn now() -> Instant {
    time::Instant::now().into_std()
}

impl ViewerController {
    pub fn new(
        settings: ViewerSettings,
        feed: Arc<dyn FeedSource>,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        let session_id = Uuid::new_v4().to_string();
        let started = now();
        let nav = NavigationController::new(
            session_id.clone(),
            settings.navigation.clone(),
            settings.engagement.clone(),
            started,
        );
        let aggregator = Aggregator::new(settings.analytics.clone(), started, Utc::now());

        Self {
            session_id,
            settings,
            core: Arc::new(Mutex::new(ViewerCore {
                nav,
                aggregator,
                closed: false,
            })),
            feed,
            sink,
            ticker: Arc::new(Mutex::new(None)),
            posts: Arc::new(std::sync::Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    /// Load the first page and start the scheduler tick.
    ///
    /// An empty feed or a failed fetch is reported here and also left visible
    /// as the navigation state; [`ViewerController::retry`] recovers from the
    /// latter.
    pub async fn start(&self) -> Result<(), ViewerError> {
        let request = self.core.lock().await.nav.begin();
        log_info!("Starting session {}", self.session_id);

        let result = self.feed.fetch_batch(&request).await;
        let failure = result.as_ref().err().cloned();
        let state = self.apply_fetch(result).await;

        self.spawn_ticker().await;

        match (state, failure) {
            (NavState::Empty, _) => Err(ViewerError::EmptyFeed),
            (NavState::Error { .. }, Some(err)) => Err(err),
            (NavState::Error { message }, None) => Err(ViewerError::FetchFailure(message)),
            _ => Ok(()),
        }
    }

    /// Re-issue the fetch that failed. `None` unless the feed is in `Error`.
    pub async fn retry(&self) -> Option<NavState> {
        let request = {
            let mut core = self.core.lock().await;
            if core.closed {
                return None;
            }
            core.nav.retry()?
        };
        Some(self.fetch(request).await)
    }

    pub async fn advance(&self, target: usize) -> Result<NavState, Refusal> {
        self.navigate(move |nav, now, aggregator| nav.advance(target, now, aggregator))
            .await
    }

    pub async fn next(&self) -> Result<NavState, Refusal> {
        self.navigate(|nav, now, aggregator| nav.step_forward(now, aggregator))
            .await
    }

    pub async fn previous(&self) -> Result<NavState, Refusal> {
        self.navigate(|nav, now, aggregator| nav.step_back(now, aggregator))
            .await
    }

    /// Returns whether the like was counted.
    pub async fn like(&self) -> bool {
        self.act(|nav, now, aggregator| nav.like(now, aggregator))
            .await
            .is_some()
    }

    /// Returns the paused flag after toggling, or `None` without an active reel.
    pub async fn toggle_pause(&self) -> Option<bool> {
        self.act(|nav, now, aggregator| nav.toggle_pause(now, aggregator))
            .await
            .map(|update| update.is_paused)
    }

    pub async fn rewatch(&self) -> bool {
        self.act(|nav, now, aggregator| nav.rewatch(now, aggregator))
            .await
            .is_some()
    }

    pub async fn record_scroll(&self) -> bool {
        self.act(|nav, now, aggregator| nav.record_scroll(now, aggregator))
            .await
            .is_some()
    }

    pub async fn report(&self) -> AnalyticsReport {
        self.core.lock().await.aggregator.snapshot_for_reporting()
    }

    pub async fn view(&self) -> ViewerSnapshot {
        let core = self.core.lock().await;
        let now = now();
        let tracker = core.nav.active_tracker();
        let window = core.nav.window();

        ViewerSnapshot {
            state: core.nav.state().clone(),
            reel: core.nav.active_reel().map(|reel| reel.as_ref().clone()),
            interaction: tracker.map(|tracker| tracker.snapshot(now)),
            is_paused: tracker.is_some_and(|tracker| tracker.state().is_paused),
            window_start: window.start_index(),
            window_len: window.len(),
            has_more: window.has_more(),
        }
    }

    /// End the session: post the active reel's final snapshot and the session
    /// record, then wait for every outstanding post. Only the first call does
    /// anything.
    pub async fn close(&self) -> Option<SessionRecord> {
        let (final_post, record) = {
            let mut core = self.core.lock().await;
            if core.closed {
                return None;
            }
            core.closed = true;

            let now = now();
            let ViewerCore { nav, aggregator, .. } = &mut *core;
            let final_post = nav
                .finish(now, aggregator)
                .map(|snapshot| {
                    self.interaction_post(snapshot, 0.0, aggregator.elapsed_secs(now))
                });
            (final_post, aggregator.close_session(now, Utc::now()))
        };

        self.cancel.cancel();
        self.cancel_ticker().await;

        if let Some(post) = final_post {
            self.post_interaction(post);
        }
        self.track(dispatch_session(
            self.sink.clone(),
            SessionPost {
                session_id: self.session_id.clone(),
                session: record.clone(),
            },
        ));

        let pending: Vec<_> = self.posts().drain(..).collect();
        for handle in pending {
            let _ = handle.await;
        }

        log_info!(
            "Closed session {} after {:.1}s ({} reels)",
            self.session_id,
            record.session_length,
            record.reels_watched
        );
        Some(record)
    }

    /// Run a tracker action under the core lock. A completion the action
    /// settled is handled the same way as one seen by the ticker.
    async fn act<F>(&self, action: F) -> Option<TrackerUpdate>
    where
        F: FnOnce(&mut NavigationController, Instant, &mut Aggregator) -> Option<TrackerUpdate>,
    {
        let update = {
            let mut core = self.core.lock().await;
            if core.closed {
                return None;
            }
            let ViewerCore { nav, aggregator, .. } = &mut *core;
            action(nav, now(), aggregator)
        };

        if let Some(index) = update.as_ref().and_then(TrackerUpdate::completed_index) {
            self.on_completed(index);
        }
        update
    }

    fn on_completed(&self, index: usize) {
        log_info!("Reel {index} completed");
        self.schedule_auto_advance(index);
    }

    async fn navigate<F>(&self, step: F) -> Result<NavState, Refusal>
    where
        F: FnOnce(&mut NavigationController, Instant, &mut Aggregator) -> AdvanceOutcome,
    {
        let request = {
            let mut core = self.core.lock().await;
            if core.closed {
                return Err(Refusal::NotReady);
            }
            let now = now();
            let ViewerCore { nav, aggregator, .. } = &mut *core;
            match step(nav, now, aggregator) {
                AdvanceOutcome::Refused(refusal) => return Err(refusal),
                AdvanceOutcome::Moved { departure, .. } => {
                    self.post_departure(departure, aggregator.elapsed_secs(now));
                    return Ok(nav.state().clone());
                }
                AdvanceOutcome::Fetching {
                    departure, request, ..
                } => {
                    self.post_departure(departure, aggregator.elapsed_secs(now));
                    request
                }
            }
        };

        Ok(self.fetch(request).await)
    }

    async fn fetch(&self, request: FeedRequest) -> NavState {
        log_info!(
            "Fetching {} reels from index {}",
            request.batch_size,
            request.current_index
        );
        let result = self.feed.fetch_batch(&request).await;
        self.apply_fetch(result).await
    }

    async fn apply_fetch(&self, result: Result<FeedPage, ViewerError>) -> NavState {
        let mut core = self.core.lock().await;
        if core.closed {
            log_debug!("Dropping feed result for closed session {}", self.session_id);
            return core.nav.state().clone();
        }
        let ViewerCore { nav, aggregator, .. } = &mut *core;
        nav.apply_fetch(result, now(), aggregator).clone()
    }

    fn interaction_post(
        &self,
        snapshot: InteractionSnapshot,
        scroll_speed: f64,
        session_duration: f64,
    ) -> InteractionPost {
        InteractionPost {
            session_id: self.session_id.clone(),
            interaction: InteractionRecord {
                snapshot,
                scroll_speed,
                session_duration,
            },
        }
    }

    fn post_departure(&self, departure: Option<Departure>, session_duration: f64) {
        if let Some(Departure {
            snapshot,
            scroll_speed,
        }) = departure
        {
            let post = self.interaction_post(snapshot, scroll_speed, session_duration);
            self.post_interaction(post);
        }
    }

    fn post_interaction(&self, post: InteractionPost) {
        self.track(dispatch_interaction(self.sink.clone(), post));
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut posts = self.posts();
        posts.retain(|handle| !handle.is_finished());
        posts.push(handle);
    }

    fn posts(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.posts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let cancel = self.cancel.clone();
        let tick_interval = self.settings.engagement.tick_interval();

        let handle = tokio::spawn(async move {
            let mut interval =
                time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let completed = {
                    let mut core = controller.core.lock().await;
                    if core.closed {
                        break;
                    }
                    let ViewerCore { nav, aggregator, .. } = &mut *core;
                    nav.tick(now(), aggregator)
                };

                if let Some(index) = completed {
                    controller.on_completed(index);
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    /// Step forward after the configured delay if `index` is still the active
    /// reel and still completed, and the feed can move on.
    fn schedule_auto_advance(&self, index: usize) {
        let navigation = &self.settings.navigation;
        if !navigation.auto_advance_on_complete {
            return;
        }

        let controller = self.clone();
        let cancel = self.cancel.clone();
        let delay = navigation.auto_advance_delay();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = time::sleep(delay) => {}
            }

            let result = controller
                .navigate(move |nav, now, aggregator| {
                    let still_due = nav.current_index() == Some(index)
                        && nav
                            .active_tracker()
                            .is_some_and(|tracker| tracker.state().completed)
                        && nav.can_step_forward();
                    if still_due {
                        nav.step_forward(now, aggregator)
                    } else {
                        AdvanceOutcome::Refused(Refusal::NotReady)
                    }
                })
                .await;

            match result {
                Ok(state) => log_debug!("Auto-advanced from reel {index}: {state:?}"),
                Err(refusal) => log_debug!("Auto-advance from reel {index} dropped: {refusal}"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::feed::{CatalogFeed, FeedOrder};
    use crate::telemetry::RecordingSink;

    fn reels(count: usize, duration: f64) -> Vec<Reel> {
        (0..count)
            .map(|i| Reel::new(format!("reel-{i}"), duration).with_tags([format!("tag{i}")]))
            .collect()
    }

    fn catalog(count: usize, duration: f64) -> Arc<CatalogFeed> {
        Arc::new(CatalogFeed::new(reels(count, duration), FeedOrder::Sequential))
    }

    fn settings(auto_advance: bool) -> ViewerSettings {
        let mut settings = ViewerSettings::default();
        settings.navigation.batch_size = 2;
        settings.navigation.auto_advance_on_complete = auto_advance;
        settings
    }

    struct BrokenFeed;

    #[async_trait]
    impl FeedSource for BrokenFeed {
        async fn fetch_batch(&self, _request: &FeedRequest) -> Result<FeedPage, ViewerError> {
            Err(ViewerError::FetchFailure("offline".into()))
        }
    }

    /// Holds every fetch after the first page until released.
    struct GatedFeed {
        inner: CatalogFeed,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl FeedSource for GatedFeed {
        async fn fetch_batch(&self, request: &FeedRequest) -> Result<FeedPage, ViewerError> {
            if request.current_index > 0 {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.fetch_batch(request).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_selects_first_reel() {
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(false), catalog(3, 10.0), sink);

        viewer.start().await.unwrap();
        let view = viewer.view().await;
        assert_eq!(view.state, NavState::Ready { current_index: 0 });
        assert_eq!(view.reel.unwrap().label, "reel-0");
        assert_eq!(view.window_len, 2);
        assert!(view.has_more);

        viewer.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn empty_feed_is_reported() {
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(false), catalog(0, 10.0), sink);

        assert_eq!(viewer.start().await, Err(ViewerError::EmptyFeed));
        assert_eq!(viewer.view().await.state, NavState::Empty);
        assert!(!viewer.like().await);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_surfaces_error_state() {
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(false), Arc::new(BrokenFeed), sink);

        let err = viewer.start().await.unwrap_err();
        assert_eq!(err, ViewerError::FetchFailure("offline".into()));
        assert!(matches!(viewer.view().await.state, NavState::Error { .. }));

        let retried = viewer.retry().await.unwrap();
        assert!(matches!(retried, NavState::Error { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_accumulates_watch_time() {
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(false), catalog(3, 10.0), sink);
        viewer.start().await.unwrap();

        time::sleep(Duration::from_millis(2_050)).await;
        let watched = viewer.view().await.interaction.unwrap().watch_time;
        assert!((watched - 2.0).abs() < 1e-6, "watched {watched}");

        assert_eq!(viewer.toggle_pause().await, Some(true));
        time::sleep(Duration::from_secs(3)).await;
        let paused = viewer.view().await.interaction.unwrap();
        assert!((paused.watch_time - 2.05).abs() < 1e-6);
        assert_eq!(paused.pauses, 1);

        viewer.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_posts_departures_and_fetches_next_page() {
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(false), catalog(4, 10.0), sink.clone());
        viewer.start().await.unwrap();

        time::sleep(Duration::from_secs(1)).await;
        assert!(viewer.like().await);
        assert_eq!(viewer.next().await, Ok(NavState::Ready { current_index: 1 }));
        assert_eq!(viewer.previous().await, Ok(NavState::Ready { current_index: 0 }));
        assert_eq!(viewer.next().await, Ok(NavState::Ready { current_index: 1 }));

        // past the first page
        assert_eq!(viewer.next().await, Ok(NavState::Ready { current_index: 2 }));
        let view = viewer.view().await;
        assert_eq!((view.window_start, view.window_len, view.has_more), (2, 2, false));

        assert_eq!(
            viewer.advance(4).await,
            Err(Refusal::FeedExhausted { target: 4 })
        );
        assert_eq!(
            viewer.previous().await,
            Err(Refusal::BeforeWindow {
                target: 1,
                window_start: 2
            })
        );

        let record = viewer.close().await.unwrap();
        assert_eq!(record.total_skips, 1);
        assert!(viewer.close().await.is_none());

        let interactions = sink.interactions().await;
        assert_eq!(interactions.len(), 5);
        assert!(interactions
            .iter()
            .all(|post| post.session_id == viewer.session_id()));

        // reel 1 left backwards; reel 2 abandoned at close
        let mut skipped: Vec<_> = interactions
            .iter()
            .filter(|post| post.interaction.snapshot.was_skipped)
            .map(|post| post.interaction.snapshot.reel_index)
            .collect();
        skipped.sort_unstable();
        assert_eq!(skipped, vec![1, 2]);

        let first = interactions
            .iter()
            .find(|post| post.interaction.snapshot.likes == 1)
            .unwrap();
        assert_eq!(first.interaction.snapshot.reel_index, 0);
        assert!((first.interaction.scroll_speed - 1.0).abs() < 1e-9);
        assert!((first.interaction.session_duration - 1.0).abs() < 1e-9);

        let sessions = sink.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session, record);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_reel_auto_advances() {
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(true), catalog(3, 2.0), sink);
        viewer.start().await.unwrap();

        time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(viewer.view().await.state, NavState::Ready { current_index: 0 });

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(viewer.view().await.state, NavState::Ready { current_index: 1 });

        viewer.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn completion_inside_like_still_auto_advances() {
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(true), catalog(3, 2.05), sink);
        viewer.start().await.unwrap();

        // last tick at 2.0s; the like settles the clock past the end
        time::sleep(Duration::from_millis(2_060)).await;
        assert!(viewer.like().await);
        let liked = viewer.view().await.interaction.unwrap();
        assert!(liked.completed);
        assert_eq!(liked.rewatches, 1);

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(viewer.view().await.state, NavState::Ready { current_index: 1 });

        viewer.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stale_auto_advance_is_dropped() {
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(true), catalog(3, 2.0), sink);
        viewer.start().await.unwrap();

        // reel 0 completes at 2.0s and schedules a step for 3.0s
        time::sleep(Duration::from_millis(2_200)).await;
        assert_eq!(viewer.next().await, Ok(NavState::Ready { current_index: 1 }));

        time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(viewer.view().await.state, NavState::Ready { current_index: 1 });

        viewer.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_landing_after_close_is_dropped() {
        let feed = Arc::new(GatedFeed {
            inner: CatalogFeed::new(reels(4, 10.0), FeedOrder::Sequential),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(false), feed.clone(), sink.clone());
        viewer.start().await.unwrap();
        assert_eq!(viewer.next().await, Ok(NavState::Ready { current_index: 1 }));

        let pending = tokio::spawn({
            let viewer = viewer.clone();
            async move { viewer.next().await }
        });
        feed.entered.notified().await;

        viewer.close().await.unwrap();
        assert_eq!(sink.interactions().await.len(), 2);
        assert_eq!(sink.sessions().await.len(), 1);

        feed.release.notify_one();
        assert_eq!(pending.await.unwrap(), Ok(NavState::Loading));

        let view = viewer.view().await;
        assert_eq!(view.state, NavState::Loading);
        assert!(view.reel.is_none());
        assert!(view.interaction.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_session_refuses_navigation() {
        let sink = Arc::new(RecordingSink::new());
        let viewer = ViewerController::new(settings(false), catalog(3, 10.0), sink);
        viewer.start().await.unwrap();
        viewer.close().await;

        assert_eq!(viewer.next().await, Err(Refusal::NotReady));
        assert!(!viewer.like().await);
    }
}
