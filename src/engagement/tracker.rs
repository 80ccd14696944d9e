use std::sync::Arc;
use std::time::Instant;

use crate::models::{InteractionSnapshot, Reel};

use super::{metrics, EngagementConfig, EngagementState};

/// Result of any tracker entry point: the fresh snapshot, and whether this
/// call fired completion.
///
/// Every entry point settles the clock, so completion can fire from a user
/// action as well as from a tick.
#[derive(Debug, Clone)]
pub struct TrackerUpdate {
    pub snapshot: InteractionSnapshot,
    pub completed: bool,
    pub is_paused: bool,
}

impl TrackerUpdate {
    /// Index of the reel this update completed, if it did.
    pub fn completed_index(&self) -> Option<usize> {
        self.completed.then_some(self.snapshot.reel_index)
    }
}

/// Measures one reel's viewing session.
///
/// Created by [`EngagementTracker::activate`] and consumed by
/// [`EngagementTracker::deactivate`]; the tracker has no timers of its own and
/// only moves forward when its host calls [`EngagementTracker::tick`].
#[derive(Debug)]
pub struct EngagementTracker {
    reel: Arc<Reel>,
    reel_index: usize,
    config: EngagementConfig,
    state: EngagementState,
    scroll_speeds: Vec<f64>,
    last_scroll: Instant,
}

impl EngagementTracker {
    pub fn activate(
        reel: Arc<Reel>,
        reel_index: usize,
        config: EngagementConfig,
        now: Instant,
    ) -> Self {
        Self {
            reel,
            reel_index,
            config,
            state: EngagementState::new(now),
            scroll_speeds: Vec::new(),
            last_scroll: now,
        }
    }

    pub fn reel(&self) -> &Arc<Reel> {
        &self.reel
    }

    pub fn reel_index(&self) -> usize {
        self.reel_index
    }

    pub fn state(&self) -> &EngagementState {
        &self.state
    }

    fn duration(&self) -> f64 {
        self.reel.effective_duration()
    }

    fn update(&self, now: Instant, completed: bool) -> TrackerUpdate {
        TrackerUpdate {
            snapshot: self.snapshot(now),
            completed,
            is_paused: self.state.is_paused,
        }
    }

    pub fn tick(&mut self, now: Instant) -> TrackerUpdate {
        let duration = self.duration();
        let completed = self.state.advance_clock(now, duration, &self.config);
        self.update(now, completed)
    }

    /// No-op once the reel is liked.
    pub fn on_like(&mut self, now: Instant) -> Option<TrackerUpdate> {
        if !self.state.like() {
            return None;
        }
        let duration = self.duration();
        let completed = self.state.advance_clock(now, duration, &self.config);
        Some(self.update(now, completed))
    }

    pub fn on_pause_toggle(&mut self, now: Instant) -> TrackerUpdate {
        let duration = self.duration();
        let completed = self.state.toggle_pause(now, duration, &self.config);
        self.update(now, completed)
    }

    pub fn on_rewatch(&mut self, now: Instant) -> TrackerUpdate {
        let duration = self.duration();
        let completed = self.state.rewatch(now, duration, &self.config);
        self.update(now, completed)
    }

    /// Record an external scroll gesture over the reel.
    pub fn record_scroll(&mut self, now: Instant) -> TrackerUpdate {
        let gap = now.saturating_duration_since(self.last_scroll).as_secs_f64();
        self.last_scroll = now;

        let speed = if gap > 0.0 { 1.0 / gap } else { 0.0 };
        self.scroll_speeds.push(speed);
        if self.scroll_speeds.len() > self.config.scroll_history_cap {
            self.scroll_speeds.remove(0);
        }
        self.state.record_scroll_gap(gap, &self.config);

        let duration = self.duration();
        let completed = self.state.advance_clock(now, duration, &self.config);
        self.update(now, completed)
    }

    pub fn snapshot(&self, now: Instant) -> InteractionSnapshot {
        let duration = self.duration();
        let watch_time = self.state.watch_time();
        let total_view = self.state.total_view_secs(now);

        InteractionSnapshot {
            seq: 0,
            reel_index: self.reel_index,
            watch_time,
            completed: self.state.completed,
            likes: self.state.likes,
            rewatches: self.state.rewatches,
            local_rewatches: self.state.local_rewatches,
            pauses: self.state.pauses,
            percentage_watched: metrics::percentage_watched(watch_time, duration),
            was_skipped: metrics::is_abandoned(watch_time, duration, self.config.skip_fraction),
            metrics: metrics::derive(
                &self.state,
                duration,
                total_view,
                &self.scroll_speeds,
                &self.config,
            ),
        }
    }

    /// Settle the clock one last time and end the tracker's lifetime.
    pub fn deactivate(mut self, now: Instant) -> InteractionSnapshot {
        let duration = self.duration();
        self.state.advance_clock(now, duration, &self.config);
        self.snapshot(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tracker(duration: f64, config: EngagementConfig) -> (EngagementTracker, Instant) {
        let now = Instant::now();
        let reel = Arc::new(Reel::new("clip", duration));
        (EngagementTracker::activate(reel, 0, config, now), now)
    }

    /// Tick every 100ms from `from_ms` up to and including `to_ms`.
    fn tick_until(tracker: &mut EngagementTracker, t0: Instant, from_ms: u64, to_ms: u64) -> u32 {
        let mut completions = 0;
        let mut ms = from_ms;
        while ms < to_ms {
            ms = (ms + 100).min(to_ms);
            if tracker.tick(t0 + Duration::from_millis(ms)).completed {
                completions += 1;
            }
        }
        completions
    }

    #[test]
    fn completes_once_after_duration() {
        let (mut tracker, t0) = tracker(10.0, EngagementConfig::default());

        let completions = tick_until(&mut tracker, t0, 0, 10_200);
        let snapshot = tracker.snapshot(t0 + Duration::from_millis(10_200));

        assert_eq!(completions, 1);
        assert!(snapshot.completed);
        assert_eq!(snapshot.rewatches, 1);
        assert!((snapshot.percentage_watched - 102.0).abs() < 1e-6);
        assert_eq!(snapshot.local_rewatches, 0);
        assert_eq!(snapshot.metrics.engagement.attention_retention, 1.0);
    }

    #[test]
    fn rewatch_rearms_completion_once() {
        let (mut tracker, t0) = tracker(10.0, EngagementConfig::default());

        assert_eq!(tick_until(&mut tracker, t0, 0, 15_000), 1);
        assert_eq!(tracker.state().rewatches, 1);
        assert_eq!(tracker.state().local_rewatches, 5);

        let update = tracker.on_rewatch(t0 + Duration::from_millis(15_000));
        assert!(!update.snapshot.completed);
        assert_eq!(update.snapshot.rewatches, 2);
        assert!((update.snapshot.watch_time - 15.0).abs() < 1e-6);

        // already past the end, so the next tick completes again, and only that one
        let next = tracker.tick(t0 + Duration::from_millis(15_100));
        assert!(next.completed);
        assert_eq!(next.snapshot.rewatches, 3);
        assert_eq!(tick_until(&mut tracker, t0, 15_100, 30_000), 0);
        assert_eq!(tracker.state().rewatches, 3);
    }

    #[test]
    fn rewatch_before_the_end_completes_at_duration() {
        let (mut tracker, t0) = tracker(10.0, EngagementConfig::default());

        assert_eq!(tick_until(&mut tracker, t0, 0, 4_000), 0);
        tracker.on_rewatch(t0 + Duration::from_millis(4_000));
        assert_eq!(tick_until(&mut tracker, t0, 4_000, 9_900), 0);
        assert_eq!(tick_until(&mut tracker, t0, 9_900, 10_000), 1);
        assert_eq!(tracker.state().rewatches, 2);
    }

    #[test]
    fn local_rewatches_resume_after_rewatch() {
        let (mut tracker, t0) = tracker(5.0, EngagementConfig::default());
        tick_until(&mut tracker, t0, 0, 6_500);
        assert_eq!(tracker.state().local_rewatches, 1);

        // the half second carried before the rewatch is dropped
        tracker.on_rewatch(t0 + Duration::from_millis(6_500));
        tick_until(&mut tracker, t0, 6_500, 7_400);
        assert_eq!(tracker.state().local_rewatches, 1);
        tick_until(&mut tracker, t0, 7_400, 7_500);
        assert_eq!(tracker.state().local_rewatches, 2);
    }

    #[test]
    fn counts_local_rewatches_past_completion() {
        let (mut tracker, t0) = tracker(5.0, EngagementConfig::default());
        tick_until(&mut tracker, t0, 0, 8_500);
        assert_eq!(tracker.state().local_rewatches, 3);

        let (mut quiet, t1) = self::tracker(
            5.0,
            EngagementConfig {
                track_local_rewatches: false,
                ..Default::default()
            },
        );
        tick_until(&mut quiet, t1, 0, 8_500);
        assert_eq!(quiet.state().local_rewatches, 0);
    }

    #[test]
    fn pausing_restarts_the_local_rewatch_timer() {
        let (mut tracker, t0) = tracker(5.0, EngagementConfig::default());
        tick_until(&mut tracker, t0, 0, 5_700);
        tracker.on_pause_toggle(t0 + Duration::from_millis(5_700));
        tracker.on_pause_toggle(t0 + Duration::from_millis(6_000));
        // 0.7s of looping was discarded by the pause
        tick_until(&mut tracker, t0, 6_000, 6_900);
        assert_eq!(tracker.state().local_rewatches, 0);
        tick_until(&mut tracker, t0, 6_900, 7_000);
        assert_eq!(tracker.state().local_rewatches, 1);
    }

    #[test]
    fn like_is_idempotent() {
        let (mut tracker, t0) = tracker(10.0, EngagementConfig::default());
        let first = tracker.on_like(t0 + Duration::from_secs(1));
        assert_eq!(first.map(|u| u.snapshot.likes), Some(1));
        assert!(tracker.on_like(t0 + Duration::from_secs(2)).is_none());
        assert_eq!(tracker.state().likes, 1);
    }

    #[test]
    fn slow_scroll_gaps_are_hesitation() {
        let (mut tracker, t0) = tracker(30.0, EngagementConfig::default());
        tracker.record_scroll(t0 + Duration::from_millis(250));
        let update = tracker.record_scroll(t0 + Duration::from_millis(2_250));

        assert_eq!(tracker.state().hesitation_events, 1);
        assert_eq!(update.snapshot.metrics.engagement.quick_scroll_rate, 0.5);
    }

    #[test]
    fn deactivate_settles_clock_and_flags_abandonment() {
        let (mut tracker, t0) = tracker(20.0, EngagementConfig::default());
        tick_until(&mut tracker, t0, 0, 1_000);

        let snapshot = tracker.deactivate(t0 + Duration::from_millis(1_500));
        assert!((snapshot.watch_time - 1.5).abs() < 1e-6);
        assert!(snapshot.was_skipped);
        assert!((snapshot.metrics.engagement_rate - 0.0).abs() < 1e-9);
    }
}
