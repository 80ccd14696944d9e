use std::time::{Duration, Instant};

use super::EngagementConfig;

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

/// Live watch state of the active reel.
///
/// Time only accrues through [`EngagementState::advance_clock`], which folds the
/// wall-clock delta since the previous call into the watch time unless paused.
/// Both the watch timer and the local-rewatch timer run off that one clock.
#[derive(Debug, Clone)]
pub struct EngagementState {
    pub likes: u32,
    pub rewatches: u32,
    pub local_rewatches: u32,
    pub pauses: u32,
    pub completed: bool,
    pub is_paused: bool,
    pub hesitation_events: u32,
    pub view_start: Instant,
    watched: Duration,
    last_tick: Instant,
    pause_started: Option<Instant>,
    /// Looping time not yet converted into a local rewatch.
    loop_carry: Duration,
}

impl EngagementState {
    pub fn new(now: Instant) -> Self {
        Self {
            likes: 0,
            rewatches: 0,
            local_rewatches: 0,
            pauses: 0,
            completed: false,
            is_paused: false,
            hesitation_events: 0,
            view_start: now,
            watched: Duration::ZERO,
            last_tick: now,
            pause_started: None,
            loop_carry: Duration::ZERO,
        }
    }

    /// Seconds watched, cumulative across rewatch cycles.
    pub fn watch_time(&self) -> f64 {
        self.watched.as_secs_f64()
    }

    /// Seconds since activation, paused time included.
    pub fn total_view_secs(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.view_start).as_secs_f64()
    }

    /// Accrue the time since the previous call. Returns true when this call
    /// fired completion.
    ///
    /// Completion compares the cumulative watch time with the duration, so a
    /// completion re-armed by [`EngagementState::rewatch`] past the end fires
    /// again on the next call that accrues time.
    pub fn advance_clock(&mut self, now: Instant, duration: f64, config: &EngagementConfig) -> bool {
        let delta = now.saturating_duration_since(self.last_tick);
        if now > self.last_tick {
            self.last_tick = now;
        }
        if self.is_paused || delta.is_zero() {
            return false;
        }

        let target = secs(duration);
        let before = self.watched;
        self.watched += delta;
        let after = self.watched;

        let mut completed_now = false;
        if !self.completed && after >= target {
            // each completion counts as a rewatch
            self.completed = true;
            self.rewatches += 1;
            completed_now = true;
        }

        if config.track_local_rewatches && after > target {
            let period = match secs(config.local_rewatch_period_secs) {
                period if period.is_zero() => Duration::from_secs(1),
                period => period,
            };
            self.loop_carry += after - before.max(target);
            let whole = self.loop_carry.as_nanos() / period.as_nanos();
            self.local_rewatches += whole as u32;
            self.loop_carry = Duration::from_nanos((self.loop_carry.as_nanos() % period.as_nanos()) as u64);
        }

        completed_now
    }

    /// At most one like per reel. Returns false when already liked.
    pub fn like(&mut self) -> bool {
        if self.likes > 0 {
            return false;
        }
        self.likes = 1;
        true
    }

    pub fn toggle_pause(&mut self, now: Instant, duration: f64, config: &EngagementConfig) -> bool {
        if self.is_paused {
            self.resume(now, config);
            false
        } else {
            let completed_now = self.advance_clock(now, duration, config);
            self.is_paused = true;
            self.pauses += 1;
            self.pause_started = Some(now);
            self.loop_carry = Duration::ZERO;
            completed_now
        }
    }

    fn resume(&mut self, now: Instant, config: &EngagementConfig) {
        if let Some(started) = self.pause_started.take() {
            let held = now.saturating_duration_since(started).as_secs_f64();
            if config.track_hesitation && held > config.hesitation_threshold_secs {
                self.hesitation_events += 1;
            }
        }
        self.is_paused = false;
        self.last_tick = now;
        self.loop_carry = Duration::ZERO;
    }

    /// Explicit rewatch: re-arms completion and restarts the local-rewatch
    /// timer. Watch time stays cumulative.
    pub fn rewatch(&mut self, now: Instant, duration: f64, config: &EngagementConfig) -> bool {
        let completed_now = self.advance_clock(now, duration, config);
        self.rewatches += 1;
        self.completed = false;
        self.loop_carry = Duration::ZERO;
        completed_now
    }

    pub fn record_scroll_gap(&mut self, gap_secs: f64, config: &EngagementConfig) {
        if config.track_hesitation && gap_secs > config.hesitation_threshold_secs {
            self.hesitation_events += 1;
        }
    }
}
