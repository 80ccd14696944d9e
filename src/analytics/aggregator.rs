use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::models::{InteractionSnapshot, SessionRecord};
use crate::navigation::{is_forward_jump, is_non_sequential};

use super::{AnalyticsConfig, AnalyticsReport, ReelCompletion, SessionAnalytics};

/// Session-wide owner of [`SessionAnalytics`].
///
/// Snapshots are folded with replace-with-latest semantics per reel index;
/// replay and pause totals only ever grow by the positive part of the delta
/// against the snapshot being replaced.
#[derive(Debug, Clone)]
pub struct Aggregator {
    config: AnalyticsConfig,
    started: Instant,
    started_at: DateTime<Utc>,
    analytics: SessionAnalytics,
    interactions: BTreeMap<usize, InteractionSnapshot>,
    reel_tags: BTreeMap<usize, BTreeSet<String>>,
}

impl Aggregator {
    pub fn new(config: AnalyticsConfig, started: Instant, started_at: DateTime<Utc>) -> Self {
        Self {
            config,
            started,
            started_at,
            analytics: SessionAnalytics::default(),
            interactions: BTreeMap::new(),
            reel_tags: BTreeMap::new(),
        }
    }

    pub fn analytics(&self) -> &SessionAnalytics {
        &self.analytics
    }

    pub fn interaction(&self, reel_index: usize) -> Option<&InteractionSnapshot> {
        self.interactions.get(&reel_index)
    }

    /// Seconds since session start.
    pub fn elapsed_secs(&self, now: Instant) -> f64 {
        now.saturating_duration_since(self.started).as_secs_f64()
    }

    /// Remember the tags of the reel shown at `reel_index`, for the liked-tags projection.
    pub fn note_reel(&mut self, reel_index: usize, tags: &BTreeSet<String>) {
        self.reel_tags.insert(reel_index, tags.clone());
    }

    /// Fold one snapshot. Returns false when it is not newer than the snapshot
    /// already applied for the same reel.
    pub fn fold(&mut self, snapshot: InteractionSnapshot) -> bool {
        let index = snapshot.reel_index;
        let previous = self.interactions.get(&index);

        if let Some(previous) = previous {
            if snapshot.seq <= previous.seq {
                return false;
            }
        }

        let (old_replays, old_pauses) = previous
            .map(|prev| (prev.replays(), u64::from(prev.pauses)))
            .unwrap_or((0, 0));

        let replay_delta = snapshot.replays().saturating_sub(old_replays);
        let pause_delta = u64::from(snapshot.pauses).saturating_sub(old_pauses);
        self.analytics.total_replays += replay_delta;
        self.analytics.total_pauses += pause_delta;

        let ratio = snapshot.completion_ratio();
        self.analytics.watch_completion_ratios.insert(index, ratio);
        if ratio >= self.config.completion_threshold {
            self.analytics.reels_watched = self.analytics.reels_watched.max(index + 1);
        }

        self.interactions.insert(index, snapshot);
        true
    }

    pub fn record_navigation(&mut self, from: usize, to: usize, scroll_speed: f64, now: Instant) {
        if is_forward_jump(from, to) && self.analytics.time_to_first_skip.is_none() {
            self.analytics.time_to_first_skip = Some(self.elapsed_secs(now));
        }
        if is_non_sequential(from, to) {
            self.analytics.total_skips += 1;
        }

        self.analytics.scroll_speeds.push(scroll_speed);
        while self.analytics.scroll_speeds.len() > self.config.scroll_speed_cap {
            self.analytics.scroll_speeds.remove(0);
        }
    }

    pub fn snapshot_for_reporting(&self) -> AnalyticsReport {
        let liked_tags: BTreeSet<String> = self
            .interactions
            .values()
            .filter(|interaction| interaction.likes > 0)
            .filter_map(|interaction| self.reel_tags.get(&interaction.reel_index))
            .flatten()
            .cloned()
            .collect();

        AnalyticsReport {
            reels_watched: self.analytics.reels_watched,
            total_replays: self.analytics.total_replays,
            total_skips: self.analytics.total_skips,
            total_pauses: self.analytics.total_pauses,
            time_to_first_skip: self.analytics.time_to_first_skip,
            total_likes: self.interactions.values().map(|i| i.likes).sum(),
            total_rewatches: self.interactions.values().map(|i| i.rewatches).sum(),
            skipped_reels: self.interactions.values().filter(|i| i.was_skipped).count(),
            completions: self
                .analytics
                .watch_completion_ratios
                .iter()
                .map(|(&reel_index, &ratio)| ReelCompletion { reel_index, ratio })
                .collect(),
            liked_tags: liked_tags.into_iter().collect(),
            scroll_speeds: self.analytics.scroll_speeds.clone(),
        }
    }

    /// Finalized record for persistence. Reads accumulated state only.
    pub fn close_session(&self, now: Instant, ended_at: DateTime<Utc>) -> SessionRecord {
        let speeds = &self.analytics.scroll_speeds;
        let avg_scroll_speed = if speeds.is_empty() {
            0.0
        } else {
            speeds.iter().sum::<f64>() / speeds.len() as f64
        };

        let ratios = &self.analytics.watch_completion_ratios;
        let watch_completion_ratio = if ratios.is_empty() {
            0.0
        } else {
            ratios.values().sum::<f64>() / ratios.len() as f64
        };

        SessionRecord {
            start_time: self.started_at,
            end_time: ended_at,
            reels_watched: self.analytics.reels_watched,
            session_length: self.elapsed_secs(now),
            avg_scroll_speed,
            time_to_first_skip: self.analytics.time_to_first_skip,
            watch_completion_ratio,
            total_replays: self.analytics.total_replays,
            total_skips: self.analytics.total_skips,
            total_pauses: self.analytics.total_pauses,
        }
    }
}
