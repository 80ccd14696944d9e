//! Derived engagement metrics. Everything here is a pure function of the
//! current engagement state and elapsed view time.

use crate::models::{EngagementMetrics, EngagementRates};

use super::{EngagementConfig, EngagementState};

/// Elapsed view time used as a divisor; zero becomes one second.
fn view_divisor(total_view_secs: f64) -> f64 {
    if total_view_secs > 0.0 {
        total_view_secs
    } else {
        1.0
    }
}

/// Unbounded above 100 across rewatch cycles.
pub fn percentage_watched(watch_time: f64, duration: f64) -> f64 {
    100.0 * watch_time / duration
}

/// Abandoned before `skip_fraction` of the reel was seen.
///
/// This is the watch-time notion of a skip. Navigating to a non-adjacent
/// index is a different signal, see [`crate::navigation::is_non_sequential`].
pub fn is_abandoned(watch_time: f64, duration: f64, skip_fraction: f64) -> bool {
    watch_time < skip_fraction * duration
}

pub fn attention_retention(watch_time: f64, duration: f64) -> f64 {
    (watch_time / duration).min(1.0)
}

pub fn hesitation_rate(hesitation_events: u32, total_view_secs: f64) -> f64 {
    f64::from(hesitation_events) / view_divisor(total_view_secs)
}

/// Share of the last `window` scroll speeds above `threshold`.
/// Fewer than two recorded events yield zero.
pub fn quick_scroll_rate(speeds: &[f64], window: usize, threshold: f64) -> f64 {
    if speeds.len() < 2 || window == 0 {
        return 0.0;
    }

    let recent = &speeds[speeds.len().saturating_sub(window)..];
    let quick = recent.iter().filter(|speed| **speed > threshold).count();
    quick as f64 / recent.len() as f64
}

pub fn rewatch_rate(rewatches: u32, local_rewatches: u32, total_view_secs: f64) -> f64 {
    f64::from(rewatches + local_rewatches) / view_divisor(total_view_secs)
}

pub fn engagement_rate(state: &EngagementState, total_view_secs: f64) -> f64 {
    let actions = state.likes + state.rewatches + state.local_rewatches + state.pauses;
    f64::from(actions) / view_divisor(total_view_secs)
}

pub fn derive(
    state: &EngagementState,
    duration: f64,
    total_view_secs: f64,
    scroll_speeds: &[f64],
    config: &EngagementConfig,
) -> EngagementMetrics {
    EngagementMetrics {
        engagement: EngagementRates {
            hesitation_rate: hesitation_rate(state.hesitation_events, total_view_secs),
            quick_scroll_rate: quick_scroll_rate(
                scroll_speeds,
                config.quick_scroll_window,
                config.quick_scroll_speed,
            ),
            attention_retention: attention_retention(state.watch_time(), duration),
            rewatch_rate: rewatch_rate(state.rewatches, state.local_rewatches, total_view_secs),
        },
        engagement_rate: engagement_rate(state, total_view_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_exceeds_hundred_when_looping() {
        assert!((percentage_watched(10.2, 10.0) - 102.0).abs() < 1e-9);
        assert_eq!(attention_retention(10.2, 10.0), 1.0);
        assert_eq!(attention_retention(2.5, 10.0), 0.25);
    }

    #[test]
    fn abandoned_below_ten_percent() {
        assert!(is_abandoned(0.9, 10.0, 0.1));
        assert!(!is_abandoned(1.0, 10.0, 0.1));
    }

    #[test]
    fn rates_guard_zero_view_time() {
        assert_eq!(hesitation_rate(2, 0.0), 2.0);
        assert_eq!(rewatch_rate(1, 2, 0.0), 3.0);
        assert_eq!(hesitation_rate(2, 4.0), 0.5);
    }

    #[test]
    fn quick_scroll_uses_recent_window() {
        assert_eq!(quick_scroll_rate(&[5.0], 10, 2.0), 0.0);
        assert_eq!(quick_scroll_rate(&[5.0, 1.0], 10, 2.0), 0.5);

        // twelve events, only the last ten count: two slow ones fall out of the window
        let mut speeds = vec![0.1, 0.1];
        speeds.extend(std::iter::repeat(3.0).take(10));
        assert_eq!(quick_scroll_rate(&speeds, 10, 2.0), 1.0);
    }
}
