use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Row};

use crate::db::helpers::{to_i64, to_u32, to_u64};
use crate::db::Database;
use crate::models::{
    EngagementMetrics, EngagementRates, InteractionPost, InteractionRecord, InteractionSnapshot,
};

impl Database {
    /// Store the latest state of one reel within a session.
    ///
    /// Interactions are keyed on `(session_id, reel_index)`; posting again
    /// for a revisited reel replaces the stored row, unless the stored row
    /// already carries a newer `seq`. Posts are dispatched concurrently and
    /// may land out of order.
    pub async fn upsert_interaction(&self, post: &InteractionPost) -> Result<()> {
        let post = post.clone();

        self.execute(move |conn| {
            let record = &post.interaction;
            let snapshot = &record.snapshot;
            let rates = &snapshot.metrics.engagement;
            let recorded_at = Utc::now().to_rfc3339();

            conn.execute(
                "INSERT INTO interactions (
                    session_id, reel_index, seq, watch_time, completed, likes, rewatches,
                    local_rewatches, pauses, percentage_watched, was_skipped, scroll_speed,
                    session_duration, hesitation_rate, quick_scroll_rate, attention_retention,
                    rewatch_rate, engagement_rate, recorded_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19
                )
                ON CONFLICT(session_id, reel_index) DO UPDATE SET
                    seq = excluded.seq,
                    watch_time = excluded.watch_time,
                    completed = excluded.completed,
                    likes = excluded.likes,
                    rewatches = excluded.rewatches,
                    local_rewatches = excluded.local_rewatches,
                    pauses = excluded.pauses,
                    percentage_watched = excluded.percentage_watched,
                    was_skipped = excluded.was_skipped,
                    scroll_speed = excluded.scroll_speed,
                    session_duration = excluded.session_duration,
                    hesitation_rate = excluded.hesitation_rate,
                    quick_scroll_rate = excluded.quick_scroll_rate,
                    attention_retention = excluded.attention_retention,
                    rewatch_rate = excluded.rewatch_rate,
                    engagement_rate = excluded.engagement_rate,
                    recorded_at = excluded.recorded_at
                WHERE excluded.seq > interactions.seq",
                params![
                    post.session_id,
                    to_i64(snapshot.reel_index)?,
                    to_i64(snapshot.seq)?,
                    snapshot.watch_time,
                    snapshot.completed,
                    snapshot.likes,
                    snapshot.rewatches,
                    snapshot.local_rewatches,
                    snapshot.pauses,
                    snapshot.percentage_watched,
                    snapshot.was_skipped,
                    record.scroll_speed,
                    record.session_duration,
                    rates.hesitation_rate,
                    rates.quick_scroll_rate,
                    rates.attention_retention,
                    rates.rewatch_rate,
                    snapshot.metrics.engagement_rate,
                    recorded_at,
                ],
            )?;

            Ok(())
        })
        .await
    }

    pub async fn get_interactions_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<InteractionPost>> {
        let session_id = session_id.to_string();

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, reel_index, seq, watch_time, completed, likes, rewatches,
                        local_rewatches, pauses, percentage_watched, was_skipped, scroll_speed,
                        session_duration, hesitation_rate, quick_scroll_rate,
                        attention_retention, rewatch_rate, engagement_rate
                 FROM interactions
                 WHERE session_id = ?1
                 ORDER BY reel_index ASC",
            )?;

            let rows = stmt.query_map([&session_id], |row| Ok(row_to_interaction(row)))?;

            let mut posts = Vec::new();
            for row in rows {
                posts.push(row??);
            }

            Ok(posts)
        })
        .await
    }
}

fn row_to_interaction(row: &Row<'_>) -> Result<InteractionPost> {
    let reel_index: i64 = row.get("reel_index")?;
    let seq: i64 = row.get("seq")?;

    let snapshot = InteractionSnapshot {
        seq: to_u64(seq, "seq")?,
        reel_index: usize::try_from(reel_index)
            .map_err(|_| anyhow::anyhow!("reel_index contains invalid value {reel_index}"))?,
        watch_time: row.get("watch_time")?,
        completed: row.get("completed")?,
        likes: to_u32(row.get("likes")?, "likes")?,
        rewatches: to_u32(row.get("rewatches")?, "rewatches")?,
        local_rewatches: to_u32(row.get("local_rewatches")?, "local_rewatches")?,
        pauses: to_u32(row.get("pauses")?, "pauses")?,
        percentage_watched: row.get("percentage_watched")?,
        was_skipped: row.get("was_skipped")?,
        metrics: EngagementMetrics {
            engagement: EngagementRates {
                hesitation_rate: row.get("hesitation_rate")?,
                quick_scroll_rate: row.get("quick_scroll_rate")?,
                attention_retention: row.get("attention_retention")?,
                rewatch_rate: row.get("rewatch_rate")?,
            },
            engagement_rate: row.get("engagement_rate")?,
        },
    };

    Ok(InteractionPost {
        session_id: row.get("session_id")?,
        interaction: InteractionRecord {
            snapshot,
            scroll_speed: row.get("scroll_speed")?,
            session_duration: row.get("session_duration")?,
        },
    })
}
