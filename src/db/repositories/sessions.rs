use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::helpers::{parse_datetime, to_i64, to_u64};
use crate::db::Database;
use crate::models::{SessionPost, SessionRecord};

impl Database {
    pub async fn upsert_session(&self, post: &SessionPost) -> Result<()> {
        let post = post.clone();

        self.execute(move |conn| {
            let session = &post.session;

            conn.execute(
                "INSERT OR REPLACE INTO sessions (
                    session_id, start_time, end_time, reels_watched, session_length,
                    avg_scroll_speed, time_to_first_skip, watch_completion_ratio,
                    total_replays, total_skips, total_pauses
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    post.session_id,
                    session.start_time.to_rfc3339(),
                    session.end_time.to_rfc3339(),
                    to_i64(session.reels_watched)?,
                    session.session_length,
                    session.avg_scroll_speed,
                    session.time_to_first_skip,
                    session.watch_completion_ratio,
                    to_i64(session.total_replays)?,
                    to_i64(session.total_skips)?,
                    to_i64(session.total_pauses)?,
                ],
            )?;

            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionPost>> {
        let session_id = session_id.to_string();

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, start_time, end_time, reels_watched, session_length,
                        avg_scroll_speed, time_to_first_skip, watch_completion_ratio,
                        total_replays, total_skips, total_pauses
                 FROM sessions
                 WHERE session_id = ?1",
            )?;

            let row = stmt
                .query_row([&session_id], |row| Ok(row_to_session(row)))
                .optional()?;

            row.transpose()
        })
        .await
    }
}

fn row_to_session(row: &Row<'_>) -> Result<SessionPost> {
    let start_time: String = row.get("start_time")?;
    let end_time: String = row.get("end_time")?;
    let reels_watched: i64 = row.get("reels_watched")?;

    Ok(SessionPost {
        session_id: row.get("session_id")?,
        session: SessionRecord {
            start_time: parse_datetime(&start_time, "start_time")?,
            end_time: parse_datetime(&end_time, "end_time")?,
            reels_watched: usize::try_from(to_u64(reels_watched, "reels_watched")?)?,
            session_length: row.get("session_length")?,
            avg_scroll_speed: row.get("avg_scroll_speed")?,
            time_to_first_skip: row.get("time_to_first_skip")?,
            watch_completion_ratio: row.get("watch_completion_ratio")?,
            total_replays: to_u64(row.get("total_replays")?, "total_replays")?,
            total_skips: to_u64(row.get("total_skips")?, "total_skips")?,
            total_pauses: to_u64(row.get("total_pauses")?, "total_pauses")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::temp_database;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn session_round_trips_through_sqlite() {
        let (db, path) = temp_database("sessions-roundtrip");
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let post = SessionPost {
            session_id: "abc".into(),
            session: SessionRecord {
                start_time: start,
                end_time: start + Duration::seconds(90),
                reels_watched: 4,
                session_length: 90.0,
                avg_scroll_speed: 0.4,
                time_to_first_skip: None,
                watch_completion_ratio: 0.8,
                total_replays: 3,
                total_skips: 1,
                total_pauses: 2,
            },
        };

        db.upsert_session(&post).await.unwrap();
        assert_eq!(db.get_session("abc").await.unwrap(), Some(post));
        assert_eq!(db.get_session("missing").await.unwrap(), None);

        drop(db);
        let _ = std::fs::remove_file(path);
    }
}
