use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

/// Schema scripts in order; entry `n` upgrades `user_version` from `n` to `n + 1`.
const MIGRATIONS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

fn latest_version() -> i32 {
    MIGRATIONS.len() as i32
}

fn user_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")
}

/// Bring the telemetry schema up to date inside one transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let found = user_version(conn)?;
    let latest = latest_version();

    if found > latest {
        bail!("telemetry database is at schema {found}, this build only knows up to {latest}");
    }
    if found == latest {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    for (step, script) in MIGRATIONS.iter().enumerate().skip(found as usize) {
        let target = step as i32 + 1;
        tx.execute_batch(script)
            .with_context(|| format!("failed to apply schema v{target}"))?;
        info!("Applied telemetry schema v{target}");
    }

    tx.pragma_update(None, "user_version", latest)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")
}
