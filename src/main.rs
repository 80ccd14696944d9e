use std::{env, path::PathBuf, sync::Arc};

use anyhow::Result;
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use reelpulse::{
    init_logging, CatalogFeed, Database, FeedOrder, SettingsStore, ViewerController, ViewerError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Forward,
    Back,
    Like,
    Pause,
    Rewatch,
    Stats,
    Retry,
    Quit,
}

impl Intent {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == " " {
            return Some(Intent::Pause);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "j" | "down" => Some(Intent::Forward),
            "k" | "up" => Some(Intent::Back),
            "l" => Some(Intent::Like),
            "p" | "space" => Some(Intent::Pause),
            "r" => Some(Intent::Rewatch),
            "s" => Some(Intent::Stats),
            "retry" => Some(Intent::Retry),
            "q" | "quit" => Some(Intent::Quit),
            _ => None,
        }
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var_os(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn feed_order() -> FeedOrder {
    let shuffled = env::var("REELPULSE_SHUFFLE")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if shuffled {
        FeedOrder::Shuffled
    } else {
        FeedOrder::Sequential
    }
}

async fn render(viewer: &ViewerController) {
    let view = viewer.view().await;
    match (&view.reel, view.state.current_index()) {
        (Some(reel), Some(index)) => {
            let author = if reel.info.author.is_empty() {
                "unknown"
            } else {
                reel.info.author.as_str()
            };
            println!(
                "[{index}] {} by {author} ({:.0}s) {}",
                reel.label,
                reel.duration_secs,
                if view.is_paused { "paused" } else { "playing" }
            );
        }
        _ => println!("{:?}", view.state),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    info!("reelpulse starting up...");

    let settings_store = SettingsStore::new(env_path("REELPULSE_SETTINGS", "data/settings.json"))?;
    let catalog_path = env_path("REELPULSE_CATALOG", "data/reels.json");
    let feed = CatalogFeed::from_path(&catalog_path, feed_order())?;
    if feed.is_empty() {
        warn!("Catalog {} has no reels", catalog_path.display());
    } else {
        info!("Loaded {} reels from {}", feed.len(), catalog_path.display());
    }
    let database = Database::new(env_path("REELPULSE_DB", "data/reelpulse.sqlite3"))?;

    let viewer = ViewerController::new(
        settings_store.settings(),
        Arc::new(feed),
        Arc::new(database),
    );
    info!("Session {}", viewer.session_id());

    match viewer.start().await {
        Ok(()) => render(&viewer).await,
        Err(ViewerError::EmptyFeed) => println!("No reels to show."),
        Err(err) => println!("{err} (type `retry`)"),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(intent) = Intent::parse(&line) else {
            println!("keys: j/down k/up l p/space r s q");
            continue;
        };

        match intent {
            Intent::Forward | Intent::Back => {
                let moved = if intent == Intent::Forward {
                    viewer.next().await
                } else {
                    viewer.previous().await
                };
                match moved {
                    Ok(_) => render(&viewer).await,
                    Err(refusal) => debug!("Ignored: {refusal}"),
                }
            }
            Intent::Like => {
                if viewer.like().await {
                    println!("liked");
                }
            }
            Intent::Pause => {
                viewer.toggle_pause().await;
                render(&viewer).await;
            }
            Intent::Rewatch => {
                if viewer.rewatch().await {
                    println!("rewatching");
                }
            }
            Intent::Stats => {
                let report = viewer.report().await;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Intent::Retry => match viewer.retry().await {
                Some(_) => render(&viewer).await,
                None => warn!("Nothing to retry"),
            },
            Intent::Quit => break,
        }
    }

    if let Some(record) = viewer.close().await {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keyboard_intents() {
        assert_eq!(Intent::parse("j"), Some(Intent::Forward));
        assert_eq!(Intent::parse("down\n"), Some(Intent::Forward));
        assert_eq!(Intent::parse("K"), Some(Intent::Back));
        assert_eq!(Intent::parse(" "), Some(Intent::Pause));
        assert_eq!(Intent::parse("space"), Some(Intent::Pause));
        assert_eq!(Intent::parse("q"), Some(Intent::Quit));
        assert_eq!(Intent::parse("x"), None);
        assert_eq!(Intent::parse(""), None);
    }
}
