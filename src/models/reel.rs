use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Public counters shown alongside a reel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReelInfo {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub saves: u64,
    #[serde(default, rename = "comments_num")]
    pub comments: u64,
}

/// One feed item. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Target viewing duration in seconds.
    #[serde(rename = "time")]
    pub duration_secs: f64,
    #[serde(default)]
    pub info: ReelInfo,
}

impl Reel {
    pub fn new(label: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            id: None,
            label: label.into(),
            tags: BTreeSet::new(),
            duration_secs,
            info: ReelInfo::default(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Duration used as a divisor; a missing or non-positive duration counts as one second.
    pub fn effective_duration(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.duration_secs
        } else {
            1.0
        }
    }
}
