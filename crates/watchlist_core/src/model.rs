use std::fmt;

use serde::Serialize;

/// A username scraped from the ranking page. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Trims the scraped text; returns `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
}

impl UserProfile {
    /// The remote API occasionally reports id 0 for real accounts.
    pub fn has_suspicious_id(&self) -> bool {
        self.user_id == 0
    }
}

/// One title from a user's raw watch history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub title_id: i64,
    pub title: String,
    /// `<= 0` means unscored.
    pub score: i64,
    pub watched_episodes: i64,
    /// `<= 0` means unknown or still airing.
    pub total_episodes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimeRating {
    pub id: i64,
    pub title: String,
    pub user_score: i64,
    pub watched_per: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub uid: i64,
    pub username: String,
    pub list: Vec<AnimeRating>,
}

/// Suspicious but structurally valid data. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataAnomaly {
    ZeroUserId {
        username: String,
    },
    UnknownEpisodeTotal {
        title_id: i64,
        title: String,
        watched: i64,
        total: i64,
    },
}

impl fmt::Display for DataAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataAnomaly::ZeroUserId { username } => {
                write!(f, "user {username} reported with uid 0")
            }
            DataAnomaly::UnknownEpisodeTotal {
                title_id,
                title,
                watched,
                total,
            } => write!(
                f,
                "title {title_id} ({title}) has total episodes {total}, watched {watched}"
            ),
        }
    }
}
