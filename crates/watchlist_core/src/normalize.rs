use crate::{AnimeRating, DataAnomaly, HistoryEntry, UserProfile, UserRecord};

/// Marker for "unscored" and "unknown" in the output document.
pub const SENTINEL: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub record: UserRecord,
    pub anomalies: Vec<DataAnomaly>,
}

pub fn normalize_score(raw: i64) -> i64 {
    if raw <= 0 {
        SENTINEL
    } else {
        raw
    }
}

/// `watched / total`, or the sentinel when the total is not positive. Not clamped.
pub fn watched_fraction(watched: i64, total: i64) -> f64 {
    if total <= 0 {
        SENTINEL as f64
    } else {
        watched as f64 / total as f64
    }
}

pub fn normalize_entry(entry: &HistoryEntry) -> (AnimeRating, Option<DataAnomaly>) {
    let anomaly = (entry.total_episodes <= 0).then(|| DataAnomaly::UnknownEpisodeTotal {
        title_id: entry.title_id,
        title: entry.title.clone(),
        watched: entry.watched_episodes,
        total: entry.total_episodes,
    });
    let rating = AnimeRating {
        id: entry.title_id,
        title: entry.title.clone(),
        user_score: normalize_score(entry.score),
        watched_per: watched_fraction(entry.watched_episodes, entry.total_episodes),
    };
    (rating, anomaly)
}

/// Builds the output record for one user: one rating per history entry, in input order.
pub fn normalize_record(profile: &UserProfile, history: &[HistoryEntry]) -> NormalizedRecord {
    let mut anomalies = Vec::new();
    let list = history
        .iter()
        .map(|entry| {
            let (rating, anomaly) = normalize_entry(entry);
            anomalies.extend(anomaly);
            rating
        })
        .collect();

    NormalizedRecord {
        record: UserRecord {
            uid: profile.user_id,
            username: profile.username.clone(),
            list,
        },
        anomalies,
    }
}
