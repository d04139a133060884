//! Watchlist core: pure data model, normalization and pass bookkeeping.
mod document;
mod model;
mod normalize;
mod pass;

pub use document::{object_key, serialize_records, OBJECT_KEY_FORMAT, OBJECT_KEY_SUFFIX};
pub use model::{AnimeRating, DataAnomaly, HistoryEntry, UserProfile, UserRecord, Username};
pub use normalize::{
    normalize_entry, normalize_record, normalize_score, watched_fraction, NormalizedRecord,
    SENTINEL,
};
pub use pass::{InvalidTransition, PassReport, PassStage};
