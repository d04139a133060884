//! Retry-wrapped profile and history requests.
//!
//! The two endpoints signal rate limiting differently, so each gets its own
//! classification function. Do not merge them.

use watchlist_core::{HistoryEntry, UserProfile, Username};

use crate::retry::{Attempt, BackoffRetrier};
use crate::{RemoteError, RemoteFailure, RemoteFetcher};

pub const FETCH_PROFILE: &str = "fetch-profile";
pub const FETCH_HISTORY: &str = "fetch-history";

/// Profile lookups: only "bad request" is permanent.
pub fn classify_profile_error(err: RemoteError) -> Attempt<RemoteError> {
    if err.kind == RemoteFailure::BadRequest {
        Attempt::Permanent(err)
    } else {
        Attempt::Retryable(err)
    }
}

/// History lookups: only "too many requests" is retryable.
pub fn classify_history_error(err: RemoteError) -> Attempt<RemoteError> {
    if err.kind == RemoteFailure::TooManyRequests {
        Attempt::Retryable(err)
    } else {
        Attempt::Permanent(err)
    }
}

pub async fn fetch_profile(
    retrier: &BackoffRetrier,
    fetcher: &dyn RemoteFetcher,
    username: &Username,
) -> Result<UserProfile, RemoteError> {
    retrier
        .retry(FETCH_PROFILE, username.as_str(), || async move {
            fetcher
                .get_user(username)
                .await
                .map_err(classify_profile_error)
        })
        .await
}

pub async fn fetch_history(
    retrier: &BackoffRetrier,
    fetcher: &dyn RemoteFetcher,
    profile: &UserProfile,
) -> Result<Vec<HistoryEntry>, RemoteError> {
    retrier
        .retry(FETCH_HISTORY, &profile.username, || async move {
            fetcher
                .get_history(profile)
                .await
                .map_err(classify_history_error)
        })
        .await
}
