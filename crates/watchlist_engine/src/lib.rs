//! Watchlist engine: remote fetching, retry discipline, harvest passes,
//! publishing and scheduling.
mod fetch;
mod persist;
mod publish;
mod ranking;
mod requests;
mod retry;
mod runner;
mod schedule;
mod types;

pub use fetch::{
    FetchSettings, HttpRemoteFetcher, RemoteFetcher, DEFAULT_API_BASE_URL, DEFAULT_RANKING_URL,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use publish::{
    DirectoryPublisher, PublishError, Publisher, S3Publisher, DEFAULT_BUCKET, DEFAULT_REGION,
};
pub use ranking::{
    InvalidSelector, SelectorExtractor, UsernameExtractor, RANKING_USERNAME_SELECTOR,
};
pub use requests::{
    classify_history_error, classify_profile_error, fetch_history, fetch_profile, FETCH_HISTORY,
    FETCH_PROFILE,
};
pub use retry::{Attempt, BackoffPolicy, BackoffRetrier, BackoffSchedule, Sleeper, TokioSleeper};
pub use runner::{local_clock, utc_clock, HarvestRunner, KeyClock, PassError, RunnerSettings};
pub use schedule::{
    HarvestPass, ScheduleHandle, ScheduleLoop, ScheduleSettings, DEFAULT_INTERVAL,
};
pub use types::{RemoteError, RemoteFailure};
