use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Utc};
use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use watchlist_core::{
    normalize_record, object_key, serialize_records, DataAnomaly, PassReport, PassStage,
    UserRecord, Username,
};
use watchlist_logging::{harvest_debug, harvest_error, harvest_info, harvest_warn};

use crate::publish::{PublishError, Publisher};
use crate::requests::{fetch_history, fetch_profile};
use crate::retry::BackoffRetrier;
use crate::{RemoteError, RemoteFetcher};

/// Wall-clock source for object keys.
pub type KeyClock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn utc_clock() -> KeyClock {
    Arc::new(|| Utc::now().naive_utc())
}

pub fn local_clock() -> KeyClock {
    Arc::new(|| Local::now().naive_local())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Users fetched concurrently. 1 keeps the pass strictly sequential.
    pub workers: usize,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

/// Failures that end a pass early. Per-user failures never surface here.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("username list fetch failed: {0}")]
    UsernameList(#[source] RemoteError),
    #[error("serializing harvest document failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("publishing {key} failed: {source}")]
    Publish {
        key: String,
        #[source]
        source: PublishError,
    },
}

enum UserOutcome {
    Harvested {
        record: UserRecord,
        anomalies: usize,
    },
    ProfileFailed,
    HistoryFailed,
}

/// Executes harvest passes. Holds no state between passes.
pub struct HarvestRunner {
    fetcher: Arc<dyn RemoteFetcher>,
    publisher: Arc<dyn Publisher>,
    retrier: BackoffRetrier,
    settings: RunnerSettings,
    clock: KeyClock,
}

impl HarvestRunner {
    pub fn new(
        fetcher: Arc<dyn RemoteFetcher>,
        publisher: Arc<dyn Publisher>,
        retrier: BackoffRetrier,
        settings: RunnerSettings,
        clock: KeyClock,
    ) -> Self {
        Self {
            fetcher,
            publisher,
            retrier,
            settings,
            clock,
        }
    }

    /// One full pass: usernames, per-user fetch and normalize, serialize, publish.
    pub async fn run(&self) -> Result<PassReport, PassError> {
        let mut report = PassReport::new();
        let result = self.run_stages(&mut report).await;
        match &result {
            Ok(()) => {
                enter(&mut report, PassStage::Done);
                harvest_info!("Harvest pass finished: {}", report);
            }
            Err(_) => {
                // The schedule loop logs the error.
                enter(&mut report, PassStage::Aborted);
                harvest_info!("Harvest pass aborted: {}", report);
            }
        }
        result.map(|()| report)
    }

    /// Fetches and normalizes every listed user, skipping failures.
    pub async fn collect(&self, report: &mut PassReport) -> Result<Vec<UserRecord>, PassError> {
        let raw = self
            .fetcher
            .list_usernames()
            .await
            .map_err(PassError::UsernameList)?;
        report.usernames_listed = raw.len();

        let usernames: Vec<Username> =
            raw.iter().filter_map(|name| Username::parse(name)).collect();
        report.empty_usernames = raw.len() - usernames.len();
        harvest_info!(
            "Fetched {} usernames ({} empty)",
            report.usernames_listed,
            report.empty_usernames
        );
        enter(report, PassStage::ProcessingUsers);

        let outcomes: Vec<UserOutcome> = stream::iter(usernames)
            .map(|username| self.harvest_user(username))
            .buffered(self.settings.workers.max(1))
            .collect()
            .await;

        let mut records = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                UserOutcome::Harvested { record, anomalies } => {
                    report.anomalies += anomalies;
                    records.push(record);
                }
                UserOutcome::ProfileFailed => report.profile_failures += 1,
                UserOutcome::HistoryFailed => report.history_failures += 1,
            }
        }
        report.records = records.len();
        Ok(records)
    }

    async fn run_stages(&self, report: &mut PassReport) -> Result<(), PassError> {
        let records = self.collect(report).await?;

        enter(report, PassStage::Serializing);
        let body = serialize_records(&records)?;
        let key = object_key((self.clock)());

        enter(report, PassStage::Publishing);
        let size = body.len();
        self.publisher
            .store(&key, body)
            .await
            .map_err(|source| PassError::Publish {
                key: key.clone(),
                source,
            })?;
        harvest_info!("Published {} ({} bytes, {} records)", key, size, records.len());
        report.published_key = Some(key);
        report.published_bytes = Some(size);
        Ok(())
    }

    async fn harvest_user(&self, username: Username) -> UserOutcome {
        harvest_debug!("Processing lists of {}", username);
        let fetcher = self.fetcher.as_ref();

        let profile = match fetch_profile(&self.retrier, fetcher, &username).await {
            Ok(profile) => profile,
            Err(err) => {
                harvest_warn!("Skipping {}: profile fetch failed: {}", username, err);
                return UserOutcome::ProfileFailed;
            }
        };

        let mut anomalies = 0;
        if profile.has_suspicious_id() {
            anomalies += 1;
            harvest_warn!(
                "{}",
                DataAnomaly::ZeroUserId {
                    username: username.to_string(),
                }
            );
        }

        let history = match fetch_history(&self.retrier, fetcher, &profile).await {
            Ok(history) => history,
            Err(err) => {
                harvest_warn!("Skipping {}: history fetch failed: {}", username, err);
                return UserOutcome::HistoryFailed;
            }
        };

        let normalized = normalize_record(&profile, &history);
        for anomaly in &normalized.anomalies {
            harvest_info!("Data anomaly for {}: {}", username, anomaly);
        }
        UserOutcome::Harvested {
            record: normalized.record,
            anomalies: anomalies + normalized.anomalies.len(),
        }
    }
}

fn enter(report: &mut PassReport, stage: PassStage) {
    match report.advance(stage) {
        Ok(()) => harvest_debug!("Harvest pass stage: {}", stage),
        Err(err) => harvest_error!("{}", err),
    }
}
