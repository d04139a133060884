#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use watchlist_core::{HistoryEntry, UserProfile, Username};
use watchlist_engine::{
    BackoffPolicy, BackoffRetrier, KeyClock, PublishError, Publisher, RemoteError, RemoteFetcher,
    Sleeper,
};

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct NoSleep {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait::async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn instant_retrier() -> BackoffRetrier {
    let policy = BackoffPolicy {
        randomization_factor: 0.0,
        max_attempts: Some(5),
        ..BackoffPolicy::default()
    };
    BackoffRetrier::with_sleeper(policy, Arc::new(NoSleep::default()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    User(String),
    History(String),
}

/// Scripted fetcher: each username gets a queue of responses, the last one repeats.
#[derive(Default)]
pub struct StubFetcher {
    pub usernames: Mutex<Option<Result<Vec<String>, RemoteError>>>,
    pub users: Mutex<HashMap<String, VecDeque<Result<UserProfile, RemoteError>>>>,
    pub histories: Mutex<HashMap<String, VecDeque<Result<Vec<HistoryEntry>, RemoteError>>>>,
    pub calls: Mutex<Vec<Call>>,
    pub history_delay: Mutex<HashMap<String, Duration>>,
}

impl StubFetcher {
    pub fn new(usernames: &[&str]) -> Self {
        let stub = Self::default();
        *stub.usernames.lock().unwrap() =
            Some(Ok(usernames.iter().map(|name| name.to_string()).collect()));
        stub
    }

    pub fn failing_list(err: RemoteError) -> Self {
        let stub = Self::default();
        *stub.usernames.lock().unwrap() = Some(Err(err));
        stub
    }

    pub fn user(self, name: &str, responses: Vec<Result<UserProfile, RemoteError>>) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(name.to_string(), responses.into());
        self
    }

    pub fn history(
        self,
        name: &str,
        responses: Vec<Result<Vec<HistoryEntry>, RemoteError>>,
    ) -> Self {
        self.histories
            .lock()
            .unwrap()
            .insert(name.to_string(), responses.into());
        self
    }

    pub fn delay_history(self, name: &str, delay: Duration) -> Self {
        self.history_delay
            .lock()
            .unwrap()
            .insert(name.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn next<T: Clone>(
        queues: &Mutex<HashMap<String, VecDeque<Result<T, RemoteError>>>>,
        name: &str,
    ) -> Result<T, RemoteError> {
        let mut queues = queues.lock().unwrap();
        let queue = queues
            .get_mut(name)
            .unwrap_or_else(|| panic!("no scripted response for {name}"));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

#[async_trait::async_trait]
impl RemoteFetcher for StubFetcher {
    async fn list_usernames(&self) -> Result<Vec<String>, RemoteError> {
        self.calls.lock().unwrap().push(Call::List);
        self.usernames
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn get_user(&self, username: &Username) -> Result<UserProfile, RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::User(username.to_string()));
        Self::next(&self.users, username.as_str())
    }

    async fn get_history(&self, profile: &UserProfile) -> Result<Vec<HistoryEntry>, RemoteError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::History(profile.username.clone()));
        let delay = self
            .history_delay
            .lock()
            .unwrap()
            .get(&profile.username)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::next(&self.histories, &profile.username)
    }
}

pub fn profile(uid: i64, name: &str) -> UserProfile {
    UserProfile {
        user_id: uid,
        username: name.to_string(),
    }
}

pub fn entry(title_id: i64, title: &str, score: i64, watched: i64, total: i64) -> HistoryEntry {
    HistoryEntry {
        title_id,
        title: title.to_string(),
        score,
        watched_episodes: watched,
        total_episodes: total,
    }
}

/// Keeps every stored document in memory.
#[derive(Default)]
pub struct RecordingPublisher {
    pub stored: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail_with: Mutex<Option<String>>,
}

impl RecordingPublisher {
    pub fn failing(message: &str) -> Self {
        let publisher = Self::default();
        *publisher.fail_with.lock().unwrap() = Some(message.to_string());
        publisher
    }

    pub fn stored(&self) -> Vec<(String, Vec<u8>)> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn store(&self, key: &str, body: Vec<u8>) -> Result<(), PublishError> {
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(PublishError::Backend {
                key: key.to_string(),
                message,
            });
        }
        self.stored.lock().unwrap().push((key.to_string(), body));
        Ok(())
    }
}

/// Each call returns a time one second later than the previous one.
pub fn ticking_clock() -> KeyClock {
    let ticks = Arc::new(AtomicU32::new(0));
    Arc::new(move || {
        let tick = ticks.fetch_add(1, Ordering::SeqCst);
        NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 15, tick)
            .unwrap()
    })
}
