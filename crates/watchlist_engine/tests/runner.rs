mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{entry, instant_retrier, profile, ticking_clock, Call, RecordingPublisher, StubFetcher};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use watchlist_core::{PassReport, PassStage};
use watchlist_engine::{
    HarvestRunner, PassError, PublishError, RemoteError, RemoteFailure, RunnerSettings,
};

fn runner(fetcher: Arc<StubFetcher>, publisher: Arc<RecordingPublisher>) -> HarvestRunner {
    runner_with_workers(fetcher, publisher, 1)
}

fn runner_with_workers(
    fetcher: Arc<StubFetcher>,
    publisher: Arc<RecordingPublisher>,
    workers: usize,
) -> HarvestRunner {
    HarvestRunner::new(
        fetcher,
        publisher,
        instant_retrier(),
        RunnerSettings { workers },
        ticking_clock(),
    )
}

fn published_json(publisher: &RecordingPublisher, index: usize) -> Value {
    let stored = publisher.stored();
    serde_json::from_slice(&stored[index].1).unwrap()
}

#[tokio::test]
async fn skips_empty_and_bad_request_users() {
    watchlist_logging::initialize_for_tests();
    let fetcher = Arc::new(
        StubFetcher::new(&["alice", "", "bob"])
            .user("alice", vec![Ok(profile(1, "alice"))])
            .history("alice", vec![Ok(vec![entry(10, "X", 0, 0, 0)])])
            .user("bob", vec![Err(RemoteError::bad_request())]),
    );
    let publisher = Arc::new(RecordingPublisher::default());

    let report = runner(fetcher.clone(), publisher.clone()).run().await.unwrap();

    assert_eq!(
        published_json(&publisher, 0),
        json!([{
            "uid": 1,
            "username": "alice",
            "list": [{ "id": 10, "title": "X", "user_score": -1, "watched_per": -1.0 }]
        }])
    );
    assert_eq!(
        fetcher.calls(),
        vec![
            Call::List,
            Call::User("alice".to_string()),
            Call::History("alice".to_string()),
            Call::User("bob".to_string()),
        ]
    );
    assert_eq!(report.stage(), PassStage::Done);
    assert_eq!(report.usernames_listed, 3);
    assert_eq!(report.empty_usernames, 1);
    assert_eq!(report.profile_failures, 1);
    assert_eq!(report.records, 1);
    assert_eq!(report.anomalies, 1);
    assert_eq!(report.published_key.as_deref(), Some("07032024-091500-out.json"));
}

#[tokio::test]
async fn permanent_history_failure_excludes_user() {
    let fetcher = Arc::new(
        StubFetcher::new(&["alice", "carol"])
            .user("alice", vec![Ok(profile(1, "alice"))])
            .history(
                "alice",
                vec![Err(RemoteError::new(RemoteFailure::Malformed, "no anime"))],
            )
            .user("carol", vec![Ok(profile(3, "carol"))])
            .history("carol", vec![Ok(vec![entry(5, "Y", 9, 6, 12)])]),
    );
    let publisher = Arc::new(RecordingPublisher::default());

    let report = runner(fetcher, publisher.clone()).run().await.unwrap();

    let doc = published_json(&publisher, 0);
    let names: Vec<_> = doc
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["username"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["carol"]);
    assert_eq!(doc[0]["list"][0]["user_score"], json!(9));
    assert_eq!(doc[0]["list"][0]["watched_per"], json!(0.5));
    assert_eq!(report.history_failures, 1);
}

#[tokio::test]
async fn record_count_matches_input_when_everything_succeeds() {
    let names = ["a", "b", "c"];
    let mut stub = StubFetcher::new(&names);
    for (uid, name) in names.iter().enumerate() {
        stub = stub
            .user(name, vec![Ok(profile(uid as i64 + 1, name))])
            .history(name, vec![Ok(Vec::new())]);
    }
    let publisher = Arc::new(RecordingPublisher::default());

    let report = runner(Arc::new(stub), publisher.clone()).run().await.unwrap();

    assert_eq!(report.records, names.len());
    assert_eq!(published_json(&publisher, 0).as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn zero_uid_is_kept_and_counted() {
    let fetcher = Arc::new(
        StubFetcher::new(&["ghost"])
            .user("ghost", vec![Ok(profile(0, "ghost"))])
            .history("ghost", vec![Ok(vec![entry(1, "Z", 7, 3, 3)])]),
    );
    let publisher = Arc::new(RecordingPublisher::default());

    let report = runner(fetcher.clone(), publisher.clone()).run().await.unwrap();

    assert_eq!(published_json(&publisher, 0)[0]["uid"], json!(0));
    assert_eq!(report.anomalies, 1);
    assert!(fetcher.calls().contains(&Call::History("ghost".to_string())));
}

#[tokio::test]
async fn username_list_failure_aborts_only_the_pass() {
    let fetcher = Arc::new(StubFetcher::failing_list(RemoteError::new(
        RemoteFailure::Network,
        "connection reset",
    )));
    let publisher = Arc::new(RecordingPublisher::default());
    let runner = runner(fetcher, publisher.clone());

    let err = runner.run().await.unwrap_err();
    assert!(matches!(err, PassError::UsernameList(ref e) if e.kind == RemoteFailure::Network));
    assert!(publisher.stored().is_empty());

    // The runner stays usable for the next trigger.
    assert!(runner.run().await.is_err());
}

#[tokio::test]
async fn publish_failure_is_reported_to_the_caller() {
    let fetcher = Arc::new(StubFetcher::new(&[]));
    let publisher = Arc::new(RecordingPublisher::failing("access denied"));

    let err = runner(fetcher, publisher).run().await.unwrap_err();

    match err {
        PassError::Publish { key, source } => {
            assert!(key.ends_with("-out.json"));
            assert!(matches!(source, PublishError::Backend { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn back_to_back_passes_publish_independent_documents() {
    let fetcher = Arc::new(
        StubFetcher::new(&["alice"])
            .user("alice", vec![Ok(profile(1, "alice"))])
            .history("alice", vec![Ok(vec![entry(10, "X", 8, 1, 2)])]),
    );
    let publisher = Arc::new(RecordingPublisher::default());
    let runner = runner(fetcher, publisher.clone());

    let first: PassReport = runner.run().await.unwrap();
    let second: PassReport = runner.run().await.unwrap();

    let stored = publisher.stored();
    assert_eq!(stored.len(), 2);
    assert_ne!(stored[0].0, stored[1].0);
    assert_eq!(stored[0].1, stored[1].1);
    assert_eq!(first.records, 1);
    assert_eq!(second.records, 1);
}

#[tokio::test(start_paused = true)]
async fn bounded_workers_overlap_fetches_and_preserve_order() {
    let fetcher = Arc::new(
        StubFetcher::new(&["slow", "fast", "last"])
            .user("slow", vec![Ok(profile(1, "slow"))])
            .user("fast", vec![Ok(profile(2, "fast"))])
            .user("last", vec![Ok(profile(3, "last"))])
            .history("slow", vec![Ok(Vec::new())])
            .history("fast", vec![Ok(Vec::new())])
            .history("last", vec![Ok(Vec::new())])
            .delay_history("slow", Duration::from_secs(3))
            .delay_history("fast", Duration::from_secs(2)),
    );
    let publisher = Arc::new(RecordingPublisher::default());
    let started = tokio::time::Instant::now();

    runner_with_workers(fetcher, publisher.clone(), 2)
        .run()
        .await
        .unwrap();

    // Sequential fetching would need 5s; two workers overlap slow and fast.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(5));

    let uids: Vec<_> = published_json(&publisher, 0)
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["uid"].as_i64().unwrap())
        .collect();
    assert_eq!(uids, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn single_worker_is_sequential() {
    let fetcher = Arc::new(
        StubFetcher::new(&["slow", "fast"])
            .user("slow", vec![Ok(profile(1, "slow"))])
            .user("fast", vec![Ok(profile(2, "fast"))])
            .history("slow", vec![Ok(Vec::new())])
            .history("fast", vec![Ok(Vec::new())])
            .delay_history("slow", Duration::from_secs(3))
            .delay_history("fast", Duration::from_secs(2)),
    );
    let publisher = Arc::new(RecordingPublisher::default());
    let started = tokio::time::Instant::now();

    runner(fetcher.clone(), publisher).run().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(
        fetcher.calls()[1..].to_vec(),
        vec![
            Call::User("slow".to_string()),
            Call::History("slow".to_string()),
            Call::User("fast".to_string()),
            Call::History("fast".to_string()),
        ]
    );
}
