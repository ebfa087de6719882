//! End-to-end scenarios against a real Redis server.
//!
//! Run with `cargo test -- --ignored` once a server is listening on
//! `REDIS_URL` (default `redis://localhost:6379`).

use redis::streams::StreamRangeReply;
use redis::AsyncCommands;
use serde_json::json;

use stinger::{
    AddReturn, DeduplicationOpts, JobOpts, JobState, KeepPolicy, MoveToActiveArgs,
    MoveToActiveReturn, MoveToFinishedArgs, QueueError, Queue, RateLimiterOpts, ScriptFailure,
};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

async fn connection() -> redis::aio::Connection {
    redis::Client::open(redis_url())
        .unwrap()
        .get_async_connection()
        .await
        .unwrap()
}

/// Fresh queue handle over a wiped namespace.
async fn queue(name: &str) -> Queue {
    let mut conn = connection().await;
    let keys: Vec<String> = redis::cmd("KEYS")
        .arg(format!("sq:{}:*", name))
        .query_async(&mut conn)
        .await
        .unwrap();
    if !keys.is_empty() {
        redis::cmd("DEL")
            .arg(keys)
            .query_async::<_, ()>(&mut conn)
            .await
            .unwrap();
    }
    Queue::new(name, &redis_url()).await.unwrap()
}

fn lease(token: &str) -> MoveToActiveArgs {
    MoveToActiveArgs {
        token: token.to_string(),
        lock_duration: 10_000,
        limiter: None,
        name: None,
    }
}

fn finish(token: &str) -> MoveToFinishedArgs {
    MoveToFinishedArgs {
        token: token.to_string(),
        keep_jobs: KeepPolicy::All.to_keep_jobs(),
        lock_duration: 10_000,
        attempts: 3,
        max_metrics_size: None,
        limiter: None,
        fields_to_update: None,
    }
}

async fn events_named(queue_name: &str, event: &str) -> usize {
    let mut conn = connection().await;
    let reply: StreamRangeReply = conn
        .xrange_all(format!("sq:{}:events", queue_name))
        .await
        .unwrap();
    reply
        .ids
        .iter()
        .filter_map(|entry| entry.map.get("event"))
        .filter_map(|v| redis::from_redis_value::<String>(v).ok())
        .filter(|name| name == event)
        .count()
}

fn expect_job(ret: MoveToActiveReturn<serde_json::Value>) -> stinger::Job<serde_json::Value> {
    match ret {
        MoveToActiveReturn::Job(job) => job,
        other => panic!("expected a leased job, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn fifo_jobs_are_served_in_enqueue_order() {
    let q = queue("it-fifo").await;

    q.add("T", &json!({"n": 1}), &JobOpts::default()).await.unwrap();
    q.add("T", &json!({"n": 2}), &JobOpts::default()).await.unwrap();

    let first = expect_job(q.move_to_active(&lease("tA")).await.unwrap());
    let second = expect_job(q.move_to_active(&lease("tB")).await.unwrap());

    assert_eq!(first.name, "T");
    assert_eq!(first.data["n"], 1);
    assert_eq!(second.data["n"], 2);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn higher_priorities_win_and_ties_stay_fifo() {
    let q = queue("it-priority").await;

    for (n, priority) in [(0u32, 0u32), (1, 5), (2, 5), (3, 10)] {
        let opts = JobOpts {
            priority,
            ..JobOpts::default()
        };
        q.add("T", &json!({ "n": n }), &opts).await.unwrap();
    }

    let mut served = Vec::new();
    for token in ["t1", "t2", "t3", "t4"] {
        let job = expect_job(q.move_to_active(&lease(token)).await.unwrap());
        served.push((job.priority, job.data["n"].as_u64().unwrap()));
    }

    assert_eq!(served, vec![(10, 3), (5, 1), (5, 2), (0, 0)]);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn delayed_jobs_surface_only_once_ripe() {
    let q = queue("it-delayed").await;
    let before = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;

    let opts = JobOpts {
        delay: 100,
        ..JobOpts::default()
    };
    q.add("T", &json!({"n": 1}), &opts).await.unwrap();

    match q
        .move_to_active::<serde_json::Value>(&lease("tA"))
        .await
        .unwrap()
    {
        MoveToActiveReturn::NextDelayed { timestamp } => {
            assert!(timestamp >= before + 100);
        }
        other => panic!("expected a next-delayed hint, got {:?}", other),
    }

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    let job = expect_job(q.move_to_active(&lease("tA")).await.unwrap());
    assert_eq!(job.data["n"], 1);
    assert_eq!(job.delay, 0);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn concurrent_adds_sharing_a_deduplication_id_collapse() {
    let q = queue("it-dedup").await;

    let opts = JobOpts {
        de: Some(DeduplicationOpts {
            id: "X".to_string(),
            ttl: Some(60_000),
            replace: false,
            extend: false,
        }),
        ..JobOpts::default()
    };

    let first = q.add("T", &json!({"n": 1}), &opts).await.unwrap();
    let second = q.add("T", &json!({"n": 2}), &opts).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(events_named("it-dedup", "debounced").await, 1);
    assert_eq!(events_named("it-dedup", "deduplicated").await, 1);
    assert_eq!(events_named("it-dedup", "added").await, 1);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn completion_requires_the_owning_token() {
    let q = queue("it-lock").await;

    q.add("T", &json!({"n": 1}), &JobOpts::default()).await.unwrap();
    let job = expect_job(q.move_to_active(&lease("tA")).await.unwrap());

    let err = q
        .move_to_completed::<serde_json::Value>(&job.id, "\"done\"", false, &finish("tB"))
        .await
        .unwrap_err();
    match err {
        QueueError::Script { failure, .. } => assert_eq!(failure, ScriptFailure::LockMismatch),
        other => panic!("expected a lock mismatch, got {:?}", other),
    }

    let counts = q
        .get_counts(&[JobState::Active, JobState::Completed])
        .await
        .unwrap();
    assert_eq!(counts, vec![1, 0]);

    q.move_to_completed::<serde_json::Value>(&job.id, "\"done\"", false, &finish("tA"))
        .await
        .unwrap();

    let counts = q
        .get_counts(&[JobState::Active, JobState::Completed])
        .await
        .unwrap();
    assert_eq!(counts, vec![0, 1]);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn the_rate_limiter_caps_leases_per_window() {
    let q = queue("it-limiter").await;

    for n in 0..3 {
        q.add("T", &json!({ "n": n }), &JobOpts::default()).await.unwrap();
    }

    let args = MoveToActiveArgs {
        token: "tA".to_string(),
        lock_duration: 10_000,
        limiter: Some(RateLimiterOpts {
            max: 2,
            duration: 60_000,
        }),
        name: None,
    };

    expect_job(q.move_to_active(&args).await.unwrap());
    expect_job(q.move_to_active(&args).await.unwrap());

    match q
        .move_to_active::<serde_json::Value>(&args)
        .await
        .unwrap()
    {
        MoveToActiveReturn::RateLimited { expire_in_ms } => assert!(expire_in_ms > 0),
        other => panic!("expected a rate-limited reply, got {:?}", other),
    }
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn custom_ids_are_idempotent() {
    let q = queue("it-custom-id").await;

    let first = q
        .add_with_id("order-9", "T", &json!({"n": 1}), &JobOpts::default())
        .await
        .unwrap();
    let second = q
        .add_with_id("order-9", "T", &json!({"n": 1}), &JobOpts::default())
        .await
        .unwrap();

    assert_eq!(first, AddReturn::Id("order-9".to_string()));
    assert_eq!(second, AddReturn::AlreadyExists);
    assert_eq!(events_named("it-custom-id", "added").await, 1);
    assert_eq!(events_named("it-custom-id", "duplicated").await, 1);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn leased_jobs_round_trip_their_body() {
    let q = queue("it-roundtrip").await;

    let opts = JobOpts {
        priority: 7,
        ..JobOpts::default()
    };
    q.add("render", &json!({"frame": 12}), &opts).await.unwrap();

    let job = expect_job(q.move_to_active(&lease("tA")).await.unwrap());
    assert_eq!(job.name, "render");
    assert_eq!(job.data["frame"], 12);
    assert_eq!(job.priority, 7);
    assert_eq!(job.attempts_started, 1);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn failed_jobs_can_be_retried_until_attempts_run_out() {
    let q = queue("it-retry").await;

    q.add("T", &json!({"n": 1}), &JobOpts::default()).await.unwrap();
    let job = expect_job(q.move_to_active(&lease("tA")).await.unwrap());

    q.retry(&stinger::RetryJobArgs {
        job_id: job.id.clone(),
        token: "tA".to_string(),
        order: Default::default(),
        fields_to_update: None,
    })
    .await
    .unwrap();

    let counts = q.get_counts(&[JobState::Wait, JobState::Active]).await.unwrap();
    assert_eq!(counts, vec![1, 0]);

    let again = expect_job(q.move_to_active(&lease("tB")).await.unwrap());
    assert_eq!(again.id, job.id);
    assert_eq!(again.attempts_made, 1);

    q.move_to_failed::<serde_json::Value>(&again.id, "boom", false, &finish("tB"))
        .await
        .unwrap();

    let counts = q.get_counts(&[JobState::Failed]).await.unwrap();
    assert_eq!(counts, vec![1]);
    assert_eq!(events_named("it-retry", "waiting").await, 2);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn finishing_with_fetch_next_leases_in_one_round_trip() {
    let q = queue("it-fetch-next").await;

    q.add("T", &json!({"n": 1}), &JobOpts::default()).await.unwrap();
    q.add("T", &json!({"n": 2}), &JobOpts::default()).await.unwrap();

    let first = expect_job(q.move_to_active(&lease("tA")).await.unwrap());

    let next = q
        .move_to_completed::<serde_json::Value>(&first.id, "\"ok\"", true, &finish("tA"))
        .await
        .unwrap()
        .expect("fetch_next returns a tuple");
    let second = expect_job(next);
    assert_eq!(second.data["n"], 2);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn removing_on_complete_deletes_the_body() {
    let q = queue("it-remove").await;

    q.add("T", &json!({"n": 1}), &JobOpts::default()).await.unwrap();
    let job = expect_job(q.move_to_active(&lease("tA")).await.unwrap());

    let args = MoveToFinishedArgs {
        keep_jobs: KeepPolicy::Remove.to_keep_jobs(),
        ..finish("tA")
    };
    q.move_to_completed::<serde_json::Value>(&job.id, "\"ok\"", false, &args)
        .await
        .unwrap();

    let mut conn = connection().await;
    let exists: bool = conn
        .exists(format!("{}{}", q.prefix(), job.id))
        .await
        .unwrap();
    assert!(!exists);
    let counts = q.get_counts(&[JobState::Completed]).await.unwrap();
    assert_eq!(counts, vec![0]);
}
