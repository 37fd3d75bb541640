//! Sliding-window script against a live redis. Set `REDIS_URL` to run;
//! without it every test returns early.

use media_gateway::rate_limit::{Decision, RateLimitStore, RedisStore, WindowPolicy};
use uuid::Uuid;

fn store() -> Option<RedisStore> {
    let Ok(url) = std::env::var("REDIS_URL") else {
        eprintln!("REDIS_URL not set; skipping redis store test");
        return None;
    };
    Some(RedisStore::open(&url, WindowPolicy::default()).expect("valid REDIS_URL"))
}

fn unique_client() -> String {
    format!("test-{}", Uuid::new_v4())
}

async fn fill(store: &RedisStore, client: &str, start: f64) {
    for i in 0..60 {
        let now = start + i as f64 * (1.0 / 60.0);
        let decision = store.check(client, now).await.unwrap();
        assert!(decision.is_allowed(), "call {} rejected", i + 1);
    }
}

#[tokio::test]
async fn rejects_the_61st_call_within_a_second() {
    let Some(store) = store() else { return };
    let client = unique_client();
    fill(&store, &client, 1000.0).await;

    match store.check(&client, 1001.0).await.unwrap() {
        Decision::Limited { retry_after } => {
            assert!(retry_after > 0.0);
            assert!((retry_after - 59.0).abs() < 1e-3, "{retry_after}");
        }
        Decision::Allowed => panic!("61st call must be rejected"),
    }
}

#[tokio::test]
async fn admits_once_the_oldest_call_leaves_the_window() {
    let Some(store) = store() else { return };
    let client = unique_client();
    fill(&store, &client, 1000.0).await;

    assert!(!store.check(&client, 1030.0).await.unwrap().is_allowed());
    assert!(store.check(&client, 1060.0).await.unwrap().is_allowed());
}

#[tokio::test]
async fn clients_have_independent_ledgers() {
    let Some(store) = store() else { return };
    let busy = unique_client();
    fill(&store, &busy, 1000.0).await;

    assert!(!store.check(&busy, 1001.0).await.unwrap().is_allowed());
    assert!(store.check(&unique_client(), 1001.0).await.unwrap().is_allowed());
}
