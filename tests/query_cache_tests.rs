use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;
use tokio_test::{assert_pending, assert_ready};

use reelsight::{
    models::RecommendationKind,
    query::{QueryClient, QueryConfig, QueryFamily, QueryFilter, QueryKey, QueryState},
    ClientError, ClientResult,
};

const STALE: Duration = Duration::from_secs(300);

fn client() -> QueryClient {
    QueryClient::new(QueryConfig {
        stale_time: STALE,
        gc_time: Duration::from_secs(300),
    })
}

/// Fetch that counts its calls and returns the call number
fn counting(
    calls: &Arc<AtomicUsize>,
) -> impl FnOnce() -> BoxFuture<'static, ClientResult<usize>> + Send {
    let calls = Arc::clone(calls);
    move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) }.boxed()
}

/// Fetch that does not resolve until `gate` is notified
fn gated(
    calls: &Arc<AtomicUsize>,
    gate: &Arc<Notify>,
) -> impl FnOnce() -> BoxFuture<'static, ClientResult<usize>> + Send {
    let calls = Arc::clone(calls);
    let gate = Arc::clone(gate);
    move || {
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            gate.notified().await;
            Ok(n)
        }
        .boxed()
    }
}

#[tokio::test]
async fn test_concurrent_queries_share_one_fetch() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::movies("batman", 2);

    let (a, b): (QueryState<usize>, QueryState<usize>) = tokio::join!(
        client.query(&key, counting(&calls)),
        client.query(&key, counting(&calls))
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.data, Some(1));
    assert_eq!(b.data, Some(1));
}

#[tokio::test]
async fn test_waiters_resolve_together_when_the_fetch_lands() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let key = QueryKey::Movie(42);

    let mut first =
        tokio_test::task::spawn(client.query::<usize, _, _>(&key, gated(&calls, &gate)));
    let mut second =
        tokio_test::task::spawn(client.query::<usize, _, _>(&key, gated(&calls, &gate)));
    assert_pending!(first.poll());
    assert_pending!(second.poll());
    assert_eq!(client.stats().in_flight, 1);

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(first.is_woken());
    let first = assert_ready!(first.poll());
    let second = assert_ready!(second.poll());
    assert_eq!(first.data, Some(1));
    assert_eq!(second.data, Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_result_is_served_without_fetching() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::Movie(1);

    let _: QueryState<usize> = client.query(&key, counting(&calls)).await;
    tokio::time::advance(STALE - Duration::from_millis(1)).await;

    let state: QueryState<usize> = client.observe(&key, counting(&calls));
    assert_eq!(state.data, Some(1));
    assert!(!state.is_fetching);
    assert!(!state.is_stale);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_result_is_served_while_refetching() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::Movie(1);

    let _: QueryState<usize> = client.query(&key, counting(&calls)).await;
    tokio::time::advance(STALE + Duration::from_millis(1)).await;

    let state: QueryState<usize> = client.query(&key, counting(&calls)).await;
    assert_eq!(state.data, Some(1));
    assert!(state.is_refetching());

    tokio::time::sleep(Duration::from_millis(1)).await;
    let state: QueryState<usize> = client.state(&key);
    assert_eq!(state.data, Some(2));
    assert!(!state.is_fetching);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_family_invalidation_refetches_every_matching_key() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let hybrid = QueryKey::recommendations(RecommendationKind::Hybrid, 1, 10);
    let content = QueryKey::recommendations(RecommendationKind::ContentBased, 1, 10);
    let movie = QueryKey::Movie(42);

    for key in [&hybrid, &content, &movie] {
        let _: QueryState<usize> = client.query(key, counting(&calls)).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let invalidated = client.invalidate(&QueryFilter::Family(QueryFamily::Recommendations));
    assert_eq!(invalidated, 2);

    for key in [&hybrid, &content, &movie] {
        let _: QueryState<usize> = client.observe(key, counting(&calls));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert!(!client.state::<usize>(&hybrid).is_stale);
    assert!(!client.state::<usize>(&movie).is_stale);
}

#[tokio::test]
async fn test_invalidation_during_fetch_keeps_entry_stale() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let key = QueryKey::recommendations(RecommendationKind::Hybrid, 1, 10);

    let _: QueryState<usize> = client.observe(&key, gated(&calls, &gate));
    client.invalidate(&QueryFilter::Key(key.clone()));
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let state: QueryState<usize> = client.state(&key);
    assert_eq!(state.data, Some(1));
    assert!(state.is_stale);
}

#[tokio::test]
async fn test_removed_key_joins_fetch_still_in_flight() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let key = QueryKey::Movie(42);

    let _: QueryState<usize> = client.observe(&key, gated(&calls, &gate));
    assert!(client.remove(&key));

    let state: QueryState<usize> = client.observe(&key, gated(&calls, &gate));
    assert!(state.is_loading());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    gate.notify_one();
    let state: QueryState<usize> = client.query(&key, gated(&calls, &gate)).await;
    assert_eq!(state.data, Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cleared_cache_does_not_duplicate_running_fetches() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let key = QueryKey::movies("batman", 1);

    let _: QueryState<usize> = client.observe(&key, gated(&calls, &gate));
    client.clear();
    assert_eq!(client.stats().entries, 0);

    gate.notify_one();
    let state: QueryState<usize> = client.query(&key, gated(&calls, &gate)).await;
    assert_eq!(state.data, Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_mutation_invalidates_user_recommendations() {
    let client = client();
    let calls = Arc::new(AtomicUsize::new(0));
    let mine = QueryKey::recommendations(RecommendationKind::Collaborative, 1, 10);
    let popular = QueryKey::recommendations(RecommendationKind::Popular, 1, 10);
    let theirs = QueryKey::recommendations(RecommendationKind::Collaborative, 2, 10);

    for key in [&mine, &popular, &theirs] {
        let _: QueryState<usize> = client.query(key, counting(&calls)).await;
    }

    let posted = client
        .mutate(
            async { Ok::<_, ClientError>("recorded") },
            &[QueryFilter::Recommendations { user_id: 1 }],
        )
        .await;
    assert_eq!(posted, Ok("recorded"));

    assert!(client.state::<usize>(&mine).is_stale);
    assert!(client.state::<usize>(&popular).is_stale);
    assert!(!client.state::<usize>(&theirs).is_stale);
}

#[tokio::test]
async fn test_error_is_shared_by_all_waiters() {
    let client = client();
    let key = QueryKey::Movie(999_999);
    let not_found = || async {
        Err::<usize, _>(ClientError::Http {
            status: 404,
            message: "Movie not found".to_string(),
        })
    };

    let (a, b): (QueryState<usize>, QueryState<usize>) =
        tokio::join!(client.query(&key, not_found), client.query(&key, not_found));
    assert!(a.is_error());
    assert!(b.is_error());
    assert_eq!(a.error, b.error);
}
