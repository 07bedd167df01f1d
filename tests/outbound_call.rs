//! Outbound calls against real sockets.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use service_kit::http::{
    AbortReason, CallError, CallFailure, CallOutcome, OutboundClient, ReqwestTransport,
};
use service_kit::lifecycle::{Lifecycle, Shutdown, TimerRegistry};

mod common;

fn client(timers: &Arc<TimerRegistry>) -> OutboundClient {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    OutboundClient::with_transport(ReqwestTransport::new(http), timers.clone(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_json_response_is_success() {
    let addr = common::start_mock_backend(r#"{"items":[1,2,3]}"#).await;
    let timers = Arc::new(TimerRegistry::new());

    let outcome = client(&timers)
        .call(&format!("http://{}/items", addr), "POST", Some(r#"{"q":"x"}"#), None)
        .await
        .unwrap();

    assert_eq!(outcome.into_result().unwrap(), json!({"items": [1, 2, 3]}));
    assert!(timers.is_empty());
}

#[tokio::test]
async fn test_slow_backend_is_aborted() {
    let addr = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, "{}".to_string())
    })
    .await;
    let timers = Arc::new(TimerRegistry::new());

    let started = std::time::Instant::now();
    let outcome = client(&timers)
        .call(&format!("http://{}/", addr), "GET", None, Some(Duration::from_millis(100)))
        .await
        .unwrap();

    assert!(matches!(outcome, CallOutcome::Aborted(AbortReason::Timeout)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(timers.is_empty());
}

#[tokio::test]
async fn test_connection_refused_is_failure() {
    let addr = common::closed_port().await;
    let timers = Arc::new(TimerRegistry::new());
    let target = format!("http://{}/", addr);

    let outcome = client(&timers).call(&target, "GET", None, None).await.unwrap();

    match outcome {
        CallOutcome::Failure(CallFailure::Transport { target: t, .. }) => assert_eq!(t, target),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(timers.is_empty());
}

#[tokio::test]
async fn test_html_response_is_parse_failure() {
    let addr = common::start_mock_backend("<html>oops</html>").await;
    let timers = Arc::new(TimerRegistry::new());

    let err = client(&timers)
        .call(&format!("http://{}/", addr), "GET", None, None)
        .await
        .unwrap()
        .into_result()
        .unwrap_err();

    assert!(matches!(err, CallError::Failure(CallFailure::Parse { .. })));
}

#[tokio::test]
async fn test_invalid_body_never_hits_backend() {
    let hits = Arc::new(AtomicU32::new(0));
    let h = hits.clone();
    let addr = common::start_programmable_backend(move || {
        let h = h.clone();
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            (200, "{}".to_string())
        }
    })
    .await;
    let timers = Arc::new(TimerRegistry::new());

    let err = client(&timers)
        .call(&format!("http://{}/", addr), "POST", Some("{invalid json"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::InvalidArgument(_)));
    assert!(timers.is_empty());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_registry_size_unchanged_across_outcomes() {
    let ok = common::start_mock_backend("{}").await;
    let bad = common::start_mock_backend("nope").await;
    let timers = Arc::new(TimerRegistry::new());
    timers.arm(Duration::from_secs(60), || {});
    let before = timers.len();

    let client = client(&timers);
    client.call(&format!("http://{}/", ok), "GET", None, None).await.unwrap();
    client.call(&format!("http://{}/", bad), "GET", None, None).await.unwrap();

    assert_eq!(timers.len(), before);
}

#[tokio::test]
async fn test_teardown_drains_in_flight_deadlines() {
    let addr = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, "{}".to_string())
    })
    .await;
    let timers = Arc::new(TimerRegistry::new());
    let lifecycle = Lifecycle::new(timers.clone(), Shutdown::new());

    let client = Arc::new(client(&timers));
    let c = client.clone();
    let target = format!("http://{}/", addr);
    let in_flight = tokio::spawn(async move { c.call(&target, "GET", None, None).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(timers.len(), 1);

    assert_eq!(lifecycle.teardown("upstream exhausted"), 1);
    assert!(timers.is_empty());
    in_flight.abort();
}
