mod common;

use common::{order, settle, CountingOrderSource};
use navigator_core::capabilities::{InMemoryKvStore, LocalRealtimeHub, OrderFilters, ReloadOptions};
use navigator_core::model::{OrderPayload, Place};
use navigator_core::{
    Collaborators, CoreConfig, DispatchApp, DriverId, OrderId, OrderStatus, RecordingReporter,
    CURRENT_REFRESH_INTERVAL, NEARBY_REFRESH_INTERVAL,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn app_with(source: Arc<CountingOrderSource>, hub: &LocalRealtimeHub) -> DispatchApp {
    DispatchApp::new(
        CoreConfig::default(),
        Collaborators {
            kv: Arc::new(InMemoryKvStore::new()),
            telephony: None,
            realtime: Arc::new(hub.clone()),
            orders: source,
            reporter: Arc::new(RecordingReporter::new()),
        },
    )
    .unwrap()
}

fn place(name: &str) -> Place {
    Place { name: Some(name.into()), ..Place::default() }
}

#[tokio::test(start_paused = true)]
async fn realtime_events_refresh_the_right_collection() {
    let source = CountingOrderSource::new();
    let hub = LocalRealtimeHub::new();
    let app = app_with(source.clone(), &hub);

    app.orders().on_focus(&DriverId::new("8")).await;
    settle().await;
    assert_eq!(source.calls(), (0, 1, 1));

    // order.ready → current only
    hub.publish("driver.8", json!({ "event": "order.ready" }));
    settle().await;
    assert_eq!(source.calls(), (0, 2, 1));

    // order.ping → nearby only
    hub.publish("driver.8", json!({ "event": "order.ping" }));
    settle().await;
    assert_eq!(source.calls(), (1, 2, 1));
}

#[tokio::test(start_paused = true)]
async fn blur_silences_timers_and_channel() {
    let source = CountingOrderSource::new();
    let hub = LocalRealtimeHub::new();
    let app = app_with(source.clone(), &hub);

    app.orders().on_focus(&DriverId::new("8")).await;
    tokio::time::sleep(NEARBY_REFRESH_INTERVAL + Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(source.calls().0, 1);

    app.orders().on_blur().await;
    let revision = app.orders().snapshot().revision;
    let calls = source.calls();

    // Ticks and socket events after blur leave no trace
    tokio::time::sleep(CURRENT_REFRESH_INTERVAL * 3).await;
    assert_eq!(hub.publish("driver.8", json!({ "event": "order.ready" })), 0);
    settle().await;

    assert_eq!(source.calls(), calls);
    assert_eq!(app.orders().snapshot().revision, revision);
}

#[tokio::test]
async fn summary_counts_stops_across_active_orders() {
    let source = CountingOrderSource::new();
    let mut first = order("order_1", OrderStatus::Dispatched);
    first.payload = Some(OrderPayload {
        pickup: Some(place("A")),
        dropoff: Some(place("B")),
        waypoints: None,
    });
    first.distance = Some(2500.0);
    first.time = Some(600.0);
    let mut second = order("order_2", OrderStatus::Started);
    second.payload = Some(OrderPayload {
        pickup: Some(place("C")),
        dropoff: None,
        waypoints: Some(vec![None]),
    });
    let third = order("order_3", OrderStatus::Dispatched);
    let mut finished = order("order_4", OrderStatus::Completed);
    finished.payload = Some(OrderPayload { pickup: Some(place("Z")), ..OrderPayload::default() });
    *source.current.lock().unwrap() = vec![first, second, third, finished];

    let hub = LocalRealtimeHub::new();
    let app = app_with(source, &hub);
    app.orders()
        .reload_current_orders(&OrderFilters::none(), ReloadOptions::default())
        .await;

    let summary = app.orders().summary();
    assert_eq!(summary.order_count, 3);
    assert_eq!(summary.stop_count, 3);
    assert!((summary.total_distance_m - 2500.0).abs() < f64::EPSILON);
    assert!((summary.total_duration_s - 600.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn adhoc_dismiss_stays_local() {
    let source = CountingOrderSource::new();
    let mut adhoc = order("order_50", OrderStatus::Created);
    adhoc.adhoc = true;
    let regular = order("order_51", OrderStatus::Created);
    *source.nearby.lock().unwrap() = vec![adhoc, regular];

    let hub = LocalRealtimeHub::new();
    let app = app_with(source.clone(), &hub);
    app.orders()
        .reload_nearby_orders(&OrderFilters::none(), ReloadOptions::silent())
        .await;
    let calls = source.calls();

    assert!(app.orders().dismiss_adhoc(&OrderId::new("order_50")));
    let visible: Vec<String> = app
        .orders()
        .visible_orders()
        .into_iter()
        .map(|o| o.id.to_string())
        .collect();
    assert_eq!(visible, vec!["order_51"]);

    // Second dismiss changes nothing
    let revision = app.orders().snapshot().revision;
    assert!(!app.orders().dismiss_adhoc(&OrderId::new("order_50")));
    assert_eq!(app.orders().snapshot().revision, revision);
    assert_eq!(source.calls(), calls);
}
