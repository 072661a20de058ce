//! Raise / lower of rendered collections.

mod common;

use std::sync::Arc;

use clipzip_engine::{EngineEvent, ErrorScope, EventFilter, EventKind, LayerKind};
use clipzip_types::{CollectionId, ItemType};
use common::{FakeHost, FakeService, area, collection, engine, line_feature};

fn service() -> Arc<FakeService> {
    let service = FakeService::new();
    service.set_catalog(
        None,
        vec![
            collection("roads", ItemType::Feature, 100.0),
            collection("dem", ItemType::Coverage, 100.0),
        ],
    );
    service.set_features("roads", vec![line_feature()]);
    Arc::new(service)
}

#[tokio::test]
async fn test_raise_and_lower_vector_group() {
    let host = FakeHost::new();
    let service = service();
    let engine = engine(&host, &service);
    engine.on_draw_ended(area("A", 1.0)).await;
    engine.toggle("roads", true, None).await;

    assert!(engine.raise(LayerKind::Vector, "roads").await);
    assert_eq!(host.group("roads").unwrap().z, 102);
    assert!(engine.lower(LayerKind::Vector, "roads").await);
    assert!(engine.lower(LayerKind::Vector, "roads").await);
    assert_eq!(host.group("roads").unwrap().z, 100);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_raise_of_same_layer_is_refused() {
    let host = FakeHost::new();
    let service = service();
    let engine = engine(&host, &service);
    engine.on_draw_ended(area("A", 1.0)).await;
    engine.toggle("dem", true, None).await;
    assert_eq!(host.layer("dem").unwrap().z, 100);

    // Make the first raise wait for the layer so the second overlaps it.
    if let Some(layer) = host.state.lock().layers.get_mut("dem") {
        layer.pending_polls = 3;
    }
    let (first, second) = tokio::join!(
        engine.raise(LayerKind::Raster, "dem"),
        engine.raise(LayerKind::Raster, "dem"),
    );

    assert!(first);
    assert!(!second);
    assert_eq!(host.layer("dem").unwrap().z, 101);
    assert!(engine.ordering_in_progress().is_empty());
}

#[tokio::test]
async fn test_in_progress_set_is_announced() {
    let host = FakeHost::new();
    let service = service();
    let engine = engine(&host, &service);
    engine.on_draw_ended(area("A", 1.0)).await;
    engine.toggle("roads", true, None).await;

    let mut events = engine.subscribe(EventFilter::Kinds(vec![EventKind::LayerOrdered]));
    engine.raise(LayerKind::Vector, "roads").await;

    let sets: Vec<Vec<CollectionId>> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::LayerOrdered { in_progress } => Some(in_progress),
            _ => None,
        })
        .collect();
    assert_eq!(sets, vec![vec![CollectionId::from("roads")], vec![]]);
}

#[tokio::test]
async fn test_host_failure_releases_claim() {
    let host = FakeHost::new();
    let service = service();
    let engine = engine(&host, &service);
    engine.on_draw_ended(area("A", 1.0)).await;
    engine.toggle("roads", true, None).await;

    host.state.lock().fail_z_index = true;
    let mut errors = engine.subscribe(EventFilter::Kinds(vec![EventKind::Error]));
    assert!(!engine.raise(LayerKind::Vector, "roads").await);
    assert!(matches!(
        errors.try_recv(),
        Some(EngineEvent::Error { scope: ErrorScope::Order, .. })
    ));
    assert!(engine.ordering_in_progress().is_empty());

    host.state.lock().fail_z_index = false;
    assert!(engine.raise(LayerKind::Vector, "roads").await);
    assert_eq!(host.group("roads").unwrap().z, 102);
}

#[tokio::test]
async fn test_raising_missing_group_reports_error() {
    let host = FakeHost::new();
    let service = service();
    let engine = engine(&host, &service);

    let mut errors = engine.subscribe(EventFilter::Kinds(vec![EventKind::Error]));
    assert!(!engine.raise(LayerKind::Vector, "nothing").await);
    assert!(errors.try_recv().is_some());
}
