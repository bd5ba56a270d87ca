// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end session behavior against the in-memory store and mock surface.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use geofence_dry_tests::{Answer, DiffBuilder, MockSurface, RecordBuilder, ScriptedGeocoder};
use geofence_map_port::{ControlId, LatLng, SurfaceError};
use geofence_model::{GeoPoint, RecordId};
use geofence_store::{FeedMode, MemoryStore};
use geofence_sync::{
    EditForm, GeofenceSyncSession, SessionCommand, SessionConfig, SessionHandle, SessionNotice,
    CREATE_ALERT, EDIT_ALERT,
};
use tokio::time::{sleep, timeout};

const A: LatLng = LatLng::new(8.47, 124.64);
const B: LatLng = LatLng::new(8.48, 124.65);

fn start(
    store: &MemoryStore,
    geocoder: ScriptedGeocoder,
    surface: &MockSurface,
) -> SessionHandle {
    let surface = surface.clone();
    GeofenceSyncSession::start(
        &SessionConfig::default(),
        Arc::new(store.clone()),
        Arc::new(geocoder),
        move |_container: &str| Ok(surface),
    )
    .expect("session should start")
}

async fn wait_for<F>(handle: &mut SessionHandle, mut pred: F) -> SessionNotice
where
    F: FnMut(&SessionNotice) -> bool,
{
    timeout(Duration::from_secs(2), async {
        loop {
            let notice = handle.next_notice().await.expect("session ended early");
            if pred(&notice) {
                return notice;
            }
        }
    })
    .await
    .expect("timed out waiting for notice")
}

async fn reconciled(handle: &mut SessionHandle) -> geofence_sync::ReconcileReport {
    match wait_for(handle, |n| matches!(n, SessionNotice::Reconciled(_))).await {
        SessionNotice::Reconciled(report) => report,
        other => panic!("unexpected notice: {other:?}"),
    }
}

fn alpha() -> geofence_model::GeofenceRecord {
    RecordBuilder::new("g1")
        .deployment("Alpha")
        .address("X St")
        .radius(20)
        .at(8.47, 124.64)
        .build()
}

#[tokio::test]
async fn renders_snapshot_then_removes_on_empty_snapshot() {
    let store = MemoryStore::new();
    store.put_external(alpha());
    let probe = MockSurface::new();
    let mut session = start(&store, ScriptedGeocoder::new(), &probe);

    assert_eq!(reconciled(&mut session).await.added, 1);
    let circles = probe.circles();
    assert_eq!(circles.len(), 1);
    let (handle, circle) = &circles[0];
    assert_eq!(circle.center, A);
    assert!((circle.radius_m - 20.0).abs() < f64::EPSILON);
    let text = probe.popup(*handle).unwrap().text();
    assert!(text.contains("Alpha"));
    assert!(text.contains("20m"));

    store.remove_external(&RecordId::new("g1")).unwrap();
    assert_eq!(reconciled(&mut session).await.removed, 1);
    assert_eq!(probe.circle_count(), 0);

    session.stop().await;
    assert!(probe.is_disposed());
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn click_resolve_save_issues_one_create() {
    let store = MemoryStore::new();
    let geocoder = ScriptedGeocoder::new().answer(B, Answer::Address("Y Ave".into()));
    let probe = MockSurface::new();
    let mut session = start(&store, geocoder, &probe);
    reconciled(&mut session).await;

    session.send(SessionCommand::MapClick(B));
    let resolved = wait_for(&mut session, |n| {
        matches!(n, SessionNotice::CandidateResolved { .. })
    })
    .await;
    assert_eq!(
        resolved,
        SessionNotice::CandidateResolved {
            location: B,
            address: Some("Y Ave".into()),
        }
    );

    session.send(SessionCommand::SetDeployment("Bravo".into()));
    session.send(SessionCommand::SetRadius("15".into()));
    session.send(SessionCommand::SaveCandidate);
    let issued = wait_for(&mut session, |n| matches!(n, SessionNotice::CreateIssued(_))).await;
    let SessionNotice::CreateIssued(doc) = issued else {
        unreachable!()
    };
    assert_eq!(doc.deployment, "Bravo");
    assert_eq!(doc.address, "Y Ave");
    assert_eq!(doc.radius_meters, 15);
    assert_eq!(doc.location, GeoPoint::new(8.48, 124.65));

    assert_eq!(reconciled(&mut session).await.added, 1);
    assert_eq!(probe.marker_count(), 0);
    assert_eq!(probe.circle_count(), 1);
    assert_eq!(store.write_count(), 1);
    let stored = store.records();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].deployment, "Bravo");

    session.stop().await;
}

#[tokio::test]
async fn untouched_radius_saves_at_the_default() {
    let store = MemoryStore::new();
    let geocoder = ScriptedGeocoder::new().answer(B, Answer::Address("Y Ave".into()));
    let probe = MockSurface::new();
    let mut session = start(&store, geocoder, &probe);
    reconciled(&mut session).await;

    session.send(SessionCommand::MapClick(B));
    wait_for(&mut session, |n| {
        matches!(n, SessionNotice::CandidateResolved { .. })
    })
    .await;
    session.send(SessionCommand::SetDeployment("Bravo".into()));
    session.send(SessionCommand::SaveCandidate);
    let issued = wait_for(&mut session, |n| {
        matches!(n, SessionNotice::CreateIssued(_) | SessionNotice::Alert(_))
    })
    .await;
    let SessionNotice::CreateIssued(doc) = issued else {
        panic!("save rejected: {issued:?}")
    };
    assert_eq!(doc.radius_meters, 10);

    assert_eq!(reconciled(&mut session).await.added, 1);
    assert_eq!(store.records()[0].radius_meters, 10);
    session.stop().await;
}

#[tokio::test]
async fn stop_applies_queued_save_and_waits_for_the_write() {
    let store = MemoryStore::new();
    let geocoder = ScriptedGeocoder::new().answer(B, Answer::Address("Y Ave".into()));
    let probe = MockSurface::new();
    let mut session = start(&store, geocoder, &probe);
    reconciled(&mut session).await;

    session.send(SessionCommand::MapClick(B));
    wait_for(&mut session, |n| {
        matches!(n, SessionNotice::CandidateResolved { .. })
    })
    .await;
    session.send(SessionCommand::SetDeployment("Bravo".into()));
    session.send(SessionCommand::SaveCandidate);
    session.stop().await;

    assert_eq!(store.write_count(), 1);
    let stored = store.records();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].deployment, "Bravo");
    assert!(probe.is_disposed());
}

#[tokio::test]
async fn later_click_supersedes_slow_lookup() {
    let store = MemoryStore::new();
    let geocoder = ScriptedGeocoder::new()
        .answer_after(A, Answer::Address("Slow St".into()), Duration::from_millis(200))
        .answer(B, Answer::Address("Y Ave".into()));
    let probe = MockSurface::new();
    let mut session = start(&store, geocoder.clone(), &probe);
    reconciled(&mut session).await;

    session.send(SessionCommand::MapClick(A));
    session.send(SessionCommand::MapClick(B));
    let resolved = wait_for(&mut session, |n| {
        matches!(n, SessionNotice::CandidateResolved { .. })
    })
    .await;
    assert!(matches!(
        resolved,
        SessionNotice::CandidateResolved { location, .. } if location == B
    ));

    sleep(Duration::from_millis(300)).await;
    while let Some(notice) = session.try_notice() {
        assert!(
            !matches!(notice, SessionNotice::CandidateResolved { .. }),
            "superseded lookup leaked: {notice:?}"
        );
    }
    assert_eq!(probe.marker_count(), 1);
    assert_eq!(probe.circle_count(), 1);
    assert_eq!(probe.markers()[0].1.position, B);
    assert_eq!(probe.circles()[0].1.center, B);
    assert_eq!(geocoder.calls().last(), Some(&B));

    session.stop().await;
    assert_eq!(probe.marker_count() + probe.circle_count(), 0);
}

#[tokio::test]
async fn failed_lookup_blocks_save_with_alert() {
    let store = MemoryStore::new();
    let geocoder = ScriptedGeocoder::new().answer(A, Answer::Status(503));
    let probe = MockSurface::new();
    let mut session = start(&store, geocoder, &probe);
    reconciled(&mut session).await;

    session.send(SessionCommand::MapClick(A));
    let resolved = wait_for(&mut session, |n| {
        matches!(n, SessionNotice::CandidateResolved { .. })
    })
    .await;
    assert!(matches!(
        resolved,
        SessionNotice::CandidateResolved { address: None, .. }
    ));

    session.send(SessionCommand::SetDeployment("Bravo".into()));
    session.send(SessionCommand::SetRadius("15".into()));
    session.send(SessionCommand::SaveCandidate);
    let alert = wait_for(&mut session, |n| matches!(n, SessionNotice::Alert(_))).await;
    assert_eq!(alert, SessionNotice::Alert(CREATE_ALERT.into()));
    assert_eq!(store.write_count(), 0);
    assert_eq!(probe.marker_count(), 1);

    session.send(SessionCommand::CancelCandidate);
    session.stop().await;
    assert_eq!(probe.marker_count(), 0);
}

#[tokio::test]
async fn not_found_resolves_with_fallback_text() {
    let store = MemoryStore::new();
    let probe = MockSurface::new();
    let mut session = start(&store, ScriptedGeocoder::new(), &probe);
    reconciled(&mut session).await;

    session.send(SessionCommand::MapClick(A));
    let resolved = wait_for(&mut session, |n| {
        matches!(n, SessionNotice::CandidateResolved { .. })
    })
    .await;
    assert_eq!(
        resolved,
        SessionNotice::CandidateResolved {
            location: A,
            address: Some("No address found".into()),
        }
    );
    let (marker, _) = probe.markers()[0].clone();
    assert_eq!(probe.opened_popup(), Some(marker));
    session.stop().await;
}

#[tokio::test]
async fn cancel_discards_candidate_overlays() {
    let store = MemoryStore::new();
    let probe = MockSurface::new();
    let mut session = start(&store, ScriptedGeocoder::new(), &probe);
    reconciled(&mut session).await;

    session.send(SessionCommand::MapClick(A));
    wait_for(&mut session, |n| matches!(n, SessionNotice::CandidateResolved { .. })).await;
    session.send(SessionCommand::CancelCandidate);
    session.send(SessionCommand::SaveCandidate);
    assert_eq!(
        wait_for(&mut session, |n| matches!(n, SessionNotice::Alert(_))).await,
        SessionNotice::Alert(CREATE_ALERT.into())
    );
    assert_eq!(probe.marker_count() + probe.circle_count(), 0);
    session.stop().await;
}

#[tokio::test]
async fn delete_control_writes_straight_to_store() {
    let store = MemoryStore::new();
    store.put_external(alpha());
    let probe = MockSurface::new();
    let mut session = start(&store, ScriptedGeocoder::new(), &probe);
    reconciled(&mut session).await;

    session.send(SessionCommand::OpenPopup(RecordId::new("g1")));
    session.send(SessionCommand::ControlClicked(ControlId::new("deleteBtn_g1")));
    assert_eq!(
        wait_for(&mut session, |n| matches!(n, SessionNotice::DeleteIssued(_))).await,
        SessionNotice::DeleteIssued(RecordId::new("g1"))
    );
    assert_eq!(reconciled(&mut session).await.removed, 1);
    assert!(store.records().is_empty());
    assert_eq!(probe.circle_count(), 0);
    session.stop().await;
}

#[tokio::test]
async fn controls_of_closed_popups_do_nothing() {
    let store = MemoryStore::new();
    store.put_external(alpha());
    let probe = MockSurface::new();
    let mut session = start(&store, ScriptedGeocoder::new(), &probe);
    reconciled(&mut session).await;

    let handle = probe.circles()[0].0;
    session.send(SessionCommand::PopupOpened(handle));
    session.send(SessionCommand::PopupClosed);
    session.send(SessionCommand::ControlClicked(ControlId::new("deleteBtn_g1")));
    session.send(SessionCommand::SubmitEdit(EditForm::new(
        RecordId::new("g1"),
        "",
        "20",
    )));
    assert_eq!(
        wait_for(&mut session, |n| matches!(n, SessionNotice::Alert(_))).await,
        SessionNotice::Alert(EDIT_ALERT.into())
    );
    assert_eq!(store.write_count(), 0);
    session.stop().await;
}

#[tokio::test]
async fn edit_sees_latest_record_and_update_round_trips() {
    let store = MemoryStore::new();
    store.put_external(alpha());
    let probe = MockSurface::new();
    let mut session = start(&store, ScriptedGeocoder::new(), &probe);
    reconciled(&mut session).await;

    let handle = probe.circles()[0].0;
    session.send(SessionCommand::PopupOpened(handle));
    store.put_external(
        RecordBuilder::new("g1")
            .deployment("Alpha-2")
            .radius(20)
            .at(8.47, 124.64)
            .build(),
    );
    assert_eq!(reconciled(&mut session).await.updated, 1);

    session.send(SessionCommand::ControlClicked(ControlId::new("showModalBtn_g1")));
    let notice = wait_for(&mut session, |n| matches!(n, SessionNotice::EditRequested(_))).await;
    let SessionNotice::EditRequested(record) = notice else {
        unreachable!()
    };
    assert_eq!(record.deployment, "Alpha-2");

    let mut form = EditForm::from_record(&record);
    form.radius = "40".into();
    session.send(SessionCommand::SubmitEdit(form));
    wait_for(&mut session, |n| matches!(n, SessionNotice::UpdateIssued(..))).await;
    assert_eq!(reconciled(&mut session).await.updated, 1);
    assert!((probe.circles()[0].1.radius_m - 40.0).abs() < f64::EPSILON);
    assert!(probe.popup(handle).unwrap().text().contains("40m"));
    session.stop().await;
}

#[tokio::test]
async fn feed_error_keeps_last_snapshot() {
    let store = MemoryStore::new();
    store.put_external(alpha());
    let probe = MockSurface::new();
    let mut session = start(&store, ScriptedGeocoder::new(), &probe);
    reconciled(&mut session).await;

    store.inject_feed_error("backend hiccup");
    let notice = wait_for(&mut session, |n| matches!(n, SessionNotice::FeedError(_))).await;
    assert!(matches!(notice, SessionNotice::FeedError(msg) if msg.contains("backend hiccup")));
    assert_eq!(probe.circle_count(), 1);
    assert_eq!(store.subscriber_count(), 1);
    session.stop().await;
}

#[tokio::test]
async fn diff_gap_triggers_resubscribe() {
    let store = MemoryStore::with_mode(FeedMode::Diffs);
    store.put_external(alpha());
    let probe = MockSurface::new();
    let mut session = start(&store, ScriptedGeocoder::new(), &probe);
    reconciled(&mut session).await;

    store.inject_frame(DiffBuilder::new(40, 41).remove("g1").frame());
    wait_for(&mut session, |n| matches!(n, SessionNotice::FeedError(_))).await;
    let report = reconciled(&mut session).await;
    assert!(report.is_noop());
    assert_eq!(probe.circle_count(), 1);
    assert_eq!(store.subscriber_count(), 1);

    store.put_external(RecordBuilder::new("g2").radius(5).build());
    assert_eq!(reconciled(&mut session).await.added, 1);
    assert_eq!(probe.circle_count(), 2);
    session.stop().await;
}

#[tokio::test]
async fn unavailable_container_starts_nothing() {
    let store = MemoryStore::new();
    let started = GeofenceSyncSession::start(
        &SessionConfig::default(),
        Arc::new(store.clone()),
        Arc::new(ScriptedGeocoder::new()),
        |container: &str| -> Result<MockSurface, SurfaceError> {
            Err(SurfaceError::ContainerUnavailable(container.to_string()))
        },
    );
    assert!(started.is_none());
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn repeated_start_stop_leaks_nothing() {
    let store = MemoryStore::new();
    store.put_external(alpha());
    for _ in 0..5 {
        let probe = MockSurface::new();
        let mut session = start(&store, ScriptedGeocoder::new(), &probe);
        assert_eq!(reconciled(&mut session).await.added, 1);
        assert_eq!(probe.circle_count(), 1);
        session.send(SessionCommand::MapClick(B));
        session.stop().await;
        assert!(probe.is_disposed());
        assert_eq!(probe.circle_count() + probe.marker_count(), 0);
    }
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn dropping_the_handle_still_tears_down() {
    let store = MemoryStore::new();
    let probe = MockSurface::new();
    let mut session = start(&store, ScriptedGeocoder::new(), &probe);
    reconciled(&mut session).await;
    drop(session);

    timeout(Duration::from_secs(2), async {
        while !probe.is_disposed() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("surface not released");
    assert_eq!(store.subscriber_count(), 0);
}
