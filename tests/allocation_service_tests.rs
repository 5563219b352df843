// Copyright (c) 2025 - Cowboy AI, Inc.
//! Integration tests for the allocation service
//!
//! These tests drive the full flow against the in-memory store:
//! 1. Submit an event → validated, recorded as pending
//! 2. Approve it → re-validated, decision recorded, summaries refreshed
//! 3. Query derived state, projections and costs as of a reference day

mod fixtures;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use cim_equipment_allocation::aggregate::AllocationStatus;
use cim_equipment_allocation::domain::{
    BillingRates, EquipmentUnit, OwnershipMode, UnitNumber, ValidationError,
};
use cim_equipment_allocation::event_store::{
    EventFilter, EventStore, InMemoryEventStore, StreamId, VersionCheck,
};
use cim_equipment_allocation::events::{AllocationEventKind, ApprovalDecision, EventRecord};
use cim_equipment_allocation::projection::executor::{
    ExecutorError, InMemorySummaryStore, SummaryWriter,
};
use cim_equipment_allocation::projection::pure::{ExtensionSummary, SummaryEffect, UnitSummary};
use cim_equipment_allocation::service::{
    AllocationService, EventSourcedAllocationService, SyncTarget,
};
use cim_equipment_allocation::registry::InMemoryRegistry;
use cim_equipment_allocation::{EngineError, EngineResult};

use fixtures::*;

/// Submit and approve in one step, approving at the event's own date
async fn record_approved<S: AllocationService>(service: &S, event: EventRecord) -> EventRecord {
    let approve_at = event.event_date;
    let pending = service.submit_event(event).await.unwrap();
    service
        .approve_event(pending.event_id, "site-lead", approve_at)
        .await
        .unwrap()
}

async fn status_on<S: AllocationService>(service: &S, unit_id: Uuid, when: DateTime<Utc>) -> AllocationStatus {
    service.compute_state(unit_id, when).await.unwrap().status
}

#[tokio::test]
async fn test_same_day_end_keeps_unit_allocated_until_next_day() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, at(3, 7), started(north(), None))).await;
    record_approved(&service, record(2, unit, at(3, 17), ended(north()))).await;

    let same_day = service.compute_state(unit, at(3, 23)).await.unwrap();
    assert_eq!(same_day.status, AllocationStatus::Allocated);
    assert_eq!(same_day.current_site_id, Some(north()));

    let next_day = service.compute_state(unit, day(4)).await.unwrap();
    assert_eq!(next_day.status, AllocationStatus::Available);
    assert_eq!(next_day.current_site_id, None);
}

#[tokio::test]
async fn test_overrunning_allocation_is_exceeded() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, day(1), started(north(), Some(day(10))))).await;

    assert_eq!(status_on(&service, unit, day(10)).await, AllocationStatus::Allocated);
    assert_eq!(status_on(&service, unit, day(11)).await, AllocationStatus::Exceeded);
}

#[tokio::test]
async fn test_transport_moves_presence_but_not_the_term() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, day(1), started(north(), Some(day(20))))).await;
    record_approved(&service, record(2, unit, day(5), departed(south()))).await;

    let moving = service.compute_state(unit, day(5)).await.unwrap();
    assert_eq!(moving.status, AllocationStatus::InTransit);
    assert!(!moving.is_present_at(north()));
    assert!(moving.is_present_at(south()));

    record_approved(&service, record(3, unit, day(6), arrived(south()))).await;

    let landed = service.compute_state(unit, day(6)).await.unwrap();
    assert_eq!(landed.end_date, Some(day(20)));
    assert_eq!(landed.allocation_site_id, Some(north()));
    assert_eq!(landed.status, AllocationStatus::Allocated);
    assert!(!landed.is_present_at(north()));
    assert!(landed.is_present_at(south()));
}

#[tokio::test]
async fn test_attaching_an_extension_held_elsewhere_fails() {
    let service = service();

    record_approved(&service, record(1, excavator_id(), day(2), attached(bucket_id(), Some(north())))).await;

    let result = service
        .submit_event(record(2, dozer_id(), day(3), attached(bucket_id(), Some(south()))))
        .await;

    match result {
        Err(EngineError::Validation(ValidationError::ExtensionHeldElsewhere {
            extension_id,
            holder_unit_id,
        })) => {
            assert_eq!(extension_id, bucket_id());
            assert_eq!(holder_unit_id, excavator_id());
        }
        other => panic!("expected a holder conflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_racing_attach_approvals_are_serialized() {
    let service = service();

    // Both pass validation while the extension is free.
    let first = service
        .submit_event(record(1, excavator_id(), day(2), attached(bucket_id(), None)))
        .await
        .unwrap();
    let second = service
        .submit_event(record(2, dozer_id(), day(2), attached(bucket_id(), None)))
        .await
        .unwrap();

    service
        .approve_event(first.event_id, "site-lead", day(2))
        .await
        .unwrap();
    let loser = service.approve_event(second.event_id, "site-lead", day(2)).await;

    assert!(matches!(
        loser,
        Err(EngineError::Validation(ValidationError::ExtensionHeldElsewhere { .. }))
    ));
    let bucket = service.compute_extension_state(bucket_id(), day(3)).await.unwrap();
    assert_eq!(bucket.holder_unit_id, Some(excavator_id()));
}

#[tokio::test]
async fn test_every_fact_bumps_the_extension_version() {
    let service = service();
    let stream = StreamId::Extension(bucket_id());

    record_approved(&service, record(1, excavator_id(), day(2), attached(bucket_id(), None))).await;
    assert_eq!(service.store().stream_version(stream).await.unwrap(), 2);

    record_approved(&service, record(2, excavator_id(), day(4), detached(bucket_id()))).await;
    assert_eq!(service.store().stream_version(stream).await.unwrap(), 4);
}

#[tokio::test]
async fn test_back_dated_start_behind_open_allocation_fails() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, day(10), started(north(), None))).await;
    let before = service
        .estimate_allocation_cost(unit, date(1), date(20))
        .await
        .unwrap();

    // Free on day 5, but the day 10 allocation is still open.
    let result = service
        .submit_event(record(2, unit, day(5), started(south(), None)))
        .await;

    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::AlreadyAllocated { site_id }))
            if site_id == Some(north())
    ));
    let after = service
        .estimate_allocation_cost(unit, date(1), date(20))
        .await
        .unwrap();
    assert_eq!(after, before);
    assert_eq!(after.total_days, 11);
}

#[tokio::test]
async fn test_back_dated_start_before_a_closed_cycle_is_allowed() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, day(10), started(north(), None))).await;
    record_approved(&service, record(2, unit, day(15), ended(north()))).await;

    let pending = service
        .submit_event(record(3, unit, day(5), started(south(), None)))
        .await;
    assert!(pending.is_ok());
}

#[tokio::test]
async fn test_back_dated_attach_behind_current_holder_fails() {
    let service = service();

    record_approved(&service, record(1, dozer_id(), day(10), attached(bucket_id(), None))).await;

    let result = service
        .submit_event(record(2, excavator_id(), day(4), attached(bucket_id(), None)))
        .await;

    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::ExtensionHeldElsewhere { holder_unit_id, .. }))
            if holder_unit_id == dozer_id()
    ));
}

#[tokio::test]
async fn test_unit_can_be_reallocated_on_the_day_it_was_released() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, at(1, 7), started(north(), None))).await;
    record_approved(&service, record(2, unit, at(10, 9), ended(north()))).await;
    record_approved(&service, record(3, unit, at(10, 14), started(south(), None))).await;

    let same_day = service.compute_state(unit, at(10, 20)).await.unwrap();
    assert_eq!(same_day.allocation_site_id, Some(south()));

    let next_day = service.compute_state(unit, day(11)).await.unwrap();
    assert_eq!(next_day.status, AllocationStatus::Allocated);
    assert_eq!(next_day.current_site_id, Some(south()));
    assert_eq!(next_day.allocation_event_id, Some(event_id(3)));
}

#[tokio::test]
async fn test_second_start_on_the_same_day_without_release_fails() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, at(1, 7), started(north(), None))).await;

    let result = service
        .submit_event(record(2, unit, at(1, 14), started(south(), None)))
        .await;
    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::AlreadyAllocated { .. }))
    ));
}

#[tokio::test]
async fn test_ten_day_allocation_with_three_day_downtime() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, day(1), started(north(), None))).await;
    record_approved(&service, record(2, unit, day(3), downtime("hydraulic leak"))).await;
    record_approved(&service, record(3, unit, day(6), back_up())).await;
    record_approved(&service, record(4, unit, day(11), ended(north()))).await;

    let estimate = service
        .estimate_allocation_cost(unit, date(1), date(31))
        .await
        .unwrap();

    assert_eq!(estimate.total_days, 10);
    assert_eq!(estimate.downtime_days, 3);
    assert_eq!(estimate.billable_days, 7);
    assert_eq!(estimate.daily_rate, 150.0);
    assert_eq!(estimate.estimated_cost, 1050.0);
}

#[tokio::test]
async fn test_owned_units_cost_nothing() {
    let service = service();
    let unit = dozer_id();

    record_approved(&service, record(1, unit, day(1), started(north(), None))).await;

    let estimate = service
        .estimate_allocation_cost(unit, date(1), date(5))
        .await
        .unwrap();
    assert_eq!(estimate.total_days, 5);
    assert_eq!(estimate.estimated_cost, 0.0);
}

#[tokio::test]
async fn test_sync_twice_writes_once() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, day(1), started(north(), None))).await;
    let writes_after_approval = service.writer().write_count();
    let stored = service.writer().unit_summaries().await;

    service
        .sync_derived_state(SyncTarget::Unit(unit), day(1))
        .await
        .unwrap();
    service
        .sync_derived_state(SyncTarget::Unit(unit), day(1))
        .await
        .unwrap();

    assert_eq!(service.writer().write_count(), writes_after_approval);
    assert_eq!(service.writer().unit_summaries().await, stored);
}

#[tokio::test]
async fn test_rebuild_fills_unit_and_extension_summaries() {
    let store = Arc::new(InMemoryEventStore::new());
    let recorder = EventSourcedAllocationService::new(
        Arc::clone(&store),
        Arc::new(registry()),
        Arc::new(InMemorySummaryStore::new()),
    );
    record_approved(&recorder, record(1, excavator_id(), day(1), started(north(), None))).await;
    record_approved(&recorder, record(2, excavator_id(), day(2), attached(bucket_id(), None))).await;

    // Same log, empty cache
    let service = EventSourcedAllocationService::new(
        store,
        Arc::new(registry()),
        Arc::new(InMemorySummaryStore::new()),
    );
    let refreshed = service.rebuild_summaries(day(3)).await.unwrap();

    assert_eq!(refreshed, 3);
    let bucket = service
        .writer()
        .extension_summary(bucket_id())
        .await
        .unwrap()
        .expect("bucket summary written");
    assert_eq!(bucket.holder_unit_id, Some(excavator_id()));
    assert_eq!(service.writer().unit_summaries().await.len(), 2);
}

#[tokio::test]
async fn test_historical_entries_have_unique_openings() {
    let service = service();
    let unit = excavator_id();

    record_approved(&service, record(1, unit, day(1), started(north(), None))).await;
    record_approved(&service, record(2, unit, day(4), ended(north()))).await;
    record_approved(&service, record(3, unit, day(8), started(north(), None))).await;
    record_approved(&service, record(4, unit, day(9), attached(bucket_id(), Some(north())))).await;
    record_approved(&service, record(5, unit, day(12), departed(south()))).await;
    record_approved(&service, record(6, unit, day(13), arrived(south()))).await;

    let history = service
        .list_historical_allocations(north(), day(20))
        .await
        .unwrap();

    let openings: HashSet<Uuid> = history.iter().map(|h| h.opening_event_id).collect();
    assert_eq!(openings.len(), history.len());
    assert_eq!(history.len(), 3);

    // Newest first: the bucket, then the cycle that moved south, then the closed one.
    assert_eq!(history[0].opening_event_id, event_id(4));
    let moved = history
        .iter()
        .find(|h| h.opening_event_id == event_id(3))
        .unwrap();
    assert!(!moved.present_now);
    assert_eq!(moved.moved_to, Some(south()));
    assert_eq!(moved.moved_to_title.as_deref(), Some("South Quarry"));
}

#[tokio::test]
async fn test_active_view_lists_allocated_units_and_extensions() {
    let service = service();

    record_approved(&service, record(1, excavator_id(), day(1), started(north(), None))).await;
    record_approved(&service, record(2, excavator_id(), day(2), downtime("flat track"))).await;
    record_approved(&service, record(3, excavator_id(), day(2), attached(bucket_id(), None))).await;

    let active = service.list_active_allocations(day(3)).await.unwrap();

    assert_eq!(active.units.len(), 1);
    let unit = &active.units[0];
    assert_eq!(unit.unit_number, "EX-01");
    assert_eq!(unit.status, AllocationStatus::Maintenance);
    assert_eq!(unit.site_title.as_deref(), Some("North Yard"));
    assert_eq!(unit.downtime_reason.as_deref(), Some("flat track"));

    assert_eq!(active.extensions.len(), 1);
    assert_eq!(active.extensions[0].holder_unit_id, Some(excavator_id()));
    assert_eq!(active.extensions[0].site_id, Some(north()));
}

#[tokio::test]
async fn test_correction_supersedes_the_original() {
    let service = service();
    let unit = excavator_id();

    let wrong = record_approved(&service, record(1, unit, day(1), started(north(), None))).await;
    record_approved(
        &service,
        record(2, unit, day(1), started(south(), None)).correcting(wrong.event_id),
    )
    .await;

    let state = service.compute_state(unit, day(2)).await.unwrap();
    assert_eq!(state.current_site_id, Some(south()));
    assert_eq!(state.allocation_event_id, Some(event_id(2)));
}

#[tokio::test]
async fn test_correction_must_target_same_unit() {
    let service = service();

    let other = record_approved(&service, record(1, dozer_id(), day(1), started(north(), None))).await;
    let result = service
        .submit_event(record(2, excavator_id(), day(1), started(south(), None)).correcting(other.event_id))
        .await;

    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::CorrectionTargetMismatch { .. }))
    ));
}

#[tokio::test]
async fn test_rejected_events_never_count() {
    let service = service();
    let unit = excavator_id();

    let pending = service
        .submit_event(record(1, unit, day(1), started(north(), None)))
        .await
        .unwrap();
    service
        .reject_event(pending.event_id, "site-lead", day(1))
        .await
        .unwrap();

    assert_eq!(status_on(&service, unit, day(5)).await, AllocationStatus::Available);
    assert_eq!(service.writer().write_count(), 0);
}

#[tokio::test]
async fn test_requests_are_inert() {
    let service = service();
    let unit = excavator_id();

    record_approved(
        &service,
        record(
            1,
            unit,
            day(1),
            AllocationEventKind::AllocationRequested {
                site_id: Some(north()),
                supplier_id: None,
                end_date: None,
            },
        ),
    )
    .await;

    let state = service.compute_state(unit, day(2)).await.unwrap();
    assert_eq!(state.status, AllocationStatus::Available);
    assert_eq!(state.current_site_id, None);
}

/// Writer whose writes always fail
#[derive(Default)]
struct BrokenWriter {
    inner: InMemorySummaryStore,
}

#[async_trait]
impl SummaryWriter for BrokenWriter {
    async fn unit_summary(&self, unit_id: Uuid) -> Result<Option<UnitSummary>, ExecutorError> {
        self.inner.unit_summary(unit_id).await
    }

    async fn extension_summary(
        &self,
        extension_id: Uuid,
    ) -> Result<Option<ExtensionSummary>, ExecutorError> {
        self.inner.extension_summary(extension_id).await
    }

    async fn execute(&self, _effects: Vec<SummaryEffect>) -> Result<(), ExecutorError> {
        Err(ExecutorError::WriteFailed("summary table is read-only".to_string()))
    }
}

#[tokio::test]
async fn test_sync_failure_does_not_block_approval() {
    let service = EventSourcedAllocationService::new(
        Arc::new(InMemoryEventStore::new()),
        Arc::new(registry()),
        Arc::new(BrokenWriter::default()),
    );
    let unit = excavator_id();

    let approved = record_approved(&service, record(1, unit, day(1), started(north(), None))).await;
    assert!(approved.is_approved());
    assert_eq!(status_on(&service, unit, day(2)).await, AllocationStatus::Allocated);

    let direct = service
        .sync_derived_state(SyncTarget::Unit(unit), day(2))
        .await;
    assert!(matches!(direct, Err(EngineError::Store(_))));
}

/// In-memory store that counts the read queries it answers
#[derive(Default)]
struct CountingStore {
    inner: InMemoryEventStore,
    unit_queries: AtomicUsize,
    extension_queries: AtomicUsize,
    site_queries: AtomicUsize,
    bulk_queries: AtomicUsize,
}

impl CountingStore {
    fn reset(&self) {
        for counter in [
            &self.unit_queries,
            &self.extension_queries,
            &self.site_queries,
            &self.bulk_queries,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    /// (unit, extension, site, bulk) query counts
    fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.unit_queries.load(Ordering::SeqCst),
            self.extension_queries.load(Ordering::SeqCst),
            self.site_queries.load(Ordering::SeqCst),
            self.bulk_queries.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl EventStore for CountingStore {
    async fn append(&self, event: EventRecord, check: Option<VersionCheck>) -> EngineResult<u64> {
        self.inner.append(event, check).await
    }

    async fn record_decision(
        &self,
        decision: ApprovalDecision,
        check: Option<VersionCheck>,
    ) -> EngineResult<EventRecord> {
        self.inner.record_decision(decision, check).await
    }

    async fn find_event(&self, event_id: Uuid) -> EngineResult<Option<EventRecord>> {
        self.inner.find_event(event_id).await
    }

    async fn events_for_unit(&self, unit_id: Uuid, filter: &EventFilter) -> EngineResult<Vec<EventRecord>> {
        self.unit_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.events_for_unit(unit_id, filter).await
    }

    async fn events_for_extension(
        &self,
        extension_id: Uuid,
        filter: &EventFilter,
    ) -> EngineResult<Vec<EventRecord>> {
        self.extension_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.events_for_extension(extension_id, filter).await
    }

    async fn events_for_site(&self, site_id: Uuid, filter: &EventFilter) -> EngineResult<Vec<EventRecord>> {
        self.site_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.events_for_site(site_id, filter).await
    }

    async fn events_matching(&self, filter: &EventFilter) -> EngineResult<Vec<EventRecord>> {
        self.bulk_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.events_matching(filter).await
    }

    async fn stream_version(&self, stream: StreamId) -> EngineResult<u64> {
        self.inner.stream_version(stream).await
    }
}

fn fleet_unit(n: u128) -> EquipmentUnit {
    EquipmentUnit {
        id: Uuid::from_u128(0x01934f4a_1100_7000_8000_000000000000 + n),
        unit_number: UnitNumber::new(format!("FL-{:02}", n)).unwrap(),
        equipment_type: "loader".to_string(),
        supplier_name: None,
        ownership: OwnershipMode::Owned,
        billing: BillingRates::default(),
        active: true,
    }
}

#[tokio::test]
async fn test_active_view_makes_one_store_round_trip_for_any_fleet_size() {
    for fleet_size in [1u128, 4, 16] {
        let fleet: Vec<EquipmentUnit> = (0..fleet_size).map(fleet_unit).collect();
        let service = EventSourcedAllocationService::new(
            Arc::new(CountingStore::default()),
            Arc::new(InMemoryRegistry::new(fleet.clone(), vec![bucket()], sites())),
            Arc::new(InMemorySummaryStore::new()),
        );

        for (seq, unit) in fleet.iter().enumerate() {
            record_approved(&service, record(seq as u128 + 1, unit.id, day(1), started(north(), None))).await;
        }
        record_approved(
            &service,
            record(fleet_size + 1, fleet[0].id, day(2), attached(bucket_id(), None)),
        )
        .await;

        service.store().reset();
        let active = service.list_active_allocations(day(3)).await.unwrap();

        assert_eq!(active.units.len(), fleet.len());
        assert_eq!(active.extensions.len(), 1);
        assert_eq!(service.store().counts(), (0, 0, 0, 1), "fleet of {}", fleet_size);
    }
}
