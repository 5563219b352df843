// Copyright (c) 2025 - Cowboy AI, Inc.
//! Allocation Service
//!
//! Coordinates the registry, the event store, the reducers and the summary
//! writer.
//!
//! # Approval Semantics
//!
//! Approving an event is one transaction:
//! 1. Read the guarded stream's version
//! 2. Re-validate against the approved history
//! 3. Record the decision (optimistic concurrency)
//!
//! Summary synchronization runs afterwards. Its failures are logged and never
//! undo the approval; the summary is a cache that the next sync repairs.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::aggregate::{
    compute_extension_state, compute_state, estimate_cost, CostEstimate, EquipmentState,
    ExtensionState,
};
use crate::domain::calendar::end_of_day;
use crate::domain::invariants::{validate_correction_target, validate_event, ValidationError};
use crate::domain::{EquipmentUnit, Extension};
use crate::errors::{EngineError, EngineResult, EntityKind};
use crate::event_store::{EventFilter, EventStore, StreamId, VersionCheck};
use crate::events::{replay_set, ApprovalDecision, ApprovalStatus, EventRecord};
use crate::projection::executor::SummaryWriter;
use crate::projection::pure::{plan_extension_sync, plan_unit_sync};
use crate::projection::{
    materialize_active, segment_site_history, site_titles, ActiveAllocations, EventIndex,
    HistoricalAllocation,
};
use crate::registry::EquipmentRegistry;

/// Summary a synchronization refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target", content = "id", rename_all = "snake_case")]
pub enum SyncTarget {
    Unit(Uuid),
    Extension(Uuid),
}

/// Allocation service trait
///
/// Every query is answered as of an explicit reference instant.
#[async_trait]
pub trait AllocationService: Send + Sync {
    /// Derived state of one unit
    ///
    /// # Errors
    /// - `NotFound` if the unit is not registered
    async fn compute_state(&self, unit_id: Uuid, as_of: DateTime<Utc>) -> EngineResult<EquipmentState>;

    /// Derived state of one extension
    async fn compute_extension_state(
        &self,
        extension_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> EngineResult<ExtensionState>;

    /// Every active unit and attached extension worth showing on the live view
    async fn list_active_allocations(&self, as_of: DateTime<Utc>) -> EngineResult<ActiveAllocations>;

    /// Allocation cycles that touched a site, newest first
    async fn list_historical_allocations(
        &self,
        site_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> EngineResult<Vec<HistoricalAllocation>>;

    /// Check a candidate against the approved history
    ///
    /// The candidate is checked as of its own date. An allocation start is
    /// let through when the open allocation was ended earlier that same day.
    /// Events that open a span are also checked against the state the latest
    /// recorded history leaves, so a back-dated start cannot slip in behind
    /// an allocation that is still open.
    ///
    /// # Errors
    /// - `Validation` with the violated rule
    /// - `NotFound` if the unit or extension is not registered
    async fn validate(&self, candidate: &EventRecord) -> EngineResult<()>;

    /// Recompute a unit's or extension's state and refresh its summary
    async fn sync_derived_state(&self, target: SyncTarget, as_of: DateTime<Utc>) -> EngineResult<()>;

    /// Day counts and cost for a unit over an inclusive period
    async fn estimate_allocation_cost(
        &self,
        unit_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> EngineResult<CostEstimate>;

    /// Validate and record an event as pending
    async fn submit_event(&self, event: EventRecord) -> EngineResult<EventRecord>;

    /// Approve a pending event, then refresh the affected summaries
    async fn approve_event(
        &self,
        event_id: Uuid,
        approver: &str,
        at: DateTime<Utc>,
    ) -> EngineResult<EventRecord>;

    /// Reject a pending event
    async fn reject_event(
        &self,
        event_id: Uuid,
        approver: &str,
        at: DateTime<Utc>,
    ) -> EngineResult<EventRecord>;
}

/// Event-sourced implementation of [`AllocationService`]
pub struct EventSourcedAllocationService<S, R, W> {
    /// Event log
    store: Arc<S>,

    /// Units, extensions and sites
    registry: Arc<R>,

    /// Denormalized summary cache
    writer: Arc<W>,
}

impl<S, R, W> Clone for EventSourcedAllocationService<S, R, W> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<S, R, W> EventSourcedAllocationService<S, R, W>
where
    S: EventStore,
    R: EquipmentRegistry,
    W: SummaryWriter,
{
    pub fn new(store: Arc<S>, registry: Arc<R>, writer: Arc<W>) -> Self {
        Self {
            store,
            registry,
            writer,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    async fn require_unit(&self, unit_id: Uuid) -> EngineResult<EquipmentUnit> {
        self.registry
            .unit(unit_id)
            .await?
            .ok_or_else(|| EngineError::not_found(EntityKind::Unit, unit_id))
    }

    async fn require_extension(&self, extension_id: Uuid) -> EngineResult<Extension> {
        self.registry
            .extension(extension_id)
            .await?
            .ok_or_else(|| EngineError::not_found(EntityKind::Extension, extension_id))
    }

    async fn require_event(&self, event_id: Uuid) -> EngineResult<EventRecord> {
        self.store
            .find_event(event_id)
            .await?
            .ok_or_else(|| EngineError::not_found(EntityKind::Event, event_id))
    }

    /// Approved unit history in replay order, minus `excluded`
    async fn unit_history(&self, unit_id: Uuid, excluded: &HashSet<Uuid>) -> EngineResult<Vec<EventRecord>> {
        let events = self.store.events_for_unit(unit_id, &EventFilter::approved()).await?;
        Ok(replay_set(
            events.into_iter().filter(|e| !excluded.contains(&e.event_id)),
        ))
    }

    async fn extension_history(
        &self,
        extension_id: Uuid,
        excluded: &HashSet<Uuid>,
    ) -> EngineResult<Vec<EventRecord>> {
        let events = self
            .store
            .events_for_extension(extension_id, &EventFilter::approved())
            .await?;
        Ok(replay_set(
            events.into_iter().filter(|e| !excluded.contains(&e.event_id)),
        ))
    }

    /// Version guard for submitting an event
    ///
    /// Only extension events need one: two units racing for the same
    /// extension must not both get a pending attach past validation.
    async fn submission_guard(&self, event: &EventRecord) -> EngineResult<Option<VersionCheck>> {
        match event.extension_id() {
            Some(extension_id) => {
                let stream = StreamId::Extension(extension_id);
                let expected = self.store.stream_version(stream).await?;
                Ok(Some(VersionCheck::new(stream, expected)))
            }
            None => Ok(None),
        }
    }

    /// Version guard for deciding on an event
    async fn approval_guard(&self, event: &EventRecord) -> EngineResult<VersionCheck> {
        let stream = match event.extension_id() {
            Some(extension_id) => StreamId::Extension(extension_id),
            None => StreamId::Unit(event.unit_id),
        };
        let expected = self.store.stream_version(stream).await?;
        Ok(VersionCheck::new(stream, expected))
    }

    /// Refresh the summary of every active unit and extension
    ///
    /// Used to fill an empty cache. Failures are logged per target and the
    /// rebuild carries on; returns how many summaries were refreshed.
    pub async fn rebuild_summaries(&self, as_of: DateTime<Utc>) -> EngineResult<usize> {
        let units = self.registry.active_units().await?;
        let extensions = self.registry.extensions().await?;

        let targets = units
            .iter()
            .map(|u| SyncTarget::Unit(u.id))
            .chain(extensions.iter().filter(|x| x.active).map(|x| SyncTarget::Extension(x.id)));

        let mut refreshed = 0;
        for target in targets {
            match self.sync_derived_state(target, as_of).await {
                Ok(()) => refreshed += 1,
                Err(e) => warn!(target = ?target, error = %e, "Summary rebuild failed"),
            }
        }
        Ok(refreshed)
    }

    /// Refresh every summary an approved event touches, logging failures
    async fn sync_after_approval(&self, event: &EventRecord, as_of: DateTime<Utc>) {
        let mut targets = vec![SyncTarget::Unit(event.unit_id)];
        if let Some(extension_id) = event.extension_id() {
            targets.push(SyncTarget::Extension(extension_id));
        }

        for target in targets {
            if let Err(e) = self.sync_derived_state(target, as_of).await {
                warn!(
                    event_id = %event.event_id,
                    target = ?target,
                    error = %e,
                    "Summary sync failed after approval"
                );
            }
        }
    }
}

/// State once every fact recorded up to `day` has taken effect
fn settled_state(unit_id: Uuid, events: &[EventRecord], day: NaiveDate) -> EquipmentState {
    let recorded: Vec<EventRecord> = events.iter().filter(|e| e.day() <= day).cloned().collect();
    compute_state(unit_id, &recorded, end_of_day(day))
}

fn last_day(events: &[EventRecord]) -> Option<NaiveDate> {
    events.iter().map(EventRecord::day).max()
}

/// Ids a re-validation must not see: the candidate and whatever it replaces
fn excluded_ids(candidate: &EventRecord) -> HashSet<Uuid> {
    std::iter::once(candidate.event_id)
        .chain(candidate.corrects_event_id)
        .collect()
}

#[async_trait]
impl<S, R, W> AllocationService for EventSourcedAllocationService<S, R, W>
where
    S: EventStore,
    R: EquipmentRegistry,
    W: SummaryWriter,
{
    #[instrument(skip(self), fields(unit_id = %unit_id))]
    async fn compute_state(&self, unit_id: Uuid, as_of: DateTime<Utc>) -> EngineResult<EquipmentState> {
        self.require_unit(unit_id).await?;
        let events = self.unit_history(unit_id, &HashSet::new()).await?;
        Ok(compute_state(unit_id, &events, as_of))
    }

    #[instrument(skip(self), fields(extension_id = %extension_id))]
    async fn compute_extension_state(
        &self,
        extension_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> EngineResult<ExtensionState> {
        self.require_extension(extension_id).await?;
        let events = self.extension_history(extension_id, &HashSet::new()).await?;
        Ok(compute_extension_state(extension_id, &events, as_of))
    }

    async fn list_active_allocations(&self, as_of: DateTime<Utc>) -> EngineResult<ActiveAllocations> {
        let units = self.registry.active_units().await?;
        let extensions = self.registry.extensions().await?;
        let titles = site_titles(&self.registry.sites().await?);

        let index = EventIndex::build(self.store.events_matching(&EventFilter::derivation()).await?);
        debug!(units = units.len(), events = index.len(), "Materializing active allocations");

        Ok(materialize_active(&units, &extensions, &titles, &index, as_of))
    }

    #[instrument(skip(self), fields(site_id = %site_id))]
    async fn list_historical_allocations(
        &self,
        site_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> EngineResult<Vec<HistoricalAllocation>> {
        let touching = self
            .store
            .events_for_site(site_id, &EventFilter::approved())
            .await?;
        let unit_ids: HashSet<Uuid> = touching.iter().map(|e| e.unit_id).collect();

        let mut events = touching;
        for unit_id in &unit_ids {
            events.extend(
                self.store
                    .events_for_unit(*unit_id, &EventFilter::approved())
                    .await?,
            );
        }

        let extension_ids: HashSet<Uuid> = events.iter().filter_map(|e| e.extension_id()).collect();
        for extension_id in &extension_ids {
            events.extend(
                self.store
                    .events_for_extension(*extension_id, &EventFilter::approved())
                    .await?,
            );
        }

        let units: Vec<EquipmentUnit> = self
            .registry
            .units()
            .await?
            .into_iter()
            .filter(|u| unit_ids.contains(&u.id))
            .collect();
        let extensions: Vec<Extension> = self
            .registry
            .extensions()
            .await?
            .into_iter()
            .filter(|x| extension_ids.contains(&x.id))
            .collect();
        let titles = site_titles(&self.registry.sites().await?);

        let index = EventIndex::build(events);
        Ok(segment_site_history(
            site_id,
            &units,
            &extensions,
            &titles,
            &index,
            as_of,
        ))
    }

    #[instrument(skip(self, candidate), fields(event_id = %candidate.event_id, unit_id = %candidate.unit_id))]
    async fn validate(&self, candidate: &EventRecord) -> EngineResult<()> {
        self.require_unit(candidate.unit_id).await?;

        if let Some(corrected_event_id) = candidate.corrects_event_id {
            let target = self.store.find_event(corrected_event_id).await?;
            validate_correction_target(candidate, target.as_ref())?;
        }

        let excluded = excluded_ids(candidate);
        let unit_events = self.unit_history(candidate.unit_id, &excluded).await?;
        let extension_events = match candidate.extension_id() {
            Some(extension_id) => {
                self.require_extension(extension_id).await?;
                Some((
                    extension_id,
                    self.extension_history(extension_id, &excluded).await?,
                ))
            }
            None => None,
        };
        let extension_as_of = |as_of: DateTime<Utc>| {
            extension_events
                .as_ref()
                .map(|(extension_id, events)| compute_extension_state(*extension_id, events, as_of))
        };

        // On the candidate's own day
        let unit_state = compute_state(candidate.unit_id, &unit_events, candidate.event_date);
        match validate_event(candidate, &unit_state, extension_as_of(candidate.event_date).as_ref()) {
            Ok(()) => {}
            // Released earlier that day: the end is deferred but the slot is free
            Err(ValidationError::AlreadyAllocated { .. })
                if !settled_state(candidate.unit_id, &unit_events, candidate.day()).has_open_allocation() => {}
            Err(e) => return Err(e.into()),
        }

        // A back-dated opening must not overlap what later history leaves open
        if candidate.kind.opens_span() {
            let latest = last_day(&unit_events)
                .into_iter()
                .chain(extension_events.as_ref().and_then(|(_, events)| last_day(events)))
                .max()
                .filter(|latest| *latest >= candidate.day());

            if let Some(latest) = latest {
                let as_of = end_of_day(latest);
                debug!(latest = %latest, "Checking candidate against latest history");
                let unit_now = compute_state(candidate.unit_id, &unit_events, as_of);
                validate_event(candidate, &unit_now, extension_as_of(as_of).as_ref())?;
            }
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn sync_derived_state(&self, target: SyncTarget, as_of: DateTime<Utc>) -> EngineResult<()> {
        let effects = match target {
            SyncTarget::Unit(unit_id) => {
                let state = self.compute_state(unit_id, as_of).await?;
                let previous = self.writer.unit_summary(unit_id).await?;
                plan_unit_sync(previous.as_ref(), &state)
            }
            SyncTarget::Extension(extension_id) => {
                let state = self.compute_extension_state(extension_id, as_of).await?;
                let previous = self.writer.extension_summary(extension_id).await?;
                plan_extension_sync(previous.as_ref(), &state)
            }
        };

        self.writer.execute(effects).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(unit_id = %unit_id))]
    async fn estimate_allocation_cost(
        &self,
        unit_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> EngineResult<CostEstimate> {
        let unit = self.require_unit(unit_id).await?;
        let events = self.unit_history(unit_id, &HashSet::new()).await?;
        Ok(estimate_cost(&unit, &events, period_start, period_end))
    }

    async fn submit_event(&self, event: EventRecord) -> EngineResult<EventRecord> {
        let event = EventRecord {
            approval: ApprovalStatus::Pending,
            approved_by: None,
            ..event
        };

        let guard = self.submission_guard(&event).await?;
        self.validate(&event).await?;
        self.store.append(event.clone(), guard).await?;

        info!(
            event_id = %event.event_id,
            unit_id = %event.unit_id,
            event_type = %event.event_type(),
            "Event submitted"
        );
        Ok(event)
    }

    async fn approve_event(
        &self,
        event_id: Uuid,
        approver: &str,
        at: DateTime<Utc>,
    ) -> EngineResult<EventRecord> {
        let event = self.require_event(event_id).await?;
        if event.approval != ApprovalStatus::Pending {
            return Err(ValidationError::AlreadyDecided {
                event_id,
                status: event.approval.as_str().to_string(),
            }
            .into());
        }

        let guard = self.approval_guard(&event).await?;
        self.validate(&event).await?;
        let approved = self
            .store
            .record_decision(ApprovalDecision::approve(&event, approver, at), Some(guard))
            .await?;

        info!(
            event_id = %approved.event_id,
            unit_id = %approved.unit_id,
            approver = %approver,
            "Event approved"
        );

        self.sync_after_approval(&approved, at).await;
        Ok(approved)
    }

    async fn reject_event(
        &self,
        event_id: Uuid,
        approver: &str,
        at: DateTime<Utc>,
    ) -> EngineResult<EventRecord> {
        let event = self.require_event(event_id).await?;
        let rejected = self
            .store
            .record_decision(ApprovalDecision::reject(&event, approver, at), None)
            .await?;

        info!(
            event_id = %rejected.event_id,
            unit_id = %rejected.unit_id,
            approver = %approver,
            "Event rejected"
        );
        Ok(rejected)
    }
}
