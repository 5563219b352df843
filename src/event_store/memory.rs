// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-Memory Event Store
//!
//! Single-process store used by tests and by embedders that hold the log
//! elsewhere. Version checks and writes happen under one write lock, so a
//! check-then-append is atomic.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{EventFilter, EventStore, StreamId, VersionCheck};
use crate::domain::invariants::ValidationError;
use crate::errors::{EngineError, EngineResult, EntityKind};
use crate::events::{sort_for_replay, ApprovalDecision, ApprovalStatus, EventRecord};
use crate::jetstream::{FactBody, StoredFact};

/// Folded view of the log: records with their latest decision applied
#[derive(Debug, Default)]
pub(super) struct FactLog {
    /// Records in append order
    events: Vec<EventRecord>,
    positions: HashMap<Uuid, usize>,
    versions: HashMap<StreamId, u64>,
}

impl FactLog {
    /// Rebuild the view from stored facts in stream order
    ///
    /// Decisions for unknown events are skipped; a later decision about the
    /// same event wins.
    pub(super) fn from_facts(facts: impl IntoIterator<Item = StoredFact>) -> Self {
        let mut log = Self::default();
        for fact in facts {
            match fact.body {
                FactBody::Event(event) => {
                    log.record(event);
                }
                FactBody::Approval(decision) => {
                    log.decide(&decision);
                }
            }
        }
        log
    }

    pub(super) fn version(&self, stream: StreamId) -> u64 {
        self.versions.get(&stream).copied().unwrap_or(0)
    }

    pub(super) fn check(&self, check: Option<VersionCheck>) -> EngineResult<()> {
        match check {
            Some(VersionCheck { stream, expected }) if self.version(stream) != expected => {
                Err(EngineError::Concurrency(format!(
                    "Expected {} at version {}, but current version is {}",
                    stream,
                    expected,
                    self.version(stream)
                )))
            }
            _ => Ok(()),
        }
    }

    pub(super) fn contains(&self, event_id: Uuid) -> bool {
        self.positions.contains_key(&event_id)
    }

    pub(super) fn find(&self, event_id: Uuid) -> Option<&EventRecord> {
        self.positions.get(&event_id).map(|&p| &self.events[p])
    }

    /// Add a record; `false` when its id is already taken
    pub(super) fn record(&mut self, event: EventRecord) -> bool {
        if self.contains(event.event_id) {
            return false;
        }
        self.bump(&event);
        self.positions.insert(event.event_id, self.events.len());
        self.events.push(event);
        true
    }

    /// Apply a decision; `None` when the event is unknown
    pub(super) fn decide(&mut self, decision: &ApprovalDecision) -> Option<EventRecord> {
        let position = *self.positions.get(&decision.event_id)?;
        let decided = self.events[position].clone().decided(decision);
        self.bump(&decided);
        self.events[position] = decided.clone();
        Some(decided)
    }

    /// Fail unless the event exists and is still pending
    pub(super) fn pending(&self, event_id: Uuid) -> EngineResult<&EventRecord> {
        let event = self
            .find(event_id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Event, event_id))?;
        if event.approval != ApprovalStatus::Pending {
            return Err(ValidationError::AlreadyDecided {
                event_id,
                status: event.approval.as_str().to_string(),
            }
            .into());
        }
        Ok(event)
    }

    fn bump(&mut self, event: &EventRecord) {
        for stream in StreamId::of(event) {
            *self.versions.entry(stream).or_insert(0) += 1;
        }
    }

    pub(super) fn select(&self, keep: impl Fn(&EventRecord) -> bool) -> Vec<EventRecord> {
        let mut selected: Vec<EventRecord> =
            self.events.iter().filter(|e| keep(e)).cloned().collect();
        sort_for_replay(&mut selected);
        selected
    }

    pub(super) fn len(&self) -> usize {
        self.events.len()
    }
}

/// Event store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    log: RwLock<FactLog>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with records, as if appended in order
    pub fn with_events(events: impl IntoIterator<Item = EventRecord>) -> Self {
        let mut log = FactLog::default();
        for event in events {
            log.record(event);
        }
        Self {
            log: RwLock::new(log),
        }
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.log.read().await.len() == 0
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: EventRecord, check: Option<VersionCheck>) -> EngineResult<u64> {
        let mut log = self.log.write().await;

        if log.contains(event.event_id) {
            return Err(EngineError::Concurrency(format!(
                "Event {} already recorded",
                event.event_id
            )));
        }
        log.check(check)?;

        let unit_stream = StreamId::Unit(event.unit_id);
        debug!(event_id = %event.event_id, event_type = %event.event_type(), "Appended event");
        log.record(event);

        Ok(log.version(unit_stream))
    }

    async fn record_decision(
        &self,
        decision: ApprovalDecision,
        check: Option<VersionCheck>,
    ) -> EngineResult<EventRecord> {
        let mut log = self.log.write().await;

        log.pending(decision.event_id)?;
        log.check(check)?;

        let decided = log
            .decide(&decision)
            .ok_or_else(|| EngineError::not_found(EntityKind::Event, decision.event_id))?;
        debug!(event_id = %decided.event_id, approval = ?decided.approval, "Recorded decision");

        Ok(decided)
    }

    async fn find_event(&self, event_id: Uuid) -> EngineResult<Option<EventRecord>> {
        Ok(self.log.read().await.find(event_id).cloned())
    }

    async fn events_for_unit(&self, unit_id: Uuid, filter: &EventFilter) -> EngineResult<Vec<EventRecord>> {
        let log = self.log.read().await;
        Ok(log.select(|e| e.unit_id == unit_id && filter.matches(e)))
    }

    async fn events_for_extension(
        &self,
        extension_id: Uuid,
        filter: &EventFilter,
    ) -> EngineResult<Vec<EventRecord>> {
        let log = self.log.read().await;
        Ok(log.select(|e| e.extension_id() == Some(extension_id) && filter.matches(e)))
    }

    async fn events_for_site(&self, site_id: Uuid, filter: &EventFilter) -> EngineResult<Vec<EventRecord>> {
        let log = self.log.read().await;
        Ok(log.select(|e| e.kind.references_site(site_id) && filter.matches(e)))
    }

    async fn events_matching(&self, filter: &EventFilter) -> EngineResult<Vec<EventRecord>> {
        let log = self.log.read().await;
        Ok(log.select(|e| filter.matches(e)))
    }

    async fn stream_version(&self, stream: StreamId) -> EngineResult<u64> {
        Ok(self.log.read().await.version(stream))
    }
}
