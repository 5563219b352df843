// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Store Abstraction
//!
//! The event log is the only persisted authority. Stores append event records
//! and approval decisions, and answer the queries the reducers need.
//!
//! # Architecture
//!
//! ```text
//! submit → EventStore::append (pending)
//! approve → EventStore::record_decision ──> reducers ──> summaries
//!                 ↑
//!        per-stream version check
//! ```
//!
//! # Event Store Requirements
//!
//! 1. **Append-Only**: records are never rewritten; approval is a separate fact
//! 2. **Ordered**: queries return events by `event_date`, then creation order
//! 3. **Versioned**: every unit and extension stream has a version used for
//!    optimistic concurrency
//!
//! Stores return raw records with their latest approval applied. Dropping
//! unapproved and corrected events is the reader's job
//! ([`crate::events::replay_set`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::EngineResult;
use crate::events::{ApprovalDecision, ApprovalStatus, EventRecord, EventType};

pub mod memory;
pub mod nats;

pub use memory::InMemoryEventStore;
pub use nats::NatsEventStore;

/// Stream an event is addressed to
///
/// Every event belongs to its unit's stream; attach/detach events also belong
/// to the extension's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "stream", content = "id", rename_all = "snake_case")]
pub enum StreamId {
    Unit(Uuid),
    Extension(Uuid),
}

impl StreamId {
    /// Streams an event is addressed to
    pub fn of(event: &EventRecord) -> Vec<StreamId> {
        let mut streams = vec![StreamId::Unit(event.unit_id)];
        if let Some(extension_id) = event.extension_id() {
            streams.push(StreamId::Extension(extension_id));
        }
        streams
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamId::Unit(id) => write!(f, "unit {}", id),
            StreamId::Extension(id) => write!(f, "extension {}", id),
        }
    }
}

/// Optimistic concurrency guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionCheck {
    pub stream: StreamId,
    pub expected: u64,
}

impl VersionCheck {
    pub fn new(stream: StreamId, expected: u64) -> Self {
        Self { stream, expected }
    }
}

/// Query filter on approval status and event type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub approval: Option<ApprovalStatus>,
    pub types: Option<Vec<EventType>>,
}

impl EventFilter {
    /// Every event
    pub fn all() -> Self {
        Self::default()
    }

    /// Approved events only
    pub fn approved() -> Self {
        Self {
            approval: Some(ApprovalStatus::Approved),
            types: None,
        }
    }

    /// Approved events of the types the allocation projections fold over
    pub fn derivation() -> Self {
        Self::approved().with_types(EventType::derivation_types())
    }

    pub fn with_types(mut self, types: &[EventType]) -> Self {
        self.types = Some(types.to_vec());
        self
    }

    pub fn matches(&self, event: &EventRecord) -> bool {
        let approval_ok = self.approval.map(|a| a == event.approval).unwrap_or(true);
        let type_ok = self
            .types
            .as_ref()
            .map(|types| types.contains(&event.event_type()))
            .unwrap_or(true);
        approval_ok && type_ok
    }
}

/// Event Store trait for persisting and retrieving allocation events
///
/// All queries return events in replay order.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append a new record
    ///
    /// # Returns
    ///
    /// The unit stream's version after appending
    ///
    /// # Errors
    ///
    /// - `Concurrency` if `check` does not match the stream's version, or the
    ///   event id is already taken
    /// - `Store` if writing to storage fails
    async fn append(&self, event: EventRecord, check: Option<VersionCheck>) -> EngineResult<u64>;

    /// Record an approval decision and return the decided record
    ///
    /// # Errors
    ///
    /// - `NotFound` if the event does not exist
    /// - `Concurrency` if `check` does not match the stream's version
    async fn record_decision(
        &self,
        decision: ApprovalDecision,
        check: Option<VersionCheck>,
    ) -> EngineResult<EventRecord>;

    async fn find_event(&self, event_id: Uuid) -> EngineResult<Option<EventRecord>>;

    async fn events_for_unit(&self, unit_id: Uuid, filter: &EventFilter) -> EngineResult<Vec<EventRecord>>;

    /// Events naming the extension, whichever unit they were recorded for
    async fn events_for_extension(
        &self,
        extension_id: Uuid,
        filter: &EventFilter,
    ) -> EngineResult<Vec<EventRecord>>;

    /// Events naming the site, transport destinations included
    async fn events_for_site(&self, site_id: Uuid, filter: &EventFilter) -> EngineResult<Vec<EventRecord>>;

    async fn events_matching(&self, filter: &EventFilter) -> EngineResult<Vec<EventRecord>>;

    /// Number of facts (records and decisions) addressed to a stream
    async fn stream_version(&self, stream: StreamId) -> EngineResult<u64>;
}
