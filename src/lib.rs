// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event-derived equipment allocation for the Composable Information Machine
//!
//! Where a unit is, whether it is down, which extensions it carries and what
//! it cost are never stored as mutable fields. They are folded from an
//! append-only log of approved events as of an explicit reference time.
//!
//! - [`aggregate`]: pure reducers and the financial day calculator
//! - [`domain`]: registry value objects, calendar rules and the validation gate
//! - [`events`]: the event record and its closed set of kinds
//! - [`event_store`]: append-only log (in memory or NATS JetStream)
//! - [`projection`]: live view, site history and summary synchronization
//! - [`service`]: the query surface and the approval workflow

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod errors;
pub mod event_store;
pub mod events;
pub mod jetstream;
pub mod nats;
pub mod projection;
pub mod registry;
pub mod service;
pub mod subjects;

// Re-export commonly used types
pub use aggregate::{AllocationStatus, CostEstimate, EquipmentState, ExtensionState};
pub use config::EngineConfig;
pub use errors::{EngineError, EngineResult, EntityKind};
pub use event_store::{EventFilter, EventStore, InMemoryEventStore, NatsEventStore, StreamId, VersionCheck};
pub use events::{AllocationEventKind, ApprovalDecision, ApprovalStatus, EventRecord, EventType};
pub use nats::{NatsClient, NatsConfig};
pub use registry::{EquipmentRegistry, InMemoryRegistry};
pub use service::{AllocationService, EventSourcedAllocationService, SyncTarget};
