// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service Layer for Equipment Allocation
//!
//! The application service answers every question about where equipment is,
//! and runs the approval workflow that turns submitted events into facts.
//!
//! # Architecture
//!
//! ```text
//! Client Request
//!     ↓
//! Service Layer (this module)
//!     ↓
//! Validation Gate → Event Store (pending record, approval decision)
//!     ↓
//! Reducers (pure, as of a reference time)
//!     ↓
//! Summary Writer (best effort after approval)
//! ```
//!
//! # Design Principles
//!
//! 1. **Log is the authority**: every answer is derived from approved events
//! 2. **Explicit time**: every query takes the reference instant it answers for
//! 3. **Pure core**: services fetch, reducers fold, writers persist
//! 4. **Async by Default**: All I/O is asynchronous
//!
//! # Example
//!
//! ```rust,ignore
//! use cim_equipment_allocation::service::{AllocationService, EventSourcedAllocationService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = EventSourcedAllocationService::new(store, registry, writer);
//!
//!     let pending = service.submit_event(event).await?;
//!     service.approve_event(pending.event_id, "site-lead", Utc::now()).await?;
//!
//!     let state = service.compute_state(unit_id, Utc::now()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod allocation;

pub use allocation::{AllocationService, EventSourcedAllocationService, SyncTarget};
