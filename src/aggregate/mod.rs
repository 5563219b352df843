// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Functional Reducers
//!
//! Derived state is never stored as the source of truth. It is rebuilt by
//! folding a replay-ordered event history up to a reference day:
//!
//! ```text
//! [EventRecord] + as_of → EquipmentState
//! [EventRecord] + as_of → ExtensionState
//! [EventRecord] + period → CostEstimate
//! ```
//!
//! # Fold Pattern
//!
//! ```rust,ignore
//! let events = replay_set(store.events_for_unit(unit_id).await?);
//! let state = compute_state(unit_id, &events, as_of);
//! ```
//!
//! All functions here are pure: no I/O, no clock. The reference instant is
//! always a parameter, which is what makes time travel and deterministic
//! tests possible.

pub mod billing;
pub mod equipment_state;
pub mod extension_state;

pub use billing::{estimate_cost, CostEstimate};
pub use equipment_state::{
    apply_event, compute_state, AllocationStatus, AttachedExtension, EquipmentState, TransitLeg,
};
pub use extension_state::{apply_extension_event, compute_extension_state, ExtensionState};
