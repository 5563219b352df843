// Copyright (c) 2025 - Cowboy AI, Inc.
//! Equipment Domain Events
//!
//! The event log is the only authority on where a unit is and what it is
//! doing. Everything else (derived state, projections, summaries) is folded
//! from it and can be rebuilt at any time.
//!
//! # Event Flow
//!
//! ```text
//! Candidate → Validation Gate → EventStore (pending)
//!                                   ↓ approve
//!                           Reducers → Projections / Summaries
//! ```
//!
//! # Ordering
//!
//! Events replay by `event_date`, then by creation order (`recorded_at`, then
//! the time-ordered `event_id`) so that same-day events fold
//! deterministically.
//!
//! # Module Organization
//!
//! - [`allocation`] - Event envelope and the closed set of event kinds

pub mod allocation;

pub use allocation::{
    replay_set, sort_for_replay, AllocationEventKind, ApprovalDecision, ApprovalStatus,
    EventRecord, EventType, LocationDetail,
};
