// Copyright (c) 2025 - Cowboy AI, Inc.

//! NATS subject hierarchy for equipment allocation
//!
//! # Subject Pattern
//!
//! ```text
//! equipment.events.unit.{unit_id}.{event_type}    recorded events
//! equipment.approvals.unit.{unit_id}              approval decisions
//! {summary_prefix}.unit.{unit_id}                 unit summaries
//! {summary_prefix}.extension.{extension_id}       extension summaries
//! ```
//!
//! Per-unit subjects let the store read one unit's timeline with a single
//! filtered consumer (`equipment.events.unit.{unit_id}.>`).
//!
//! # Examples
//!
//! ```rust
//! use cim_equipment_allocation::subjects::{event_subject, unit_events_filter};
//! use cim_equipment_allocation::events::EventType;
//! use uuid::Uuid;
//!
//! let unit = Uuid::nil();
//! assert_eq!(
//!     event_subject(unit, EventType::DowntimeStarted),
//!     format!("equipment.events.unit.{}.downtime_started", unit),
//! );
//! assert_eq!(
//!     unit_events_filter(unit),
//!     format!("equipment.events.unit.{}.>", unit),
//! );
//! ```

use std::fmt;
use uuid::Uuid;

use crate::events::EventType;

/// Root namespace for all equipment subjects
pub const EQUIPMENT_ROOT: &str = "equipment";

/// Default prefix summaries are published under
pub const DEFAULT_SUMMARY_PREFIX: &str = "equipment.summary";

/// Message channels below the root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Recorded domain events
    Events,
    /// Approval decisions about recorded events
    Approvals,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Events => write!(f, "events"),
            Channel::Approvals => write!(f, "approvals"),
        }
    }
}

/// What a summary describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryKind {
    Unit,
    Extension,
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryKind::Unit => write!(f, "unit"),
            SummaryKind::Extension => write!(f, "extension"),
        }
    }
}

/// Subject an event about a unit is recorded on
pub fn event_subject(unit_id: Uuid, event_type: EventType) -> String {
    format!("{}.{}.unit.{}.{}", EQUIPMENT_ROOT, Channel::Events, unit_id, event_type)
}

/// Every event recorded for one unit
pub fn unit_events_filter(unit_id: Uuid) -> String {
    format!("{}.{}.unit.{}.>", EQUIPMENT_ROOT, Channel::Events, unit_id)
}

/// Subject approval decisions for a unit's events go to
pub fn approval_subject(unit_id: Uuid) -> String {
    format!("{}.{}.unit.{}", EQUIPMENT_ROOT, Channel::Approvals, unit_id)
}

/// Wildcard for a whole channel: `equipment.{channel}.>`
pub fn channel_wildcard(channel: Channel) -> String {
    format!("{}.{}.>", EQUIPMENT_ROOT, channel)
}

/// Subjects the allocation stream must capture
pub fn stream_subjects() -> Vec<String> {
    vec![
        channel_wildcard(Channel::Events),
        channel_wildcard(Channel::Approvals),
    ]
}

/// Subject a summary is published on
pub fn summary_subject(prefix: &str, kind: SummaryKind, id: Uuid) -> String {
    format!("{}.{}.{}", prefix.trim_end_matches('.'), kind, id)
}

/// Unit id carried by an event or approval subject
pub fn unit_id_from_subject(subject: &str) -> Option<Uuid> {
    let mut parts = subject.split('.');
    if parts.next()? != EQUIPMENT_ROOT {
        return None;
    }
    parts.next()?;
    if parts.next()? != "unit" {
        return None;
    }
    parts.next()?.parse().ok()
}
