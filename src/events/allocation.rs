// Copyright (c) 2025 - Cowboy AI, Inc.
//! Equipment Allocation Domain Events
//!
//! Every fact about a unit's whereabouts and commercial status is an
//! [`EventRecord`]: an envelope (identity, dates, approval, authorship) around
//! an [`AllocationEventKind`] that carries only the fields meaningful to that
//! kind of occurrence.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::domain::calendar::day_of;

/// Approval state of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

/// Where a unit physically stands, captured when it lands somewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LocationDetail {
    /// Site title as known when the event was recorded
    pub site_title: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Discriminant of [`AllocationEventKind`], used for filtering and subjects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AllocationRequested,
    AllocationConfirmed,
    AllocationStarted,
    AllocationEnded,
    DowntimeStarted,
    DowntimeEnded,
    ExtensionAttached,
    ExtensionDetached,
    TransportStarted,
    TransportArrived,
    Refueled,
    MaterialEntered,
    MaterialExited,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AllocationRequested => "allocation_requested",
            EventType::AllocationConfirmed => "allocation_confirmed",
            EventType::AllocationStarted => "allocation_started",
            EventType::AllocationEnded => "allocation_ended",
            EventType::DowntimeStarted => "downtime_started",
            EventType::DowntimeEnded => "downtime_ended",
            EventType::ExtensionAttached => "extension_attached",
            EventType::ExtensionDetached => "extension_detached",
            EventType::TransportStarted => "transport_started",
            EventType::TransportArrived => "transport_arrived",
            EventType::Refueled => "refueled",
            EventType::MaterialEntered => "material_entered",
            EventType::MaterialExited => "material_exited",
        }
    }

    /// Event types the allocation projections fold over
    pub fn derivation_types() -> &'static [EventType] {
        &[
            EventType::AllocationStarted,
            EventType::AllocationEnded,
            EventType::DowntimeStarted,
            EventType::DowntimeEnded,
            EventType::ExtensionAttached,
            EventType::ExtensionDetached,
            EventType::TransportStarted,
            EventType::TransportArrived,
        ]
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationEventKind {
    /// A site asked for the unit; inert until started
    AllocationRequested {
        site_id: Option<Uuid>,
        supplier_id: Option<Uuid>,
        end_date: Option<DateTime<Utc>>,
    },

    /// Supplier or fleet desk confirmed a request
    AllocationConfirmed {
        site_id: Option<Uuid>,
        supplier_id: Option<Uuid>,
        end_date: Option<DateTime<Utc>>,
    },

    /// Unit went to work at a site
    AllocationStarted {
        site_id: Uuid,
        supplier_id: Option<Uuid>,
        /// Planned commercial end of the allocation
        end_date: Option<DateTime<Utc>>,
        location: Option<LocationDetail>,
    },

    /// Unit was released by a site
    AllocationEnded { site_id: Uuid },

    /// Unit broke down or went in for maintenance
    DowntimeStarted { reason: String },

    /// Unit is working again
    DowntimeEnded { resolution: Option<String> },

    /// Accessory was mounted on the unit
    ExtensionAttached {
        extension_id: Uuid,
        site_id: Option<Uuid>,
        end_date: Option<DateTime<Utc>>,
    },

    /// Accessory was taken off the unit
    ExtensionDetached { extension_id: Uuid },

    /// Unit left a site for another one
    TransportStarted {
        origin_site_id: Option<Uuid>,
        destination_site_id: Uuid,
    },

    /// Unit reached a site
    TransportArrived {
        site_id: Uuid,
        location: Option<LocationDetail>,
    },

    /// Fuel was delivered to the unit
    Refueled { site_id: Option<Uuid>, liters: f64 },

    /// Material was loaded into the unit
    MaterialEntered {
        site_id: Option<Uuid>,
        description: String,
        quantity: Option<f64>,
    },

    /// Material was unloaded from the unit
    MaterialExited {
        site_id: Option<Uuid>,
        description: String,
        quantity: Option<f64>,
    },
}

impl AllocationEventKind {
    pub fn event_type(&self) -> EventType {
        use AllocationEventKind::*;

        match self {
            AllocationRequested { .. } => EventType::AllocationRequested,
            AllocationConfirmed { .. } => EventType::AllocationConfirmed,
            AllocationStarted { .. } => EventType::AllocationStarted,
            AllocationEnded { .. } => EventType::AllocationEnded,
            DowntimeStarted { .. } => EventType::DowntimeStarted,
            DowntimeEnded { .. } => EventType::DowntimeEnded,
            ExtensionAttached { .. } => EventType::ExtensionAttached,
            ExtensionDetached { .. } => EventType::ExtensionDetached,
            TransportStarted { .. } => EventType::TransportStarted,
            TransportArrived { .. } => EventType::TransportArrived,
            Refueled { .. } => EventType::Refueled,
            MaterialEntered { .. } => EventType::MaterialEntered,
            MaterialExited { .. } => EventType::MaterialExited,
        }
    }

    /// Site the event happened at (the origin, for a departure)
    pub fn site_id(&self) -> Option<Uuid> {
        use AllocationEventKind::*;

        match self {
            AllocationRequested { site_id, .. }
            | AllocationConfirmed { site_id, .. }
            | ExtensionAttached { site_id, .. }
            | Refueled { site_id, .. }
            | MaterialEntered { site_id, .. }
            | MaterialExited { site_id, .. } => *site_id,
            AllocationStarted { site_id, .. }
            | AllocationEnded { site_id }
            | TransportArrived { site_id, .. } => Some(*site_id),
            TransportStarted { origin_site_id, .. } => *origin_site_id,
            DowntimeStarted { .. } | DowntimeEnded { .. } | ExtensionDetached { .. } => None,
        }
    }

    pub fn extension_id(&self) -> Option<Uuid> {
        match self {
            AllocationEventKind::ExtensionAttached { extension_id, .. }
            | AllocationEventKind::ExtensionDetached { extension_id } => Some(*extension_id),
            _ => None,
        }
    }

    pub fn supplier_id(&self) -> Option<Uuid> {
        match self {
            AllocationEventKind::AllocationRequested { supplier_id, .. }
            | AllocationEventKind::AllocationConfirmed { supplier_id, .. }
            | AllocationEventKind::AllocationStarted { supplier_id, .. } => *supplier_id,
            _ => None,
        }
    }

    /// Planned commercial end carried by the event
    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        match self {
            AllocationEventKind::AllocationRequested { end_date, .. }
            | AllocationEventKind::AllocationConfirmed { end_date, .. }
            | AllocationEventKind::AllocationStarted { end_date, .. }
            | AllocationEventKind::ExtensionAttached { end_date, .. } => *end_date,
            _ => None,
        }
    }

    pub fn location(&self) -> Option<&LocationDetail> {
        match self {
            AllocationEventKind::AllocationStarted { location, .. }
            | AllocationEventKind::TransportArrived { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// Whether the event names the site anywhere, destination included
    pub fn references_site(&self, site: Uuid) -> bool {
        if self.site_id() == Some(site) {
            return true;
        }
        matches!(
            self,
            AllocationEventKind::TransportStarted { destination_site_id, .. }
                if *destination_site_id == site
        )
    }

    /// Events that only make sense while the unit stands somewhere
    pub fn requires_site(&self) -> bool {
        matches!(
            self,
            AllocationEventKind::Refueled { .. }
                | AllocationEventKind::MaterialEntered { .. }
                | AllocationEventKind::MaterialExited { .. }
        )
    }

    /// Events that open something (an allocation, a downtime, a hold on an
    /// extension) that later history may still have open
    pub fn opens_span(&self) -> bool {
        matches!(
            self,
            AllocationEventKind::AllocationStarted { .. }
                | AllocationEventKind::DowntimeStarted { .. }
                | AllocationEventKind::ExtensionAttached { .. }
        )
    }
}

/// Immutable record of one domain occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event version for schema evolution
    pub event_version: u32,

    /// Unique event identifier (UUID v7, so creation-ordered)
    pub event_id: Uuid,

    /// Unit the event is about
    pub unit_id: Uuid,

    /// When the occurrence takes effect
    pub event_date: DateTime<Utc>,

    /// When the record was written; breaks same-day ties
    pub recorded_at: DateTime<Utc>,

    pub approval: ApprovalStatus,
    pub created_by: Option<String>,
    pub approved_by: Option<String>,

    /// Earlier event this one replaces
    pub corrects_event_id: Option<Uuid>,

    pub kind: AllocationEventKind,
}

impl EventRecord {
    pub const CURRENT_VERSION: u32 = 1;

    /// New pending record
    pub fn new(
        event_id: Uuid,
        unit_id: Uuid,
        event_date: DateTime<Utc>,
        recorded_at: DateTime<Utc>,
        kind: AllocationEventKind,
    ) -> Self {
        Self {
            event_version: Self::CURRENT_VERSION,
            event_id,
            unit_id,
            event_date,
            recorded_at,
            approval: ApprovalStatus::Pending,
            created_by: None,
            approved_by: None,
            corrects_event_id: None,
            kind,
        }
    }

    pub fn created_by(mut self, author: impl Into<String>) -> Self {
        self.created_by = Some(author.into());
        self
    }

    pub fn approved_by(mut self, approver: impl Into<String>) -> Self {
        self.approval = ApprovalStatus::Approved;
        self.approved_by = Some(approver.into());
        self
    }

    pub fn correcting(mut self, event_id: Uuid) -> Self {
        self.corrects_event_id = Some(event_id);
        self
    }

    /// Record with a decision about it applied
    pub fn decided(mut self, decision: &ApprovalDecision) -> Self {
        self.approval = decision.status;
        self.approved_by = match decision.status {
            ApprovalStatus::Approved => decision.decided_by.clone(),
            _ => None,
        };
        self
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Calendar day the event takes effect on
    pub fn day(&self) -> NaiveDate {
        day_of(self.event_date)
    }

    pub fn site_id(&self) -> Option<Uuid> {
        self.kind.site_id()
    }

    pub fn extension_id(&self) -> Option<Uuid> {
        self.kind.extension_id()
    }

    pub fn is_approved(&self) -> bool {
        self.approval == ApprovalStatus::Approved
    }

    /// Whether folding this event can change derived state
    ///
    /// Requests never do, whatever their approval.
    pub fn participates(&self) -> bool {
        self.is_approved() && self.event_type() != EventType::AllocationRequested
    }

    /// Replay order: effective date, then creation order
    pub fn replay_key(&self) -> (DateTime<Utc>, DateTime<Utc>, Uuid) {
        (self.event_date, self.recorded_at, self.event_id)
    }
}

/// Approval or rejection of a recorded event, stored as its own fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub event_id: Uuid,
    /// Unit the decided event is about
    pub unit_id: Uuid,
    pub status: ApprovalStatus,
    pub decided_by: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl ApprovalDecision {
    pub fn approve(event: &EventRecord, by: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            event_id: event.event_id,
            unit_id: event.unit_id,
            status: ApprovalStatus::Approved,
            decided_by: Some(by.into()),
            decided_at: at,
        }
    }

    pub fn reject(event: &EventRecord, by: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: ApprovalStatus::Rejected,
            ..Self::approve(event, by, at)
        }
    }
}

/// Sort events into replay order in place
pub fn sort_for_replay(events: &mut [EventRecord]) {
    events.sort_by_key(|e| e.replay_key());
}

/// Approved events in replay order, with corrected events dropped
///
/// An approved event carrying `corrects_event_id` supersedes the event it
/// names; only the correction is folded.
pub fn replay_set(events: impl IntoIterator<Item = EventRecord>) -> Vec<EventRecord> {
    let approved: Vec<EventRecord> = events.into_iter().filter(|e| e.is_approved()).collect();
    let superseded: HashSet<Uuid> = approved.iter().filter_map(|e| e.corrects_event_id).collect();

    let mut replay: Vec<EventRecord> = approved
        .into_iter()
        .filter(|e| !superseded.contains(&e.event_id))
        .collect();
    sort_for_replay(&mut replay);
    replay
}
