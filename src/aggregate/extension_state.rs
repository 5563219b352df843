// Copyright (c) 2025 - Cowboy AI, Inc.
//! Extension State Reducer
//!
//! Accessories live on their own timeline made of the attach/detach events
//! that name them, whichever unit those events were recorded against.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::equipment_state::AllocationStatus;
use crate::domain::calendar::day_of;
use crate::events::{AllocationEventKind, EventRecord};

/// Point-in-time state of one extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionState {
    pub extension_id: Uuid,

    /// Unit the extension is mounted on
    pub holder_unit_id: Option<Uuid>,

    /// Site named by the attach event
    pub site_id: Option<Uuid>,

    /// `Available`, `Allocated` or `Exceeded`
    pub status: AllocationStatus,

    pub attach_event_id: Option<Uuid>,
    pub attached_at: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    pub last_event_id: Option<Uuid>,
}

impl ExtensionState {
    pub fn empty(extension_id: Uuid) -> Self {
        Self {
            extension_id,
            holder_unit_id: None,
            site_id: None,
            status: AllocationStatus::Available,
            attach_event_id: None,
            attached_at: None,
            end_date: None,
            last_event_id: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.holder_unit_id.is_some()
    }

    pub fn is_held_by(&self, unit_id: Uuid) -> bool {
        self.holder_unit_id == Some(unit_id)
    }
}

/// Reconstruct an extension's state as of a reference instant
///
/// `events` must be in replay order; events naming other extensions are
/// skipped, so a whole unit history can be passed in.
pub fn compute_extension_state(
    extension_id: Uuid,
    events: &[EventRecord],
    as_of: DateTime<Utc>,
) -> ExtensionState {
    let as_of_day = day_of(as_of);
    let mut state = ExtensionState::empty(extension_id);

    for event in events {
        if event.day() > as_of_day {
            break;
        }
        if !event.participates() || event.extension_id() != Some(extension_id) {
            continue;
        }
        state = apply_extension_event(state, event);
    }

    mark_exceeded(state, as_of_day)
}

/// Apply one attach/detach event (pure function)
pub fn apply_extension_event(state: ExtensionState, event: &EventRecord) -> ExtensionState {
    match &event.kind {
        AllocationEventKind::ExtensionAttached {
            site_id, end_date, ..
        } => ExtensionState {
            holder_unit_id: Some(event.unit_id),
            site_id: *site_id,
            status: AllocationStatus::Allocated,
            attach_event_id: Some(event.event_id),
            attached_at: Some(event.event_date),
            end_date: *end_date,
            last_event_id: Some(event.event_id),
            ..state
        },

        // A detach recorded against a unit that does not hold it changes nothing.
        AllocationEventKind::ExtensionDetached { .. } if state.is_held_by(event.unit_id) => {
            ExtensionState {
                last_event_id: Some(event.event_id),
                ..ExtensionState::empty(state.extension_id)
            }
        }

        _ => state,
    }
}

fn mark_exceeded(state: ExtensionState, as_of_day: NaiveDate) -> ExtensionState {
    match state.end_date {
        Some(end) if state.status == AllocationStatus::Allocated && as_of_day > day_of(end) => {
            ExtensionState {
                status: AllocationStatus::Exceeded,
                ..state
            }
        }
        _ => state,
    }
}
