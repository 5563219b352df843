// Copyright (c) 2025 - Cowboy AI, Inc.
//! Equipment State Reducer
//!
//! Folds a unit's ordered event history into the state it is in on a given
//! reference day.
//!
//! # Day Semantics
//!
//! ```text
//! event day  > reference day   → not folded, iteration stops
//! allocation end on ref. day   → still allocated (last day is occupied)
//! allocation end before ref.   → available, site released
//! downtime end on ref. day     → still in downtime
//! downtime end before ref.     → back to allocated / available
//! ```
//!
//! After the fold an ongoing allocation whose planned end lies before the
//! reference day reads as [`AllocationStatus::Exceeded`]. That status is never
//! stored, only derived.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::calendar::day_of;
use crate::events::{AllocationEventKind, EventRecord, LocationDetail};

/// Derived operational status of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    /// No open allocation
    Available,
    /// Working at a site
    Allocated,
    /// Allocated but down
    Maintenance,
    /// Moving between sites; the allocation is untouched
    InTransit,
    /// Still allocated after its planned end
    Exceeded,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Available => "available",
            AllocationStatus::Allocated => "allocated",
            AllocationStatus::Maintenance => "maintenance",
            AllocationStatus::InTransit => "in_transit",
            AllocationStatus::Exceeded => "exceeded",
        }
    }
}

/// Accessory currently mounted on a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedExtension {
    pub extension_id: Uuid,
    /// Attach event that linked it
    pub event_id: Uuid,
    pub attached_at: DateTime<Utc>,
}

/// Journey between two sites
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitLeg {
    pub origin_site_id: Option<Uuid>,
    pub destination_site_id: Uuid,
    /// Departure event
    pub event_id: Uuid,
    pub departed_at: DateTime<Utc>,
}

/// Point-in-time state of one unit, derived from its events
///
/// # Reconstruction
///
/// ```rust,ignore
/// let state = compute_state(unit_id, &events, as_of);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentState {
    pub unit_id: Uuid,

    /// Physical site; the origin while in transit
    pub current_site_id: Option<Uuid>,

    pub status: AllocationStatus,

    pub in_downtime: bool,
    pub downtime_event_id: Option<Uuid>,

    /// Start event of the open allocation
    pub allocation_event_id: Option<Uuid>,
    /// Site the open allocation was contracted for
    pub allocation_site_id: Option<Uuid>,
    pub allocation_start: Option<DateTime<Utc>>,
    /// Planned commercial end of the open allocation
    pub end_date: Option<DateTime<Utc>>,

    pub attached_extensions: Vec<AttachedExtension>,

    pub transit: Option<TransitLeg>,

    /// Last known physical location
    pub location: Option<LocationDetail>,

    /// Last event folded into this state
    pub last_event_id: Option<Uuid>,
}

impl EquipmentState {
    /// State of a unit with no history
    pub fn empty(unit_id: Uuid) -> Self {
        Self {
            unit_id,
            current_site_id: None,
            status: AllocationStatus::Available,
            in_downtime: false,
            downtime_event_id: None,
            allocation_event_id: None,
            allocation_site_id: None,
            allocation_start: None,
            end_date: None,
            attached_extensions: Vec::new(),
            transit: None,
            location: None,
            last_event_id: None,
        }
    }

    pub fn has_open_allocation(&self) -> bool {
        self.allocation_event_id.is_some()
    }

    pub fn is_in_transit(&self) -> bool {
        self.status == AllocationStatus::InTransit && self.transit.is_some()
    }

    pub fn holds_extension(&self, extension_id: Uuid) -> bool {
        self.attached_extensions
            .iter()
            .any(|a| a.extension_id == extension_id)
    }

    /// Whether the unit physically counts as present at a site right now
    ///
    /// A unit in transit is only present at its destination; the origin sees
    /// it as moved.
    pub fn is_present_at(&self, site_id: Uuid) -> bool {
        if let (AllocationStatus::InTransit, Some(leg)) = (self.status, &self.transit) {
            return leg.destination_site_id == site_id;
        }
        self.current_site_id == Some(site_id) && self.status != AllocationStatus::Available
    }

    /// Status the unit falls back to once transit or downtime is over
    fn settled_status(&self) -> AllocationStatus {
        if self.transit.is_some() {
            AllocationStatus::InTransit
        } else if !self.has_open_allocation() {
            AllocationStatus::Available
        } else if self.in_downtime {
            AllocationStatus::Maintenance
        } else {
            AllocationStatus::Allocated
        }
    }
}

/// Reconstruct a unit's state as of a reference instant
///
/// `events` must be in replay order (see [`crate::events::replay_set`]).
/// Events that are not approved are skipped; events on a later day than
/// `as_of` stop the fold.
pub fn compute_state(unit_id: Uuid, events: &[EventRecord], as_of: DateTime<Utc>) -> EquipmentState {
    let as_of_day = day_of(as_of);
    let mut state = EquipmentState::empty(unit_id);

    for event in events {
        if event.day() > as_of_day {
            break;
        }
        if !event.participates() {
            continue;
        }
        state = apply_event(state, event, as_of_day);
    }

    mark_exceeded(state, as_of_day)
}

/// Apply one event to a state (pure function)
///
/// Never fails: history that does not line up (an end for a site the unit is
/// not at, a second downtime start) is ignored rather than rejected.
pub fn apply_event(state: EquipmentState, event: &EventRecord, as_of_day: NaiveDate) -> EquipmentState {
    use AllocationEventKind::*;

    let state = EquipmentState {
        last_event_id: Some(event.event_id),
        ..state
    };
    let takes_effect = event.day() < as_of_day;

    match &event.kind {
        AllocationStarted {
            site_id,
            end_date,
            location,
            ..
        } => {
            let started = EquipmentState {
                current_site_id: Some(*site_id),
                allocation_event_id: Some(event.event_id),
                allocation_site_id: Some(*site_id),
                allocation_start: Some(event.event_date),
                end_date: *end_date,
                transit: None,
                location: location.clone().or(state.location.clone()),
                ..state
            };
            EquipmentState {
                status: started.settled_status(),
                ..started
            }
        }

        AllocationEnded { site_id } => {
            let matches_site = state.current_site_id == Some(*site_id);
            if !matches_site || !state.has_open_allocation() || !takes_effect {
                return state;
            }
            EquipmentState {
                current_site_id: None,
                status: AllocationStatus::Available,
                in_downtime: false,
                downtime_event_id: None,
                allocation_event_id: None,
                allocation_site_id: None,
                allocation_start: None,
                end_date: None,
                transit: None,
                ..state
            }
        }

        DowntimeStarted { .. } => {
            if !state.has_open_allocation() || state.in_downtime {
                return state;
            }
            let down = EquipmentState {
                in_downtime: true,
                downtime_event_id: Some(event.event_id),
                ..state
            };
            EquipmentState {
                status: down.settled_status(),
                ..down
            }
        }

        DowntimeEnded { .. } => {
            if !state.in_downtime || !takes_effect {
                return state;
            }
            let up = EquipmentState {
                in_downtime: false,
                downtime_event_id: None,
                ..state
            };
            EquipmentState {
                status: up.settled_status(),
                ..up
            }
        }

        ExtensionAttached { extension_id, .. } => {
            let mut attached_extensions: Vec<_> = state
                .attached_extensions
                .iter()
                .filter(|a| a.extension_id != *extension_id)
                .cloned()
                .collect();
            attached_extensions.push(AttachedExtension {
                extension_id: *extension_id,
                event_id: event.event_id,
                attached_at: event.event_date,
            });
            EquipmentState {
                attached_extensions,
                ..state
            }
        }

        ExtensionDetached { extension_id } => {
            let attached_extensions = state
                .attached_extensions
                .iter()
                .filter(|a| a.extension_id != *extension_id)
                .cloned()
                .collect();
            EquipmentState {
                attached_extensions,
                ..state
            }
        }

        TransportStarted {
            origin_site_id,
            destination_site_id,
        } => EquipmentState {
            status: AllocationStatus::InTransit,
            transit: Some(TransitLeg {
                origin_site_id: origin_site_id.or(state.current_site_id),
                destination_site_id: *destination_site_id,
                event_id: event.event_id,
                departed_at: event.event_date,
            }),
            ..state
        },

        TransportArrived { site_id, location } => {
            // The commercial term (allocation site, start, end_date) stays as is.
            let arrived = EquipmentState {
                current_site_id: Some(*site_id),
                transit: None,
                location: location.clone().or(state.location.clone()),
                ..state
            };
            EquipmentState {
                status: arrived.settled_status(),
                ..arrived
            }
        }

        AllocationRequested { .. }
        | AllocationConfirmed { .. }
        | Refueled { .. }
        | MaterialEntered { .. }
        | MaterialExited { .. } => state,
    }
}

fn mark_exceeded(state: EquipmentState, as_of_day: NaiveDate) -> EquipmentState {
    let overdue = state
        .end_date
        .map(|end| as_of_day > day_of(end))
        .unwrap_or(false);

    if state.status == AllocationStatus::Allocated && overdue {
        EquipmentState {
            status: AllocationStatus::Exceeded,
            ..state
        }
    } else {
        state
    }
}
