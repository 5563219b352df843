// Copyright (c) 2025 - Cowboy AI, Inc.
//! Validation Gate - Pre-conditions for Accepting Events
//!
//! Before an event is accepted or approved it is checked against the state
//! the unit (and, for accessory events, the extension) is in on the event's
//! own day. All functions are pure; callers fetch history and run the
//! reducers first.
//!
//! # Rules
//!
//! | Event                         | Rejected when                                   |
//! |-------------------------------|-------------------------------------------------|
//! | allocation request / confirm  | no site named                                   |
//! | allocation start              | unit already allocated                          |
//! | allocation end                | unit not allocated, or allocated elsewhere      |
//! | downtime start                | unit not allocated, or already down             |
//! | downtime end                  | unit not down                                   |
//! | extension attach              | extension held by another unit, or by this one  |
//! | extension detach              | extension not held by this unit                 |
//! | transport start               | unallocated unit with no site, or moving        |
//! | transport arrival             | unallocated unit not in transit                 |
//! | refueling / material in-out   | unit has no current site                        |

use uuid::Uuid;

use crate::aggregate::equipment_state::EquipmentState;
use crate::aggregate::extension_state::ExtensionState;
use crate::events::{AllocationEventKind, EventRecord};

/// Validation result with detailed error information
pub type ValidationResult = Result<(), ValidationError>;

/// Business-rule violation, rendered directly to users
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unit is already allocated (site {site_id:?})")]
    AlreadyAllocated { site_id: Option<Uuid> },

    #[error("Unit is not allocated")]
    NotAllocated,

    #[error("Unit is allocated at site {current_site_id:?}, not {requested_site_id}")]
    AllocatedElsewhere {
        current_site_id: Option<Uuid>,
        requested_site_id: Uuid,
    },

    #[error("Downtime can only start while the unit is allocated")]
    DowntimeRequiresAllocation,

    #[error("Unit is already in downtime (event {downtime_event_id:?})")]
    AlreadyInDowntime { downtime_event_id: Option<Uuid> },

    #[error("Unit is not in downtime")]
    NotInDowntime,

    #[error("Extension {extension_id} is held by unit {holder_unit_id}")]
    ExtensionHeldElsewhere {
        extension_id: Uuid,
        holder_unit_id: Uuid,
    },

    #[error("Extension {extension_id} is already attached to this unit")]
    ExtensionAlreadyAttached { extension_id: Uuid },

    #[error("Extension {extension_id} is not attached to unit {unit_id}")]
    ExtensionNotHeld { extension_id: Uuid, unit_id: Uuid },

    #[error("Unit has no current site")]
    NoCurrentSite,

    #[error("A site is required")]
    MissingSite,

    #[error("Unit is already in transit")]
    AlreadyInTransit,

    #[error("Unit is not in transit")]
    NotInTransit,

    #[error("Event {event_id} was already {status}")]
    AlreadyDecided { event_id: Uuid, status: String },

    #[error("Correction must address an event of the same unit")]
    CorrectionTargetMismatch { corrected_event_id: Uuid },
}

/// Check a candidate event against the unit's (and extension's) state
///
/// `extension` is the state of the extension the candidate names, if any;
/// `None` is treated as an extension with no history.
pub fn validate_event(
    candidate: &EventRecord,
    unit: &EquipmentState,
    extension: Option<&ExtensionState>,
) -> ValidationResult {
    use AllocationEventKind::*;

    match &candidate.kind {
        AllocationRequested { site_id, .. } | AllocationConfirmed { site_id, .. } => {
            validate_site_named(*site_id)
        }
        AllocationStarted { .. } => validate_allocation_start(unit),
        AllocationEnded { site_id } => validate_allocation_end(unit, *site_id),
        DowntimeStarted { .. } => validate_downtime_start(unit),
        DowntimeEnded { .. } => validate_downtime_end(unit),
        ExtensionAttached { extension_id, .. } => {
            validate_extension_attach(candidate.unit_id, *extension_id, extension)
        }
        ExtensionDetached { extension_id } => {
            validate_extension_detach(candidate.unit_id, *extension_id, extension)
        }
        TransportStarted { .. } => validate_transport_start(unit),
        TransportArrived { .. } => validate_transport_arrival(unit),
        Refueled { .. } | MaterialEntered { .. } | MaterialExited { .. } => {
            validate_has_site(unit)
        }
    }
}

/// A correction must name an existing event of the same unit
pub fn validate_correction_target(candidate: &EventRecord, target: Option<&EventRecord>) -> ValidationResult {
    let Some(corrected_event_id) = candidate.corrects_event_id else {
        return Ok(());
    };
    match target {
        Some(original)
            if original.event_id == corrected_event_id && original.unit_id == candidate.unit_id =>
        {
            Ok(())
        }
        _ => Err(ValidationError::CorrectionTargetMismatch { corrected_event_id }),
    }
}

pub fn validate_site_named(site_id: Option<Uuid>) -> ValidationResult {
    site_id.map(|_| ()).ok_or(ValidationError::MissingSite)
}

pub fn validate_allocation_start(unit: &EquipmentState) -> ValidationResult {
    if unit.has_open_allocation() {
        return Err(ValidationError::AlreadyAllocated {
            site_id: unit.current_site_id,
        });
    }
    Ok(())
}

pub fn validate_allocation_end(unit: &EquipmentState, site_id: Uuid) -> ValidationResult {
    if !unit.has_open_allocation() {
        return Err(ValidationError::NotAllocated);
    }
    if unit.current_site_id != Some(site_id) {
        return Err(ValidationError::AllocatedElsewhere {
            current_site_id: unit.current_site_id,
            requested_site_id: site_id,
        });
    }
    Ok(())
}

pub fn validate_downtime_start(unit: &EquipmentState) -> ValidationResult {
    if !unit.has_open_allocation() {
        return Err(ValidationError::DowntimeRequiresAllocation);
    }
    if unit.in_downtime {
        return Err(ValidationError::AlreadyInDowntime {
            downtime_event_id: unit.downtime_event_id,
        });
    }
    Ok(())
}

pub fn validate_downtime_end(unit: &EquipmentState) -> ValidationResult {
    if !unit.in_downtime {
        return Err(ValidationError::NotInDowntime);
    }
    Ok(())
}

pub fn validate_extension_attach(
    unit_id: Uuid,
    extension_id: Uuid,
    extension: Option<&ExtensionState>,
) -> ValidationResult {
    match extension.and_then(|e| e.holder_unit_id) {
        Some(holder) if holder == unit_id => {
            Err(ValidationError::ExtensionAlreadyAttached { extension_id })
        }
        Some(holder_unit_id) => Err(ValidationError::ExtensionHeldElsewhere {
            extension_id,
            holder_unit_id,
        }),
        None => Ok(()),
    }
}

pub fn validate_extension_detach(
    unit_id: Uuid,
    extension_id: Uuid,
    extension: Option<&ExtensionState>,
) -> ValidationResult {
    if extension.map(|e| e.is_held_by(unit_id)).unwrap_or(false) {
        return Ok(());
    }
    Err(ValidationError::ExtensionNotHeld {
        extension_id,
        unit_id,
    })
}

/// Allocated units may always move; others need a site to leave from
pub fn validate_transport_start(unit: &EquipmentState) -> ValidationResult {
    if unit.has_open_allocation() {
        return Ok(());
    }
    if unit.transit.is_some() {
        return Err(ValidationError::AlreadyInTransit);
    }
    validate_has_site(unit)
}

pub fn validate_transport_arrival(unit: &EquipmentState) -> ValidationResult {
    if unit.has_open_allocation() || unit.transit.is_some() {
        return Ok(());
    }
    Err(ValidationError::NotInTransit)
}

pub fn validate_has_site(unit: &EquipmentState) -> ValidationResult {
    if unit.current_site_id.is_none() {
        return Err(ValidationError::NoCurrentSite);
    }
    Ok(())
}
