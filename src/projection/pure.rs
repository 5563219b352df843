// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Summary Projection
//!
//! The synchronization writer keeps a denormalized summary per unit and per
//! extension for cheap downstream reads. Deciding *what* to write is pure:
//!
//! ```text
//! (previous summary, derived state) → [SummaryEffect]
//! ```
//!
//! Effects are data; an executor (see [`super::executor`]) performs them.
//! A summary that already matches the derived state yields no write, which is
//! what makes re-running a sync with no new events a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::equipment_state::{AllocationStatus, EquipmentState};
use crate::aggregate::extension_state::ExtensionState;

/// Cached allocation fields of one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub unit_id: Uuid,
    pub status: AllocationStatus,
    pub current_site_id: Option<Uuid>,
    pub in_downtime: bool,
    pub downtime_event_id: Option<Uuid>,
    pub allocation_start: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub transit_destination_id: Option<Uuid>,
    pub attached_extension_ids: Vec<Uuid>,
    /// Last event folded into the summary
    pub derived_from: Option<Uuid>,
}

/// Cached allocation fields of one extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSummary {
    pub extension_id: Uuid,
    pub status: AllocationStatus,
    pub holder_unit_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub attached_at: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub derived_from: Option<Uuid>,
}

/// Log levels for logging effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

/// Side effects of a synchronization, returned as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SummaryEffect {
    /// Replace a unit's summary
    WriteUnit(UnitSummary),

    /// Replace an extension's summary
    WriteExtension(ExtensionSummary),

    /// Log a message
    Log { level: LogLevel, message: String },
}

impl UnitSummary {
    pub fn from_state(state: &EquipmentState) -> Self {
        Self {
            unit_id: state.unit_id,
            status: state.status,
            current_site_id: state.current_site_id,
            in_downtime: state.in_downtime,
            downtime_event_id: state.downtime_event_id,
            allocation_start: state.allocation_start,
            end_date: state.end_date,
            transit_destination_id: state.transit.as_ref().map(|t| t.destination_site_id),
            attached_extension_ids: state
                .attached_extensions
                .iter()
                .map(|a| a.extension_id)
                .collect(),
            derived_from: state.last_event_id,
        }
    }
}

impl ExtensionSummary {
    pub fn from_state(state: &ExtensionState) -> Self {
        Self {
            extension_id: state.extension_id,
            status: state.status,
            holder_unit_id: state.holder_unit_id,
            site_id: state.site_id,
            attached_at: state.attached_at,
            end_date: state.end_date,
            derived_from: state.last_event_id,
        }
    }
}

/// Effects needed to bring a unit's summary in line with its state
pub fn plan_unit_sync(previous: Option<&UnitSummary>, state: &EquipmentState) -> Vec<SummaryEffect> {
    let next = UnitSummary::from_state(state);

    if previous == Some(&next) {
        return vec![SummaryEffect::Log {
            level: LogLevel::Debug,
            message: format!("unit {} summary unchanged", next.unit_id),
        }];
    }

    let message = format!(
        "unit {} summary -> {} at {:?}",
        next.unit_id,
        next.status.as_str(),
        next.current_site_id
    );
    vec![
        SummaryEffect::WriteUnit(next),
        SummaryEffect::Log {
            level: LogLevel::Info,
            message,
        },
    ]
}

/// Effects needed to bring an extension's summary in line with its state
pub fn plan_extension_sync(
    previous: Option<&ExtensionSummary>,
    state: &ExtensionState,
) -> Vec<SummaryEffect> {
    let next = ExtensionSummary::from_state(state);

    if previous == Some(&next) {
        return vec![SummaryEffect::Log {
            level: LogLevel::Debug,
            message: format!("extension {} summary unchanged", next.extension_id),
        }];
    }

    let message = format!(
        "extension {} summary -> {} held by {:?}",
        next.extension_id,
        next.status.as_str(),
        next.holder_unit_id
    );
    vec![
        SummaryEffect::WriteExtension(next),
        SummaryEffect::Log {
            level: LogLevel::Info,
            message,
        },
    ]
}

/// Whether a batch of effects writes anything
pub fn has_writes(effects: &[SummaryEffect]) -> bool {
    effects
        .iter()
        .any(|e| !matches!(e, SummaryEffect::Log { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocated() -> EquipmentState {
        EquipmentState {
            current_site_id: Some(Uuid::from_u128(100)),
            status: AllocationStatus::Allocated,
            allocation_event_id: Some(Uuid::from_u128(1)),
            last_event_id: Some(Uuid::from_u128(1)),
            ..EquipmentState::empty(Uuid::from_u128(7))
        }
    }

    #[test]
    fn test_first_sync_writes() {
        let effects = plan_unit_sync(None, &allocated());
        assert!(has_writes(&effects));
        assert!(matches!(
            &effects[0],
            SummaryEffect::WriteUnit(s) if s.status == AllocationStatus::Allocated
        ));
    }

    #[test]
    fn test_unchanged_summary_is_not_rewritten() {
        let state = allocated();
        let previous = UnitSummary::from_state(&state);
        let effects = plan_unit_sync(Some(&previous), &state);
        assert!(!has_writes(&effects));
    }

    #[test]
    fn test_changed_state_is_rewritten() {
        let previous = UnitSummary::from_state(&EquipmentState::empty(Uuid::from_u128(7)));
        let effects = plan_unit_sync(Some(&previous), &allocated());
        assert!(has_writes(&effects));
    }

    #[test]
    fn test_extension_plan_is_deterministic() {
        let state = ExtensionState {
            holder_unit_id: Some(Uuid::from_u128(7)),
            status: AllocationStatus::Allocated,
            ..ExtensionState::empty(Uuid::from_u128(500))
        };
        assert_eq!(plan_extension_sync(None, &state), plan_extension_sync(None, &state));

        let previous = ExtensionSummary::from_state(&state);
        assert!(!has_writes(&plan_extension_sync(Some(&previous), &state)));
    }
}
