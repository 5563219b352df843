// Copyright (c) 2025 - Cowboy AI, Inc.
//! Bulk Materializer
//!
//! Builds the live view of the whole fleet from one fetch of reference data
//! and one fetch of events. Events are grouped once into an [`EventIndex`];
//! every reducer run and every display lookup after that is in memory, so the
//! number of store round trips does not grow with the fleet.
//!
//! A unit is listed when it has an open allocation, is in transit, is in
//! downtime, or simply has a current site (parked without a contract).

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{AllocationProjection, ExtensionProjection, SiteTitles, TransitView};
use crate::aggregate::equipment_state::{compute_state, EquipmentState};
use crate::aggregate::extension_state::compute_extension_state;
use crate::domain::{EquipmentUnit, Extension};
use crate::events::{replay_set, AllocationEventKind, EventRecord};

/// Approved events grouped by unit and by extension, in replay order
#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    by_unit: HashMap<Uuid, Vec<EventRecord>>,
    by_extension: HashMap<Uuid, Vec<EventRecord>>,
    /// event id → (unit id, position in that unit's timeline)
    by_id: HashMap<Uuid, (Uuid, usize)>,
}

impl EventIndex {
    /// Index a batch of fetched events
    ///
    /// Duplicates (same event id fetched through two paths) are kept once.
    /// Pending, rejected and corrected events are dropped.
    pub fn build(events: impl IntoIterator<Item = EventRecord>) -> Self {
        let mut seen = HashSet::new();
        let replay = replay_set(events.into_iter().filter(|e| seen.insert(e.event_id)));

        let mut index = Self::default();
        for event in replay {
            if let Some(extension_id) = event.extension_id() {
                index
                    .by_extension
                    .entry(extension_id)
                    .or_default()
                    .push(event.clone());
            }
            let timeline = index.by_unit.entry(event.unit_id).or_default();
            index
                .by_id
                .insert(event.event_id, (event.unit_id, timeline.len()));
            timeline.push(event);
        }
        index
    }

    pub fn unit_events(&self, unit_id: Uuid) -> &[EventRecord] {
        self.by_unit.get(&unit_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attach/detach events naming the extension, whichever unit recorded them
    pub fn extension_events(&self, extension_id: Uuid) -> &[EventRecord] {
        self.by_extension
            .get(&extension_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn event(&self, event_id: Uuid) -> Option<&EventRecord> {
        let (unit_id, position) = self.by_id.get(&event_id)?;
        self.by_unit.get(unit_id)?.get(*position)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Reason text recorded on a downtime-start event
    pub fn downtime_reason(&self, event_id: Uuid) -> Option<&str> {
        match &self.event(event_id)?.kind {
            AllocationEventKind::DowntimeStarted { reason } => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Latest site title a unit's own events captured for a site
    pub fn site_title_hint(&self, unit_id: Uuid, site_id: Uuid) -> Option<&str> {
        self.unit_events(unit_id)
            .iter()
            .rev()
            .filter(|e| e.site_id() == Some(site_id))
            .find_map(|e| e.kind.location().and_then(|l| l.site_title.as_deref()))
    }

    /// Registry title first, then whatever the unit's events recorded
    pub fn resolve_title(&self, titles: &SiteTitles, unit_id: Uuid, site_id: Uuid) -> Option<String> {
        titles
            .get(&site_id)
            .cloned()
            .or_else(|| self.site_title_hint(unit_id, site_id).map(str::to_string))
    }
}

/// Live fleet view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveAllocations {
    pub units: Vec<AllocationProjection>,
    pub extensions: Vec<ExtensionProjection>,
}

/// Whether a derived state earns a place on the live view
pub fn is_listed(state: &EquipmentState) -> bool {
    state.has_open_allocation()
        || state.is_in_transit()
        || state.in_downtime
        || state.current_site_id.is_some()
}

/// Project every active unit and every attached extension as of `as_of`
///
/// Inactive registry entries and events for unknown units are ignored.
/// Output is sorted by unit number, then extension code.
pub fn materialize_active(
    units: &[EquipmentUnit],
    extensions: &[Extension],
    titles: &SiteTitles,
    index: &EventIndex,
    as_of: DateTime<Utc>,
) -> ActiveAllocations {
    let states: HashMap<Uuid, EquipmentState> = units
        .iter()
        .filter(|u| u.active)
        .map(|u| (u.id, compute_state(u.id, index.unit_events(u.id), as_of)))
        .collect();

    let mut projected_units: Vec<AllocationProjection> = units
        .iter()
        .filter_map(|unit| {
            let state = states.get(&unit.id)?;
            is_listed(state).then(|| project_unit(unit, state, index, titles))
        })
        .collect();
    projected_units.sort_by(|a, b| a.unit_number.cmp(&b.unit_number));

    let unit_numbers: HashMap<Uuid, &str> = units
        .iter()
        .map(|u| (u.id, u.unit_number.as_str()))
        .collect();

    let mut projected_extensions: Vec<ExtensionProjection> = extensions
        .iter()
        .filter(|e| e.active)
        .filter_map(|extension| {
            let state = compute_extension_state(
                extension.id,
                index.extension_events(extension.id),
                as_of,
            );
            let holder_unit_id = state.holder_unit_id?;
            let site_id = states
                .get(&holder_unit_id)
                .and_then(|s| s.current_site_id)
                .or(state.site_id);
            let site_title = site_id.and_then(|site| index.resolve_title(titles, holder_unit_id, site));

            Some(ExtensionProjection {
                extension_id: extension.id,
                code: extension.code.clone(),
                extension_type: extension.extension_type.clone(),
                holder_unit_id: Some(holder_unit_id),
                holder_unit_number: unit_numbers.get(&holder_unit_id).map(|n| n.to_string()),
                site_id,
                site_title,
                status: state.status,
                attached_at: state.attached_at,
                end_date: state.end_date,
            })
        })
        .collect();
    projected_extensions.sort_by(|a, b| a.code.cmp(&b.code));

    ActiveAllocations {
        units: projected_units,
        extensions: projected_extensions,
    }
}

/// Merge one unit's derived state with its display attributes
pub fn project_unit(
    unit: &EquipmentUnit,
    state: &EquipmentState,
    index: &EventIndex,
    titles: &SiteTitles,
) -> AllocationProjection {
    let title = |site: Uuid| index.resolve_title(titles, unit.id, site);

    AllocationProjection {
        unit_id: unit.id,
        unit_number: unit.unit_number.to_string(),
        equipment_type: unit.equipment_type.clone(),
        supplier_name: unit.supplier_name.clone(),
        status: state.status,
        current_site_id: state.current_site_id,
        site_title: state.current_site_id.and_then(title),
        in_downtime: state.in_downtime,
        downtime_reason: state
            .downtime_event_id
            .and_then(|id| index.downtime_reason(id))
            .map(str::to_string),
        allocation_event_id: state.allocation_event_id,
        allocation_start: state.allocation_start,
        end_date: state.end_date,
        transit: state.transit.as_ref().map(|leg| TransitView {
            origin_site_id: leg.origin_site_id,
            origin_title: leg.origin_site_id.and_then(title),
            destination_site_id: leg.destination_site_id,
            destination_title: title(leg.destination_site_id),
            departed_at: leg.departed_at,
        }),
        attached_extension_ids: state
            .attached_extensions
            .iter()
            .map(|a| a.extension_id)
            .collect(),
        location: state.location.clone(),
    }
}
