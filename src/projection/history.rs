// Copyright (c) 2025 - Cowboy AI, Inc.
//! Historical Cycle Segmenter
//!
//! Reconstructs every past and present allocation cycle units and extensions
//! had at one site. Each subject's **entire** history is walked, not just the
//! events naming the site: a cycle can span sites through transport, and
//! "is it here today" needs the full picture.
//!
//! # Cycles
//!
//! ```text
//! unit:       ... start(A) ─ down ─ up ─ depart(A→B) ─ arrive(B) ─ end(B) │ next cycle ...
//! extension:  attach ─────────────────────────────────────────── detach │ next cycle ...
//! ```
//!
//! A cycle closes on allocation-end (units) or extension-detach (extensions),
//! or stays open at the end of history. A departure never closes a cycle.
//! A cycle belongs to a site when any of its events names the site, which
//! includes a departure from it: the origin keeps seeing the cycle, flagged
//! with where the unit moved to.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::active::EventIndex;
use super::{CycleSubject, HistoricalAllocation, SiteTitles};
use crate::aggregate::equipment_state::{compute_state, EquipmentState};
use crate::aggregate::extension_state::compute_extension_state;
use crate::domain::calendar::day_of;
use crate::domain::{EquipmentUnit, Extension};
use crate::events::{AllocationEventKind, EventRecord, EventType};

/// Every cycle any indexed unit or extension had at `site_id`
///
/// `index` must hold the full histories of the subjects to consider. Events
/// after the day of `as_of` are ignored. Entries are newest first and never
/// share an opening event.
pub fn segment_site_history(
    site_id: Uuid,
    units: &[EquipmentUnit],
    extensions: &[Extension],
    titles: &SiteTitles,
    index: &EventIndex,
    as_of: DateTime<Utc>,
) -> Vec<HistoricalAllocation> {
    let units_by_id: HashMap<Uuid, &EquipmentUnit> = units.iter().map(|u| (u.id, u)).collect();
    let full_states: HashMap<Uuid, EquipmentState> = units
        .iter()
        .map(|u| (u.id, compute_state(u.id, index.unit_events(u.id), as_of)))
        .collect();

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for unit in units {
        let Some(full_state) = full_states.get(&unit.id) else {
            continue;
        };
        for entry in unit_cycles(site_id, unit, full_state, titles, index, as_of) {
            if seen.insert(entry.opening_event_id) {
                entries.push(entry);
            }
        }
    }

    for extension in extensions {
        let cycles = extension_cycles(
            site_id,
            extension,
            &units_by_id,
            &full_states,
            titles,
            index,
            as_of,
        );
        for entry in cycles {
            if seen.insert(entry.opening_event_id) {
                entries.push(entry);
            }
        }
    }

    entries.sort_by(|a, b| {
        b.opened_at
            .cmp(&a.opened_at)
            .then(a.opening_event_id.cmp(&b.opening_event_id))
    });
    entries
}

/// Split a timeline into cycles; the last one may be open
fn split_cycles(
    events: impl Iterator<Item = EventRecord>,
    closes: impl Fn(&EventRecord) -> bool,
) -> Vec<Vec<EventRecord>> {
    let mut cycles = Vec::new();
    let mut current = Vec::new();

    for event in events {
        let closing = closes(&event);
        current.push(event);
        if closing {
            cycles.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        cycles.push(current);
    }
    cycles
}

/// What a walk over one cycle learned about the target site
#[derive(Debug, Default, PartialEq)]
struct CycleScan {
    participates: bool,
    moved_to: Option<Uuid>,
}

fn scan_cycle(events: &[EventRecord], site_id: Uuid) -> CycleScan {
    let mut scan = CycleScan::default();
    let mut last_site = None;

    for event in events {
        if event.kind.references_site(site_id) {
            scan.participates = true;
        }
        match &event.kind {
            AllocationEventKind::AllocationStarted { site_id: started, .. } => {
                last_site = Some(*started);
            }
            AllocationEventKind::TransportStarted {
                origin_site_id,
                destination_site_id,
            } => {
                // Departures recorded without an origin leave from wherever the unit last was.
                if origin_site_id.or(last_site) == Some(site_id) && *destination_site_id != site_id {
                    scan.participates = true;
                    scan.moved_to = Some(*destination_site_id);
                }
            }
            AllocationEventKind::TransportArrived { site_id: arrived, .. } => {
                last_site = Some(*arrived);
                if *arrived == site_id {
                    scan.moved_to = None;
                }
            }
            _ => {}
        }
    }
    scan
}

fn closes_unit_cycle(event: &EventRecord) -> bool {
    event.event_type() == EventType::AllocationEnded
}

fn closes_extension_cycle(event: &EventRecord) -> bool {
    event.event_type() == EventType::ExtensionDetached
}

/// Unit-level events that shape a cycle; accessories have their own cycles
fn is_unit_cycle_event(event: &EventRecord) -> bool {
    event.extension_id().is_none() && EventType::derivation_types().contains(&event.event_type())
}

fn unit_cycles(
    site_id: Uuid,
    unit: &EquipmentUnit,
    full_state: &EquipmentState,
    titles: &SiteTitles,
    index: &EventIndex,
    as_of: DateTime<Utc>,
) -> Vec<HistoricalAllocation> {
    let as_of_day = day_of(as_of);
    let timeline = index
        .unit_events(unit.id)
        .iter()
        .filter(|e| e.day() <= as_of_day && e.participates() && is_unit_cycle_event(e))
        .cloned();
    let cycles = split_cycles(timeline, closes_unit_cycle);
    let latest = cycles.len().saturating_sub(1);

    cycles
        .iter()
        .enumerate()
        .filter_map(|(position, cycle)| {
            let opening = cycle.first()?;
            let scan = scan_cycle(cycle, site_id);
            if !scan.participates {
                return None;
            }

            let closed_at = cycle
                .last()
                .filter(|e| closes_unit_cycle(e))
                .map(|e| e.event_date);
            let snapshot = compute_state(unit.id, cycle, closed_at.unwrap_or(as_of));
            let present_now = position == latest && full_state.is_present_at(site_id);
            let moved_to = scan.moved_to.filter(|_| !present_now);

            Some(HistoricalAllocation {
                subject: CycleSubject::Unit { unit_id: unit.id },
                label: unit.unit_number.to_string(),
                kind_label: unit.equipment_type.clone(),
                supplier_name: unit.supplier_name.clone(),
                site_id,
                site_title: index.resolve_title(titles, unit.id, site_id),
                opening_event_id: opening.event_id,
                opened_at: opening.event_date,
                closed_at,
                status: snapshot.status,
                end_date: snapshot.end_date,
                present_now,
                moved_to,
                moved_to_title: moved_to.and_then(|dest| index.resolve_title(titles, unit.id, dest)),
            })
        })
        .collect()
}

fn extension_cycles(
    site_id: Uuid,
    extension: &Extension,
    units_by_id: &HashMap<Uuid, &EquipmentUnit>,
    full_states: &HashMap<Uuid, EquipmentState>,
    titles: &SiteTitles,
    index: &EventIndex,
    as_of: DateTime<Utc>,
) -> Vec<HistoricalAllocation> {
    let as_of_day = day_of(as_of);
    let timeline = index
        .extension_events(extension.id)
        .iter()
        .filter(|e| e.day() <= as_of_day && e.participates())
        .cloned();
    let cycles = split_cycles(timeline, closes_extension_cycle);
    let latest = cycles.len().saturating_sub(1);
    let current = compute_extension_state(extension.id, index.extension_events(extension.id), as_of);

    cycles
        .iter()
        .enumerate()
        .filter_map(|(position, cycle)| {
            let opening = cycle
                .first()
                .filter(|e| e.event_type() == EventType::ExtensionAttached)?;
            let holder = opening.unit_id;
            let unit = units_by_id.get(&holder)?;

            // Attached while the holder stood at the site, even if the event names none.
            let holder_at_attach =
                compute_state(holder, index.unit_events(holder), opening.event_date);
            let participates = cycle.iter().any(|e| e.kind.references_site(site_id))
                || holder_at_attach.current_site_id == Some(site_id);
            if !participates {
                return None;
            }

            let closed_at = cycle
                .last()
                .filter(|e| closes_extension_cycle(e))
                .map(|e| e.event_date);
            let snapshot =
                compute_extension_state(extension.id, cycle, closed_at.unwrap_or(as_of));
            let holder_now = full_states.get(&holder);
            let present_now = position == latest
                && current.is_held_by(holder)
                && holder_now.map(|s| s.is_present_at(site_id)).unwrap_or(false);
            let moved_to = holder_now
                .and_then(|s| s.transit.as_ref())
                .filter(|leg| position == latest && leg.origin_site_id == Some(site_id))
                .map(|leg| leg.destination_site_id)
                .filter(|_| !present_now);

            Some(HistoricalAllocation {
                subject: CycleSubject::Extension {
                    extension_id: extension.id,
                    holder_unit_id: holder,
                },
                label: extension.code.clone(),
                kind_label: extension.extension_type.clone(),
                supplier_name: unit.supplier_name.clone(),
                site_id,
                site_title: index.resolve_title(titles, holder, site_id),
                opening_event_id: opening.event_id,
                opened_at: opening.event_date,
                closed_at,
                status: snapshot.status,
                end_date: snapshot.end_date,
                present_now,
                moved_to,
                moved_to_title: moved_to.and_then(|dest| index.resolve_title(titles, holder, dest)),
            })
        })
        .collect()
}
