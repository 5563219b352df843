// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for State Derivation
//!
//! Derived state is a pure fold over approved history. These properties must
//! hold for any history, including ones the validation gate would never let
//! through.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use cim_equipment_allocation::aggregate::{compute_state, estimate_cost, AllocationStatus};
use cim_equipment_allocation::domain::{
    BillingCadence, BillingRates, EquipmentUnit, OwnershipMode, UnitNumber,
};
use cim_equipment_allocation::events::{replay_set, AllocationEventKind, EventRecord};

const UNIT: u128 = 1;
const EXTENSION: u128 = 500;

fn site(n: u8) -> Uuid {
    Uuid::from_u128(100 + n as u128)
}

fn march(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Kinds that move derived state, with no planned end dates
fn event_kind() -> impl Strategy<Value = AllocationEventKind> {
    let site_choice = (0u8..3).prop_map(site);
    prop_oneof![
        site_choice.clone().prop_map(|site_id| AllocationEventKind::AllocationStarted {
            site_id,
            supplier_id: None,
            end_date: None,
            location: None,
        }),
        site_choice.clone().prop_map(|site_id| AllocationEventKind::AllocationEnded { site_id }),
        Just(AllocationEventKind::DowntimeStarted {
            reason: "breakdown".to_string()
        }),
        Just(AllocationEventKind::DowntimeEnded { resolution: None }),
        Just(AllocationEventKind::ExtensionAttached {
            extension_id: Uuid::from_u128(EXTENSION),
            site_id: None,
            end_date: None,
        }),
        Just(AllocationEventKind::ExtensionDetached {
            extension_id: Uuid::from_u128(EXTENSION)
        }),
        site_choice.clone().prop_map(|destination_site_id| AllocationEventKind::TransportStarted {
            origin_site_id: None,
            destination_site_id,
        }),
        site_choice.prop_map(|site_id| AllocationEventKind::TransportArrived {
            site_id,
            location: None,
        }),
    ]
}

/// Approved history on March days 1..=20, in arbitrary order
fn history() -> impl Strategy<Value = Vec<EventRecord>> {
    prop::collection::vec((1u32..=20, 0u32..24, event_kind()), 0..40).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(seq, (day, hour, kind))| {
                let when = march(day, hour);
                EventRecord::new(
                    Uuid::from_u128(seq as u128 + 1),
                    Uuid::from_u128(UNIT),
                    when,
                    when,
                    kind,
                )
                .approved_by("property")
            })
            .collect()
    })
}

fn rented_unit() -> EquipmentUnit {
    EquipmentUnit {
        id: Uuid::from_u128(UNIT),
        unit_number: UnitNumber::new("PT-1").unwrap(),
        equipment_type: "loader".to_string(),
        supplier_name: None,
        ownership: OwnershipMode::Rented,
        billing: BillingRates {
            cadence: BillingCadence::Monthly,
            daily: None,
            weekly: None,
            monthly: Some(3000.0),
        },
        active: true,
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Property: Derivation is deterministic
    ///
    /// Replaying the same history any number of times yields the same state.
    #[test]
    fn prop_replay_is_deterministic(events in history(), day in 1u32..=28) {
        let replay = replay_set(events);
        let first = compute_state(Uuid::from_u128(UNIT), &replay, march(day, 12));

        for _ in 0..3 {
            let again = compute_state(Uuid::from_u128(UNIT), &replay, march(day, 12));
            prop_assert_eq!(&again, &first);
        }
    }

    /// Property: Storage order is irrelevant
    ///
    /// The replay set orders events itself, so any permutation of the same
    /// records derives the same state.
    #[test]
    fn prop_input_order_is_irrelevant(events in history(), day in 1u32..=28) {
        let mut reversed = events.clone();
        reversed.reverse();

        let forward = compute_state(Uuid::from_u128(UNIT), &replay_set(events), march(day, 12));
        let backward = compute_state(Uuid::from_u128(UNIT), &replay_set(reversed), march(day, 12));

        prop_assert_eq!(forward, backward);
    }

    /// Property: Replay set is idempotent
    #[test]
    fn prop_replay_set_is_idempotent(events in history()) {
        let once = replay_set(events);
        let twice = replay_set(once.clone());
        prop_assert_eq!(once, twice);
    }

    /// Property: Time alone changes nothing
    ///
    /// Once every deferred end has taken effect, two reference instants with
    /// no events between them derive the same state.
    #[test]
    fn prop_quiet_days_do_not_change_state(
        events in history(),
        gap in 0i64..30,
        hour in 0u32..24,
    ) {
        let replay = replay_set(events);
        let settled = march(21, hour);
        let later = settled + Duration::days(gap);

        prop_assert_eq!(
            compute_state(Uuid::from_u128(UNIT), &replay, settled),
            compute_state(Uuid::from_u128(UNIT), &replay, later)
        );
    }

    /// Property: A unit with no allocation and no transit is available
    #[test]
    fn prop_idle_units_are_available(events in history(), day in 1u32..=28) {
        let state = compute_state(Uuid::from_u128(UNIT), &replay_set(events), march(day, 12));

        if !state.has_open_allocation() && state.transit.is_none() {
            prop_assert_eq!(state.status, AllocationStatus::Available);
        }
        prop_assert!(state.status != AllocationStatus::Exceeded, "no end dates, so never exceeded");
    }

    /// Property: Cost arithmetic is consistent
    #[test]
    fn prop_cost_is_billable_days_times_rate(events in history(), from in 1u32..=15, len in 0u32..=13) {
        let unit = rented_unit();
        let replay = replay_set(events);
        let start = chrono::NaiveDate::from_ymd_opt(2026, 3, from).unwrap();
        let end = start + Duration::days(len as i64);

        let estimate = estimate_cost(&unit, &replay, start, end);

        prop_assert!(estimate.total_days >= 0);
        prop_assert!(estimate.downtime_days >= 0);
        prop_assert!(estimate.billable_days >= 0);
        prop_assert_eq!(
            estimate.billable_days,
            (estimate.total_days - estimate.downtime_days).max(0)
        );
        prop_assert!((estimate.daily_rate - 100.0).abs() < f64::EPSILON);
        prop_assert!(
            (estimate.estimated_cost - estimate.billable_days as f64 * 100.0).abs() < 1e-9
        );
    }
}
