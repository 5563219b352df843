// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-equipment-allocation
//!
//! Deterministic fleet, sites and event builders shared by the integration
//! and property suites. All UUIDs and timestamps are fixed constants so that
//! tests are reproducible.
//!
//! # Design Principles
//! - No `Uuid::now_v7()` or `Utc::now()` in fixtures
//! - Dates are March 2026 days at 08:00 UTC unless a test needs otherwise

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use uuid::Uuid;

use cim_equipment_allocation::domain::{
    BillingCadence, BillingRates, EquipmentUnit, Extension, OwnershipMode, Site, UnitNumber,
};
use cim_equipment_allocation::event_store::InMemoryEventStore;
use cim_equipment_allocation::events::{AllocationEventKind, EventRecord};
use cim_equipment_allocation::projection::executor::InMemorySummaryStore;
use cim_equipment_allocation::registry::InMemoryRegistry;
use cim_equipment_allocation::service::EventSourcedAllocationService;

pub const UNIT_EXCAVATOR: &str = "01934f4a-1000-7000-8000-000000001000";
pub const UNIT_DOZER: &str = "01934f4a-1001-7000-8000-000000001001";

pub const EXTENSION_BUCKET: &str = "01934f4a-5000-7000-8000-000000005000";

pub const SITE_NORTH: &str = "01934f4a-2000-7000-8000-000000002000";
pub const SITE_SOUTH: &str = "01934f4a-2001-7000-8000-000000002001";

// Fixed test timestamp (2026-03-01T08:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-03-01T08:00:00Z";

/// Parse a fixed UUID from a constant string
pub fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("Invalid UUID in test fixture")
}

pub fn excavator_id() -> Uuid {
    parse_uuid(UNIT_EXCAVATOR)
}

pub fn dozer_id() -> Uuid {
    parse_uuid(UNIT_DOZER)
}

pub fn bucket_id() -> Uuid {
    parse_uuid(EXTENSION_BUCKET)
}

pub fn north() -> Uuid {
    parse_uuid(SITE_NORTH)
}

pub fn south() -> Uuid {
    parse_uuid(SITE_SOUTH)
}

/// Parse the fixed timestamp
pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

/// 08:00 UTC on a March 2026 day
pub fn day(d: u32) -> DateTime<Utc> {
    at(d, 8)
}

/// A given hour on a March 2026 day
pub fn at(d: u32, hour: u32) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&format!("2026-03-{:02}T{:02}:00:00Z", d, hour))
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

pub fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).expect("Invalid date in test fixture")
}

/// Deterministic event id from a sequence number
pub fn event_id(seq: u128) -> Uuid {
    Uuid::from_u128(0x01934f4a_e000_7000_8000_000000000000 + seq)
}

pub fn excavator() -> EquipmentUnit {
    EquipmentUnit {
        id: excavator_id(),
        unit_number: UnitNumber::new("EX-01").expect("Invalid unit number"),
        equipment_type: "excavator".to_string(),
        supplier_name: Some("Acme Hire".to_string()),
        ownership: OwnershipMode::Rented,
        billing: BillingRates {
            cadence: BillingCadence::Daily,
            daily: Some(150.0),
            weekly: None,
            monthly: None,
        },
        active: true,
    }
}

pub fn dozer() -> EquipmentUnit {
    EquipmentUnit {
        id: dozer_id(),
        unit_number: UnitNumber::new("DZ-07").expect("Invalid unit number"),
        equipment_type: "dozer".to_string(),
        supplier_name: None,
        ownership: OwnershipMode::Owned,
        billing: BillingRates::default(),
        active: true,
    }
}

pub fn bucket() -> Extension {
    Extension {
        id: bucket_id(),
        code: "BKT-1".to_string(),
        extension_type: "bucket".to_string(),
        active: true,
    }
}

pub fn sites() -> Vec<Site> {
    vec![
        Site {
            id: north(),
            title: "North Yard".to_string(),
        },
        Site {
            id: south(),
            title: "South Quarry".to_string(),
        },
    ]
}

pub fn registry() -> InMemoryRegistry {
    InMemoryRegistry::new(vec![excavator(), dozer()], vec![bucket()], sites())
}

pub type TestService =
    EventSourcedAllocationService<InMemoryEventStore, InMemoryRegistry, InMemorySummaryStore>;

/// Service over an empty log with the fixture fleet
pub fn service() -> TestService {
    EventSourcedAllocationService::new(
        Arc::new(InMemoryEventStore::new()),
        Arc::new(registry()),
        Arc::new(InMemorySummaryStore::new()),
    )
}

/// Pending record recorded at its own event date
pub fn record(seq: u128, unit_id: Uuid, when: DateTime<Utc>, kind: AllocationEventKind) -> EventRecord {
    EventRecord::new(event_id(seq), unit_id, when, when, kind).created_by("yard-clerk")
}

pub fn started(site_id: Uuid, end_date: Option<DateTime<Utc>>) -> AllocationEventKind {
    AllocationEventKind::AllocationStarted {
        site_id,
        supplier_id: None,
        end_date,
        location: None,
    }
}

pub fn ended(site_id: Uuid) -> AllocationEventKind {
    AllocationEventKind::AllocationEnded { site_id }
}

pub fn downtime(reason: &str) -> AllocationEventKind {
    AllocationEventKind::DowntimeStarted {
        reason: reason.to_string(),
    }
}

pub fn back_up() -> AllocationEventKind {
    AllocationEventKind::DowntimeEnded { resolution: None }
}

pub fn attached(extension_id: Uuid, site_id: Option<Uuid>) -> AllocationEventKind {
    AllocationEventKind::ExtensionAttached {
        extension_id,
        site_id,
        end_date: None,
    }
}

pub fn detached(extension_id: Uuid) -> AllocationEventKind {
    AllocationEventKind::ExtensionDetached { extension_id }
}

pub fn departed(destination_site_id: Uuid) -> AllocationEventKind {
    AllocationEventKind::TransportStarted {
        origin_site_id: None,
        destination_site_id,
    }
}

pub fn arrived(site_id: Uuid) -> AllocationEventKind {
    AllocationEventKind::TransportArrived {
        site_id,
        location: None,
    }
}
