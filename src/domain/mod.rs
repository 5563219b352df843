// Copyright (c) 2025 - Cowboy AI, Inc.
//! Equipment Domain Models
//!
//! Reference data the engine reads but never derives (units, extensions,
//! sites), the calendar-day arithmetic every reducer shares, and the
//! validation gate candidate events pass through.
//!
//! # Value Objects with Invariants
//!
//! - [`UnitNumber`] - Fleet number printed on the unit
//! - [`BillingRates`] - Rental rates with a daily-equivalent conversion
//!
//! # Entities
//!
//! - [`EquipmentUnit`] - Trackable machine or vehicle
//! - [`Extension`] - Accessory that can be mounted on a unit
//! - [`Site`] - Named work location

pub mod calendar;
pub mod equipment;
pub mod invariants;

pub use equipment::{
    BillingCadence, BillingRates, EquipmentUnit, Extension, OwnershipMode, Site, UnitNumber,
    UnitNumberError,
};
pub use invariants::{validate_event, ValidationError, ValidationResult};
