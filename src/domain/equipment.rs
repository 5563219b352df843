// Copyright (c) 2025 - Cowboy AI, Inc.
//! Equipment, Extension and Site Domain Model
//!
//! Registry-side descriptions of the things events talk about. None of these
//! types carry allocation state; that is always derived from the event log.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unit number validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitNumberError {
    #[error("Unit number is empty")]
    Empty,

    #[error("Unit number exceeds maximum length of 32 characters: {0}")]
    TooLong(usize),

    #[error("Invalid character in unit number: {0}")]
    InvalidCharacter(char),
}

/// Fleet number painted on a unit (e.g. `EX-0042`)
///
/// # Invariants
/// - Non-empty after trimming
/// - At most 32 characters
/// - ASCII alphanumerics, `-`, `_`, `/` and `.` only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitNumber(String);

impl UnitNumber {
    pub const MAX_LENGTH: usize = 32;

    pub fn new(number: impl Into<String>) -> Result<Self, UnitNumberError> {
        let number = number.into().trim().to_string();

        if number.is_empty() {
            return Err(UnitNumberError::Empty);
        }
        if number.len() > Self::MAX_LENGTH {
            return Err(UnitNumberError::TooLong(number.len()));
        }
        if let Some(c) = number
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.')))
        {
            return Err(UnitNumberError::InvalidCharacter(c));
        }

        Ok(Self(number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UnitNumber {
    type Error = UnitNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UnitNumber> for String {
    fn from(value: UnitNumber) -> Self {
        value.0
    }
}

impl fmt::Display for UnitNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the fleet owns a unit or hires it from a supplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipMode {
    Owned,
    Rented,
}

/// Cadence a rented unit is invoiced at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCadence {
    Daily,
    Weekly,
    Monthly,
}

/// Contracted hire rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingRates {
    pub cadence: BillingCadence,
    pub daily: Option<f64>,
    pub weekly: Option<f64>,
    pub monthly: Option<f64>,
}

impl BillingRates {
    pub const DAYS_PER_WEEK: f64 = 7.0;
    pub const DAYS_PER_MONTH: f64 = 30.0;

    /// Daily-equivalent rate for the contracted cadence
    ///
    /// A cadence whose rate was never filled in bills at zero.
    pub fn daily_equivalent(&self) -> f64 {
        match self.cadence {
            BillingCadence::Daily => self.daily.unwrap_or(0.0),
            BillingCadence::Weekly => self.weekly.unwrap_or(0.0) / Self::DAYS_PER_WEEK,
            BillingCadence::Monthly => self.monthly.unwrap_or(0.0) / Self::DAYS_PER_MONTH,
        }
    }
}

impl Default for BillingRates {
    fn default() -> Self {
        Self {
            cadence: BillingCadence::Daily,
            daily: None,
            weekly: None,
            monthly: None,
        }
    }
}

/// A piece of heavy equipment tracked by the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentUnit {
    pub id: Uuid,
    pub unit_number: UnitNumber,
    pub equipment_type: String,
    pub supplier_name: Option<String>,
    pub ownership: OwnershipMode,
    #[serde(default)]
    pub billing: BillingRates,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl EquipmentUnit {
    /// Rate used for cost estimates; owned units cost nothing to hire
    pub fn daily_rate(&self) -> f64 {
        match self.ownership {
            OwnershipMode::Owned => 0.0,
            OwnershipMode::Rented => self.billing.daily_equivalent(),
        }
    }
}

/// Attachable accessory (bucket, breaker, trailer...) with its own timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub id: Uuid,
    pub code: String,
    pub extension_type: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

/// Work site equipment gets allocated to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    pub title: String,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rented(cadence: BillingCadence) -> EquipmentUnit {
        EquipmentUnit {
            id: Uuid::nil(),
            unit_number: UnitNumber::new("EX-01").unwrap(),
            equipment_type: "excavator".to_string(),
            supplier_name: Some("Acme Hire".to_string()),
            ownership: OwnershipMode::Rented,
            billing: BillingRates {
                cadence,
                daily: Some(150.0),
                weekly: Some(700.0),
                monthly: Some(2700.0),
            },
            active: true,
        }
    }

    #[test]
    fn test_unit_number_validation() {
        assert_eq!(UnitNumber::new("  EX-0042 ").unwrap().as_str(), "EX-0042");
        assert_eq!(UnitNumber::new("   "), Err(UnitNumberError::Empty));
        assert_eq!(
            UnitNumber::new("EX 42"),
            Err(UnitNumberError::InvalidCharacter(' '))
        );
        assert!(matches!(
            UnitNumber::new("X".repeat(40)),
            Err(UnitNumberError::TooLong(40))
        ));
    }

    #[test]
    fn test_daily_rate_by_cadence() {
        assert_eq!(rented(BillingCadence::Daily).daily_rate(), 150.0);
        assert_eq!(rented(BillingCadence::Weekly).daily_rate(), 100.0);
        assert_eq!(rented(BillingCadence::Monthly).daily_rate(), 90.0);
    }

    #[test]
    fn test_owned_units_are_free() {
        let mut unit = rented(BillingCadence::Daily);
        unit.ownership = OwnershipMode::Owned;
        assert_eq!(unit.daily_rate(), 0.0);
    }

    #[test]
    fn test_missing_rate_bills_zero() {
        let mut unit = rented(BillingCadence::Weekly);
        unit.billing.weekly = None;
        assert_eq!(unit.daily_rate(), 0.0);
    }

    #[test]
    fn test_unit_deserializes_with_defaults() {
        let json = r#"{
            "id": "01934f4a-1000-7000-8000-000000001000",
            "unit_number": "EX-7",
            "equipment_type": "excavator",
            "supplier_name": null,
            "ownership": "owned"
        }"#;
        let unit: EquipmentUnit = serde_json::from_str(json).unwrap();
        assert!(unit.active);
        assert_eq!(unit.billing.cadence, BillingCadence::Daily);
        assert!(serde_json::from_str::<EquipmentUnit>(&json.replace("EX-7", "")).is_err());
    }
}
