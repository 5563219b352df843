// Copyright (c) 2025 - Cowboy AI, Inc.

//! Allocation Projections - Derived State Merged with Display Attributes
//!
//! Projections are the query-facing shape of the reducers' output. They are
//! computed on demand from already-fetched data and never stored as truth.
//!
//! # Architecture
//!
//! ```text
//! Registry (units, extensions, sites) ─┐
//!                                      ├──> EventIndex ──> reducers ──> projections
//! Event store (one fetch) ─────────────┘
//! ```
//!
//! - [`active`] - Bulk materializer: every unit currently somewhere or doing
//!   something, in a single pass over one event fetch
//! - [`history`] - Historical cycle segmenter: every allocation cycle a unit
//!   or extension ever had at a site
//! - [`pure`] - Summary computation for the synchronization writer
//! - [`executor`] - Summary writers that persist or publish those summaries

pub mod active;
pub mod executor;
pub mod history;
pub mod pure;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::aggregate::equipment_state::AllocationStatus;
use crate::domain::Site;
use crate::events::LocationDetail;

pub use active::{materialize_active, ActiveAllocations, EventIndex};
pub use history::segment_site_history;

/// Site id → display title
pub type SiteTitles = HashMap<Uuid, String>;

/// Index site titles by id
pub fn site_titles(sites: &[Site]) -> SiteTitles {
    sites.iter().map(|s| (s.id, s.title.clone())).collect()
}

/// Journey a unit is on, with titles resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitView {
    pub origin_site_id: Option<Uuid>,
    pub origin_title: Option<String>,
    pub destination_site_id: Uuid,
    pub destination_title: Option<String>,
    pub departed_at: DateTime<Utc>,
}

/// Live view of one unit (dashboards, maps)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationProjection {
    pub unit_id: Uuid,
    pub unit_number: String,
    pub equipment_type: String,
    pub supplier_name: Option<String>,

    pub status: AllocationStatus,
    pub current_site_id: Option<Uuid>,
    pub site_title: Option<String>,

    pub in_downtime: bool,
    pub downtime_reason: Option<String>,

    pub allocation_event_id: Option<Uuid>,
    pub allocation_start: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    pub transit: Option<TransitView>,
    pub attached_extension_ids: Vec<Uuid>,
    pub location: Option<LocationDetail>,
}

/// Live view of one attached extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionProjection {
    pub extension_id: Uuid,
    pub code: String,
    pub extension_type: String,

    pub holder_unit_id: Option<Uuid>,
    pub holder_unit_number: Option<String>,

    /// Where the holder is; the attach site when the holder is unknown
    pub site_id: Option<Uuid>,
    pub site_title: Option<String>,

    pub status: AllocationStatus,
    pub attached_at: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// What a historical cycle is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleSubject {
    Unit { unit_id: Uuid },
    Extension { extension_id: Uuid, holder_unit_id: Uuid },
}

/// One past or ongoing allocation cycle at a site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalAllocation {
    pub subject: CycleSubject,
    /// Unit number, or extension code
    pub label: String,
    /// Equipment or extension type
    pub kind_label: String,
    pub supplier_name: Option<String>,

    pub site_id: Uuid,
    pub site_title: Option<String>,

    pub opening_event_id: Uuid,
    pub opened_at: DateTime<Utc>,
    /// `None` while the cycle is still open
    pub closed_at: Option<DateTime<Utc>>,

    /// Status as of the cycle's close
    pub status: AllocationStatus,
    pub end_date: Option<DateTime<Utc>>,

    /// Physically at the site right now
    pub present_now: bool,

    /// Site the unit left for, when it departed from this one
    pub moved_to: Option<Uuid>,
    pub moved_to_title: Option<String>,
}

impl HistoricalAllocation {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }
}
