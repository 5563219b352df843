// Copyright (c) 2025 - Cowboy AI, Inc.
//! Financial Day Calculator
//!
//! Counts allocated and downtime days for a unit over an inclusive calendar
//! period and prices the difference at the unit's daily-equivalent rate.
//!
//! ```text
//! billable_days  = max(0, total_days - downtime_days)
//! estimated_cost = billable_days * daily_rate
//! ```
//!
//! Spans are paired start/end events clipped to the period; a span still open
//! when the period closes is clipped at the end of `period_end`. Allocation
//! spans are paired the way the state reducer pairs them, so an end naming a
//! site the unit is not at closes nothing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::equipment_state::{apply_event, EquipmentState};
use crate::domain::calendar::{day_span, end_of_day, start_of_day};
use crate::domain::EquipmentUnit;
use crate::events::{AllocationEventKind, EventRecord};

/// Day counts and cost for one unit over one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub total_days: i64,
    pub downtime_days: i64,
    pub billable_days: i64,
    pub daily_rate: f64,
    pub estimated_cost: f64,
}

/// Half-open window `[from, to)` covering the inclusive period
#[derive(Debug, Clone, Copy)]
struct Window {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl Window {
    fn span(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        day_span(start.max(self.from), end.min(self.to))
    }
}

/// Estimate what a unit cost over `[period_start, period_end]`
///
/// `events` must be in replay order. Events before the period are walked too
/// so that spans opened earlier are counted from the period start.
pub fn estimate_cost(
    unit: &EquipmentUnit,
    events: &[EventRecord],
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> CostEstimate {
    let window = Window {
        from: start_of_day(period_start),
        to: end_of_day(period_end),
    };

    let mut total_days = 0;
    let mut downtime_days = 0;
    let mut allocation_open: Option<DateTime<Utc>> = None;
    let mut downtime_open: Option<DateTime<Utc>> = None;
    let mut state = EquipmentState::empty(unit.id);

    for event in events
        .iter()
        .filter(|e| e.participates())
        .take_while(|e| e.event_date < window.to)
    {
        // Allocation spans follow the reducer: ends for another site are
        // dropped and a replacing start closes the span it replaces.
        let before = state.allocation_event_id;
        state = apply_event(state, event, NaiveDate::MAX);
        if state.allocation_event_id != before {
            if let Some(opened) = allocation_open.take() {
                total_days += window.span(opened, event.event_date);
            }
            if state.has_open_allocation() {
                allocation_open = Some(event.event_date);
            }
        }

        match &event.kind {
            AllocationEventKind::DowntimeStarted { .. } => {
                downtime_open.get_or_insert(event.event_date);
            }
            AllocationEventKind::DowntimeEnded { .. } => {
                if let Some(opened) = downtime_open.take() {
                    downtime_days += window.span(opened, event.event_date);
                }
            }
            _ => {}
        }
    }

    if let Some(opened) = allocation_open {
        total_days += window.span(opened, window.to);
    }
    if let Some(opened) = downtime_open {
        downtime_days += window.span(opened, window.to);
    }

    let billable_days = (total_days - downtime_days).max(0);
    let daily_rate = unit.daily_rate();

    CostEstimate {
        total_days,
        downtime_days,
        billable_days,
        daily_rate,
        estimated_cost: billable_days as f64 * daily_rate,
    }
}
