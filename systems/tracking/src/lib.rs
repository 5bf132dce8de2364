#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Live observation log of a single selected unit.

use std::{collections::VecDeque, time::Duration};

use chrono::{DateTime, Utc};
use metromesh_core::{Event, FleetView, HistoryEntry, UnitId};
use tracing::{debug, info};

/// Simulated time between two log entries of the selected unit.
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration parameters required to construct the tracker.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    log_interval: Duration,
}

impl Config {
    /// Creates a new configuration using the provided logging cadence.
    #[must_use]
    pub const fn new(log_interval: Duration) -> Self {
        Self { log_interval }
    }
}

/// Records periodic observations of the unit an operator selected.
#[derive(Debug)]
pub struct Tracker {
    log_interval: Duration,
    accumulator: Duration,
    selected: Option<UnitId>,
    log: VecDeque<HistoryEntry>,
}

impl Tracker {
    /// Creates a tracker with nothing selected.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            log_interval: config.log_interval,
            accumulator: Duration::ZERO,
            selected: None,
            log: VecDeque::new(),
        }
    }

    /// Selects `id`, discarding the previous log and recording an immediate entry.
    ///
    /// Returns `false` and leaves nothing selected when the unit is not part of
    /// `fleet`.
    #[must_use]
    pub fn select(&mut self, id: UnitId, fleet: FleetView<'_>, now: DateTime<Utc>) -> bool {
        self.deselect();
        let Some(unit) = fleet.unit(&id) else {
            debug!(unit = %id, "cannot track unit missing from fleet");
            return false;
        };
        self.log.push_front(unit.observe(now));
        info!(unit = %id, "tracking unit");
        self.selected = Some(id);
        true
    }

    /// Clears the selection and its log.
    pub fn deselect(&mut self) {
        self.selected = None;
        self.accumulator = Duration::ZERO;
        self.log.clear();
    }

    /// Currently tracked unit, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&UnitId> {
        self.selected.as_ref()
    }

    /// Observations of the tracked unit, newest first.
    #[must_use]
    pub fn log(&self) -> &VecDeque<HistoryEntry> {
        &self.log
    }

    /// Consumes world events and records due observations of the selected unit.
    ///
    /// A fleet mode change or the unit vanishing from `fleet` ends tracking.
    pub fn handle(&mut self, events: &[Event], fleet: FleetView<'_>, now: DateTime<Utc>) {
        let Some(id) = self.selected.clone() else {
            return;
        };

        let mut elapsed = Duration::ZERO;
        for event in events {
            match event {
                Event::FleetModeChanged { mode } => {
                    info!(unit = %id, ?mode, "fleet mode changed; tracking stopped");
                    self.deselect();
                    return;
                }
                Event::TimeAdvanced { dt } => elapsed = elapsed.saturating_add(*dt),
                _ => {}
            }
        }

        let Some(unit) = fleet.unit(&id) else {
            info!(unit = %id, "tracked unit left the fleet; tracking stopped");
            self.deselect();
            return;
        };

        if self.log_interval.is_zero() {
            return;
        }
        self.accumulator = self.accumulator.saturating_add(elapsed);
        while self.accumulator >= self.log_interval {
            self.accumulator -= self.log_interval;
            // Entries due earlier in the batch are back-dated by what is still pending.
            let lag = chrono::Duration::from_std(self.accumulator)
                .unwrap_or_else(|_| chrono::Duration::zero());
            self.log.push_front(unit.observe(now - lag));
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(Config::new(DEFAULT_LOG_INTERVAL))
    }
}
