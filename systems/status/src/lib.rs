#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Periodic indoor/outdoor reassignment of fleet units.

use std::time::Duration;

use metromesh_core::{Command, Event, FleetView, SnapshotOrigin, Unit, UnitStatus};
use metromesh_system_generation::{draw_speed, roll_status};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Simulated time between two status re-rolls.
pub const DEFAULT_OSCILLATION_INTERVAL: Duration = Duration::from_secs(300);

/// Re-rolls the status of every unit independently of its position.
///
/// A unit whose current speed falls outside the bound of its new status gets
/// a speed drawn uniformly within that bound; otherwise the speed is kept.
/// Position, zone label, geofence and history are never touched.
pub fn update_statuses<R>(units: &[Unit], rng: &mut R) -> Vec<Unit>
where
    R: Rng + ?Sized,
{
    units
        .iter()
        .map(|unit| {
            let status = roll_status(rng);
            let range = status.speed_range();
            let mut next = unit.clone();
            next.status = status;
            if !range.contains(unit.speed_kmh) {
                next.speed_kmh = draw_speed(range, rng);
            }
            next
        })
        .collect()
}

/// Configuration parameters required to construct the status oscillator.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    interval: Duration,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided cadence and seed.
    #[must_use]
    pub const fn new(interval: Duration, rng_seed: u64) -> Self {
        Self { interval, rng_seed }
    }
}

/// System that re-rolls unit statuses on a slow cadence.
#[derive(Debug)]
pub struct StatusOscillator {
    interval: Duration,
    accumulator: Duration,
    rng: ChaCha8Rng,
}

impl StatusOscillator {
    /// Creates a new oscillator using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            interval: config.interval,
            accumulator: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Consumes world events and emits a re-rolled fleet once per elapsed interval.
    pub fn handle(&mut self, events: &[Event], fleet: FleetView<'_>, out: &mut Vec<Command>) {
        if self.interval.is_zero() {
            return;
        }

        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                self.accumulator = self.accumulator.saturating_add(*dt);
            }
        }

        let mut rolls = 0_u32;
        while self.accumulator >= self.interval {
            self.accumulator -= self.interval;
            rolls += 1;
        }
        if rolls == 0 || fleet.units().is_empty() {
            return;
        }

        let mut units = fleet.units().to_vec();
        for _ in 0..rolls {
            units = update_statuses(&units, &mut self.rng);
        }

        let indoor = units
            .iter()
            .filter(|unit| unit.status == UnitStatus::Indoor)
            .count();
        debug!(rolls, indoor, units = units.len(), "unit statuses re-rolled");
        out.push(Command::PublishFleet {
            base: fleet.revision(),
            origin: SnapshotOrigin::StatusOscillation,
            units,
        });
    }
}

impl Default for StatusOscillator {
    fn default() -> Self {
        Self::new(Config::new(DEFAULT_OSCILLATION_INTERVAL, 0))
    }
}
