#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Movement system that advances every unit of the fleet one tick at a time.
//!
//! Each tick draws a fresh speed and one of eight compass bearings per unit,
//! with no memory of the previous tick. Moves that would leave the unit's
//! geofence are refused: the unit stays put, keeps the newly drawn speed and
//! records zero distance for the tick.

use std::time::Duration;

use metromesh_core::{geo, Command, Event, FleetView, Polygon, SnapshotOrigin, Unit};
use metromesh_system_generation::draw_speed;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Simulated time covered by one movement tick.
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_secs(5);

/// Bearings a unit may travel along, in degrees clockwise from north.
pub const COMPASS_BEARINGS: [f64; 8] = [0.0, 45.0, 90.0, 135.0, 180.0, 225.0, 270.0, 315.0];

/// Result of stepping a single unit.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    /// Unit after the step.
    pub unit: Unit,
    /// Whether the projected position stayed inside the geofence.
    pub accepted: bool,
}

/// Advances a single unit by one tick of length `tick`.
pub fn step_unit<R>(unit: &Unit, landmass: &Polygon, tick: Duration, rng: &mut R) -> StepOutcome
where
    R: Rng + ?Sized,
{
    let speed_kmh = draw_speed(unit.status.speed_range(), rng);
    let distance = geo::displacement_meters(speed_kmh, tick);
    let bearing = COMPASS_BEARINGS[rng.gen_range(0..COMPASS_BEARINGS.len())];
    let candidate = geo::destination_point(unit.position, f64::from(distance), bearing);
    let accepted = unit.geofence(landmass).contains(candidate);

    let mut next = unit.clone();
    next.speed_kmh = speed_kmh;
    if accepted {
        next.position = candidate;
        next.last_distance_meters = distance;
    } else {
        next.last_distance_meters = 0;
    }

    StepOutcome {
        unit: next,
        accepted,
    }
}

/// Advances every unit of the fleet by one tick, independently of one another.
pub fn step_fleet<R>(units: &[Unit], landmass: &Polygon, tick: Duration, rng: &mut R) -> Vec<Unit>
where
    R: Rng + ?Sized,
{
    units
        .iter()
        .map(|unit| step_unit(unit, landmass, tick, rng).unit)
        .collect()
}

/// Configuration parameters required to construct the movement system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    step_interval: Duration,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided step cadence and seed.
    #[must_use]
    pub const fn new(step_interval: Duration, rng_seed: u64) -> Self {
        Self {
            step_interval,
            rng_seed,
        }
    }
}

/// System that turns elapsed simulated time into movement ticks.
#[derive(Debug)]
pub struct Movement {
    step_interval: Duration,
    accumulator: Duration,
    rng: ChaCha8Rng,
}

impl Movement {
    /// Creates a new movement system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            step_interval: config.step_interval,
            accumulator: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Consumes world events and the latest fleet to emit a movement snapshot.
    ///
    /// Every whole step interval accumulated from `Event::TimeAdvanced` applies
    /// one tick; all ticks due in a call are folded into a single published
    /// snapshot derived from `fleet`.
    pub fn handle(
        &mut self,
        events: &[Event],
        fleet: FleetView<'_>,
        landmass: &Polygon,
        out: &mut Vec<Command>,
    ) {
        if self.step_interval.is_zero() {
            return;
        }

        let mut accumulated = Duration::ZERO;
        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                accumulated = accumulated.saturating_add(*dt);
            }
        }

        if accumulated.is_zero() {
            return;
        }

        self.accumulator = self.accumulator.saturating_add(accumulated);
        let steps = self.resolve_steps();
        if steps == 0 || fleet.units().is_empty() {
            return;
        }

        let mut units = fleet.units().to_vec();
        let mut refused = 0_usize;
        for _ in 0..steps {
            units = units
                .iter()
                .map(|unit| {
                    let outcome = step_unit(unit, landmass, self.step_interval, &mut self.rng);
                    if !outcome.accepted {
                        refused += 1;
                    }
                    outcome.unit
                })
                .collect();
        }

        debug!(
            steps,
            units = units.len(),
            refused,
            "movement ticks applied"
        );
        out.push(Command::PublishFleet {
            base: fleet.revision(),
            origin: SnapshotOrigin::Movement,
            units,
        });
    }

    fn resolve_steps(&mut self) -> u32 {
        let mut steps = 0;
        while self.accumulator >= self.step_interval {
            self.accumulator -= self.step_interval;
            steps += 1;
        }
        steps
    }
}

impl Default for Movement {
    fn default() -> Self {
        Self::new(Config::new(DEFAULT_STEP_INTERVAL, 0))
    }
}
