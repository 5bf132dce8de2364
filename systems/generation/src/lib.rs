#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Constrained random generation of fleet units.
//!
//! Positions are drawn by rejection sampling inside a bounding box until they
//! land inside the target geofence. The number of attempts is capped so a
//! pathological polygon can never stall generation; once the cap is reached
//! the centroid of the sampling box is used instead.

use std::time::Duration;

use chrono::{DateTime, Utc};
use metromesh_core::{
    geo, BoundingBox, Command, FleetView, Geofences, HistoryEntry, LatLng, Polygon,
    SnapshotOrigin, SpeedRange, Unit, UnitId, UnitStatus,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

/// Probability that a freshly rolled status is [`UnitStatus::Indoor`].
pub const INDOOR_PROBABILITY: f64 = 0.09;
/// Attempts allowed when sampling a unit position inside its geofence.
pub const MAX_SAMPLING_ATTEMPTS: u32 = 100;
/// Attempts allowed when jittering a synthetic history position.
pub const MAX_HISTORY_ATTEMPTS: u32 = 5;
/// Number of synthetic history entries attached to landmass units.
pub const HISTORY_LENGTH: u32 = 4;
/// Zone label carried by campaign units.
pub const SIMULATED_ZONE_LABEL: &str = "SIMULATED_ZONE";

const HISTORY_SPACING_MINUTES: i64 = 10;
const HISTORY_JITTER_DEGREES: f64 = 0.002;
const HISTORY_STEP: Duration = Duration::from_secs(5);

/// Region a unit is generated for.
#[derive(Clone, Copy, Debug)]
pub enum Scope<'a> {
    /// Global fleet unit guarded by the landmass polygon, generated with history.
    Landmass,
    /// Campaign unit confined to the provided zone polygon, generated without history.
    Zone(&'a Polygon),
}

/// Outcome of a rejection-sampled position draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionSample {
    /// Drawn position.
    pub position: LatLng,
    /// Whether sampling exhausted its attempts and fell back to the box centroid.
    pub fell_back: bool,
}

/// Draws a position uniformly from `bounds` until it falls inside `geofence`.
///
/// After [`MAX_SAMPLING_ATTEMPTS`] misses the centroid of `bounds` is returned
/// without further validation.
pub fn sample_position<R>(bounds: &BoundingBox, geofence: &Polygon, rng: &mut R) -> PositionSample
where
    R: Rng + ?Sized,
{
    for _ in 0..MAX_SAMPLING_ATTEMPTS {
        let candidate = LatLng::new(
            uniform(rng, bounds.min_lat(), bounds.max_lat()),
            uniform(rng, bounds.min_lng(), bounds.max_lng()),
        );
        if geofence.contains(candidate) {
            return PositionSample {
                position: candidate,
                fell_back: false,
            };
        }
    }

    PositionSample {
        position: bounds.centroid(),
        fell_back: true,
    }
}

/// Rolls a status: indoor with [`INDOOR_PROBABILITY`], outdoor otherwise.
pub fn roll_status<R>(rng: &mut R) -> UnitStatus
where
    R: Rng + ?Sized,
{
    if rng.gen::<f64>() < INDOOR_PROBABILITY {
        UnitStatus::Indoor
    } else {
        UnitStatus::Outdoor
    }
}

/// Draws an initial speed as the floor of a uniform real in `[min, max)`.
///
/// The result therefore never reaches `range.max()` itself.
pub fn sample_speed<R>(range: SpeedRange, rng: &mut R) -> u32
where
    R: Rng + ?Sized,
{
    uniform(rng, f64::from(range.min()), f64::from(range.max())).floor() as u32
}

/// Draws a speed uniformly among the whole values of the inclusive range.
pub fn draw_speed<R>(range: SpeedRange, rng: &mut R) -> u32
where
    R: Rng + ?Sized,
{
    rng.gen_range(range.min()..=range.max())
}

/// Generates a single unit for the provided scope.
///
/// Landmass units receive the identifier `10000 + index`, a random
/// informational zone label and a four-entry synthetic history ordered
/// oldest-first and ending at `now`. Zone units receive `SIM-<index>`, the
/// zone polygon as their own geofence, and no history.
pub fn generate_unit<R>(
    index: u32,
    scope: Scope<'_>,
    geofences: &Geofences,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Unit
where
    R: Rng + ?Sized,
{
    let (bounds, geofence) = match scope {
        Scope::Landmass => (geofences.bounds, &geofences.landmass),
        Scope::Zone(polygon) => (polygon.bounding_box(), polygon),
    };

    let sample = sample_position(&bounds, geofence, rng);
    if sample.fell_back {
        debug!(index, "position sampling exhausted; using bounding-box centroid");
    }

    let status = roll_status(rng);
    let speed_kmh = sample_speed(status.speed_range(), rng);

    match scope {
        Scope::Landmass => {
            let history = synthesize_history(
                sample.position,
                status.speed_range(),
                &geofences.landmass,
                now,
                rng,
            );
            Unit {
                id: UnitId::global(index),
                position: sample.position,
                status,
                speed_kmh,
                last_distance_meters: 0,
                zone_id: pick_label(&geofences.zone_labels, rng),
                boundary: None,
                history,
            }
        }
        Scope::Zone(polygon) => Unit {
            id: UnitId::simulated(index),
            position: sample.position,
            status,
            speed_kmh,
            last_distance_meters: 0,
            zone_id: SIMULATED_ZONE_LABEL.to_owned(),
            boundary: Some(polygon.clone()),
            history: Vec::new(),
        },
    }
}

/// Generates `count` landmass units with synthetic history.
pub fn generate_initial_fleet<R>(
    count: u32,
    geofences: &Geofences,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Unit>
where
    R: Rng + ?Sized,
{
    (0..count)
        .map(|index| generate_unit(index, Scope::Landmass, geofences, now, rng))
        .collect()
}

fn synthesize_history<R>(
    seed: LatLng,
    range: SpeedRange,
    landmass: &Polygon,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<HistoryEntry>
where
    R: Rng + ?Sized,
{
    (0..HISTORY_LENGTH)
        .rev()
        .map(|steps_back| {
            let position = jitter_position(seed, landmass, rng);
            let speed_kmh = sample_speed(range, rng);
            HistoryEntry {
                timestamp: now
                    - chrono::Duration::minutes(HISTORY_SPACING_MINUTES * i64::from(steps_back)),
                position,
                speed_kmh,
                distance_meters: geo::displacement_meters(speed_kmh, HISTORY_STEP),
            }
        })
        .collect()
}

// Falls back to the unperturbed seed, which is not re-validated.
fn jitter_position<R>(seed: LatLng, landmass: &Polygon, rng: &mut R) -> LatLng
where
    R: Rng + ?Sized,
{
    for _ in 0..MAX_HISTORY_ATTEMPTS {
        let candidate = LatLng::new(
            seed.latitude() + uniform(rng, -HISTORY_JITTER_DEGREES, HISTORY_JITTER_DEGREES),
            seed.longitude() + uniform(rng, -HISTORY_JITTER_DEGREES, HISTORY_JITTER_DEGREES),
        );
        if landmass.contains(candidate) {
            return candidate;
        }
    }
    seed
}

fn pick_label<R>(labels: &[String], rng: &mut R) -> String
where
    R: Rng + ?Sized,
{
    if labels.is_empty() {
        return String::new();
    }
    labels[rng.gen_range(0..labels.len())].clone()
}

// Degenerate spans collapse to `min` instead of panicking like `gen_range`.
fn uniform<R>(rng: &mut R, min: f64, max: f64) -> f64
where
    R: Rng + ?Sized,
{
    min + rng.gen::<f64>() * (max - min)
}

/// Configuration parameters required to construct the fleet seeder.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    fleet_size: u32,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided fleet size and seed.
    #[must_use]
    pub const fn new(fleet_size: u32, rng_seed: u64) -> Self {
        Self {
            fleet_size,
            rng_seed,
        }
    }
}

/// System that populates the world with a global landmass fleet.
#[derive(Debug)]
pub struct FleetSeeder {
    fleet_size: u32,
    rng: ChaCha8Rng,
}

impl FleetSeeder {
    /// Creates a new seeder using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            fleet_size: config.fleet_size,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Emits the startup fleet built on top of the observed snapshot.
    pub fn seed(
        &mut self,
        fleet: FleetView<'_>,
        geofences: &Geofences,
        now: DateTime<Utc>,
        out: &mut Vec<Command>,
    ) {
        self.emit(SnapshotOrigin::InitialFleet, fleet, geofences, now, out);
    }

    /// Emits a freshly generated global fleet replacing the observed snapshot.
    pub fn reset(
        &mut self,
        fleet: FleetView<'_>,
        geofences: &Geofences,
        now: DateTime<Utc>,
        out: &mut Vec<Command>,
    ) {
        self.emit(SnapshotOrigin::Reset, fleet, geofences, now, out);
    }

    fn emit(
        &mut self,
        origin: SnapshotOrigin,
        fleet: FleetView<'_>,
        geofences: &Geofences,
        now: DateTime<Utc>,
        out: &mut Vec<Command>,
    ) {
        let units = generate_initial_fleet(self.fleet_size, geofences, now, &mut self.rng);
        info!(?origin, units = units.len(), "generated global fleet");
        out.push(Command::PublishFleet {
            base: fleet.revision(),
            origin,
            units,
        });
    }
}
