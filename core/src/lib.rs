#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the MetroMesh fleet engine.
//!
//! This crate defines the message surface that connects the host adapter, the
//! authoritative world, and pure systems. The host submits [`Command`] values,
//! the world executes them through its `apply` entry point and broadcasts
//! [`Event`] values. Systems read immutable [`FleetView`] snapshots, compute the
//! next fleet with pure functions, and hand it back as a
//! [`Command::PublishFleet`] tagged with the revision they observed.

pub mod geo;

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Offers a replacement fleet snapshot to the world.
    ///
    /// The world accepts the snapshot only when `base` still names its current
    /// revision, so two producers working from the same snapshot can never
    /// silently overwrite one another.
    PublishFleet {
        /// Revision of the snapshot the producer derived `units` from.
        base: FleetRevision,
        /// Producer that computed the snapshot.
        origin: SnapshotOrigin,
        /// Complete replacement fleet.
        units: Vec<Unit>,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a new fleet snapshot became authoritative.
    FleetPublished {
        /// Revision assigned to the accepted snapshot.
        revision: FleetRevision,
        /// Producer that computed the snapshot.
        origin: SnapshotOrigin,
        /// Number of units contained in the snapshot.
        unit_count: usize,
    },
    /// Reports that a fleet snapshot was refused.
    FleetPublishRejected {
        /// Producer whose snapshot was refused.
        origin: SnapshotOrigin,
        /// Specific reason the snapshot was refused.
        reason: PublishError,
    },
    /// Announces that the fleet switched between global and campaign operation.
    FleetModeChanged {
        /// Mode that became active.
        mode: FleetMode,
    },
}

/// Producers allowed to submit fleet snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotOrigin {
    /// Global fleet generated at startup.
    InitialFleet,
    /// Periodic movement tick.
    Movement,
    /// Periodic indoor/outdoor status re-roll.
    StatusOscillation,
    /// Zone-scoped replacement fleet for a campaign.
    Campaign,
    /// Freshly generated global fleet replacing a campaign.
    Reset,
}

impl SnapshotOrigin {
    /// Mode implied by a snapshot from this origin, if the origin implies one.
    #[must_use]
    pub const fn implied_mode(self) -> Option<FleetMode> {
        match self {
            Self::InitialFleet | Self::Reset => Some(FleetMode::Global),
            Self::Campaign => Some(FleetMode::Campaign),
            Self::Movement | Self::StatusOscillation => None,
        }
    }
}

/// Operating mode of the fleet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FleetMode {
    /// Units roam the landmass geofence.
    Global,
    /// Units are confined to the zones of an active campaign.
    Campaign,
}

/// Reasons a fleet snapshot may be refused by the world.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PublishError {
    /// The snapshot was derived from an outdated revision.
    StaleRevision {
        /// Revision the producer read.
        expected: FleetRevision,
        /// Revision currently held by the world.
        actual: FleetRevision,
    },
    /// Two units in the snapshot share the same identifier.
    DuplicateUnitId(UnitId),
}

/// Monotonic counter identifying an authoritative fleet snapshot.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FleetRevision(u64);

impl FleetRevision {
    /// Creates a revision with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the revision.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Revision that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Read-only view of the authoritative fleet at a given revision.
#[derive(Clone, Copy, Debug)]
pub struct FleetView<'a> {
    revision: FleetRevision,
    units: &'a [Unit],
}

impl<'a> FleetView<'a> {
    /// Creates a view over the provided snapshot.
    #[must_use]
    pub const fn new(revision: FleetRevision, units: &'a [Unit]) -> Self {
        Self { revision, units }
    }

    /// Revision of the captured snapshot.
    #[must_use]
    pub const fn revision(&self) -> FleetRevision {
        self.revision
    }

    /// Units of the captured snapshot in fleet order.
    #[must_use]
    pub const fn units(&self) -> &'a [Unit] {
        self.units
    }

    /// Looks up a unit by identifier.
    #[must_use]
    pub fn unit(&self, id: &UnitId) -> Option<&'a Unit> {
        self.units.iter().find(|unit| &unit.id == id)
    }
}

/// Geographic position expressed in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    latitude: f64,
    longitude: f64,
}

impl LatLng {
    /// Creates a position from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Axis-aligned latitude/longitude rectangle used as a sampling region.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    min_lat: f64,
    max_lat: f64,
    min_lng: f64,
    max_lng: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its extreme coordinates.
    #[must_use]
    pub const fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// Smallest box enclosing every vertex of the polygon.
    #[must_use]
    pub fn enclosing(polygon: &Polygon) -> Self {
        let mut bounds = Self::new(90.0, -90.0, 180.0, -180.0);
        for vertex in polygon.vertices() {
            bounds.min_lat = bounds.min_lat.min(vertex.latitude());
            bounds.max_lat = bounds.max_lat.max(vertex.latitude());
            bounds.min_lng = bounds.min_lng.min(vertex.longitude());
            bounds.max_lng = bounds.max_lng.max(vertex.longitude());
        }
        bounds
    }

    /// Southern edge.
    #[must_use]
    pub const fn min_lat(&self) -> f64 {
        self.min_lat
    }

    /// Northern edge.
    #[must_use]
    pub const fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Western edge.
    #[must_use]
    pub const fn min_lng(&self) -> f64 {
        self.min_lng
    }

    /// Eastern edge.
    #[must_use]
    pub const fn max_lng(&self) -> f64 {
        self.max_lng
    }

    /// Midpoint of the box.
    #[must_use]
    pub fn centroid(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Simple closed ring of geographic vertices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LatLng>", into = "Vec<LatLng>")]
pub struct Polygon {
    vertices: Vec<LatLng>,
}

impl Polygon {
    /// Minimum number of vertices required to enclose an area.
    pub const MIN_VERTICES: usize = 3;

    /// Creates a polygon from its ordered vertices.
    pub fn new(vertices: Vec<LatLng>) -> Result<Self, PolygonError> {
        if vertices.len() < Self::MIN_VERTICES {
            return Err(PolygonError::TooFewVertices {
                count: vertices.len(),
            });
        }
        Ok(Self { vertices })
    }

    /// Creates a polygon from `(latitude, longitude)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, PolygonError> {
        Self::new(
            pairs
                .iter()
                .map(|&(latitude, longitude)| LatLng::new(latitude, longitude))
                .collect(),
        )
    }

    /// Ordered vertices of the ring.
    #[must_use]
    pub fn vertices(&self) -> &[LatLng] {
        &self.vertices
    }

    /// Reports whether the point lies inside the ring.
    #[must_use]
    pub fn contains(&self, point: LatLng) -> bool {
        geo::point_in_polygon(point, &self.vertices)
    }

    /// Smallest box enclosing the ring.
    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::enclosing(self)
    }
}

impl TryFrom<Vec<LatLng>> for Polygon {
    type Error = PolygonError;

    fn try_from(vertices: Vec<LatLng>) -> Result<Self, Self::Error> {
        Self::new(vertices)
    }
}

impl From<Polygon> for Vec<LatLng> {
    fn from(polygon: Polygon) -> Self {
        polygon.vertices
    }
}

/// Reasons a polygon cannot be constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PolygonError {
    /// Fewer than three vertices were supplied.
    #[error("polygon requires at least 3 vertices, got {count}")]
    TooFewVertices {
        /// Number of vertices supplied.
        count: usize,
    },
}

/// Named region used both as a geofence and as a sampling area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Display name used to select the zone.
    pub name: String,
    /// Representative position of the zone, typically its label anchor.
    pub anchor: LatLng,
    /// Boundary of the zone.
    pub polygon: Polygon,
}

/// Named collection of zones available to campaigns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneCatalog {
    zones: Vec<Zone>,
}

impl ZoneCatalog {
    /// Creates a catalog from the provided zones.
    #[must_use]
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    /// Resolves a zone by exact name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.name == name)
    }

    /// Zones in catalog order.
    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Number of zones in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Reports whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Fixed geofence configuration supplied by the host deployment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geofences {
    /// Default geofence for units without a boundary of their own.
    pub landmass: Polygon,
    /// Sampling rectangle used when generating landmass units.
    pub bounds: BoundingBox,
    /// Zones selectable for campaigns.
    pub zones: ZoneCatalog,
    /// Informational labels assigned to landmass units.
    pub zone_labels: Vec<String>,
}

/// Indoor/outdoor state of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitStatus {
    /// Unit is travelling on the street.
    Outdoor,
    /// Unit is parked or inside a structure.
    Indoor,
}

impl UnitStatus {
    /// Speed bound permitted while in this status.
    #[must_use]
    pub const fn speed_range(self) -> SpeedRange {
        match self {
            Self::Outdoor => SpeedRange::new(10, 24),
            Self::Indoor => SpeedRange::new(1, 10),
        }
    }
}

/// Inclusive speed bound measured in km/h.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpeedRange {
    min: u32,
    max: u32,
}

impl SpeedRange {
    /// Creates an inclusive range.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Lowest permitted speed.
    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Highest permitted speed.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Reports whether the speed lies within the bound.
    #[must_use]
    pub const fn contains(&self, speed_kmh: u32) -> bool {
        speed_kmh >= self.min && speed_kmh <= self.max
    }
}

/// Identifier of a unit, unique within one fleet snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Numeric base added to the index of landmass units.
    pub const GLOBAL_BASE: u32 = 10_000;
    /// Prefix carried by campaign units.
    pub const SIMULATED_PREFIX: &'static str = "SIM-";

    /// Wraps an arbitrary identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Identifier of the landmass unit generated at `index`.
    #[must_use]
    pub fn global(index: u32) -> Self {
        Self((Self::GLOBAL_BASE + index).to_string())
    }

    /// Identifier of the campaign unit generated at `index`.
    #[must_use]
    pub fn simulated(index: u32) -> Self {
        Self(format!("{}{index}", Self::SIMULATED_PREFIX))
    }

    /// Borrowed string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Historical observation of a unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Moment of the observation.
    pub timestamp: DateTime<Utc>,
    /// Position at the moment of observation.
    pub position: LatLng,
    /// Speed at the moment of observation.
    pub speed_kmh: u32,
    /// Displacement attributed to the observation.
    pub distance_meters: u32,
}

/// Tracked advertising-bearing vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Identifier unique within the fleet.
    pub id: UnitId,
    /// Current position.
    pub position: LatLng,
    /// Current indoor/outdoor state.
    pub status: UnitStatus,
    /// Current speed in km/h, always within the bound of `status`.
    pub speed_kmh: u32,
    /// Displacement applied by the most recent step, zero when the step was refused.
    pub last_distance_meters: u32,
    /// Informational zone label, never consulted for geofencing.
    pub zone_id: String,
    /// Unit-specific geofence replacing the landmass when present.
    pub boundary: Option<Polygon>,
    /// Historical observations.
    pub history: Vec<HistoryEntry>,
}

impl Unit {
    /// Geofence the unit must remain inside.
    #[must_use]
    pub fn geofence<'a>(&'a self, landmass: &'a Polygon) -> &'a Polygon {
        self.boundary.as_ref().unwrap_or(landmass)
    }

    /// Observation describing the unit as it currently stands.
    #[must_use]
    pub fn observe(&self, timestamp: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            timestamp,
            position: self.position,
            speed_kmh: self.speed_kmh,
            distance_meters: self.last_distance_meters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BoundingBox, FleetRevision, HistoryEntry, LatLng, Polygon, PolygonError, PublishError,
        SnapshotOrigin, Unit, UnitId, UnitStatus,
    };
    use chrono::{TimeZone, Utc};
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    fn triangle() -> Polygon {
        Polygon::from_pairs(&[(0.0, 0.0), (0.0, 2.0), (2.0, 1.0)]).expect("triangle")
    }

    #[test]
    fn polygon_rejects_fewer_than_three_vertices() {
        assert_eq!(
            Polygon::from_pairs(&[(0.0, 0.0), (1.0, 1.0)]),
            Err(PolygonError::TooFewVertices { count: 2 })
        );
    }

    #[test]
    fn bounding_box_encloses_polygon() {
        let bounds = triangle().bounding_box();
        assert_eq!(bounds, BoundingBox::new(0.0, 2.0, 0.0, 2.0));
        assert_eq!(bounds.centroid(), LatLng::new(1.0, 1.0));
    }

    #[test]
    fn speed_ranges_follow_status() {
        assert_eq!(UnitStatus::Outdoor.speed_range().min(), 10);
        assert_eq!(UnitStatus::Outdoor.speed_range().max(), 24);
        assert_eq!(UnitStatus::Indoor.speed_range().min(), 1);
        assert_eq!(UnitStatus::Indoor.speed_range().max(), 10);
        assert!(UnitStatus::Indoor.speed_range().contains(10));
        assert!(!UnitStatus::Indoor.speed_range().contains(11));
    }

    #[test]
    fn unit_ids_use_distinct_schemes() {
        assert_eq!(UnitId::global(0).as_str(), "10000");
        assert_eq!(UnitId::global(287).as_str(), "10287");
        assert_eq!(UnitId::simulated(7).as_str(), "SIM-7");
    }

    #[test]
    fn origins_imply_modes() {
        assert!(SnapshotOrigin::Movement.implied_mode().is_none());
        assert!(SnapshotOrigin::StatusOscillation.implied_mode().is_none());
        assert_eq!(
            SnapshotOrigin::Campaign.implied_mode(),
            Some(super::FleetMode::Campaign)
        );
        assert_eq!(
            SnapshotOrigin::Reset.implied_mode(),
            Some(super::FleetMode::Global)
        );
    }

    #[test]
    fn geofence_prefers_unit_boundary() {
        let landmass = Polygon::from_pairs(&[(5.0, 5.0), (5.0, 6.0), (6.0, 5.5)]).expect("landmass");
        let mut unit = sample_unit();
        assert_eq!(unit.geofence(&landmass), &landmass);
        unit.boundary = Some(triangle());
        assert_eq!(unit.geofence(&landmass), &triangle());
    }

    #[test]
    fn polygon_deserialization_enforces_vertex_minimum() {
        let json = r#"[{"latitude":0.0,"longitude":0.0},{"latitude":1.0,"longitude":1.0}]"#;
        assert!(serde_json::from_str::<Polygon>(json).is_err());

        let json = r#"[{"latitude":0.0,"longitude":0.0},{"latitude":1.0,"longitude":1.0},{"latitude":0.0,"longitude":1.0}]"#;
        let polygon = serde_json::from_str::<Polygon>(json).expect("three vertices");
        assert_eq!(polygon.vertices().len(), 3);
    }

    #[test]
    fn unit_round_trips_through_bincode() {
        let mut unit = sample_unit();
        unit.boundary = Some(triangle());
        assert_round_trip(&unit);
    }

    #[test]
    fn publish_error_round_trips_through_bincode() {
        assert_round_trip(&PublishError::StaleRevision {
            expected: FleetRevision::new(3),
            actual: FleetRevision::new(4),
        });
        assert_round_trip(&PublishError::DuplicateUnitId(UnitId::simulated(1)));
    }

    fn sample_unit() -> Unit {
        let timestamp = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp");
        Unit {
            id: UnitId::global(1),
            position: LatLng::new(40.75, -73.99),
            status: UnitStatus::Outdoor,
            speed_kmh: 12,
            last_distance_meters: 0,
            zone_id: "MIDTOWN_WEST".to_owned(),
            boundary: None,
            history: vec![HistoryEntry {
                timestamp,
                position: LatLng::new(40.751, -73.991),
                speed_kmh: 11,
                distance_meters: 15,
            }],
        }
    }
}
