//! Runtime settings loaded from an optional TOML file.
//!
//! Every key is optional; anything left out falls back to the reference
//! deployment so an empty file and no file at all behave the same.

use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use metromesh_core::{BoundingBox, Geofences, LatLng, Polygon, Zone, ZoneCatalog};
use metromesh_world::catalog;
use serde::Deserialize;

/// Settings that drive a simulation run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    /// Seed from which every system derives its random stream.
    pub(crate) seed: u64,
    /// Number of units in the global fleet.
    pub(crate) fleet_size: u32,
    /// Simulated start time; the wall clock when absent.
    pub(crate) epoch: Option<DateTime<Utc>>,
    /// Cadences of the periodic systems.
    pub(crate) intervals: Intervals,
    /// Replacements for parts of the reference geofences.
    pub(crate) geofences: GeofenceOverrides,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0,
            fleet_size: catalog::REFERENCE_FLEET_SIZE,
            epoch: None,
            intervals: Intervals::default(),
            geofences: GeofenceOverrides::default(),
        }
    }
}

/// Cadences, in simulated seconds, of the periodic systems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Intervals {
    /// Seconds per movement tick; also the driver's tick length.
    pub(crate) movement_secs: u64,
    /// Seconds between status re-rolls; zero disables them.
    pub(crate) status_secs: u64,
    /// Seconds between live log entries of a tracked unit; zero disables them.
    pub(crate) log_secs: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            movement_secs: 5,
            status_secs: 300,
            log_secs: 5,
        }
    }
}

impl Intervals {
    pub(crate) fn movement(&self) -> Duration {
        Duration::from_secs(self.movement_secs)
    }

    pub(crate) fn status(&self) -> Duration {
        Duration::from_secs(self.status_secs)
    }

    pub(crate) fn log(&self) -> Duration {
        Duration::from_secs(self.log_secs)
    }
}

/// Optional replacements for the reference geofences.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GeofenceOverrides {
    /// Landmass ring as `[latitude, longitude]` pairs.
    pub(crate) landmass: Option<Vec<(f64, f64)>>,
    /// Sampling rectangle; derived from the landmass override when absent.
    pub(crate) bounds: Option<BoundingBox>,
    /// Zone catalog replacing the reference neighbourhoods.
    pub(crate) zones: Option<Vec<ZoneSettings>>,
    /// Informational labels handed out to global units.
    pub(crate) zone_labels: Option<Vec<String>>,
}

/// One zone of an overriding catalog.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ZoneSettings {
    /// Name used to select the zone.
    pub(crate) name: String,
    /// Label position; the centre of the ring's bounding box when absent.
    #[serde(default)]
    pub(crate) anchor: Option<(f64, f64)>,
    /// Boundary as `[latitude, longitude]` pairs.
    pub(crate) ring: Vec<(f64, f64)>,
}

impl Settings {
    /// Loads settings from `path`, or the defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("invalid settings in {}", path.display()))
    }

    /// Parses and validates settings from TOML text.
    pub(crate) fn from_toml(contents: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(contents).context("failed to parse settings toml contents")?;
        if settings.intervals.movement_secs == 0 {
            bail!("intervals.movement_secs must be greater than zero");
        }
        Ok(settings)
    }

    /// Builds the geofences, applying any overrides to the reference deployment.
    pub(crate) fn geofences(&self) -> Result<Geofences> {
        let mut geofences = catalog::reference_geofences();
        let overrides = &self.geofences;

        if let Some(ring) = &overrides.landmass {
            geofences.landmass =
                Polygon::from_pairs(ring).context("invalid landmass override")?;
            geofences.bounds = geofences.landmass.bounding_box();
        }
        if let Some(bounds) = overrides.bounds {
            if bounds.min_lat() > bounds.max_lat() || bounds.min_lng() > bounds.max_lng() {
                bail!("bounds override has its minimum above its maximum");
            }
            geofences.bounds = bounds;
        }
        if let Some(zones) = &overrides.zones {
            geofences.zones = ZoneCatalog::new(
                zones
                    .iter()
                    .map(ZoneSettings::to_zone)
                    .collect::<Result<_>>()?,
            );
        }
        if let Some(labels) = &overrides.zone_labels {
            geofences.zone_labels = labels.clone();
        }

        Ok(geofences)
    }
}

impl ZoneSettings {
    fn to_zone(&self) -> Result<Zone> {
        let polygon = Polygon::from_pairs(&self.ring)
            .with_context(|| format!("invalid ring for zone `{}`", self.name))?;
        let anchor = match self.anchor {
            Some((latitude, longitude)) => LatLng::new(latitude, longitude),
            None => polygon.bounding_box().centroid(),
        };
        Ok(Zone {
            name: self.name.clone(),
            anchor,
            polygon,
        })
    }
}
