#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Campaign fleet construction and the booking rules that surround it.
//!
//! [`build_campaign_fleet`] spreads a requested number of units over a set of
//! named zones, confining each unit to its zone polygon. The booking helpers
//! ([`CampaignRequest`], [`max_zones_for`], [`CampaignEstimate`]) enforce and
//! price what an operator may ask for; the builder itself never consults them.

use chrono::{DateTime, Utc};
use metromesh_core::{
    Command, Event, FleetMode, FleetView, Geofences, SnapshotOrigin, Unit, ZoneCatalog,
};
use metromesh_system_generation::{generate_unit, Scope};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Units a campaign must book per selected zone.
pub const UNITS_PER_ZONE_ALLOWANCE: u32 = 50;
/// Estimated impressions delivered by one unit during one week.
pub const IMPRESSIONS_PER_UNIT_WEEK: f64 = 30_912.0;
/// Price in dollars of one unit during one week.
pub const COST_PER_UNIT_WEEK: f64 = 105.0;

/// Number of units generated for each zone of a campaign.
///
/// The result is rounded, so the whole campaign fleet may differ from
/// `total` by the rounding error multiplied by the zone count.
#[must_use]
pub fn units_per_zone(total: u32, zone_count: usize) -> u32 {
    if zone_count == 0 {
        return 0;
    }
    (f64::from(total) / zone_count as f64).round() as u32
}

/// Builds a replacement fleet confined to the named zones.
///
/// An empty `zone_names` yields an empty fleet. Names that the catalog in
/// `geofences` cannot resolve are skipped and their share of units is not
/// produced. Identifiers are `SIM-<n>` with `n` increasing across all zones.
pub fn build_campaign_fleet<R>(
    total: u32,
    zone_names: &[String],
    geofences: &Geofences,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<Unit>
where
    R: Rng + ?Sized,
{
    let quota = units_per_zone(total, zone_names.len());
    let mut units = Vec::new();
    let mut index = 0_u32;

    for name in zone_names {
        let Some(zone) = geofences.zones.resolve(name) else {
            debug!(zone = %name, "campaign zone not in catalog; skipping its quota");
            continue;
        };
        for _ in 0..quota {
            units.push(generate_unit(
                index,
                Scope::Zone(&zone.polygon),
                geofences,
                now,
                rng,
            ));
            index += 1;
        }
    }

    units
}

/// Largest number of zones a campaign of `unit_count` units may select.
#[must_use]
pub fn max_zones_for(unit_count: u32) -> usize {
    (unit_count / UNITS_PER_ZONE_ALLOWANCE).max(1) as usize
}

/// Campaign booking submitted by an operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRequest {
    /// Total units requested across all zones.
    pub unit_count: u32,
    /// Names of the zones to cover, in selection order.
    pub zones: Vec<String>,
    /// Length of the campaign in weeks.
    pub duration_weeks: u32,
    /// Advertised discount in percent. Informational only.
    pub promotion_percent: u8,
}

impl CampaignRequest {
    /// Checks the booking against the zone-cap rule and the catalog.
    pub fn validate(&self, catalog: &ZoneCatalog) -> Result<(), CampaignRequestError> {
        if self.zones.is_empty() {
            return Err(CampaignRequestError::NoZones);
        }

        let allowed = max_zones_for(self.unit_count);
        if self.zones.len() > allowed {
            return Err(CampaignRequestError::TooManyZones {
                requested: self.zones.len(),
                allowed,
                unit_count: self.unit_count,
            });
        }

        if let Some(unknown) = self.zones.iter().find(|name| catalog.resolve(name).is_none()) {
            return Err(CampaignRequestError::UnknownZone(unknown.clone()));
        }

        Ok(())
    }

    /// Estimate of the reach and price of this booking.
    #[must_use]
    pub fn estimate(&self) -> CampaignEstimate {
        CampaignEstimate::new(self.unit_count, self.duration_weeks)
    }
}

/// Reasons a campaign booking is refused.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CampaignRequestError {
    /// No zone was selected.
    #[error("campaign must select at least one zone")]
    NoZones,
    /// More zones were selected than the unit count allows.
    #[error("{unit_count} units allow at most {allowed} zone(s), {requested} selected")]
    TooManyZones {
        /// Number of zones selected.
        requested: usize,
        /// Number of zones the unit count allows.
        allowed: usize,
        /// Units booked.
        unit_count: u32,
    },
    /// A selected zone is missing from the catalog.
    #[error("unknown zone `{0}`")]
    UnknownZone(String),
}

/// Reach and price projected for a campaign.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CampaignEstimate {
    /// Estimated impressions over the whole campaign.
    pub impressions: u64,
    /// Estimated cost in whole dollars.
    pub cost: u64,
    /// Cost per thousand impressions, zero when no impressions are expected.
    pub cpm: f64,
}

impl CampaignEstimate {
    /// Projects the estimate for `unit_count` units over `duration_weeks` weeks.
    #[must_use]
    pub fn new(unit_count: u32, duration_weeks: u32) -> Self {
        let unit_weeks = f64::from(unit_count) * f64::from(duration_weeks);
        let impressions = (unit_weeks * IMPRESSIONS_PER_UNIT_WEEK).round() as u64;
        let cost = (unit_weeks * COST_PER_UNIT_WEEK).round() as u64;
        let cpm = if impressions > 0 {
            cost as f64 / (impressions as f64 / 1000.0)
        } else {
            0.0
        };
        Self {
            impressions,
            cost,
            cpm,
        }
    }
}

/// Configuration parameters required to construct the campaign system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration using the provided seed.
    #[must_use]
    pub const fn new(rng_seed: u64) -> Self {
        Self { rng_seed }
    }
}

/// System that swaps the global fleet for a campaign fleet on demand.
#[derive(Debug)]
pub struct Campaign {
    active: Option<CampaignRequest>,
    rng: ChaCha8Rng,
}

impl Campaign {
    /// Creates a new campaign system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            active: None,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Booking whose fleet is currently deployed, if any.
    #[must_use]
    pub fn active(&self) -> Option<&CampaignRequest> {
        self.active.as_ref()
    }

    /// Emits the campaign fleet for `request` on top of the observed snapshot.
    ///
    /// A request without zones is ignored and the current fleet stays in place.
    pub fn start(
        &mut self,
        request: CampaignRequest,
        fleet: FleetView<'_>,
        geofences: &Geofences,
        now: DateTime<Utc>,
        out: &mut Vec<Command>,
    ) {
        if request.zones.is_empty() {
            debug!("campaign without zones ignored");
            return;
        }

        let units = build_campaign_fleet(
            request.unit_count,
            &request.zones,
            geofences,
            now,
            &mut self.rng,
        );
        info!(
            requested = request.unit_count,
            generated = units.len(),
            zones = request.zones.len(),
            "campaign fleet built"
        );
        out.push(Command::PublishFleet {
            base: fleet.revision(),
            origin: SnapshotOrigin::Campaign,
            units,
        });
        self.active = Some(request);
    }

    /// Forgets the active booking once the world leaves campaign mode or
    /// refuses the campaign fleet.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::FleetModeChanged {
                    mode: FleetMode::Global,
                } => {
                    if self.active.take().is_some() {
                        info!("campaign ended");
                    }
                }
                Event::FleetPublishRejected {
                    origin: SnapshotOrigin::Campaign,
                    reason,
                } => {
                    warn!(?reason, "campaign fleet refused");
                    self.active = None;
                }
                _ => {}
            }
        }
    }
}

impl Default for Campaign {
    fn default() -> Self {
        Self::new(Config::new(0))
    }
}
