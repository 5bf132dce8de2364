//! Host loop that owns the world and dispatches events to every system.

use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use metromesh_core::{
    Command, Event, FleetMode, FleetRevision, Geofences, HistoryEntry, Unit, UnitId,
};
use metromesh_system_campaign::{self as campaign, Campaign, CampaignEstimate, CampaignRequest};
use metromesh_system_generation::{self as generation, FleetSeeder};
use metromesh_system_movement::{self as movement, Movement};
use metromesh_system_status::{self as status, StatusOscillator};
use metromesh_system_tracking::{self as tracking, Tracker};
use metromesh_world::{self as world, query, World};
use serde::Serialize;
use tracing::debug;

use crate::settings::Settings;

/// Drives the world and its systems one tick at a time.
#[derive(Debug)]
pub(crate) struct Simulation {
    world: World,
    seeder: FleetSeeder,
    movement: Movement,
    status: StatusOscillator,
    campaign: Campaign,
    tracker: Tracker,
    tick: Duration,
}

impl Simulation {
    /// Creates an empty simulation; call [`Simulation::boot`] to populate it.
    pub(crate) fn new(settings: &Settings, geofences: Geofences, epoch: DateTime<Utc>) -> Self {
        let seed = settings.seed;
        let intervals = settings.intervals;
        Self {
            world: World::new(geofences, epoch),
            seeder: FleetSeeder::new(generation::Config::new(settings.fleet_size, seed)),
            movement: Movement::new(movement::Config::new(
                intervals.movement(),
                seed.wrapping_add(1),
            )),
            status: StatusOscillator::new(status::Config::new(
                intervals.status(),
                seed.wrapping_add(2),
            )),
            campaign: Campaign::new(campaign::Config::new(seed.wrapping_add(3))),
            tracker: Tracker::new(tracking::Config::new(intervals.log())),
            tick: intervals.movement(),
        }
    }

    /// Publishes the initial global fleet.
    pub(crate) fn boot(&mut self) {
        let mut commands = Vec::new();
        self.seeder.seed(
            query::fleet(&self.world),
            query::geofences(&self.world),
            query::clock(&self.world),
            &mut commands,
        );
        let events = self.submit(commands);
        self.settle(&events);
    }

    /// Validates `request` and replaces the global fleet with its campaign fleet.
    pub(crate) fn start_campaign(&mut self, request: CampaignRequest) -> Result<()> {
        request.validate(&query::geofences(&self.world).zones)?;
        let mut commands = Vec::new();
        self.campaign.start(
            request,
            query::fleet(&self.world),
            query::geofences(&self.world),
            query::clock(&self.world),
            &mut commands,
        );
        let events = self.submit(commands);
        self.settle(&events);
        if self.campaign.active().is_none() {
            bail!("campaign fleet was refused by the world");
        }
        Ok(())
    }

    /// Ends the running campaign by regenerating the global fleet.
    pub(crate) fn stop_campaign(&mut self) {
        let mut commands = Vec::new();
        self.seeder.reset(
            query::fleet(&self.world),
            query::geofences(&self.world),
            query::clock(&self.world),
            &mut commands,
        );
        let events = self.submit(commands);
        self.settle(&events);
    }

    /// Starts logging the unit named `id`.
    pub(crate) fn track(&mut self, id: UnitId) -> Result<()> {
        let now = query::clock(&self.world);
        if !self.tracker.select(id.clone(), query::fleet(&self.world), now) {
            bail!("unit {id} is not part of the current fleet");
        }
        Ok(())
    }

    /// Whether a campaign fleet is currently deployed.
    pub(crate) fn campaign_active(&self) -> bool {
        self.campaign.active().is_some()
    }

    /// Advances simulated time by `duration` in ticks of the movement cadence.
    pub(crate) fn advance(&mut self, duration: Duration) {
        let mut remaining = duration;
        while !remaining.is_zero() {
            let dt = remaining.min(self.tick);
            remaining -= dt;
            self.step(dt);
        }
    }

    fn step(&mut self, dt: Duration) {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick { dt }, &mut events);

        let mut commands = Vec::new();
        self.movement.handle(
            &events,
            query::fleet(&self.world),
            &query::geofences(&self.world).landmass,
            &mut commands,
        );
        let published = self.submit(commands);
        events.extend(published);

        let mut commands = Vec::new();
        self.status
            .handle(&events, query::fleet(&self.world), &mut commands);
        let published = self.submit(commands);
        events.extend(published);

        self.settle(&events);
    }

    fn submit(&mut self, commands: Vec<Command>) -> Vec<Event> {
        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }
        events
    }

    fn settle(&mut self, events: &[Event]) {
        self.campaign.handle(events);
        self.tracker.handle(
            events,
            query::fleet(&self.world),
            query::clock(&self.world),
        );
        debug!(
            revision = query::revision(&self.world).get(),
            events = events.len(),
            "systems settled"
        );
    }

    /// Captures the current state for presentation.
    pub(crate) fn report(&self) -> Report {
        let counts = query::status_counts(&self.world);
        Report {
            clock: query::clock(&self.world),
            ticks: query::tick_index(&self.world),
            revision: query::revision(&self.world),
            mode: query::mode(&self.world),
            indoor: counts.indoor,
            outdoor: counts.outdoor,
            campaign: self.campaign.active().map(|request| CampaignReport {
                estimate: request.estimate(),
                request: request.clone(),
            }),
            tracked: self.tracker.selected().map(|unit| TrackedReport {
                unit: unit.clone(),
                log: self.tracker.log().iter().cloned().collect(),
            }),
            units: query::fleet(&self.world).units().to_vec(),
        }
    }
}

/// Snapshot of a simulation suitable for printing or JSON output.
#[derive(Debug, Serialize)]
pub(crate) struct Report {
    pub(crate) clock: DateTime<Utc>,
    pub(crate) ticks: u64,
    pub(crate) revision: FleetRevision,
    pub(crate) mode: FleetMode,
    pub(crate) indoor: usize,
    pub(crate) outdoor: usize,
    pub(crate) campaign: Option<CampaignReport>,
    pub(crate) tracked: Option<TrackedReport>,
    pub(crate) units: Vec<Unit>,
}

/// Active campaign and its projected reach.
#[derive(Debug, Serialize)]
pub(crate) struct CampaignReport {
    pub(crate) request: CampaignRequest,
    pub(crate) estimate: CampaignEstimate,
}

/// Live log of the tracked unit, newest first.
#[derive(Debug, Serialize)]
pub(crate) struct TrackedReport {
    pub(crate) unit: UnitId,
    pub(crate) log: Vec<HistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use metromesh_world::catalog;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
            .single()
            .expect("valid epoch")
    }

    fn simulation(fleet_size: u32) -> Simulation {
        let settings = Settings {
            fleet_size,
            seed: 7,
            ..Settings::default()
        };
        let mut simulation = Simulation::new(&settings, catalog::reference_geofences(), epoch());
        simulation.boot();
        simulation
    }

    fn request(unit_count: u32, zones: &[&str]) -> CampaignRequest {
        CampaignRequest {
            unit_count,
            zones: zones.iter().map(|zone| (*zone).to_owned()).collect(),
            duration_weeks: 4,
            promotion_percent: 10,
        }
    }

    #[test]
    fn boot_publishes_global_fleet() {
        let report = simulation(288).report();
        assert_eq!(report.units.len(), 288);
        assert_eq!(report.revision, FleetRevision::new(1));
        assert_eq!(report.mode, FleetMode::Global);
        assert_eq!(report.indoor + report.outdoor, 288);
    }

    #[test]
    fn advancing_moves_and_reclassifies_units() {
        let mut simulation = simulation(30);
        simulation.advance(Duration::from_secs(600));
        let report = simulation.report();

        assert_eq!(report.ticks, 120);
        assert_eq!(report.clock, epoch() + chrono::Duration::seconds(600));
        // One initial publish, one per movement tick and two status re-rolls.
        assert_eq!(report.revision, FleetRevision::new(1 + 120 + 2));
        let landmass = &catalog::reference_geofences().landmass;
        for unit in &report.units {
            assert!(landmass.contains(unit.position));
            assert!(unit.status.speed_range().contains(unit.speed_kmh));
        }
    }

    #[test]
    fn partial_ticks_cover_the_whole_duration() {
        let mut simulation = simulation(5);
        simulation.advance(Duration::from_secs(12));
        let report = simulation.report();
        assert_eq!(report.ticks, 3);
        assert_eq!(report.clock, epoch() + chrono::Duration::seconds(12));
    }

    #[test]
    fn campaign_round_trip_restores_global_fleet() {
        let mut simulation = simulation(40);
        simulation
            .start_campaign(request(100, &["Times Square", "Chelsea"]))
            .expect("valid campaign");
        assert!(simulation.campaign_active());

        let report = simulation.report();
        assert_eq!(report.mode, FleetMode::Campaign);
        assert_eq!(report.units.len(), 100);
        let campaign = report.campaign.expect("campaign reported");
        assert_eq!(campaign.estimate.impressions, 100 * 4 * 30_912);

        simulation.stop_campaign();
        let report = simulation.report();
        assert!(!simulation.campaign_active());
        assert_eq!(report.mode, FleetMode::Global);
        assert_eq!(report.units.len(), 40);
        assert!(report.units.iter().all(|unit| unit.boundary.is_none()));
    }

    #[test]
    fn invalid_campaigns_leave_fleet_untouched() {
        let mut simulation = simulation(10);
        let error = simulation
            .start_campaign(request(60, &["Times Square", "SoHo"]))
            .expect_err("two zones need 100 units");
        assert!(error.to_string().contains("at most 1 zone"));
        assert_eq!(simulation.report().units.len(), 10);
    }

    #[test]
    fn tracking_follows_the_selected_unit() {
        let mut simulation = simulation(10);
        simulation.track(UnitId::global(3)).expect("unit exists");
        simulation.advance(Duration::from_secs(20));

        let tracked = simulation.report().tracked.expect("tracking active");
        assert_eq!(tracked.unit, UnitId::global(3));
        assert_eq!(tracked.log.len(), 5);
        assert!(tracked
            .log
            .windows(2)
            .all(|pair| pair[0].timestamp > pair[1].timestamp));

        assert!(simulation.track(UnitId::simulated(0)).is_err());
    }

    #[test]
    fn campaign_start_ends_tracking() {
        let mut simulation = simulation(10);
        simulation.track(UnitId::global(0)).expect("unit exists");
        simulation
            .start_campaign(request(50, &["SoHo"]))
            .expect("valid campaign");

        let report = simulation.report();
        assert!(report.tracked.is_none());
        assert_eq!(report.units[0].id, UnitId::simulated(0));
        assert!(simulation.track(UnitId::simulated(0)).is_ok());
    }
}
