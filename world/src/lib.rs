#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative fleet state management for MetroMesh.
//!
//! The world is the only writer of the fleet snapshot. Producers submit
//! complete replacement fleets through [`apply`]; a snapshot is accepted only
//! when it was derived from the revision the world currently holds.

pub mod catalog;

use std::{collections::HashSet, time::Duration};

use chrono::{DateTime, Utc};
use metromesh_core::{
    Command, Event, FleetMode, FleetRevision, Geofences, PublishError, SnapshotOrigin, Unit,
    UnitId,
};
use tracing::{debug, info, warn};

/// Represents the authoritative MetroMesh world state.
#[derive(Debug)]
pub struct World {
    geofences: Geofences,
    units: Vec<Unit>,
    revision: FleetRevision,
    mode: FleetMode,
    clock: DateTime<Utc>,
    tick_index: u64,
}

impl World {
    /// Creates an empty world guarded by the provided geofences.
    ///
    /// The fleet starts empty at revision zero in global mode; `epoch` seeds
    /// the simulation clock.
    #[must_use]
    pub fn new(geofences: Geofences, epoch: DateTime<Utc>) -> Self {
        Self {
            geofences,
            units: Vec::new(),
            revision: FleetRevision::default(),
            mode: FleetMode::Global,
            clock: epoch,
            tick_index: 0,
        }
    }

    /// Creates an empty world guarded by the reference deployment geofences.
    #[must_use]
    pub fn with_reference_geofences(epoch: DateTime<Utc>) -> Self {
        Self::new(catalog::reference_geofences(), epoch)
    }

    fn advance_clock(&mut self, dt: Duration) {
        let advanced = chrono::Duration::from_std(dt)
            .ok()
            .and_then(|delta| self.clock.checked_add_signed(delta));
        match advanced {
            Some(clock) => self.clock = clock,
            None => warn!(?dt, "clock advance overflowed; clock left unchanged"),
        }
        self.tick_index += 1;
    }

    fn publish(
        &mut self,
        base: FleetRevision,
        origin: SnapshotOrigin,
        units: Vec<Unit>,
        out_events: &mut Vec<Event>,
    ) {
        if base != self.revision {
            warn!(
                ?origin,
                expected = base.get(),
                actual = self.revision.get(),
                "fleet snapshot derived from stale revision"
            );
            out_events.push(Event::FleetPublishRejected {
                origin,
                reason: PublishError::StaleRevision {
                    expected: base,
                    actual: self.revision,
                },
            });
            return;
        }

        if let Some(duplicate) = first_duplicate_id(&units) {
            warn!(?origin, unit = %duplicate, "fleet snapshot contains duplicate unit id");
            out_events.push(Event::FleetPublishRejected {
                origin,
                reason: PublishError::DuplicateUnitId(duplicate),
            });
            return;
        }

        self.units = units;
        self.revision = self.revision.next();
        debug!(
            ?origin,
            revision = self.revision.get(),
            units = self.units.len(),
            "fleet snapshot published"
        );
        out_events.push(Event::FleetPublished {
            revision: self.revision,
            origin,
            unit_count: self.units.len(),
        });

        if let Some(mode) = origin.implied_mode() {
            if mode != self.mode {
                self.mode = mode;
                info!(?mode, "fleet mode changed");
                out_events.push(Event::FleetModeChanged { mode });
            }
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.advance_clock(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::PublishFleet {
            base,
            origin,
            units,
        } => world.publish(base, origin, units, out_events),
    }
}

fn first_duplicate_id(units: &[Unit]) -> Option<UnitId> {
    let mut seen = HashSet::with_capacity(units.len());
    units
        .iter()
        .find(|unit| !seen.insert(&unit.id))
        .map(|unit| unit.id.clone())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use chrono::{DateTime, Utc};
    use metromesh_core::{
        FleetMode, FleetRevision, FleetView, Geofences, Unit, UnitId, UnitStatus,
    };

    use super::World;

    /// Provides read-only access to the deployment geofences.
    #[must_use]
    pub fn geofences(world: &World) -> &Geofences {
        &world.geofences
    }

    /// Captures a read-only view of the authoritative fleet.
    #[must_use]
    pub fn fleet(world: &World) -> FleetView<'_> {
        FleetView::new(world.revision, &world.units)
    }

    /// Looks up a unit of the authoritative fleet by identifier.
    #[must_use]
    pub fn unit<'world>(world: &'world World, id: &UnitId) -> Option<&'world Unit> {
        world.units.iter().find(|unit| &unit.id == id)
    }

    /// Revision of the authoritative fleet.
    #[must_use]
    pub fn revision(world: &World) -> FleetRevision {
        world.revision
    }

    /// Whether the fleet roams globally or serves a campaign.
    #[must_use]
    pub fn mode(world: &World) -> FleetMode {
        world.mode
    }

    /// Current simulated wall-clock time.
    #[must_use]
    pub fn clock(world: &World) -> DateTime<Utc> {
        world.clock
    }

    /// Number of ticks applied since the world was created.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Counts the indoor and outdoor units of the authoritative fleet.
    #[must_use]
    pub fn status_counts(world: &World) -> StatusCounts {
        world
            .units
            .iter()
            .fold(StatusCounts::default(), |mut counts, unit| {
                match unit.status {
                    UnitStatus::Indoor => counts.indoor += 1,
                    UnitStatus::Outdoor => counts.outdoor += 1,
                }
                counts
            })
    }

    /// Tally of units per status.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct StatusCounts {
        /// Units currently indoors.
        pub indoor: usize,
        /// Units currently outdoors.
        pub outdoor: usize,
    }
}
