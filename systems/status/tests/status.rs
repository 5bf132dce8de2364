use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use metromesh_core::{
    Command, Event, FleetRevision, FleetView, LatLng, SnapshotOrigin, Unit, UnitId, UnitStatus,
};
use metromesh_system_generation::generate_initial_fleet;
use metromesh_system_status::{update_statuses, Config, StatusOscillator};
use metromesh_world::catalog;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn unit(index: u32, status: UnitStatus, speed_kmh: u32) -> Unit {
    Unit {
        id: UnitId::global(index),
        position: LatLng::new(40.75, -73.99),
        status,
        speed_kmh,
        last_distance_meters: 7,
        zone_id: "SOHO_N".to_owned(),
        boundary: None,
        history: Vec::new(),
    }
}

#[test]
fn reroll_leaves_position_and_history_untouched() {
    let geofences = catalog::reference_geofences();
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    let units = generate_initial_fleet(50, &geofences, now(), &mut rng);

    let rerolled = update_statuses(&units, &mut rng);

    assert_eq!(rerolled.len(), units.len());
    for (before, after) in units.iter().zip(&rerolled) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.position, after.position);
        assert_eq!(before.history, after.history);
        assert_eq!(before.zone_id, after.zone_id);
        assert_eq!(before.last_distance_meters, after.last_distance_meters);
        assert!(after.status.speed_range().contains(after.speed_kmh));
    }
}

#[test]
fn shared_speed_survives_status_flip() {
    // 10 km/h lies in both bounds, so it is never redrawn.
    let units: Vec<_> = (0..200)
        .map(|index| unit(index, UnitStatus::Outdoor, 10))
        .collect();
    let mut rng = ChaCha8Rng::seed_from_u64(32);

    let rerolled = update_statuses(&units, &mut rng);

    assert!(rerolled
        .iter()
        .any(|unit| unit.status == UnitStatus::Indoor));
    assert!(rerolled.iter().all(|unit| unit.speed_kmh == 10));
}

#[test]
fn fast_units_slow_down_when_moved_indoors() {
    let units: Vec<_> = (0..500)
        .map(|index| unit(index, UnitStatus::Outdoor, 24))
        .collect();
    let mut rng = ChaCha8Rng::seed_from_u64(33);

    let rerolled = update_statuses(&units, &mut rng);

    for unit in &rerolled {
        match unit.status {
            UnitStatus::Indoor => assert!((1..=10).contains(&unit.speed_kmh)),
            UnitStatus::Outdoor => assert_eq!(unit.speed_kmh, 24),
        }
    }
}

#[test]
fn oscillator_publishes_once_per_interval() {
    let units = vec![unit(0, UnitStatus::Outdoor, 12), unit(1, UnitStatus::Indoor, 3)];
    let revision = FleetRevision::new(4);
    let mut oscillator = StatusOscillator::new(Config::new(Duration::from_secs(300), 5));
    let mut commands = Vec::new();

    for _ in 0..59 {
        oscillator.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_secs(5),
            }],
            FleetView::new(revision, &units),
            &mut commands,
        );
    }
    assert!(commands.is_empty());

    oscillator.handle(
        &[Event::TimeAdvanced {
            dt: Duration::from_secs(5),
        }],
        FleetView::new(revision, &units),
        &mut commands,
    );
    assert_eq!(commands.len(), 1);
    match &commands[0] {
        Command::PublishFleet { base, origin, units: published } => {
            assert_eq!(*base, revision);
            assert_eq!(*origin, SnapshotOrigin::StatusOscillation);
            assert_eq!(published.len(), 2);
        }
        other => panic!("unexpected command emitted: {other:?}"),
    }
}

#[test]
fn oscillator_ignores_empty_fleet() {
    let mut oscillator = StatusOscillator::default();
    let mut commands = Vec::new();

    oscillator.handle(
        &[Event::TimeAdvanced {
            dt: Duration::from_secs(600),
        }],
        FleetView::new(FleetRevision::default(), &[]),
        &mut commands,
    );

    assert!(commands.is_empty());
}

proptest! {
    #[test]
    fn speeds_stay_within_new_bounds(
        seed in any::<u64>(),
        speeds in proptest::collection::vec(1_u32..=24, 1..40),
    ) {
        let units: Vec<_> = speeds
            .iter()
            .enumerate()
            .map(|(index, speed)| {
                let status = if *speed > 10 { UnitStatus::Outdoor } else { UnitStatus::Indoor };
                unit(index as u32, status, *speed)
            })
            .collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        for unit in update_statuses(&units, &mut rng) {
            prop_assert!(unit.status.speed_range().contains(unit.speed_kmh));
        }
    }
}
