//! Reference deployment data: the Manhattan landmass between Canal St and
//! 59th St, its sampling rectangle, and the neighbourhood catalog.

use metromesh_core::{BoundingBox, Geofences, LatLng, Polygon, Zone, ZoneCatalog};

/// Size of the global fleet in the reference deployment.
pub const REFERENCE_FLEET_SIZE: u32 = 288;

const LANDMASS: [(f64, f64); 7] = [
    (40.7711, -73.9942), // 59th & West Side Hwy
    (40.7570, -74.0075), // 34th & West Side
    (40.7240, -74.0110), // Canal & West Side
    (40.7150, -73.9920), // Canal & Lower East
    (40.7300, -73.9740), // Stuyvesant Cove
    (40.7430, -73.9710), // 34th & FDR
    (40.7590, -73.9590), // 59th & FDR
];

const BOUNDS: BoundingBox = BoundingBox::new(40.7140, 40.7720, -74.0120, -73.9590);

const ZONE_LABELS: [&str; 11] = [
    "TIMES_SQUARE_CORE",
    "TIMES_SQUARE_N",
    "TIMES_SQUARE_S",
    "HELLS_KITCHEN_E",
    "MIDTOWN_WEST",
    "THEATER_DISTRICT",
    "BRYANT_PARK_NW",
    "SOHO_N",
    "TRIBECA_E",
    "CHELSEA_S",
    "GARMENT_DISTRICT",
];

struct ZoneSeed {
    name: &'static str,
    anchor: (f64, f64),
    ring: &'static [(f64, f64)],
}

const ZONES: [ZoneSeed; 16] = [
    ZoneSeed {
        name: "Hell's Kitchen",
        anchor: (40.7638, -73.9918),
        ring: &[
            (40.7711, -73.9942),
            (40.7570, -74.0075),
            (40.7536, -73.9991),
            (40.7569, -73.9895),
            (40.7681, -73.9824),
        ],
    },
    ZoneSeed {
        name: "Times Square",
        anchor: (40.7580, -73.9855),
        ring: &[
            (40.7618, -73.9880),
            (40.7540, -73.9918),
            (40.7523, -73.9858),
            (40.7595, -73.9818),
        ],
    },
    ZoneSeed {
        name: "Chelsea",
        anchor: (40.7465, -74.0014),
        ring: &[
            (40.7538, -74.0022),
            (40.7437, -74.0079),
            (40.7396, -73.9994),
            (40.7483, -73.9904),
        ],
    },
    ZoneSeed {
        name: "Midtown East",
        anchor: (40.7549, -73.9718),
        ring: &[
            (40.7590, -73.9590),
            (40.7490, -73.9675),
            (40.7530, -73.9780),
            (40.7630, -73.9720),
        ],
    },
    ZoneSeed {
        name: "Midtown West",
        anchor: (40.7589, -73.9890),
        ring: &[
            (40.7700, -73.9820),
            (40.7550, -73.9950),
            (40.7480, -73.9880),
            (40.7600, -73.9750),
        ],
    },
    ZoneSeed {
        name: "Garment District",
        anchor: (40.7547, -73.9916),
        ring: &[
            (40.7570, -73.9960),
            (40.7490, -73.9990),
            (40.7470, -73.9880),
            (40.7540, -73.9850),
        ],
    },
    ZoneSeed {
        name: "Murray Hill",
        anchor: (40.7479, -73.9757),
        ring: &[
            (40.7530, -73.9720),
            (40.7450, -73.9700),
            (40.7440, -73.9820),
            (40.7510, -73.9830),
        ],
    },
    ZoneSeed {
        name: "Columbus Circle",
        anchor: (40.7681, -73.9824),
        ring: &[
            (40.7711, -73.9840),
            (40.7650, -73.9850),
            (40.7660, -73.9780),
            (40.7720, -73.9800),
        ],
    },
    ZoneSeed {
        name: "Hudson Yards",
        anchor: (40.7538, -74.0022),
        ring: &[
            (40.7580, -74.0080),
            (40.7480, -74.0080),
            (40.7490, -73.9970),
            (40.7580, -73.9970),
        ],
    },
    ZoneSeed {
        name: "SoHo",
        anchor: (40.7233, -74.0030),
        ring: &[
            (40.7290, -74.0050),
            (40.7190, -74.0070),
            (40.7200, -73.9950),
            (40.7280, -73.9950),
        ],
    },
    ZoneSeed {
        name: "East Village",
        anchor: (40.7265, -73.9815),
        ring: &[
            (40.7330, -73.9910),
            (40.7220, -73.9910),
            (40.7220, -73.9720),
            (40.7330, -73.9720),
        ],
    },
    ZoneSeed {
        name: "Upper West Side",
        anchor: (40.7870, -73.9754),
        ring: &[
            (40.7710, -73.9940),
            (40.7680, -73.9820),
            (40.7750, -73.9750),
            (40.7800, -73.9850),
        ],
    },
    ZoneSeed {
        name: "Upper East Side",
        anchor: (40.7736, -73.9566),
        ring: &[
            (40.7750, -73.9650),
            (40.7640, -73.9720),
            (40.7590, -73.9590),
            (40.7720, -73.9500),
        ],
    },
    ZoneSeed {
        name: "Tribeca",
        anchor: (40.7163, -74.0086),
        ring: &[
            (40.7240, -74.0110),
            (40.7120, -74.0120),
            (40.7140, -74.0030),
            (40.7220, -74.0020),
        ],
    },
    ZoneSeed {
        name: "Financial District",
        anchor: (40.7075, -74.0113),
        ring: &[
            (40.7120, -74.0150),
            (40.7000, -74.0160),
            (40.7030, -74.0050),
            (40.7110, -74.0050),
        ],
    },
    ZoneSeed {
        name: "Greenwich Village",
        anchor: (40.7336, -74.0027),
        ring: &[
            (40.7390, -74.0050),
            (40.7280, -74.0080),
            (40.7290, -73.9910),
            (40.7370, -73.9910),
        ],
    },
];

/// Geofences of the reference deployment.
#[must_use]
pub fn reference_geofences() -> Geofences {
    Geofences {
        landmass: reference_polygon(&LANDMASS),
        bounds: BOUNDS,
        zones: reference_zones(),
        zone_labels: ZONE_LABELS.iter().map(|label| (*label).to_owned()).collect(),
    }
}

/// Neighbourhood catalog of the reference deployment.
#[must_use]
pub fn reference_zones() -> ZoneCatalog {
    ZoneCatalog::new(
        ZONES
            .iter()
            .map(|seed| Zone {
                name: seed.name.to_owned(),
                anchor: LatLng::new(seed.anchor.0, seed.anchor.1),
                polygon: reference_polygon(seed.ring),
            })
            .collect(),
    )
}

fn reference_polygon(ring: &[(f64, f64)]) -> Polygon {
    Polygon::from_pairs(ring).expect("reference rings have at least three vertices")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_deployment_matches_expected_shape() {
        let geofences = reference_geofences();
        assert_eq!(geofences.landmass.vertices().len(), 7);
        assert_eq!(geofences.zones.len(), 16);
        assert_eq!(geofences.zone_labels.len(), 11);
    }

    #[test]
    fn sampling_bounds_enclose_landmass() {
        let geofences = reference_geofences();
        let enclosing = geofences.landmass.bounding_box();
        assert!(geofences.bounds.min_lat() <= enclosing.min_lat());
        assert!(geofences.bounds.max_lat() >= enclosing.max_lat());
        assert!(geofences.bounds.min_lng() <= enclosing.min_lng());
        assert!(geofences.bounds.max_lng() >= enclosing.max_lng());
    }

    #[test]
    fn zones_resolve_by_name() {
        let zones = reference_zones();
        let times_square = zones.resolve("Times Square").expect("times square");
        assert_eq!(times_square.polygon.vertices().len(), 4);
        assert!(zones.resolve("Atlantis").is_none());
    }
}
