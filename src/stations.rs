/// Location registry for the Senegal basin forecasting engine.
///
/// Defines the canonical list of gauge stations, dams and sub-basins the
/// engine forecasts for, along with their coordinates and characteristic
/// discharge. This is the single source of truth for location ids; other
/// modules resolve ids through here rather than hardcoding metadata.

use crate::model::{Location, LocationKind};

// ---------------------------------------------------------------------------
// Registry entries
// ---------------------------------------------------------------------------

/// Static metadata for one monitored location.
pub struct RegisteredLocation {
    pub id: &'static str,
    pub name: &'static str,
    /// Human-readable description of the location's role in the basin.
    pub description: &'static str,
    pub kind: LocationKind,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Characteristic discharge in m³/s.
    pub baseline_discharge: f64,
}

impl RegisteredLocation {
    pub fn to_location(&self) -> Location {
        Location {
            id: self.id.to_string(),
            name: self.name.to_string(),
            kind: self.kind,
            latitude: self.latitude,
            longitude: self.longitude,
            baseline_discharge: self.baseline_discharge,
        }
    }
}

/// Defaults applied to ids that are not in the registry.
pub const DEFAULT_LATITUDE: f64 = 14.0;
pub const DEFAULT_LONGITUDE: f64 = -12.0;
pub const DEFAULT_BASELINE_DISCHARGE: f64 = 1000.0;

/// All locations served by the engine, ordered downstream stations first,
/// then dams, then sub-basins.
pub static LOCATION_REGISTRY: &[RegisteredLocation] = &[
    RegisteredLocation {
        id: "station_001",
        name: "Bakel",
        description: "Main-stem reference gauge below the Falémé confluence. \
                      Primary flood-stage reference for the middle valley.",
        kind: LocationKind::Station,
        latitude: 14.22,
        longitude: -11.92,
        baseline_discharge: 1250.0,
    },
    RegisteredLocation {
        id: "station_002",
        name: "Matam",
        description: "Middle-valley gauge; floods here lag Bakel by about a day.",
        kind: LocationKind::Station,
        latitude: 14.13,
        longitude: -11.77,
        baseline_discharge: 950.0,
    },
    RegisteredLocation {
        id: "station_003",
        name: "Kaédi",
        description: "Lower middle-valley gauge upstream of the Diama reach.",
        kind: LocationKind::Station,
        latitude: 13.83,
        longitude: -13.15,
        baseline_discharge: 550.0,
    },
    RegisteredLocation {
        id: "dam_manantali",
        name: "Manantali",
        description: "Regulating reservoir on the Bafing. Hydropower and \
                      flood attenuation for the whole valley.",
        kind: LocationKind::Dam,
        latitude: 12.08,
        longitude: -7.98,
        baseline_discharge: 1200.0,
    },
    RegisteredLocation {
        id: "dam_diama",
        name: "Diama",
        description: "Anti-salinity barrage near the estuary.",
        kind: LocationKind::Dam,
        latitude: 14.72,
        longitude: -14.65,
        baseline_discharge: 800.0,
    },
    RegisteredLocation {
        id: "dam_felou",
        name: "Félou",
        description: "Run-of-river hydropower site below Manantali.",
        kind: LocationKind::Dam,
        latitude: 13.2,
        longitude: -8.1,
        baseline_discharge: 450.0,
    },
    RegisteredLocation {
        id: "basin_001",
        name: "Upper Fouta Djallon basin",
        description: "Headwater catchment; source of most wet-season runoff.",
        kind: LocationKind::Basin,
        latitude: 10.5,
        longitude: -10.5,
        baseline_discharge: DEFAULT_BASELINE_DISCHARGE,
    },
    RegisteredLocation {
        id: "basin_002",
        name: "Middle western Sudan basin",
        description: "Regulated middle basin containing Manantali and Félou.",
        kind: LocationKind::Basin,
        latitude: 12.8,
        longitude: -8.2,
        baseline_discharge: DEFAULT_BASELINE_DISCHARGE,
    },
    RegisteredLocation {
        id: "basin_003",
        name: "Sahelian delta basin",
        description: "Delta and estuary downstream of Diama.",
        kind: LocationKind::Basin,
        latitude: 14.8,
        longitude: -14.5,
        baseline_discharge: DEFAULT_BASELINE_DISCHARGE,
    },
];

/// Looks up a location by id. Returns `None` if not found.
pub fn find_location(id: &str) -> Option<&'static RegisteredLocation> {
    LOCATION_REGISTRY.iter().find(|l| l.id == id)
}

/// Returns the ids of every registered location of the given kind.
pub fn locations_of_kind(kind: LocationKind) -> Vec<&'static str> {
    LOCATION_REGISTRY
        .iter()
        .filter(|l| l.kind == kind)
        .map(|l| l.id)
        .collect()
}

/// Resolves any id to a `Location`, never failing.
///
/// Unknown ids keep their id as a name, are treated as dams when the id
/// starts with `dam`, and take the default coordinates and baseline.
pub fn resolve_location(id: &str) -> Location {
    match find_location(id) {
        Some(registered) => registered.to_location(),
        None => Location {
            id: id.to_string(),
            name: id.to_string(),
            kind: if id.starts_with("dam") {
                LocationKind::Dam
            } else {
                LocationKind::Station
            },
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            baseline_discharge: DEFAULT_BASELINE_DISCHARGE,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
