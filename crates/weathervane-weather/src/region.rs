//! Static city → region classification.

use crate::types::Region;

const EUROPE: &[&str] = &[
    "Kyiv", "London", "Paris", "Berlin", "Madrid", "Rome", "Warsaw", "Vienna", "Amsterdam",
    "Lisbon", "Prague",
];
const ASIA: &[&str] = &[
    "Tokyo", "Beijing", "Seoul", "Shanghai", "Delhi", "Mumbai", "Bangkok", "Singapore",
    "Jakarta",
];
const AMERICA: &[&str] = &[
    "New York", "Los Angeles", "Chicago", "Toronto", "Mexico City", "São Paulo",
    "Buenos Aires", "Lima",
];

const TABLE: &[(Region, &[&str])] = &[
    (Region::Europe, EUROPE),
    (Region::Asia, ASIA),
    (Region::America, AMERICA),
];

/// Classify a canonical city name.
///
/// Matching ignores case. Cities missing from the table are `Region::Other`.
pub fn classify_region(city: &str) -> Region {
    let city = city.trim();
    TABLE
        .iter()
        .find(|(_, cities)| cities.iter().any(|c| c.to_lowercase() == city.to_lowercase()))
        .map(|(region, _)| *region)
        .unwrap_or(Region::Other)
}
