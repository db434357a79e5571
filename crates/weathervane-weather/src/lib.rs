//! Weather resolution for Weathervane
//!
//! City name normalization, region classification, and the provider client
//! that turns one city into one typed weather record.

pub mod normalize;
pub mod provider;
pub mod region;
pub mod types;

pub use normalize::{normalize_city_name, CityQuery};
pub use provider::{interpret_payload, FetchError, HttpWeatherProvider, WeatherSource};
pub use region::classify_region;
pub use types::*;
