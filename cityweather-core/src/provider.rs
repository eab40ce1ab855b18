use crate::{City, Config, Coordinates, WeatherReading, error::Result};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// Remote source of weather readings and geocoding answers.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions at a coordinate, metric units.
    async fn fetch_weather(&self, coordinates: Coordinates) -> Result<WeatherReading>;

    /// Forward geocoding. Fails with `NotFound` when nothing matches.
    async fn fetch_geocoding(&self, city_name: &str, limit: u32) -> Result<Vec<City>>;

    /// Reverse geocoding. Fails with `NotFound` when nothing matches.
    async fn fetch_reverse_geocoding(
        &self,
        coordinates: Coordinates,
        limit: u32,
    ) -> Result<Vec<City>>;
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.api_key()?;

    let provider = OpenWeatherProvider::new(
        api_key.to_owned(),
        config.weather_url().to_owned(),
        config.geocoding_url().to_owned(),
    )?;

    Ok(Box::new(provider))
}
