//! Cache-first resolution of city names and weather readings.

use chrono::Duration;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info, warn};

use crate::{
    City, Coordinates, Location, WeatherProvider, WeatherReading,
    error::{Result, WeatherError},
    store::Store,
};

/// How long a cached reading is served before the remote is asked again.
pub const CACHE_DURATION_MINUTES: i64 = 10;

/// Remote geocoding is only asked for the single best match.
const GEOCODING_LIMIT: u32 = 1;

/// How a free-text query is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CityQuery {
    Id(i64),
    Name(String),
}

impl CityQuery {
    /// All-digit input is a city id, anything else a name prefix.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = trimmed.parse() {
                return Self::Id(id);
            }
        }
        Self::Name(text.to_string())
    }
}

#[derive(Debug)]
pub struct WeatherService {
    store: Arc<Store>,
    provider: Box<dyn WeatherProvider>,
}

impl WeatherService {
    pub fn new(store: Arc<Store>, provider: Box<dyn WeatherProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cache_duration() -> Duration {
        Duration::minutes(CACHE_DURATION_MINUTES)
    }

    /// Run a store call on the blocking pool; SQLite work never runs on the
    /// async workers.
    async fn with_store<T, F>(&self, call: F) -> Result<T>
    where
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || call(&store)).await?
    }

    /// Resolve free text to cities: local id or prefix match first, remote
    /// geocoding only when the local table has nothing.
    pub async fn resolve_city(&self, query: &str) -> Result<Vec<City>> {
        match CityQuery::parse(query) {
            CityQuery::Id(id) => Ok(vec![self.resolve_city_by_id(id).await?]),
            CityQuery::Name(name) => self.resolve_city_by_name(&name).await,
        }
    }

    pub async fn resolve_city_by_id(&self, id: i64) -> Result<City> {
        self.with_store(move |store| store.find_city_by_id(id)).await
    }

    async fn resolve_city_by_name(&self, name: &str) -> Result<Vec<City>> {
        if name.trim().is_empty() {
            return Err(WeatherError::not_found("empty city name"));
        }

        let prefix = name.to_string();
        match self.with_store(move |store| store.find_cities_by_prefix(&prefix)).await {
            Ok(cities) if !cities.is_empty() => {
                debug!(query = name, count = cities.len(), "resolved city locally");
                return Ok(cities);
            }
            Ok(_) => {}
            Err(err) => warn!(query = name, error = %err, "local city lookup failed"),
        }

        info!(query = name, "city not in local table, asking remote geocoder");
        match self.provider.fetch_geocoding(name, GEOCODING_LIMIT).await {
            Ok(cities) if !cities.is_empty() => Ok(cities),
            Ok(_) => Err(not_found_anywhere(name)),
            Err(err) if err.is_not_found() => Err(not_found_anywhere(name)),
            // Any remote failure here reads as "no such city" to the caller.
            Err(err) => {
                warn!(query = name, error = %err, "remote geocoding failed");
                Err(not_found_anywhere(name))
            }
        }
    }

    /// Reverse-geocode coordinates to the nearest named city.
    pub async fn locate(&self, coordinates: Coordinates) -> Result<City> {
        self.provider
            .fetch_reverse_geocoding(coordinates, GEOCODING_LIMIT)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                WeatherError::not_found(format!(
                    "no city near ({}, {})",
                    coordinates.lat, coordinates.lon
                ))
            })
    }

    /// Current weather for `location`, served from cache when a reading within
    /// the coordinate window is younger than [`CACHE_DURATION_MINUTES`].
    ///
    /// A cache miss always goes to the network; a failed cache write is
    /// logged and the fetched reading is still returned.
    pub async fn get_weather(&self, location: &Location) -> Result<WeatherReading> {
        let coordinates = match location.coordinates {
            Some(coordinates) => coordinates,
            None => {
                let cities = self.resolve_city(&location.name).await?;
                let city = cities
                    .first()
                    .ok_or_else(|| not_found_anywhere(&location.name))?;
                city.coordinates()
            }
        };

        let cached = self
            .with_store(move |store| store.get_fresh_weather(coordinates, Self::cache_duration()))
            .await;
        match cached {
            Ok(cached) => {
                debug!(lat = coordinates.lat, lon = coordinates.lon, "weather cache hit");
                return Ok(cached);
            }
            Err(err) if err.is_not_found() => {
                debug!(lat = coordinates.lat, lon = coordinates.lon, "weather cache miss");
            }
            Err(err) => warn!(error = %err, "weather cache read failed, fetching remotely"),
        }

        let reading = self.provider.fetch_weather(coordinates).await?;

        let row = reading.clone();
        if let Err(err) = self.with_store(move |store| store.insert_weather(&row)).await {
            warn!(error = %err, "failed to cache the weather reading");
        }

        Ok(reading)
    }
}

fn not_found_anywhere(name: &str) -> WeatherError {
    WeatherError::not_found(format!("city '{name}' not found locally or via API"))
}
