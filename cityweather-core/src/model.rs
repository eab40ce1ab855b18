use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Zero/zero is what the remote and the UI use for "no coordinates".
    pub fn is_unset(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }

    /// True when both axes are within `epsilon` degrees of `other`.
    pub fn within(&self, other: &Coordinates, epsilon: f64) -> bool {
        (self.lat - other.lat).abs() <= epsilon && (self.lon - other.lon).abs() <= epsilon
    }
}

/// Reference data for a city. `id` is zero when the source did not supply one
/// (remote geocoding answers carry no id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl City {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }
}

/// What a list widget needs from an entry.
pub trait ListItem {
    fn title(&self) -> &str;
    fn description(&self) -> String;
    fn filter_value(&self) -> &str;
}

impl ListItem for City {
    fn title(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("{}, Lat: {:.6}, Lon: {:.6}", self.country, self.lat, self.lon)
    }

    fn filter_value(&self) -> &str {
        &self.name
    }
}

/// Input to a weather lookup: a name, optionally already resolved to
/// coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub coordinates: Option<Coordinates>,
}

impl Location {
    pub fn named(name: impl Into<String>) -> Self {
        Self { id: 0, name: name.into(), coordinates: None }
    }

    pub fn at(coordinates: Coordinates) -> Self {
        Self { id: 0, name: String::new(), coordinates: Some(coordinates) }
    }

    /// A location with neither a name nor usable coordinates cannot be looked up.
    pub fn is_resolvable(&self) -> bool {
        self.coordinates.is_some() || !self.name.trim().is_empty()
    }
}

impl From<&City> for Location {
    fn from(city: &City) -> Self {
        let coordinates = city.coordinates();
        Self {
            id: city.id,
            name: city.name.clone(),
            coordinates: (!coordinates.is_unset()).then_some(coordinates),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: i64,
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// Snapshot of current conditions at a coordinate. Temperatures are metric.
///
/// `Option` fields are absent when the source did not report them; absence
/// is distinct from zero (no gust reported vs. a gust of 0 m/s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub city_id: i64,
    pub city_name: String,
    pub country: Option<String>,
    pub coordinates: Coordinates,

    pub condition: Option<Condition>,

    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub pressure: u32,
    pub sea_level: Option<u32>,
    pub ground_level: Option<u32>,

    pub wind_speed: f64,
    pub wind_deg: u16,
    pub wind_gust: Option<f64>,
    pub rain_1h: Option<f64>,
    pub cloudiness: u8,
    pub visibility: u32,

    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    /// Offset from UTC in seconds.
    pub timezone: i32,

    /// When the remote source recorded the observation.
    pub observed_at: DateTime<Utc>,
    /// When this process fetched it. Always set, whole seconds.
    pub fetched_at: DateTime<Utc>,
}

pub(crate) fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Current time truncated to whole seconds, matching what the store keeps.
pub(crate) fn now_seconds() -> DateTime<Utc> {
    unix_to_utc(Utc::now().timestamp()).unwrap_or_else(Utc::now)
}
