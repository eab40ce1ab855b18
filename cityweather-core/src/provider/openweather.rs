use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::{
    error::{Result, WeatherError},
    model::{City, Condition, Coordinates, WeatherReading, now_seconds, unix_to_utc},
};

use super::WeatherProvider;

/// Generous whole-request deadline; callers wanting tighter latency wrap
/// calls in their own timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    weather_url: String,
    geocoding_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, weather_url: String, geocoding_url: String) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            api_key,
            weather_url,
            geocoding_url: geocoding_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Send, classify the status and decode the body into `T`.
    ///
    /// The body is only read as text on a non-2xx status, for diagnostics.
    /// A 2xx body is buffered and handed to serde_json rather than
    /// `Response::json`, which buffers the same way but would report a bad
    /// payload as a transport error instead of [`WeatherError::Decode`].
    /// The connection goes back to the pool when `response` drops, on every path.
    async fn fetch_and_decode<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::Api { status: status.as_u16(), body });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn geocode(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Vec<City>> {
        let url = format!("{}/{endpoint}", self.geocoding_url);

        let request = self
            .http
            .get(url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())]);

        Self::fetch_and_decode(request).await
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self), level = "info")]
    async fn fetch_weather(&self, coordinates: Coordinates) -> Result<WeatherReading> {
        let request = self.http.get(&self.weather_url).query(&[
            ("lat", coordinates.lat.to_string()),
            ("lon", coordinates.lon.to_string()),
            ("appid", self.api_key.clone()),
            ("units", "metric".to_string()),
        ]);

        let parsed: OwCurrentResponse = Self::fetch_and_decode(request).await?;
        debug!(city = %parsed.name, "decoded current weather");

        Ok(parsed.into_reading(now_seconds()))
    }

    #[instrument(skip(self), level = "info")]
    async fn fetch_geocoding(&self, city_name: &str, limit: u32) -> Result<Vec<City>> {
        let cities = self
            .geocode("direct", &[("q", city_name.to_string()), ("limit", limit.to_string())])
            .await?;

        if cities.is_empty() {
            return Err(WeatherError::not_found(format!("no cities found with name: {city_name}")));
        }
        Ok(cities)
    }

    #[instrument(skip(self), level = "info")]
    async fn fetch_reverse_geocoding(
        &self,
        coordinates: Coordinates,
        limit: u32,
    ) -> Result<Vec<City>> {
        let cities = self
            .geocode(
                "reverse",
                &[
                    ("lat", coordinates.lat.to_string()),
                    ("lon", coordinates.lon.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        if cities.is_empty() {
            return Err(WeatherError::not_found(format!(
                "no cities found with coordinates: ({}, {})",
                coordinates.lat, coordinates.lon
            )));
        }
        Ok(cities)
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: i64,
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: u32,
    humidity: u8,
    sea_level: Option<u32>,
    grnd_level: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: u16,
    gust: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwRain {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwClouds {
    #[serde(default)]
    all: u8,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    id: i64,
    #[serde(default)]
    name: String,
    coord: Coordinates,
    #[serde(default)]
    weather: Vec<OwWeather>,
    main: OwMain,
    #[serde(default)]
    wind: OwWind,
    rain: Option<OwRain>,
    #[serde(default)]
    clouds: OwClouds,
    #[serde(default)]
    visibility: u32,
    #[serde(default)]
    sys: OwSys,
    dt: i64,
    #[serde(default)]
    timezone: i32,
}

impl OwCurrentResponse {
    fn into_reading(self, fetched_at: DateTime<Utc>) -> WeatherReading {
        let condition = self.weather.into_iter().next().map(|w| Condition {
            id: w.id,
            main: w.main,
            description: w.description,
            icon: w.icon,
        });

        WeatherReading {
            city_id: self.id,
            city_name: self.name,
            country: self.sys.country.filter(|c| !c.is_empty()),
            coordinates: self.coord,
            condition,
            temp: self.main.temp,
            feels_like: self.main.feels_like,
            temp_min: self.main.temp_min,
            temp_max: self.main.temp_max,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            sea_level: self.main.sea_level,
            ground_level: self.main.grnd_level,
            wind_speed: self.wind.speed,
            wind_deg: self.wind.deg,
            wind_gust: self.wind.gust,
            rain_1h: self.rain.and_then(|r| r.one_hour),
            cloudiness: self.clouds.all,
            visibility: self.visibility,
            sunrise: self.sys.sunrise.and_then(unix_to_utc),
            sunset: self.sys.sunset.and_then(unix_to_utc),
            timezone: self.timezone,
            observed_at: unix_to_utc(self.dt).unwrap_or(fetched_at),
            fetched_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KOLKATA: &str = r#"{
        "coord": {"lon": 88.3697, "lat": 22.5697},
        "weather": [{"id": 721, "main": "Haze", "description": "haze", "icon": "50d"}],
        "base": "stations",
        "main": {"temp": 31.97, "feels_like": 38.97, "temp_min": 31.97, "temp_max": 31.97,
                 "pressure": 1004, "humidity": 66, "sea_level": 1004, "grnd_level": 1003},
        "visibility": 3500,
        "wind": {"speed": 3.6, "deg": 170},
        "clouds": {"all": 40},
        "dt": 1717405200,
        "sys": {"type": 1, "id": 9114, "country": "IN", "sunrise": 1717369500, "sunset": 1717418100},
        "timezone": 19800,
        "id": 1275004,
        "name": "Kolkata",
        "cod": 200
    }"#;

    #[test]
    fn maps_current_weather_payload() {
        let parsed: OwCurrentResponse = serde_json::from_str(KOLKATA).expect("valid payload");
        let fetched_at = unix_to_utc(1717405500).expect("valid ts");
        let reading = parsed.into_reading(fetched_at);

        assert_eq!(reading.city_id, 1275004);
        assert_eq!(reading.city_name, "Kolkata");
        assert_eq!(reading.country.as_deref(), Some("IN"));
        assert_eq!(reading.condition.as_ref().map(|c| c.icon.as_str()), Some("50d"));
        assert_eq!(reading.humidity, 66);
        assert_eq!(reading.ground_level, Some(1003));
        assert_eq!(reading.timezone, 19800);
        assert_eq!(reading.observed_at.timestamp(), 1717405200);
        assert_eq!(reading.fetched_at, fetched_at);
    }

    #[test]
    fn absent_optionals_stay_absent() {
        let parsed: OwCurrentResponse = serde_json::from_str(KOLKATA).expect("valid payload");
        let reading = parsed.into_reading(now_seconds());

        assert_eq!(reading.wind_gust, None);
        assert_eq!(reading.rain_1h, None);
    }

    #[test]
    fn reported_zero_gust_is_kept() {
        let json = r#"{
            "coord": {"lon": 1.0, "lat": 2.0},
            "weather": [],
            "main": {"temp": 1, "feels_like": 1, "temp_min": 1, "temp_max": 1, "pressure": 1000, "humidity": 50},
            "wind": {"speed": 0, "deg": 0, "gust": 0},
            "rain": {"1h": 0.25},
            "dt": 1717405200
        }"#;
        let parsed: OwCurrentResponse = serde_json::from_str(json).expect("valid payload");
        let reading = parsed.into_reading(now_seconds());

        assert_eq!(reading.wind_gust, Some(0.0));
        assert_eq!(reading.rain_1h, Some(0.25));
        assert_eq!(reading.condition, None);
        assert_eq!(reading.country, None);
        assert_eq!(reading.sunrise, None);
    }

    #[test]
    fn geocoding_base_url_trailing_slash_is_trimmed() {
        let provider = OpenWeatherProvider::new(
            "KEY".into(),
            "http://localhost/weather".into(),
            "http://localhost/geo/".into(),
        )
        .expect("client builds");
        assert_eq!(provider.geocoding_url, "http://localhost/geo");
    }
}
