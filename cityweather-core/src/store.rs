//! SQLite-backed city table and weather cache.

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::{fs, path::Path};

use crate::{
    error::{Result, WeatherError},
    model::{City, Condition, Coordinates, WeatherReading, unix_to_utc},
};

/// Half-width of the coordinate window, in degrees, used when matching a
/// cached reading. Roughly 1 km.
pub const COORDINATE_EPSILON: f64 = 0.01;

/// Upper bound on rows returned by a prefix search.
pub const PREFIX_SEARCH_LIMIT: u32 = 50;

const WEATHER_COLUMNS: &str = "city_id, city_name, country, lat, lon, \
     weather_main, weather_desc, weather_icon, weather_id, \
     temp, feels_like, temp_min, temp_max, humidity, pressure, sea_level, ground_level, \
     wind_speed, wind_deg, wind_gust, rain_1h, cloudiness, visibility, \
     sunrise, sunset, weather_time, fetched_at, timezone";

/// One connection shared by every query; writes are transactional per call.
pub struct Store {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the database at `path`, creating parent directories
    /// and the schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            // Connection::open reports the failure if this did not work.
            let _ = fs::create_dir_all(parent);
        }
        Self::init(Connection::open(path)?)
    }

    /// Throwaway in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cities (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                country TEXT NOT NULL,
                lat REAL NOT NULL,
                lon REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cities_name ON cities(name);

            CREATE TABLE IF NOT EXISTS weather_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city_id INTEGER,
                city_name TEXT,
                country TEXT,
                lat REAL,
                lon REAL,
                weather_main TEXT,
                weather_desc TEXT,
                weather_icon TEXT,
                weather_id INTEGER,
                temp REAL,
                feels_like REAL,
                temp_min REAL,
                temp_max REAL,
                humidity INTEGER,
                pressure INTEGER,
                sea_level INTEGER,
                ground_level INTEGER,
                wind_speed REAL,
                wind_deg INTEGER,
                wind_gust REAL,
                rain_1h REAL,
                cloudiness INTEGER,
                visibility INTEGER,
                sunrise INTEGER,
                sunset INTEGER,
                weather_time INTEGER,
                fetched_at INTEGER,
                timezone INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_weather_cache_coords
                ON weather_cache(lat, lon, fetched_at);
            "#,
        )?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn find_city_by_id(&self, id: i64) -> Result<City> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, country, lat, lon FROM cities WHERE id = ?1",
            params![id],
            row_to_city,
        )
        .optional()?
        .ok_or_else(|| WeatherError::not_found(format!("no city with id {id}")))
    }

    /// Case-sensitive prefix match on the city name. No match is an empty list.
    pub fn find_cities_by_prefix(&self, text: &str) -> Result<Vec<City>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, country, lat, lon FROM cities
             WHERE substr(name, 1, length(?1)) = ?1
             ORDER BY name, id
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![text, PREFIX_SEARCH_LIMIT], row_to_city)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Insert a batch of cities in one transaction. Rows whose id already
    /// exists are left untouched. Returns the number of new rows.
    pub fn insert_cities(&self, batch: &[City]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO cities (id, name, country, lat, lon)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for city in batch {
                inserted +=
                    stmt.execute(params![city.id, city.name, city.country, city.lat, city.lon])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn city_count(&self) -> Result<i64> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM cities", [], |row| row.get(0))?)
    }

    /// Most recent reading whose coordinates lie within [`COORDINATE_EPSILON`]
    /// of `coordinates` on both axes and whose `fetched_at` is newer than
    /// `now - max_age`.
    pub fn get_fresh_weather(
        &self,
        coordinates: Coordinates,
        max_age: Duration,
    ) -> Result<WeatherReading> {
        let cutoff = (Utc::now() - max_age).timestamp();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {WEATHER_COLUMNS} FROM weather_cache
             WHERE lat BETWEEN ?1 AND ?2
               AND lon BETWEEN ?3 AND ?4
               AND fetched_at > ?5
             ORDER BY fetched_at DESC, id DESC
             LIMIT 1"
        ))?;

        stmt.query_row(
            params![
                coordinates.lat - COORDINATE_EPSILON,
                coordinates.lat + COORDINATE_EPSILON,
                coordinates.lon - COORDINATE_EPSILON,
                coordinates.lon + COORDINATE_EPSILON,
                cutoff,
            ],
            row_to_reading,
        )
        .optional()?
        .ok_or_else(|| {
            WeatherError::not_found(format!(
                "no fresh reading near ({}, {})",
                coordinates.lat, coordinates.lon
            ))
        })
    }

    /// Append a reading. Errors come back as [`WeatherError::CacheWrite`].
    pub fn insert_weather(&self, reading: &WeatherReading) -> Result<()> {
        self.insert_weather_tx(reading).map_err(WeatherError::CacheWrite)
    }

    fn insert_weather_tx(&self, r: &WeatherReading) -> rusqlite::Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let condition = r.condition.as_ref();

        tx.execute(
            &format!(
                "INSERT INTO weather_cache ({WEATHER_COLUMNS}) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)"
            ),
            params![
                r.city_id,
                r.city_name,
                r.country,
                r.coordinates.lat,
                r.coordinates.lon,
                condition.map(|c| c.main.as_str()),
                condition.map(|c| c.description.as_str()),
                condition.map(|c| c.icon.as_str()),
                condition.map(|c| c.id),
                r.temp,
                r.feels_like,
                r.temp_min,
                r.temp_max,
                r.humidity,
                r.pressure,
                r.sea_level,
                r.ground_level,
                r.wind_speed,
                r.wind_deg,
                r.wind_gust,
                r.rain_1h,
                r.cloudiness,
                r.visibility,
                r.sunrise.map(|t| t.timestamp()),
                r.sunset.map(|t| t.timestamp()),
                r.observed_at.timestamp(),
                r.fetched_at.timestamp(),
                r.timezone,
            ],
        )?;

        tx.commit()
    }
}

fn row_to_city(row: &rusqlite::Row) -> rusqlite::Result<City> {
    Ok(City {
        id: row.get(0)?,
        name: row.get(1)?,
        country: row.get(2)?,
        lat: row.get(3)?,
        lon: row.get(4)?,
    })
}

fn row_to_reading(row: &rusqlite::Row) -> rusqlite::Result<WeatherReading> {
    // Every cache column is nullable; required fields fall back to zero.
    let main: Option<String> = row.get(5)?;
    let condition = match main {
        Some(main) => Some(Condition {
            main,
            description: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            icon: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            id: row.get::<_, Option<i64>>(8)?.unwrap_or_default(),
        }),
        None => None,
    };

    let time = |idx: usize| -> rusqlite::Result<Option<chrono::DateTime<Utc>>> {
        Ok(row.get::<_, Option<i64>>(idx)?.and_then(unix_to_utc))
    };
    let fetched_at = time(26)?.unwrap_or_default();

    Ok(WeatherReading {
        city_id: row.get::<_, Option<i64>>(0)?.unwrap_or_default(),
        city_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        country: row.get(2)?,
        coordinates: Coordinates::new(
            row.get::<_, Option<f64>>(3)?.unwrap_or_default(),
            row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
        ),
        condition,
        temp: row.get::<_, Option<f64>>(9)?.unwrap_or_default(),
        feels_like: row.get::<_, Option<f64>>(10)?.unwrap_or_default(),
        temp_min: row.get::<_, Option<f64>>(11)?.unwrap_or_default(),
        temp_max: row.get::<_, Option<f64>>(12)?.unwrap_or_default(),
        humidity: row.get::<_, Option<u8>>(13)?.unwrap_or_default(),
        pressure: row.get::<_, Option<u32>>(14)?.unwrap_or_default(),
        sea_level: row.get(15)?,
        ground_level: row.get(16)?,
        wind_speed: row.get::<_, Option<f64>>(17)?.unwrap_or_default(),
        wind_deg: row.get::<_, Option<u16>>(18)?.unwrap_or_default(),
        wind_gust: row.get(19)?,
        rain_1h: row.get(20)?,
        cloudiness: row.get::<_, Option<u8>>(21)?.unwrap_or_default(),
        visibility: row.get::<_, Option<u32>>(22)?.unwrap_or_default(),
        sunrise: time(23)?,
        sunset: time(24)?,
        observed_at: time(25)?.unwrap_or(fetched_at),
        fetched_at,
        timezone: row.get::<_, Option<i32>>(27)?.unwrap_or_default(),
    })
}
