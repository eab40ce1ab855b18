//! Core library for the `cityweather` terminal app.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather client behind a provider trait
//! - A SQLite store for the city list and cached readings
//! - Cache-first city and weather resolution
//! - The interactive search state machine and its event loop
//!
//! It is used by `cityweather-cli`, which supplies the terminal on top.

pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod search;
pub mod seed;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{Result, WeatherError};
pub use model::{City, Condition, Coordinates, ListItem, Location, WeatherReading};
pub use provider::{OpenWeatherProvider, WeatherProvider};
pub use service::{CityQuery, WeatherService};
pub use store::Store;
