use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use cityweather_core::{
    Config, Coordinates, Location, Store, WeatherService,
    config::{DEFAULT_GEOCODING_URL, DEFAULT_WEATHER_URL},
    provider::provider_from_config,
    search::{Dispatcher, SearchState, run_event_loop},
    seed::{DEFAULT_BATCH_SIZE, import_cities},
};
use console::Term;
use inquire::{Password, PasswordDisplayMode, Text};
use std::{fs::File, path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tracing::info;

use crate::{logging, terminal, view};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "cityweather", version, about = "Search cities and show their current weather")]
pub struct Cli {
    /// Defaults to the interactive search.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive city search.
    Search,

    /// Print current weather for a city name, city id or coordinates.
    Show {
        /// City name prefix or numeric city id.
        city: Option<String>,

        #[arg(long, requires = "lon", conflicts_with = "city", allow_negative_numbers = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", conflicts_with = "city", allow_negative_numbers = true)]
        lon: Option<f64>,
    },

    /// Set the API key and endpoints interactively.
    Configure,

    /// Load a city list (JSON array or one JSON object per line) into the local store.
    Import {
        file: PathBuf,

        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command.unwrap_or(Command::Search) {
            Command::Search => {
                logging::init_file()?;
                search().await
            }
            Command::Show { city, lat, lon } => {
                logging::init_stderr();
                let location = match (city, lat, lon) {
                    (_, Some(lat), Some(lon)) => Location::at(Coordinates::new(lat, lon)),
                    (Some(city), _, _) => Location::named(city),
                    _ => bail!("Give a city name or both --lat and --lon"),
                };
                show(location).await
            }
            Command::Configure => configure(),
            Command::Import { file, batch_size } => {
                logging::init_stderr();
                import(file, batch_size)
            }
        }
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<Store>> {
    let path = config.database_path()?;
    let store = Store::open(&path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    Ok(Arc::new(store))
}

fn build_service() -> anyhow::Result<WeatherService> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;
    let store = open_store(&config)?;
    Ok(WeatherService::new(store, provider))
}

async fn search() -> anyhow::Result<()> {
    let term = Term::stdout();
    if !term.is_term() {
        bail!("Interactive search needs a terminal. Use `cityweather show <city>` instead.");
    }

    let service = Arc::new(build_service()?);
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::new(service, tx.clone());

    let keys = terminal::spawn_key_reader(term.clone(), tx.clone());
    terminal::spawn_resize_watcher(term.clone(), tx);

    let state = {
        let _cursor = terminal::CursorGuard::hide(term.clone());
        let mut view = view::TerminalView::new(term.clone(), keys);
        run_event_loop(SearchState::new(), &dispatcher, rx, &mut view).await?
    };

    term.clear_screen()?;
    if let Some(err) = state.error() {
        bail!(err.user_message());
    }
    Ok(())
}

async fn show(location: Location) -> anyhow::Result<()> {
    let service = build_service()?;

    let location = match location.coordinates {
        Some(coordinates) => {
            match service.locate(coordinates).await {
                Ok(place) => println!("Nearest place: {}, {}", place.name, place.country),
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
            location
        }
        None => {
            let cities = service.resolve_city(&location.name).await?;
            let city = cities
                .first()
                .with_context(|| format!("city '{}' not found", location.name))?;
            info!(city = %city.name, id = city.id, "resolved city");
            Location::from(city)
        }
    };

    let reading = service.get_weather(&location).await?;
    for line in view::weather_lines(&reading) {
        println!("{line}");
    }
    Ok(())
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load_file()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.api_key = Some(api_key.trim().to_string());
    }

    let weather_url = Text::new("Current weather endpoint:")
        .with_default(config.weather_url.as_deref().unwrap_or(DEFAULT_WEATHER_URL))
        .prompt()?;
    config.weather_url = (weather_url != DEFAULT_WEATHER_URL).then_some(weather_url);

    let geocoding_url = Text::new("Geocoding base URL:")
        .with_default(config.geocoding_url.as_deref().unwrap_or(DEFAULT_GEOCODING_URL))
        .prompt()?;
    config.geocoding_url = (geocoding_url != DEFAULT_GEOCODING_URL).then_some(geocoding_url);

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    if config.api_key.is_none() {
        println!("No API key set yet. Run `cityweather configure` again or set API_KEY.");
    }
    Ok(())
}

fn import(file: PathBuf, batch_size: usize) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = open_store(&config)?;

    let reader =
        File::open(&file).with_context(|| format!("Failed to open city file: {}", file.display()))?;
    let count = import_cities(&store, reader, batch_size)?;

    println!("Imported {count} cities ({} in store)", store.city_count()?);
    Ok(())
}
