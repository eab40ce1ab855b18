use std::{io, sync::Arc};
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::debug;

use super::state::{Command, Event, SearchState};
use crate::service::WeatherService;

/// Draws the current state. Called once up front and after every event.
pub trait Render {
    fn render(&mut self, state: &SearchState) -> io::Result<()>;
}

/// Runs commands off the loop and feeds their outcome back as events.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    service: Arc<WeatherService>,
    events: UnboundedSender<Event>,
}

impl Dispatcher {
    pub fn new(service: Arc<WeatherService>, events: UnboundedSender<Event>) -> Self {
        Self { service, events }
    }

    /// Spawn the work behind `command`. `Quit` is the loop's business and
    /// spawns nothing.
    pub fn dispatch(&self, command: Command) -> Option<JoinHandle<()>> {
        let events = self.events.clone();

        let handle = match command {
            Command::Quit => return None,
            Command::Debounce { token, delay } => tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // Receiver gone means the loop already ended.
                let _ = events.send(Event::DebounceElapsed { token });
            }),
            Command::SearchCities { query } => {
                let service = Arc::clone(&self.service);
                tokio::spawn(async move {
                    let event = match service.resolve_city(&query).await {
                        Ok(cities) => Event::CitiesFound { query, cities },
                        Err(error) => Event::CitySearchFailed { query, error },
                    };
                    let _ = events.send(event);
                })
            }
            Command::FetchWeather { token, location } => {
                let service = Arc::clone(&self.service);
                tokio::spawn(async move {
                    let event = match service.get_weather(&location).await {
                        Ok(reading) => Event::WeatherLoaded { token, reading },
                        Err(error) => Event::WeatherFailed { token, error },
                    };
                    let _ = events.send(event);
                })
            }
        };

        Some(handle)
    }
}

/// Drive `state` until a transition asks to quit or every sender is gone.
pub async fn run_event_loop<R: Render>(
    mut state: SearchState,
    dispatcher: &Dispatcher,
    mut events: UnboundedReceiver<Event>,
    renderer: &mut R,
) -> io::Result<SearchState> {
    renderer.render(&state)?;

    while let Some(event) = events.recv().await {
        match state.update(event) {
            Some(Command::Quit) => break,
            Some(command) => {
                debug!(?command, "dispatching");
                dispatcher.dispatch(command);
            }
            None => {}
        }
        renderer.render(&state)?;
    }

    Ok(state)
}
