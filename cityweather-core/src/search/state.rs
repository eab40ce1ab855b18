use std::time::Duration;

use crate::{City, Location, WeatherReading, error::WeatherError};

/// Quiet period after the last keystroke before a search is dispatched.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Shorter queries clear the result list instead of searching.
pub const MIN_QUERY_LEN: usize = 3;

pub const MAX_QUERY_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    Esc,
    Up,
    Down,
    CtrlC,
}

/// Everything the loop reacts to. Background work reports back through
/// these; it never touches [`SearchState`] directly.
#[derive(Debug)]
pub enum Event {
    Key(Key),
    Resize { width: u16, height: u16 },
    DebounceElapsed { token: u64 },
    CitiesFound { query: String, cities: Vec<City> },
    CitySearchFailed { query: String, error: WeatherError },
    WeatherLoaded { token: u64, reading: WeatherReading },
    WeatherFailed { token: u64, error: WeatherError },
}

/// Work requested by a transition, executed outside the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Debounce { token: u64, delay: Duration },
    SearchCities { query: String },
    FetchWeather { token: u64, location: Location },
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Filtering,
    WeatherLoading,
    WeatherShown,
    Error,
}

#[derive(Debug, Default)]
pub struct SearchState {
    query: String,
    input_focused: bool,
    filter_open: bool,
    results: Vec<City>,
    highlighted: usize,
    selected: Option<City>,
    weather: Option<WeatherReading>,
    loading_weather: bool,
    error: Option<WeatherError>,
    debounce_token: u64,
    weather_token: u64,
    width: u16,
    height: u16,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn input_focused(&self) -> bool {
        self.input_focused
    }

    pub fn filter_open(&self) -> bool {
        self.filter_open
    }

    pub fn results(&self) -> &[City] {
        &self.results
    }

    pub fn highlighted(&self) -> Option<&City> {
        self.results.get(self.highlighted)
    }

    pub fn highlighted_index(&self) -> usize {
        self.highlighted
    }

    pub fn selected(&self) -> Option<&City> {
        self.selected.as_ref()
    }

    pub fn weather(&self) -> Option<&WeatherReading> {
        self.weather.as_ref()
    }

    pub fn error(&self) -> Option<&WeatherError> {
        self.error.as_ref()
    }

    pub fn viewport(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn phase(&self) -> Phase {
        if self.error.is_some() {
            Phase::Error
        } else if self.filter_open {
            Phase::Filtering
        } else if self.loading_weather {
            Phase::WeatherLoading
        } else if self.selected.is_some() && self.weather.is_some() {
            Phase::WeatherShown
        } else {
            Phase::Idle
        }
    }

    /// Apply one event. Returns the work the transition asks for, if any.
    pub fn update(&mut self, event: Event) -> Option<Command> {
        match event {
            Event::Resize { width, height } => {
                self.width = width;
                self.height = height;
                None
            }
            // Error is terminal: whatever comes next ends the loop.
            _ if self.error.is_some() => Some(Command::Quit),
            Event::Key(key) => self.on_key(key),
            Event::DebounceElapsed { token } => self.on_debounce(token),
            Event::CitiesFound { cities, .. } => {
                self.set_results(cities);
                None
            }
            Event::CitySearchFailed { error, .. } if error.is_not_found() => {
                self.set_results(Vec::new());
                None
            }
            Event::CitySearchFailed { error, .. } => self.fail(error),
            Event::WeatherLoaded { token, .. } | Event::WeatherFailed { token, .. }
                if token != self.weather_token =>
            {
                None
            }
            Event::WeatherLoaded { reading, .. } => {
                self.weather = Some(reading);
                self.loading_weather = false;
                None
            }
            Event::WeatherFailed { error, .. } => {
                self.loading_weather = false;
                self.fail(error)
            }
        }
    }

    fn on_key(&mut self, key: Key) -> Option<Command> {
        match key {
            Key::CtrlC => Some(Command::Quit),
            Key::Char('/') => {
                self.toggle_filter();
                None
            }
            Key::Enter => self.choose(),
            Key::Esc => self.back(),
            Key::Up => {
                self.move_highlight(-1);
                None
            }
            Key::Down => {
                self.move_highlight(1);
                None
            }
            _ if self.input_focused => self.edit(key),
            Key::Char('q') => Some(Command::Quit),
            Key::Char('k') => {
                self.move_highlight(-1);
                None
            }
            Key::Char('j') => {
                self.move_highlight(1);
                None
            }
            _ => None,
        }
    }

    /// closed -> open+focused -> open+unfocused -> closed
    fn toggle_filter(&mut self) {
        if !self.filter_open {
            self.filter_open = true;
            self.input_focused = true;
        } else if self.input_focused {
            self.input_focused = false;
        } else {
            self.filter_open = false;
        }
    }

    fn edit(&mut self, key: Key) -> Option<Command> {
        match key {
            Key::Char(c) if !c.is_control() && self.query.chars().count() < MAX_QUERY_LEN => {
                self.query.push(c);
            }
            Key::Backspace if !self.query.is_empty() => {
                self.query.pop();
            }
            _ => return None,
        }

        self.debounce_token += 1;
        Some(Command::Debounce { token: self.debounce_token, delay: DEBOUNCE_DELAY })
    }

    fn on_debounce(&mut self, token: u64) -> Option<Command> {
        if token != self.debounce_token {
            return None;
        }
        if self.query.chars().count() < MIN_QUERY_LEN {
            self.set_results(Vec::new());
            return None;
        }
        Some(Command::SearchCities { query: self.query.clone() })
    }

    fn choose(&mut self) -> Option<Command> {
        let city = self.highlighted()?.clone();
        let location = Location::from(&city);
        if !location.is_resolvable() {
            return None;
        }

        self.selected = Some(city);
        self.weather = None;
        self.filter_open = false;
        self.input_focused = false;
        self.loading_weather = true;
        self.weather_token += 1;

        Some(Command::FetchWeather { token: self.weather_token, location })
    }

    fn back(&mut self) -> Option<Command> {
        if self.input_focused {
            self.input_focused = false;
            None
        } else if self.filter_open {
            self.filter_open = false;
            None
        } else {
            Some(Command::Quit)
        }
    }

    fn move_highlight(&mut self, delta: isize) {
        if self.results.is_empty() {
            return;
        }
        let last = self.results.len() - 1;
        self.highlighted = self.highlighted.saturating_add_signed(delta).min(last);
    }

    fn set_results(&mut self, cities: Vec<City>) {
        self.results = cities;
        self.highlighted = 0;
    }

    fn fail(&mut self, error: WeatherError) -> Option<Command> {
        self.error = Some(error);
        None
    }
}
