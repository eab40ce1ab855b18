//! Text rendering of the search screen and weather cards.

use chrono::{DateTime, FixedOffset, Utc};
use cityweather_core::{
    ListItem, WeatherReading,
    search::{Phase, Render, SearchState},
};
use colored::Colorize;
use console::Term;
use std::io::{self, Write};

use crate::terminal::KeyGate;

/// Lines used by everything except the result list.
const CHROME_LINES: usize = 6;
const MIN_VISIBLE_RESULTS: usize = 3;

pub fn weather_emoji(icon: &str) -> &'static str {
    match icon {
        "01d" => "☀️",
        "01n" => "🌙",
        "02d" => "⛅",
        "02n" | "03d" | "03n" | "04d" | "04n" => "☁️",
        "09d" | "09n" | "10n" => "🌧️",
        "10d" => "🌦️",
        "11d" | "11n" => "⛈️",
        "13d" | "13n" => "❄️",
        "50d" | "50n" => "🌫️",
        _ => "🌤️",
    }
}

fn local_time(at: DateTime<Utc>, timezone: i32) -> String {
    match FixedOffset::east_opt(timezone) {
        Some(offset) => at.with_timezone(&offset).format("%I:%M %p").to_string(),
        None => at.format("%H:%M UTC").to_string(),
    }
}

/// Card for a single reading. Shared by the interactive screen and `show`.
pub fn weather_lines(reading: &WeatherReading) -> Vec<String> {
    let place = match &reading.country {
        Some(country) => format!("📍 {}, {country}", reading.city_name),
        None => format!("📍 {}", reading.city_name),
    };

    let mut lines = vec![place.bold().to_string()];

    if let Some(condition) = &reading.condition {
        lines.push(format!("{}  {}", weather_emoji(&condition.icon), condition.description));
    }

    lines.push(String::new());
    lines.push(format!("{:.1}°C", reading.temp).yellow().bold().to_string());
    lines.push(format!(
        "{} {:.0}°  {} {:.0}°",
        "H".dimmed(),
        reading.temp_max,
        "L".dimmed(),
        reading.temp_min
    ));

    lines.push(String::new());
    lines.push("Atmosphere".cyan().bold().to_string());
    lines.push(format!("  🌡️ Feels like  {:.1}°C", reading.feels_like));
    lines.push(format!("  💧 Humidity    {}%", reading.humidity));
    lines.push(format!("  ⏲️ Pressure    {} hPa", reading.pressure));
    lines.push(format!("  👁️ Visibility  {:.1} km", f64::from(reading.visibility) / 1000.0));
    lines.push(format!("  ☁️ Cloudiness  {}%", reading.cloudiness));

    let mut wind = format!("  🌬️ Wind        {:.1} m/s, {}°", reading.wind_speed, reading.wind_deg);
    if let Some(gust) = reading.wind_gust {
        wind.push_str(&format!(" (gusts {gust:.1} m/s)"));
    }
    lines.push(wind);

    if let Some(rain) = reading.rain_1h {
        lines.push(format!("  🌧️ Rain (1h)   {rain:.2} mm"));
    }

    if reading.sunrise.is_some() || reading.sunset.is_some() {
        lines.push(String::new());
        lines.push("Sun".blue().bold().to_string());
        if let Some(sunrise) = reading.sunrise {
            lines.push(format!("  🌅 Sunrise     {}", local_time(sunrise, reading.timezone)));
        }
        if let Some(sunset) = reading.sunset {
            lines.push(format!("  🌇 Sunset      {}", local_time(sunset, reading.timezone)));
        }
    }

    lines.push(String::new());
    lines.push(
        format!("Observed {}", reading.observed_at.format("%Y-%m-%d %H:%M UTC"))
            .dimmed()
            .to_string(),
    );

    lines
}

fn help_line(state: &SearchState) -> String {
    let help = match (state.filter_open(), state.input_focused()) {
        (true, true) => "esc leave input • enter select • / stop typing • ctrl+c quit",
        (true, false) => "esc close • enter select • ↑/↓ j/k move • / close filter • q quit",
        _ => "/ search • q quit",
    };
    help.dimmed().to_string()
}

fn search_lines(state: &SearchState, lines: &mut Vec<String>) {
    let cursor = if state.input_focused() { "▏" } else { "" };
    lines.push(format!("{} {}{cursor}", "/".cyan().bold(), state.query()));
    lines.push(String::new());

    let results = state.results();
    if results.is_empty() {
        lines.push("No cities".dimmed().to_string());
        return;
    }

    let (_, height) = state.viewport();
    let visible = usize::from(height)
        .saturating_sub(CHROME_LINES)
        .max(MIN_VISIBLE_RESULTS);
    let start = state.highlighted_index().saturating_sub(visible - 1);

    for (idx, city) in results.iter().enumerate().skip(start).take(visible) {
        if idx == state.highlighted_index() {
            lines.push(format!(
                "{} {}  {}",
                "›".cyan().bold(),
                city.title().cyan().bold(),
                city.description().dimmed()
            ));
        } else {
            lines.push(format!("  {}  {}", city.title(), city.description().dimmed()));
        }
    }
}

/// Whole screen for the current state, top to bottom.
pub fn screen_lines(state: &SearchState) -> Vec<String> {
    let mut lines = Vec::new();

    match state.phase() {
        Phase::Error => {
            let message = state.error().map(|e| e.user_message()).unwrap_or_default();
            lines.push(format!("❌ Error: {message}").red().bold().to_string());
            lines.push(String::new());
            lines.push("Press any key to exit".dimmed().to_string());
            return lines;
        }
        Phase::Filtering => {
            lines.push("🌤️ Weather Search".bold().to_string());
            search_lines(state, &mut lines);
        }
        Phase::WeatherLoading => {
            let name = state.selected().map(|c| c.name.as_str()).unwrap_or_default();
            lines.push(format!("Loading weather for {name}..."));
        }
        Phase::WeatherShown => match state.weather() {
            Some(reading) => lines.extend(weather_lines(reading)),
            None => lines.push("Loading...".to_string()),
        },
        Phase::Idle => {
            lines.push("🌤️ Weather Search".bold().to_string());
            lines.push(String::new());
            lines.push("Press / to search for a city".dimmed().to_string());
        }
    }

    lines.push(String::new());
    lines.push(help_line(state));
    lines
}

/// Redraws the full screen on every frame.
pub struct TerminalView {
    term: Term,
    keys: KeyGate,
}

impl TerminalView {
    pub fn new(term: Term, keys: KeyGate) -> Self {
        Self { term, keys }
    }
}

impl Render for TerminalView {
    fn render(&mut self, state: &SearchState) -> io::Result<()> {
        let (_, width) = self.term.size();
        let frame = screen_lines(state)
            .iter()
            .map(|line| console::truncate_str(line, usize::from(width), "…").into_owned())
            .collect::<Vec<_>>()
            .join("\r\n");

        self.term.clear_screen()?;
        self.term.write_all(frame.as_bytes())?;
        self.term.flush()?;
        self.keys.open();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cityweather_core::{
        City, Condition, Coordinates, WeatherError,
        search::{Event, Key},
    };

    fn plain(lines: &[String]) -> String {
        lines.iter().map(|l| console::strip_ansi_codes(l).into_owned()).collect::<Vec<_>>().join("\n")
    }

    fn reading() -> WeatherReading {
        let at = DateTime::from_timestamp(1717405200, 0).expect("valid ts");
        WeatherReading {
            city_id: 2643743,
            city_name: "London".into(),
            country: Some("GB".into()),
            coordinates: Coordinates::new(51.51, -0.13),
            condition: Some(Condition {
                id: 500,
                main: "Rain".into(),
                description: "light rain".into(),
                icon: "10d".into(),
            }),
            temp: 14.26,
            feels_like: 13.8,
            temp_min: 12.9,
            temp_max: 15.4,
            humidity: 81,
            pressure: 1009,
            sea_level: None,
            ground_level: None,
            wind_speed: 5.1,
            wind_deg: 240,
            wind_gust: None,
            rain_1h: Some(0.4),
            cloudiness: 75,
            visibility: 9000,
            sunrise: DateTime::from_timestamp(1717386000, 0),
            sunset: None,
            timezone: 3600,
            observed_at: at,
            fetched_at: at,
        }
    }

    #[test]
    fn unknown_icon_gets_default_emoji() {
        assert_eq!(weather_emoji("10d"), "🌦️");
        assert_eq!(weather_emoji("zz"), "🌤️");
    }

    #[test]
    fn weather_card_lists_present_fields_only() {
        let text = plain(&weather_lines(&reading()));

        assert!(text.contains("London, GB"));
        assert!(text.contains("🌦️  light rain"));
        assert!(text.contains("14.3°C"));
        assert!(text.contains("Rain (1h)   0.40 mm"));
        assert!(text.contains("Visibility  9.0 km"));
        assert!(!text.contains("gusts"));
        assert!(!text.contains("Sunset"));
    }

    #[test]
    fn sunrise_is_shown_in_city_local_time() {
        // 03:40 UTC at +01:00
        let text = plain(&weather_lines(&reading()));
        assert!(text.contains("Sunrise     04:40 AM"), "{text}");
    }

    #[test]
    fn filtering_screen_marks_highlighted_city() {
        let mut state = SearchState::new();
        state.update(Event::Key(Key::Char('/')));
        state.update(Event::CitiesFound {
            query: "Kol".into(),
            cities: vec![
                City { id: 1, name: "Kolkata".into(), country: "IN".into(), lat: 22.57, lon: 88.36 },
                City { id: 2, name: "Kolhapur".into(), country: "IN".into(), lat: 16.7, lon: 74.24 },
            ],
        });
        state.update(Event::Key(Key::Down));

        let text = plain(&screen_lines(&state));
        assert!(text.contains("  Kolkata  IN, Lat: 22.570000, Lon: 88.360000"));
        assert!(text.contains("› Kolhapur"));
    }

    #[test]
    fn error_screen_shows_user_message() {
        let mut state = SearchState::new();
        state.update(Event::CitySearchFailed {
            query: "Kol".into(),
            error: WeatherError::Api { status: 503, body: String::new() },
        });

        let text = plain(&screen_lines(&state));
        assert!(text.contains("Error: Weather service returned HTTP 503"));
        assert!(text.contains("Press any key to exit"));
    }
}
