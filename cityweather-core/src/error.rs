//! Error taxonomy shared by the remote client, the local store and the
//! resolution service.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeatherError>;

#[derive(Error, Debug)]
pub enum WeatherError {
    /// Transport-level failure (DNS, connect, timeout, broken body stream).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote answered with a status outside 200..300.
    #[error("API error: status {status}: {}", truncate_body(body))]
    Api { status: u16, body: String },

    /// The remote answered 2xx but the body does not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A fetched reading could not be persisted. Logged, never propagated
    /// out of the resolution service.
    #[error("Failed to cache weather reading: {0}")]
    CacheWrite(rusqlite::Error),

    #[error("Local store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// A blocking store call did not run to completion.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl WeatherError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Short message for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            Self::Api { status, .. } => format!("Weather service returned HTTP {status}"),
            Self::Decode(_) => "Weather service sent an unexpected response".to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::CacheWrite(_) | Self::Store(_) | Self::Task(_) => {
                "Local database error".to_string()
            }
        }
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
