//! Interactive city search as a single-threaded event loop.
//!
//! [`SearchState`] is a plain state machine: it consumes [`Event`]s and
//! answers with [`Command`]s. The [`Dispatcher`] runs those commands as
//! background tasks which report back as new events, so state is only ever
//! touched from the loop itself.

mod runtime;
mod state;

pub use runtime::{Dispatcher, Render, run_event_loop};
pub use state::{
    Command, DEBOUNCE_DELAY, Event, Key, MAX_QUERY_LEN, MIN_QUERY_LEN, Phase, SearchState,
};
