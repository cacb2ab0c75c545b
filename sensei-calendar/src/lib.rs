//! Typed gateway over the remote calendar API.
//!
//! The gateway is pure network I/O: it lists events in a window and creates
//! events, surfacing failures to the caller. It never touches local state;
//! after a successful creation the caller refreshes via [`CalendarGateway::list_upcoming`].

mod error;
mod gateway;
mod google;
mod types;

pub use error::{CalendarError, Result};
pub use gateway::CalendarGateway;
pub use google::GoogleCalendar;
pub use types::CalendarEvent;
