//! Polling data controller.
//!
//! One `PollingController` drives the fetch/refresh/stop lifecycle of a
//! single remote resource and publishes a `FetchState` the host view reads.

pub mod controller;
pub mod fetch_state;

pub use controller::{PollOptions, PollingController};
pub use fetch_state::{FetchState, FetchStatus};
