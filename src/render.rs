//! Text rendering of widget state for the terminal dashboard.

use crate::poller::{FetchState, FetchStatus};

/// What a widget shows once it has data.
pub trait Summary {
    fn headline(&self) -> String;
    fn confidence(&self) -> u8;
    fn is_degraded(&self) -> bool;
}

pub const SIMULATED_MARKER: &str = "[Simulated Data]";

/// One status line for `label`.
///
/// Refreshing keeps the previous result on screen. An error with no prior
/// success shows only the error; with prior data the stale result follows.
pub fn render_line<T: Summary>(label: &str, state: &FetchState<T>) -> String {
    match (state.status, &state.data) {
        (FetchStatus::Idle, _) => format!("{}: waiting", label),
        (FetchStatus::Loading, _) | (FetchStatus::Refreshing, None) => {
            format!("{}: loading...", label)
        }
        (FetchStatus::Refreshing, Some(data)) => {
            format!("{}: {} (refreshing)", label, describe(data))
        }
        (FetchStatus::Success, Some(data)) => format!("{}: {}", label, describe(data)),
        (FetchStatus::Success, None) => format!("{}: no data", label),
        (FetchStatus::Error, data) => {
            let message = state
                .error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("unknown error");
            match data {
                None => format!("{}: error: {}", label, message),
                Some(data) => format!(
                    "{}: error: {} (last result: {})",
                    label,
                    message,
                    describe(data)
                ),
            }
        }
    }
}

fn describe<T: Summary>(data: &T) -> String {
    let mut line = format!("{} | confidence {}%", data.headline(), data.confidence());
    if data.is_degraded() {
        line.push(' ');
        line.push_str(SIMULATED_MARKER);
    }
    line
}
