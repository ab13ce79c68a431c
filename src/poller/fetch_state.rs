use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ErrorInfo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Idle,
    /// In flight with nothing to show yet.
    Loading,
    /// In flight while a previous success stays on screen.
    Refreshing,
    Success,
    Error,
}

/// Published state of one controller.
///
/// Every transition builds a new value; `data` only ever holds a normalized
/// model and survives `Refreshing` and `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchState<T> {
    pub status: FetchStatus,
    pub data: Option<T>,
    pub error: Option<ErrorInfo>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
        }
    }
}

impl<T: Clone> FetchState<T> {
    /// A request went out: `Refreshing` if there is data to keep showing,
    /// `Loading` otherwise. Clears any previous error.
    pub fn started(&self) -> Self {
        let status = if self.data.is_some() {
            FetchStatus::Refreshing
        } else {
            FetchStatus::Loading
        };
        Self {
            status,
            data: self.data.clone(),
            error: None,
            last_fetched_at: self.last_fetched_at,
        }
    }

    pub fn succeeded(data: T, at: DateTime<Utc>) -> Self {
        Self {
            status: FetchStatus::Success,
            data: Some(data),
            error: None,
            last_fetched_at: Some(at),
        }
    }

    /// The request failed. Cached data is kept.
    pub fn failed(&self, error: ErrorInfo) -> Self {
        Self {
            status: FetchStatus::Error,
            data: self.data.clone(),
            error: Some(error),
            last_fetched_at: self.last_fetched_at,
        }
    }
}

impl<T> FetchState<T> {
    /// True while a request is in flight. Hosts disable their refresh
    /// control on this.
    pub fn is_busy(&self) -> bool {
        matches!(self.status, FetchStatus::Loading | FetchStatus::Refreshing)
    }
}
