use chrono::{DateTime, Utc};

use crate::error::ClientError;

/// Lifecycle of a query as seen by a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Never requested
    Idle,
    /// First fetch in flight, nothing to show yet
    Loading,
    /// Last fetch failed; `data` may still hold an older result
    Error,
    Success,
}

/// Snapshot of a cache entry handed to views
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<ClientError>,
    /// A fetch for this key is in flight
    pub is_fetching: bool,
    /// The freshness window has passed or the entry was invalidated
    pub is_stale: bool,
    /// Wall-clock time of the last successful fetch
    pub fetched_at: Option<DateTime<Utc>>,
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: true,
            fetched_at: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Background refresh while previous data is still shown
    pub fn is_refetching(&self) -> bool {
        self.is_fetching && self.data.is_some()
    }
}
