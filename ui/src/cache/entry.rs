use jiff::Timestamp;
use std::any::Any;
use std::collections::HashSet;
use std::rc::Rc;

use super::QueryKey;
use super::observer::Fetcher;

/// Type-erased cached value. Each key holds exactly one concrete type,
/// chosen by the hooks that read and write it.
pub type AnyData = Rc<dyn Any>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing fetched and nothing in flight.
    Idle,
    /// First fetch in flight, no data yet.
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Fetching,
    /// A fetch is wanted but the client is offline.
    Paused,
}

/// What a fetch is for. Infinite queries append on `NextPage` and reload
/// every loaded page on `Refetch`; plain queries ignore the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Refetch,
    NextPage,
}

/// Identifies one mounted observer. Unmounting only touches the entry the
/// observer was registered on, even if the key was removed and re-created
/// in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ObserverId(pub u64);

pub(crate) struct CacheEntry {
    pub data: Option<AnyData>,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub fetch_mode: Option<FetchMode>,
    pub error: Option<String>,
    pub updated_at: Option<Timestamp>,
    pub is_invalidated: bool,
    /// Bumped whenever a fetch starts or is cancelled. A response is only
    /// applied if the epoch it started under is still current.
    pub epoch: u64,
    /// Enabled observers currently mounted on this entry.
    pub observers: HashSet<ObserverId>,
    pub inactive_since: Option<Timestamp>,
    /// Fetch function of the most recently mounted enabled observer, used
    /// for background refetches.
    pub fetcher: Option<Fetcher>,
}

impl CacheEntry {
    pub fn new(now: Timestamp) -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
            fetch_status: FetchStatus::Idle,
            fetch_mode: None,
            error: None,
            updated_at: None,
            is_invalidated: false,
            epoch: 0,
            observers: HashSet::new(),
            inactive_since: Some(now),
            fetcher: None,
        }
    }

    pub fn is_observed(&self) -> bool {
        !self.observers.is_empty()
    }

    pub fn set_data(&mut self, data: AnyData, now: Timestamp) {
        self.data = Some(data);
        self.status = QueryStatus::Success;
        self.error = None;
        self.updated_at = Some(now);
        self.is_invalidated = false;
    }

    /// Drop the in-flight fetch, if any, so its response is ignored.
    /// Returns true if there was one.
    pub fn supersede_fetch(&mut self) -> bool {
        if self.fetch_status == FetchStatus::Idle {
            return false;
        }
        self.epoch += 1;
        self.fetch_status = FetchStatus::Idle;
        self.fetch_mode = None;
        if self.data.is_none() && self.status == QueryStatus::Pending {
            self.status = QueryStatus::Idle;
        }
        true
    }
}

/// Read-only view of one cache entry, with its data downcast to `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub key: QueryKey,
    pub data: Option<T>,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    pub fetch_mode: Option<FetchMode>,
    pub error: Option<String>,
    pub updated_at: Option<Timestamp>,
    pub is_invalidated: bool,
}

impl<T> QueryState<T> {
    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }
}

/// Pre-mutation value of one key, kept so a failed mutation can put it
/// back.
#[derive(Clone)]
pub struct Snapshot {
    pub(crate) key: QueryKey,
    pub(crate) data: Option<AnyData>,
}

impl Snapshot {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn had_data(&self) -> bool {
        self.data.is_some()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("key", &self.key)
            .field("had_data", &self.data.is_some())
            .finish()
    }
}
