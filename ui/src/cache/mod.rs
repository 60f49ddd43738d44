//! Client-side query cache.
//!
//! ## Design Decisions
//!
//! ### One cache per session
//! - **Single owner of server data**: every hook reads and writes through
//!   one [`QueryClient`]. Cloning the client clones a handle, not the data.
//! - **Single-threaded**: the cache lives on the browser event loop, so
//!   state sits in `Rc<RefCell<_>>`. No borrow is held while listeners run
//!   or futures are spawned, so listeners may call back into the client.
//!
//! ### Fetch epochs
//! - Every entry carries an epoch that is bumped when a fetch starts or is
//!   cancelled. A response is applied only if its epoch is still current,
//!   so a slow GET can never overwrite an optimistic write that was made
//!   after cancelling it. Transport-level requests are not aborted; their
//!   results are ignored.
//!
//! ### Invalidation keeps data
//! - Invalidating marks entries stale and refetches the ones somebody is
//!   watching. Data stays in place until the refetch lands. Removal is the
//!   only way to make data disappear.

pub mod entry;
pub mod infinite;
pub mod key;
pub mod mutation;
pub mod observer;

pub use entry::{
    AnyData, FetchMode, FetchStatus, QueryState, QueryStatus, Snapshot,
};
pub use infinite::{
    InfiniteData, InfiniteQuery, InfiniteQueryResult, Page, next_page_param,
    use_infinite_query,
};
pub use key::{KeySegment, QueryKey};
pub use mutation::{
    CANCELLED, Mutation, MutationContext, MutationHandler, MutationState,
};
pub use observer::{Query, QueryOptions, QueryResult, use_query};

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use jiff::SignedDuration;
use payloads::ClientError;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};

use crate::config::QueryConfig;
use crate::runtime::{BrowserRuntime, Runtime};
use crate::time::TimeSource;
use entry::{CacheEntry, ObserverId};
use observer::{FetchContext, Fetcher};

/// Something that happened to one cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated(QueryKey),
    Invalidated(QueryKey),
    Removed(QueryKey),
    FetchStarted(QueryKey),
    /// A response arrived for a fetch that had been superseded or
    /// cancelled, and was dropped.
    FetchDiscarded(QueryKey),
    Cancelled(QueryKey),
}

impl CacheEvent {
    pub fn key(&self) -> &QueryKey {
        match self {
            Self::Updated(key)
            | Self::Invalidated(key)
            | Self::Removed(key)
            | Self::FetchStarted(key)
            | Self::FetchDiscarded(key)
            | Self::Cancelled(key) => key,
        }
    }
}

type Listener = Rc<dyn Fn(&CacheEvent)>;

/// A registered listener. `active` is shared with its [`Subscription`] so
/// unsubscribing never needs a borrow of the cache.
struct ListenerSlot {
    id: u64,
    active: Rc<Cell<bool>>,
    listener: Listener,
}

struct CacheInner {
    entries: HashMap<QueryKey, CacheEntry>,
    listeners: Vec<ListenerSlot>,
    next_listener_id: u64,
    next_observer_id: u64,
    online: bool,
}

/// Unsubscribes its listener when dropped.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    id: u64,
    active: Rc<Cell<bool>>,
    inner: Weak<RefCell<CacheInner>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.set(false);
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        match inner.try_borrow_mut() {
            Ok(mut inner) => inner.listeners.retain(|slot| slot.id != self.id),
            Err(_) => tracing::warn!(
                listener = self.id,
                "Cache busy while unsubscribing, listener pruned on next event"
            ),
        }
    }
}

#[derive(Clone)]
pub struct QueryClient {
    inner: Rc<RefCell<CacheInner>>,
    runtime: Rc<dyn Runtime>,
    time_source: TimeSource,
    config: Rc<QueryConfig>,
}

impl QueryClient {
    /// A client on the browser event loop and system clock.
    pub fn new(config: QueryConfig) -> Self {
        Self::with_runtime(config, Rc::new(BrowserRuntime), TimeSource::system())
    }

    pub fn with_runtime(
        config: QueryConfig,
        runtime: Rc<dyn Runtime>,
        time_source: TimeSource,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CacheInner {
                entries: HashMap::new(),
                listeners: Vec::new(),
                next_listener_id: 0,
                next_observer_id: 0,
                online: true,
            })),
            runtime,
            time_source,
            config: Rc::new(config),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn time_source(&self) -> &TimeSource {
        &self.time_source
    }

    pub(crate) fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        self.runtime.spawn(future);
    }

    /// Call `listener` for every cache event until the subscription is
    /// dropped.
    pub fn subscribe(
        &self,
        listener: impl Fn(&CacheEvent) + 'static,
    ) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_listener_id;
        inner.next_listener_id += 1;
        let active = Rc::new(Cell::new(true));
        inner.listeners.push(ListenerSlot {
            id,
            active: active.clone(),
            listener: Rc::new(listener),
        });
        Subscription {
            id,
            active,
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn emit(&self, events: Vec<CacheEvent>) {
        if events.is_empty() {
            return;
        }
        let listeners: Vec<(Rc<Cell<bool>>, Listener)> = {
            let mut inner = self.inner.borrow_mut();
            inner.listeners.retain(|slot| slot.active.get());
            inner
                .listeners
                .iter()
                .map(|slot| (slot.active.clone(), slot.listener.clone()))
                .collect()
        };
        for event in &events {
            for (active, listener) in &listeners {
                if active.get() {
                    listener(event);
                }
            }
        }
    }

    pub fn get_query_state<T: Clone + 'static>(
        &self,
        key: &QueryKey,
    ) -> Option<QueryState<T>> {
        let inner = self.inner.borrow();
        let entry = inner.entries.get(key)?;
        Some(QueryState {
            key: key.clone(),
            data: entry.data.as_ref().and_then(|data| downcast(key, data)),
            status: entry.status,
            fetch_status: entry.fetch_status,
            fetch_mode: entry.fetch_mode,
            error: entry.error.clone(),
            updated_at: entry.updated_at,
            is_invalidated: entry.is_invalidated,
        })
    }

    pub fn get_query_data<T: Clone + 'static>(
        &self,
        key: &QueryKey,
    ) -> Option<T> {
        self.get_query_state::<T>(key)?.data
    }

    /// Every cached value of type `T` under `prefix`, in key order.
    pub fn find_all_data<T: Clone + 'static>(
        &self,
        prefix: &QueryKey,
    ) -> Vec<(QueryKey, T)> {
        let inner = self.inner.borrow();
        let mut found: Vec<(QueryKey, T)> = inner
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter_map(|(key, entry)| {
                let data = entry.data.as_ref()?;
                let value = (**data).downcast_ref::<T>()?;
                Some((key.clone(), value.clone()))
            })
            .collect();
        found.sort_by(|(a, _), (b, _)| a.cmp(b));
        found
    }

    /// Overwrite the data at `key`, marking it fresh and successful.
    pub fn set_query_data<T: 'static>(&self, key: &QueryKey, data: T) {
        self.set_any(key, Rc::new(data));
    }

    /// Replace the data at `key` with `update(current)`.
    pub fn update_query_data<T: Clone + 'static>(
        &self,
        key: &QueryKey,
        update: impl FnOnce(Option<T>) -> T,
    ) {
        let next = update(self.get_query_data::<T>(key));
        self.set_query_data(key, next);
    }

    fn set_any(&self, key: &QueryKey, data: AnyData) {
        let now = self.time_source.now();
        {
            let mut inner = self.inner.borrow_mut();
            inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(now))
                .set_data(data, now);
        }
        self.emit(vec![CacheEvent::Updated(key.clone())]);
    }

    /// Mark every entry under `prefix` stale and refetch the ones with
    /// enabled observers. Cached data is kept until the refetch lands.
    /// Returns the number of entries marked.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut events = Vec::new();
        let mut refetch = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            for (key, entry) in inner
                .entries
                .iter_mut()
                .filter(|(key, _)| key.starts_with(prefix))
            {
                entry.is_invalidated = true;
                events.push(CacheEvent::Invalidated(key.clone()));
                if entry.is_observed() && entry.fetcher.is_some() {
                    refetch.push(key.clone());
                }
            }
        }
        let count = events.len();
        tracing::debug!(
            %prefix,
            count,
            active = refetch.len(),
            "Invalidated queries"
        );
        self.emit(events);
        for key in refetch {
            self.dispatch_fetch(&key, FetchMode::Refetch);
        }
        count
    }

    /// Delete every entry under `prefix`. Responses still in flight for
    /// those keys are discarded when they arrive.
    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let count = self.remove_queries_where(|key| key.starts_with(prefix));
        tracing::debug!(%prefix, count, "Removed queries");
        count
    }

    /// Delete every entry whose key satisfies `predicate`, for families a
    /// prefix cannot express.
    pub fn remove_queries_where(
        &self,
        predicate: impl Fn(&QueryKey) -> bool,
    ) -> usize {
        let removed: Vec<QueryKey> = {
            let mut inner = self.inner.borrow_mut();
            let keys: Vec<QueryKey> = inner
                .entries
                .keys()
                .filter(|key| predicate(key))
                .cloned()
                .collect();
            for key in &keys {
                inner.entries.remove(key);
            }
            keys
        };
        let count = removed.len();
        self.emit(removed.into_iter().map(CacheEvent::Removed).collect());
        count
    }

    /// Remove everything, e.g. on sign out.
    pub fn clear(&self) -> usize {
        self.remove_queries(&QueryKey::default())
    }

    /// Stop waiting on fetches under `prefix`: their responses will be
    /// ignored. Returns the number of fetches cancelled.
    pub fn cancel_queries(&self, prefix: &QueryKey) -> usize {
        let cancelled: Vec<QueryKey> = {
            let mut inner = self.inner.borrow_mut();
            inner
                .entries
                .iter_mut()
                .filter(|(key, _)| key.starts_with(prefix))
                .filter_map(|(key, entry)| {
                    entry.supersede_fetch().then(|| key.clone())
                })
                .collect()
        };
        if !cancelled.is_empty() {
            tracing::debug!(
                %prefix,
                count = cancelled.len(),
                "Cancelled in-flight fetches"
            );
        }
        let count = cancelled.len();
        self.emit(cancelled.into_iter().map(CacheEvent::Cancelled).collect());
        count
    }

    pub fn fetch_status(&self, key: &QueryKey) -> FetchStatus {
        self.inner
            .borrow()
            .entries
            .get(key)
            .map_or(FetchStatus::Idle, |entry| entry.fetch_status)
    }

    /// Number of entries under `prefix` with a fetch in flight.
    pub fn is_fetching(&self, prefix: &QueryKey) -> usize {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|(key, entry)| {
                key.starts_with(prefix)
                    && entry.fetch_status == FetchStatus::Fetching
            })
            .count()
    }

    pub fn snapshot(&self, key: &QueryKey) -> Snapshot {
        let data = self
            .inner
            .borrow()
            .entries
            .get(key)
            .and_then(|entry| entry.data.clone());
        Snapshot {
            key: key.clone(),
            data,
        }
    }

    /// Put back exactly the data captured by `snapshot`. If there was no
    /// data then, the entry is emptied.
    pub fn restore(&self, snapshot: &Snapshot) {
        match &snapshot.data {
            Some(data) => self.set_any(&snapshot.key, data.clone()),
            None => {
                let existed = {
                    let mut inner = self.inner.borrow_mut();
                    match inner.entries.get_mut(&snapshot.key) {
                        Some(entry) => {
                            entry.data = None;
                            entry.updated_at = None;
                            if entry.status == QueryStatus::Success {
                                entry.status = QueryStatus::Idle;
                            }
                            true
                        }
                        None => false,
                    }
                };
                if existed {
                    self.emit(vec![CacheEvent::Updated(snapshot.key.clone())]);
                }
            }
        }
    }

    /// Whether data at `key` is older than `stale_time`, invalidated, or
    /// missing.
    pub fn is_stale(&self, key: &QueryKey, stale_time: SignedDuration) -> bool {
        let inner = self.inner.borrow();
        match inner.entries.get(key) {
            Some(entry) => self.entry_is_stale(entry, stale_time),
            None => true,
        }
    }

    fn entry_is_stale(
        &self,
        entry: &CacheEntry,
        stale_time: SignedDuration,
    ) -> bool {
        if entry.data.is_none() || entry.is_invalidated {
            return true;
        }
        match entry.updated_at {
            Some(updated_at) => self.time_source.since(updated_at) >= stale_time,
            None => true,
        }
    }

    /// Fetch `key` in the background if its data is stale, without
    /// mounting an observer.
    pub fn prefetch_query<T, F, Fut>(
        &self,
        key: &QueryKey,
        stale_time: Option<SignedDuration>,
        fetch_fn: F,
    ) -> bool
    where
        T: 'static,
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<T, ClientError>> + 'static,
    {
        let stale_time = stale_time.unwrap_or(self.config.stale_time);
        let now = self.time_source.now();
        let should_fetch = {
            let mut inner = self.inner.borrow_mut();
            let entry = inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(now));
            if entry.fetcher.is_none() {
                entry.fetcher = Some(observer::fetcher_from(fetch_fn));
            }
            entry.fetch_status == FetchStatus::Idle
                && self.entry_is_stale(entry, stale_time)
        };
        should_fetch && self.dispatch_fetch(key, FetchMode::Refetch)
    }

    /// Go offline or back online. New fetches started while offline wait in
    /// `FetchStatus::Paused` and are dispatched when the client comes back.
    pub fn set_online(&self, online: bool) {
        let resume: Vec<(QueryKey, FetchMode)> = {
            let mut inner = self.inner.borrow_mut();
            if inner.online == online {
                return;
            }
            inner.online = online;
            if !online {
                Vec::new()
            } else {
                inner
                    .entries
                    .iter()
                    .filter(|(_, entry)| {
                        entry.fetch_status == FetchStatus::Paused
                    })
                    .map(|(key, entry)| {
                        (
                            key.clone(),
                            entry.fetch_mode.unwrap_or(FetchMode::Refetch),
                        )
                    })
                    .collect()
            }
        };
        tracing::debug!(online, resumed = resume.len(), "Network status changed");
        for (key, mode) in resume {
            self.dispatch_fetch(&key, mode);
        }
    }

    pub fn is_online(&self) -> bool {
        self.inner.borrow().online
    }

    /// Drop entries nobody has watched for longer than `gc_time`.
    pub fn collect_garbage(&self) -> usize {
        let gc_time = self.config.gc_time;
        let collected: Vec<QueryKey> = {
            let mut inner = self.inner.borrow_mut();
            let keys: Vec<QueryKey> = inner
                .entries
                .iter()
                .filter(|(_, entry)| {
                    !entry.is_observed()
                        && entry.fetch_status == FetchStatus::Idle
                        && entry.inactive_since.is_some_and(|since| {
                            self.time_source.since(since) >= gc_time
                        })
                })
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                inner.entries.remove(key);
            }
            keys
        };
        if !collected.is_empty() {
            tracing::debug!(count = collected.len(), "Collected inactive queries");
        }
        let count = collected.len();
        self.emit(collected.into_iter().map(CacheEvent::Removed).collect());
        count
    }

    /// Register an observer on `key`, fetching if the data is stale.
    /// Disabled observers pass no fetcher: they never fetch, never count as
    /// active and never create an entry, so they get no id.
    pub(crate) fn mount_observer(
        &self,
        key: &QueryKey,
        fetcher: Option<Fetcher>,
        stale_time: SignedDuration,
    ) -> Option<ObserverId> {
        self.collect_garbage();
        let fetcher = fetcher?;
        let now = self.time_source.now();
        let (observer, should_fetch) = {
            let mut inner = self.inner.borrow_mut();
            let observer = ObserverId(inner.next_observer_id);
            inner.next_observer_id += 1;
            let entry = inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(now));
            entry.observers.insert(observer);
            entry.inactive_since = None;
            entry.fetcher = Some(fetcher);
            let should_fetch = entry.fetch_status == FetchStatus::Idle
                && self.entry_is_stale(entry, stale_time);
            (observer, should_fetch)
        };
        if should_fetch {
            self.dispatch_fetch(key, FetchMode::Refetch);
        }
        Some(observer)
    }

    /// Unregister `observer`. If the entry it mounted on has since been
    /// removed, the entry now at `key` belongs to other observers and is
    /// left alone.
    pub(crate) fn unmount_observer(&self, key: &QueryKey, observer: ObserverId) {
        let now = self.time_source.now();
        let mut inner = self.inner.borrow_mut();
        if let Some(entry) = inner.entries.get_mut(key)
            && entry.observers.remove(&observer)
            && !entry.is_observed()
        {
            entry.inactive_since = Some(now);
        }
    }

    /// Start a fetch for `key` with its registered fetcher, superseding any
    /// fetch already in flight. Returns false if the key has no fetcher.
    pub(crate) fn dispatch_fetch(&self, key: &QueryKey, mode: FetchMode) -> bool {
        let started = {
            let mut inner = self.inner.borrow_mut();
            let online = inner.online;
            let Some(entry) = inner.entries.get_mut(key) else {
                return false;
            };
            let Some(fetcher) = entry.fetcher.clone() else {
                return false;
            };
            entry.supersede_fetch();
            entry.epoch += 1;
            entry.fetch_mode = Some(mode);
            if entry.data.is_none() {
                entry.status = QueryStatus::Pending;
            }
            if online {
                entry.fetch_status = FetchStatus::Fetching;
                Some((entry.epoch, fetcher, entry.data.clone()))
            } else {
                entry.fetch_status = FetchStatus::Paused;
                None
            }
        };
        let Some((epoch, fetcher, previous)) = started else {
            tracing::debug!(%key, "Offline, fetch paused");
            self.emit(vec![CacheEvent::Updated(key.clone())]);
            return true;
        };

        tracing::debug!(%key, epoch, ?mode, "Fetching");
        self.emit(vec![CacheEvent::FetchStarted(key.clone())]);

        let client = self.clone();
        let key = key.clone();
        self.runtime.spawn(
            async move {
                let result = client
                    .run_with_retries(&key, epoch, &fetcher, previous, mode)
                    .await;
                client.complete_fetch(&key, epoch, result);
            }
            .boxed_local(),
        );
        true
    }

    fn is_current_fetch(&self, key: &QueryKey, epoch: u64) -> bool {
        self.inner.borrow().entries.get(key).is_some_and(|entry| {
            entry.epoch == epoch && entry.fetch_status == FetchStatus::Fetching
        })
    }

    async fn run_with_retries(
        &self,
        key: &QueryKey,
        epoch: u64,
        fetcher: &Fetcher,
        previous: Option<AnyData>,
        mode: FetchMode,
    ) -> Result<AnyData, ClientError> {
        let mut attempt = 0;
        loop {
            let context = FetchContext {
                previous: previous.clone(),
                mode,
            };
            match fetcher(context).await {
                Ok(data) => return Ok(data),
                Err(e)
                    if attempt < self.config.retry
                        && self.is_current_fetch(key, epoch) =>
                {
                    attempt += 1;
                    let delay = self.config.retry_delay_for(attempt);
                    tracing::debug!(
                        %key,
                        attempt,
                        ?delay,
                        "Fetch failed, retrying: {e}"
                    );
                    self.runtime.sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn complete_fetch(
        &self,
        key: &QueryKey,
        epoch: u64,
        result: Result<AnyData, ClientError>,
    ) {
        let now = self.time_source.now();
        let event = {
            let mut inner = self.inner.borrow_mut();
            match inner.entries.get_mut(key) {
                None => {
                    tracing::debug!(%key, "Discarding response for removed query");
                    CacheEvent::FetchDiscarded(key.clone())
                }
                Some(entry)
                    if entry.epoch != epoch
                        || entry.fetch_status != FetchStatus::Fetching =>
                {
                    tracing::debug!(
                        %key,
                        epoch,
                        current = entry.epoch,
                        "Discarding superseded response"
                    );
                    CacheEvent::FetchDiscarded(key.clone())
                }
                Some(entry) => {
                    entry.fetch_status = FetchStatus::Idle;
                    entry.fetch_mode = None;
                    match result {
                        Ok(data) => entry.set_data(data, now),
                        Err(e) => {
                            tracing::warn!(%key, "Fetch failed: {e}");
                            entry.status = QueryStatus::Error;
                            entry.error = Some(e.to_string());
                        }
                    }
                    CacheEvent::Updated(key.clone())
                }
            }
        };
        self.emit(vec![event]);
    }
}

fn downcast<T: Clone + 'static>(key: &QueryKey, data: &AnyData) -> Option<T> {
    match (**data).downcast_ref::<T>() {
        Some(value) => Some(value.clone()),
        None => {
            tracing::warn!(
                %key,
                "Cached data is not a {}",
                std::any::type_name::<T>()
            );
            None
        }
    }
}
