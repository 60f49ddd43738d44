use futures::FutureExt;
use futures::future::LocalBoxFuture;
use jiff::{SignedDuration, Timestamp};
use payloads::ClientError;
use std::future::Future;
use std::rc::Rc;

use super::entry::ObserverId;
use super::{
    AnyData, FetchMode, FetchStatus, QueryClient, QueryKey, QueryStatus,
    Subscription,
};

pub(crate) struct FetchContext {
    /// Data cached when the fetch started.
    pub previous: Option<AnyData>,
    pub mode: FetchMode,
}

pub(crate) type Fetcher = Rc<
    dyn Fn(FetchContext) -> LocalBoxFuture<'static, Result<AnyData, ClientError>>,
>;

pub(crate) fn fetcher_from<T, F, Fut>(fetch_fn: F) -> Fetcher
where
    T: 'static,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<T, ClientError>> + 'static,
{
    Rc::new(move |_: FetchContext| {
        let fetch = fetch_fn();
        async move { fetch.await.map(|data| Rc::new(data) as AnyData) }
            .boxed_local()
    })
}

/// Per-hook query configuration.
pub struct QueryOptions<T> {
    /// When false the hook never fetches and reports `FetchStatus::Idle`.
    pub enabled: bool,
    /// Overrides the client's default stale time.
    pub stale_time: Option<SignedDuration>,
    /// Consulted while the key has no data of its own.
    pub placeholder_data: Option<Rc<dyn Fn() -> Option<T>>>,
}

impl<T> Default for QueryOptions<T> {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: None,
            placeholder_data: None,
        }
    }
}

impl<T> Clone for QueryOptions<T> {
    fn clone(&self) -> Self {
        Self {
            enabled: self.enabled,
            stale_time: self.stale_time,
            placeholder_data: self.placeholder_data.clone(),
        }
    }
}

impl<T> QueryOptions<T> {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn stale_time(mut self, stale_time: SignedDuration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn placeholder_data(
        mut self,
        placeholder: impl Fn() -> Option<T> + 'static,
    ) -> Self {
        self.placeholder_data = Some(Rc::new(placeholder));
        self
    }
}

/// What a query hook renders from.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub data: Option<T>,
    pub status: QueryStatus,
    pub fetch_status: FetchStatus,
    /// Error from the last failed fetch. Data from an earlier success is
    /// still in `data`.
    pub error: Option<String>,
    /// `data` came from the placeholder, not from this key.
    pub is_placeholder_data: bool,
    pub is_stale: bool,
    pub updated_at: Option<Timestamp>,
}

impl<T> QueryResult<T> {
    /// First load: nothing to show yet and a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Pending
            && self.fetch_status == FetchStatus::Fetching
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_status == FetchStatus::Fetching
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

/// A mounted query hook.
///
/// Mounting registers an observer on the key and fetches if the cached
/// data is stale; dropping unregisters it. The cache refetches keys with
/// mounted observers when they are invalidated.
pub struct Query<T> {
    pub(crate) client: QueryClient,
    pub(crate) key: QueryKey,
    pub(crate) options: QueryOptions<T>,
    stale_time: SignedDuration,
    observer: Option<ObserverId>,
}

impl<T: Clone + 'static> Query<T> {
    pub(crate) fn mount(
        client: QueryClient,
        key: QueryKey,
        options: QueryOptions<T>,
        fetcher: Fetcher,
    ) -> Self {
        let stale_time =
            options.stale_time.unwrap_or(client.config().stale_time);
        let observer = client.mount_observer(
            &key,
            options.enabled.then_some(fetcher),
            stale_time,
        );
        Self {
            client,
            key,
            options,
            stale_time,
            observer,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.options.enabled
    }

    pub fn result(&self) -> QueryResult<T> {
        let state = self.client.get_query_state::<T>(&self.key);
        let (mut data, mut status, fetch_status, error, updated_at) =
            match state {
                Some(state) => (
                    state.data,
                    state.status,
                    state.fetch_status,
                    state.error,
                    state.updated_at,
                ),
                None => (None, QueryStatus::Idle, FetchStatus::Idle, None, None),
            };
        let fetch_status = if self.options.enabled {
            fetch_status
        } else {
            FetchStatus::Idle
        };

        let mut is_placeholder_data = false;
        if data.is_none()
            && status != QueryStatus::Error
            && let Some(placeholder) = &self.options.placeholder_data
            && let Some(value) = placeholder()
        {
            data = Some(value);
            status = QueryStatus::Success;
            is_placeholder_data = true;
        }

        QueryResult {
            data,
            status,
            fetch_status,
            error,
            is_placeholder_data,
            is_stale: is_placeholder_data
                || self.client.is_stale(&self.key, self.stale_time),
            updated_at,
        }
    }

    /// Fetch again unless a fetch for this key is already running.
    /// Disabled queries never fetch.
    pub fn refetch(&self) -> bool {
        if !self.options.enabled
            || self.client.fetch_status(&self.key) != FetchStatus::Idle
        {
            return false;
        }
        self.client.dispatch_fetch(&self.key, FetchMode::Refetch)
    }

    /// Call `on_change` whenever this key changes in the cache.
    pub fn subscribe(&self, on_change: impl Fn() + 'static) -> Subscription {
        let key = self.key.clone();
        self.client.subscribe(move |event| {
            if event.key() == &key {
                on_change();
            }
        })
    }
}

impl<T> Drop for Query<T> {
    fn drop(&mut self) {
        if let Some(observer) = self.observer {
            self.client.unmount_observer(&self.key, observer);
        }
    }
}

/// Mount a query hook for `key`, fetching with `fetch_fn`.
pub fn use_query<T, F, Fut>(
    client: &QueryClient,
    key: QueryKey,
    options: QueryOptions<T>,
    fetch_fn: F,
) -> Query<T>
where
    T: Clone + 'static,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<T, ClientError>> + 'static,
{
    Query::mount(client.clone(), key, options, fetcher_from(fetch_fn))
}
