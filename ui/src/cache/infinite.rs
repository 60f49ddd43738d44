use futures::FutureExt;
use payloads::ClientError;
use std::future::Future;
use std::rc::Rc;

use super::observer::{FetchContext, Fetcher};
use super::{
    AnyData, FetchMode, FetchStatus, Query, QueryClient, QueryKey,
    QueryOptions, QueryResult, Subscription,
};

/// Pages are numbered from 1.
pub const FIRST_PAGE: u32 = 1;

/// One page of a paginated list, tagged with its page number and the total
/// number of items across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub total: u64,
}

/// Pages loaded so far, in arrival order, with the page number each was
/// requested with.
#[derive(Debug, Clone, PartialEq)]
pub struct InfiniteData<T> {
    pub pages: Vec<Page<T>>,
    pub page_params: Vec<u32>,
}

impl<T> Default for InfiniteData<T> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            page_params: Vec::new(),
        }
    }
}

impl<T> InfiniteData<T> {
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn last_page(&self) -> Option<&Page<T>> {
        self.pages.last()
    }

    fn push(&mut self, param: u32, page: Page<T>) {
        self.page_params.push(param);
        self.pages.push(page);
    }
}

/// The page after `last_page`, or `None` once every item has been loaded.
pub fn next_page_param<T>(last_page: &Page<T>, page_size: u32) -> Option<u32> {
    let loaded = u64::from(last_page.page) * u64::from(page_size);
    (loaded < last_page.total).then(|| last_page.page + 1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfiniteQueryResult<T> {
    pub query: QueryResult<InfiniteData<T>>,
    pub has_next_page: bool,
    pub is_fetching_next_page: bool,
}

impl<T> InfiniteQueryResult<T> {
    pub fn data(&self) -> Option<&InfiniteData<T>> {
        self.query.data.as_ref()
    }
}

/// A mounted paginated query hook.
pub struct InfiniteQuery<T> {
    query: Query<InfiniteData<T>>,
    page_size: u32,
}

impl<T: Clone + 'static> InfiniteQuery<T> {
    pub fn key(&self) -> &QueryKey {
        self.query.key()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn result(&self) -> InfiniteQueryResult<T> {
        let query = self.query.result();
        let has_next_page = query
            .data
            .as_ref()
            .and_then(InfiniteData::last_page)
            .and_then(|last| next_page_param(last, self.page_size))
            .is_some();
        let is_fetching_next_page = query.is_fetching()
            && self
                .query
                .client
                .get_query_state::<InfiniteData<T>>(self.key())
                .is_some_and(|state| state.fetch_mode == Some(FetchMode::NextPage));
        InfiniteQueryResult {
            query,
            has_next_page,
            is_fetching_next_page,
        }
    }

    /// Load the next page and append it. Does nothing while another fetch
    /// for this list is running or once the last page is loaded.
    pub fn fetch_next_page(&self) -> bool {
        if !self.query.is_enabled()
            || self.query.client.fetch_status(self.key()) != FetchStatus::Idle
            || !self.result().has_next_page
        {
            return false;
        }
        self.query
            .client
            .dispatch_fetch(self.key(), FetchMode::NextPage)
    }

    /// Reload every page loaded so far.
    pub fn refetch(&self) -> bool {
        self.query.refetch()
    }

    pub fn subscribe(&self, on_change: impl Fn() + 'static) -> Subscription {
        self.query.subscribe(on_change)
    }
}

/// Mount a paginated query. `fetch_page` receives the 1-based page number.
///
/// A refetch reloads every page loaded so far, in order, so refreshing
/// page 1 never throws away later pages. It stops early if a reloaded page
/// turns out to be the last.
pub fn use_infinite_query<T, F, Fut>(
    client: &QueryClient,
    key: QueryKey,
    page_size: u32,
    options: QueryOptions<InfiniteData<T>>,
    fetch_page: F,
) -> InfiniteQuery<T>
where
    T: Clone + 'static,
    F: Fn(u32) -> Fut + 'static,
    Fut: Future<Output = Result<Page<T>, ClientError>> + 'static,
{
    let fetch_page = Rc::new(fetch_page);
    let fetcher: Fetcher = Rc::new(move |context: FetchContext| {
        let fetch_page = fetch_page.clone();
        let mode = context.mode;
        let previous = context
            .previous
            .as_ref()
            .and_then(|data| (**data).downcast_ref::<InfiniteData<T>>())
            .cloned()
            .unwrap_or_default();
        async move {
            let data = match mode {
                FetchMode::NextPage => {
                    let mut data = previous;
                    let next = match data.last_page() {
                        Some(last) => next_page_param(last, page_size),
                        None => Some(FIRST_PAGE),
                    };
                    if let Some(param) = next {
                        let page = fetch_page(param).await?;
                        data.push(param, page);
                    }
                    data
                }
                FetchMode::Refetch => {
                    let params = if previous.page_params.is_empty() {
                        vec![FIRST_PAGE]
                    } else {
                        previous.page_params.clone()
                    };
                    let mut data = InfiniteData::default();
                    for param in params {
                        let page = fetch_page(param).await?;
                        let is_last = next_page_param(&page, page_size).is_none();
                        data.push(param, page);
                        if is_last {
                            break;
                        }
                    }
                    data
                }
            };
            Ok(Rc::new(data) as AnyData)
        }
        .boxed_local()
    });

    InfiniteQuery {
        query: Query::mount(client.clone(), key, options, fetcher),
        page_size,
    }
}
