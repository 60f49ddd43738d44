use anyhow::Context;
use jiff::SignedDuration;
use payloads::APIClient;
use std::time::Duration;

/// Recipes per page when the build does not override it.
pub const DEFAULT_PAGE_SIZE: u32 = 6;

/// Defaults applied to every query unless a hook overrides them.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    /// Data younger than this is served without a network call. Zero means
    /// every mount refetches.
    pub stale_time: SignedDuration,
    /// How long an entry with no enabled observers is kept before it is
    /// swept.
    pub gc_time: SignedDuration,
    /// Extra attempts after a failed query fetch. Mutations never retry.
    pub retry: u32,
    /// Delay before the first retry; doubles per attempt up to
    /// `max_retry_delay`.
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: SignedDuration::ZERO,
            gc_time: SignedDuration::from_mins(5),
            retry: 3,
            retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

impl QueryConfig {
    /// Retries off so failures surface deterministically.
    pub fn for_tests() -> Self {
        Self {
            retry: 0,
            ..Self::default()
        }
    }

    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub backend_url: String,
    pub page_size: u32,
    pub query: QueryConfig,
}

impl ClientConfig {
    /// Build-time `BACKEND_URL` if set, otherwise the page's own origin.
    pub fn load() -> anyhow::Result<Self> {
        let backend_url = match option_env!("BACKEND_URL") {
            Some(url) => url.to_string(),
            None => window_origin()?,
        };
        let page_size = match option_env!("RECIPES_PAGE_SIZE") {
            Some(size) => size
                .parse()
                .context("RECIPES_PAGE_SIZE must be a positive integer")?,
            None => DEFAULT_PAGE_SIZE,
        };
        Ok(Self {
            backend_url,
            page_size,
            query: QueryConfig::default(),
        })
    }

    pub fn api_client(&self) -> APIClient {
        APIClient::new(self.backend_url.clone())
    }
}

fn window_origin() -> anyhow::Result<String> {
    let window = web_sys::window().context("No browser window available")?;
    window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("Cannot read window origin: {e:?}"))
}
