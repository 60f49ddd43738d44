//! Where cache work runs.
//!
//! All cache reads and writes happen on one event loop. Background fetches
//! are spawned onto it as local futures; nothing here is `Send`.

use futures::future::LocalBoxFuture;
use std::time::Duration;

pub trait Runtime {
    /// Run a future to completion in the background.
    fn spawn(&self, future: LocalBoxFuture<'static, ()>);

    /// Resolve after `duration`. Used for retry backoff.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// The browser event loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserRuntime;

impl Runtime for BrowserRuntime {
    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(future);
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(gloo_timers::future::sleep(duration))
    }
}
