pub mod mock;
pub mod mock_api;
pub mod stub_server;

pub use mock_api::{Endpoint, Gate, MockApi};
pub use stub_server::{StubServer, spawn_stub_server};

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{LocalBoxFuture, RemoteHandle};
use futures::task::LocalSpawnExt;
use payloads::responses::Profile;
use reqwest::StatusCode;
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Once;
use std::time::Duration;
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;
use ui::contexts::AuthUser;
use ui::{
    AuthContext, HookContext, ModalContext, QueryClient, QueryConfig,
    Runtime, TimeSource,
};

/// Page size used by every harness, so two full pages hold twelve recipes.
pub const TEST_PAGE_SIZE: u32 = 6;

static TRACING: Once = Once::new();

/// Install a fmt subscriber once per test binary. Set `RUST_LOG` to see
/// cache events, e.g. `RUST_LOG=ui=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = LogTracer::init();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("error"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Runs cache work on a `LocalPool`. Retry sleeps complete immediately.
pub struct TestRuntime {
    spawner: LocalSpawner,
}

impl Runtime for TestRuntime {
    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        if let Err(e) = self.spawner.spawn_local(future) {
            tracing::error!("Failed to spawn on test pool: {e}");
        }
    }

    fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(futures::future::ready(()))
    }
}

/// A query client, mock backend and session on one single-threaded
/// executor with a mocked clock.
///
/// Nothing runs until the test drives the pool with [`TestHarness::settle`]
/// or [`TestHarness::run`], so every intermediate state is observable.
pub struct TestHarness {
    pool: RefCell<LocalPool>,
    pub ctx: HookContext<MockApi>,
    pub api: Rc<MockApi>,
    pub time_source: TimeSource,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(QueryConfig::for_tests())
    }

    pub fn with_config(config: QueryConfig) -> Self {
        init_tracing();
        let pool = LocalPool::new();
        let time_source = TimeSource::mocked(mock::base_time());
        let runtime = Rc::new(TestRuntime {
            spawner: pool.spawner(),
        });
        let client =
            QueryClient::with_runtime(config, runtime, time_source.clone());
        let api = Rc::new(MockApi::new());
        let ctx = HookContext::new(
            client,
            api.clone(),
            AuthContext::new(),
            ModalContext::new(),
            TEST_PAGE_SIZE,
        );
        Self {
            pool: RefCell::new(pool),
            ctx,
            api,
            time_source,
        }
    }

    pub fn client(&self) -> &QueryClient {
        &self.ctx.client
    }

    pub fn auth(&self) -> &AuthContext {
        &self.ctx.auth
    }

    /// Run every task until none can make progress.
    pub fn settle(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    /// Drive the pool until `future` completes. Do not use this for
    /// futures waiting on a paused gate.
    pub fn run<F: Future>(&self, future: F) -> F::Output {
        self.pool.borrow_mut().run_until(future)
    }

    /// Start `future` on the pool; the handle resolves to its output.
    pub fn spawn<F>(&self, future: F) -> RemoteHandle<F::Output>
    where
        F: Future + 'static,
    {
        self.pool
            .borrow()
            .spawner()
            .spawn_local_with_handle(future)
            .expect("test pool accepts tasks")
    }

    /// Sign `profile` in on both the session and the mock backend, with
    /// the profile already synced.
    pub fn login(&self, profile: &Profile) {
        self.api.sign_in(profile);
        self.ctx.auth.login(AuthUser {
            uid: profile.external_uid.clone(),
            email: Some(format!("{}@example.com", profile.username)),
        });
        self.ctx.auth.set_profile(profile.clone());
    }

    /// Sign in on the session only, leaving the profile to be synced.
    pub fn login_unsynced(&self, profile: &Profile) {
        self.api.sign_in(profile);
        self.ctx.auth.login(AuthUser {
            uid: profile.external_uid.clone(),
            email: None,
        });
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that the result of an API action results in a specific status code.
pub fn assert_status_code<T: std::fmt::Debug>(
    result: Result<T, payloads::ClientError>,
    expected: StatusCode,
) {
    match result {
        Err(payloads::ClientError::APIError(code, _)) => {
            assert_eq!(code, expected)
        }
        other => panic!("Expected APIError, got {other:?}"),
    };
}
