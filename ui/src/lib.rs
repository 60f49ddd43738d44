//! Client-side data synchronization for the recipe app.
//!
//! [`cache::QueryClient`] holds every piece of server data the client has
//! seen. The hooks in [`hooks`] read it through mounted queries and write
//! it through mutations with optimistic update and rollback. The gateway
//! they talk to lives in the `payloads` crate.

pub mod cache;
pub mod config;
pub mod contexts;
pub mod hooks;
pub mod keys;
pub mod logs;
pub mod runtime;
pub mod time;

pub use cache::{QueryClient, QueryKey};
pub use config::{ClientConfig, QueryConfig};
pub use contexts::{AuthContext, ModalContext};
pub use hooks::HookContext;
pub use runtime::Runtime;
pub use time::TimeSource;
