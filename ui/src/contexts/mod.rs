//! Session and dialog state the hooks read alongside the cache.

pub mod auth;
pub mod modal;

pub use auth::{AuthContext, AuthState, AuthUser, Session};
pub use modal::ModalContext;
