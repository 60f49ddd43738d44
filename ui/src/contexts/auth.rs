use payloads::responses::Profile;
use payloads::{ExternalUid, ProfileId};
use std::cell::RefCell;
use std::rc::Rc;

use crate::cache::{KeySegment, QueryClient};
use crate::keys;

/// Identity-provider account of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: ExternalUid,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: AuthUser,
    /// Filled in by profile sync once the backend has the profile.
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    Unknown,
    LoggedOut,
    LoggedIn(Session),
}

/// Shared handle to the current session. Mutation hooks read it to scope
/// cache keys by user and to skip optimistic writes when nobody is signed
/// in.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    state: Rc<RefCell<AuthState>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), AuthState::LoggedIn(_))
    }

    pub fn user(&self) -> Option<AuthUser> {
        match &*self.state.borrow() {
            AuthState::LoggedIn(session) => Some(session.user.clone()),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<Profile> {
        match &*self.state.borrow() {
            AuthState::LoggedIn(session) => session.profile.clone(),
            _ => None,
        }
    }

    pub fn profile_id(&self) -> Option<ProfileId> {
        match &*self.state.borrow() {
            AuthState::LoggedIn(session) => {
                session.profile.as_ref().map(|profile| profile.id)
            }
            _ => None,
        }
    }

    pub fn login(&self, user: AuthUser) {
        tracing::debug!(uid = %user.uid, "Signed in");
        *self.state.borrow_mut() = AuthState::LoggedIn(Session {
            user,
            profile: None,
        });
    }

    /// Attach the synced profile to the session. Ignored if the session
    /// has ended or belongs to a different account.
    pub fn set_profile(&self, profile: Profile) {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            AuthState::LoggedIn(session)
                if session.user.uid == profile.external_uid =>
            {
                session.profile = Some(profile);
            }
            _ => {
                tracing::debug!(
                    uid = %profile.external_uid,
                    "Ignoring profile for inactive session"
                );
            }
        }
    }

    /// End the session and drop every cached value scoped to the user.
    pub fn logout(&self, client: &QueryClient) {
        *self.state.borrow_mut() = AuthState::LoggedOut;
        let mut removed = client.remove_queries(&keys::favorites_all());
        removed += client.remove_queries(&keys::profiles());
        removed += client.remove_queries_where(|key| {
            key.starts_with(&keys::ratings_all())
                && key.segments().get(2) == Some(&KeySegment::from("user"))
        });
        tracing::debug!(removed, "Signed out");
    }
}
