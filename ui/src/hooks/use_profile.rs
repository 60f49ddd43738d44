use futures::FutureExt;
use futures::future::LocalBoxFuture;
use payloads::requests::UpdateProfile;
use payloads::responses::Profile;
use payloads::{ClientError, RecipeApi};
use std::rc::Rc;

use super::HookContext;
use crate::cache::{Mutation, MutationHandler, Query, QueryClient, QueryOptions, use_query};
use crate::contexts::AuthContext;
use crate::keys;

/// The signed-in user's profile, seeded from the session while the fetch
/// runs. Disabled when nobody is signed in.
pub fn use_profile<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Query<Profile> {
    let user = ctx.auth.user();
    let key = match &user {
        Some(user) => keys::profile(&user.uid),
        None => keys::profiles(),
    };
    let auth = ctx.auth.clone();
    let options = QueryOptions::default()
        .enabled(user.is_some())
        .placeholder_data(move || auth.profile());
    let api = ctx.api.clone();
    use_query(&ctx.client, key, options, move || {
        let api = api.clone();
        async move { api.get_profile().await }
    })
}

/// Fetch the signed-in user's profile, which the backend creates on first
/// sight, and store it in the session and the cache. Returns `None` when
/// nobody is signed in.
pub async fn sync_profile<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Result<Option<Profile>, ClientError> {
    let Some(user) = ctx.auth.user() else {
        return Ok(None);
    };
    let profile = ctx.api.get_profile().await?;
    if profile.external_uid != user.uid {
        return Err(ClientError::Unexpected(format!(
            "Profile belongs to {}, expected {}",
            profile.external_uid, user.uid
        )));
    }
    tracing::debug!(profile_id = %profile.id, "Synced profile");
    ctx.auth.set_profile(profile.clone());
    ctx.client
        .set_query_data(&keys::profile(&profile.external_uid), profile.clone());
    Ok(Some(profile))
}

pub struct UpdateProfileHandler<A> {
    api: Rc<A>,
    auth: AuthContext,
}

impl<A: RecipeApi + 'static> MutationHandler for UpdateProfileHandler<A> {
    type Variables = UpdateProfile;
    type Output = Profile;

    fn mutation_fn(
        &self,
        variables: UpdateProfile,
    ) -> LocalBoxFuture<'static, Result<Profile, ClientError>> {
        let api = self.api.clone();
        async move { api.update_profile(&variables).await }.boxed_local()
    }

    fn on_success(
        &self,
        client: &QueryClient,
        output: &Profile,
        _variables: &UpdateProfile,
    ) {
        client.set_query_data(&keys::profile(&output.external_uid), output.clone());
        self.auth.set_profile(output.clone());
    }
}

pub fn use_update_profile<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Mutation<UpdateProfileHandler<A>> {
    Mutation::new(
        &ctx.client,
        UpdateProfileHandler {
            api: ctx.api.clone(),
            auth: ctx.auth.clone(),
        },
    )
}
