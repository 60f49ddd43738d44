use futures::FutureExt;
use futures::future::LocalBoxFuture;
use payloads::requests::RateRecipe;
use payloads::responses::RatingSummary;
use payloads::{ClientError, RecipeApi, RecipeId};
use std::rc::Rc;

use super::HookContext;
use crate::cache::{
    Mutation, MutationContext, MutationHandler, Query, QueryClient,
    QueryOptions, use_query,
};
use crate::contexts::AuthContext;
use crate::keys;

pub fn use_recipe_rating<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
    recipe_id: RecipeId,
) -> Query<RatingSummary> {
    let api = ctx.api.clone();
    use_query(
        &ctx.client,
        keys::ratings(recipe_id),
        QueryOptions::default(),
        move || {
            let api = api.clone();
            async move { api.get_rating(recipe_id).await }
        },
    )
}

/// The signed-in user's own rating of a recipe; `None` if they have not
/// rated it. Disabled while no profile is known.
pub fn use_user_rating<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
    recipe_id: RecipeId,
) -> Query<Option<u8>> {
    let profile_id = ctx.auth.profile_id();
    let key = match profile_id {
        Some(profile_id) => keys::user_rating(recipe_id, profile_id),
        None => keys::ratings(recipe_id).with("user"),
    };
    let api = ctx.api.clone();
    use_query(
        &ctx.client,
        key,
        QueryOptions::default().enabled(profile_id.is_some()),
        move || {
            let api = api.clone();
            async move {
                match profile_id {
                    Some(profile_id) => {
                        api.get_user_rating(profile_id, recipe_id).await
                    }
                    None => Ok(None),
                }
            }
        },
    )
}

/// Only the user's own rating is written optimistically. The average is
/// left to the refetch that settlement triggers.
pub struct RateRecipeHandler<A> {
    api: Rc<A>,
    auth: AuthContext,
}

impl<A: RecipeApi + 'static> MutationHandler for RateRecipeHandler<A> {
    type Variables = RateRecipe;
    type Output = ();

    fn mutation_fn(
        &self,
        variables: RateRecipe,
    ) -> LocalBoxFuture<'static, Result<(), ClientError>> {
        let api = self.api.clone();
        async move { api.rate_recipe(&variables).await }.boxed_local()
    }

    fn on_mutate(
        &self,
        client: &QueryClient,
        variables: &RateRecipe,
    ) -> Option<MutationContext> {
        let profile_id = self.auth.profile_id()?;
        let key = keys::user_rating(variables.recipe_id, profile_id);
        client.cancel_queries(&key);
        let snapshot = client.snapshot(&key);
        client.set_query_data::<Option<u8>>(&key, Some(variables.rating.0));
        Some(MutationContext::new().with_snapshot(snapshot))
    }

    fn on_settled(&self, client: &QueryClient, variables: &RateRecipe) {
        client.invalidate_queries(&keys::ratings(variables.recipe_id));
        client.invalidate_queries(&keys::recipes());
    }
}

pub fn use_rate_recipe<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Mutation<RateRecipeHandler<A>> {
    Mutation::new(
        &ctx.client,
        RateRecipeHandler {
            api: ctx.api.clone(),
            auth: ctx.auth.clone(),
        },
    )
}
