use futures::FutureExt;
use futures::future::LocalBoxFuture;
use payloads::responses::{FavoriteStatus, Recipe};
use payloads::{ClientError, RecipeApi, RecipeId};
use std::cell::Cell;
use std::rc::Rc;

use super::HookContext;
use crate::cache::{
    Mutation, MutationContext, MutationHandler, Query, QueryClient,
    QueryOptions, Subscription, use_query,
};
use crate::contexts::AuthContext;
use crate::keys;

/// The signed-in user's favorite recipes. Disabled while no profile is
/// known.
pub fn use_favorites<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Query<Vec<Recipe>> {
    let profile_id = ctx.auth.profile_id();
    let key = match profile_id {
        Some(profile_id) => keys::favorites(profile_id),
        None => keys::favorites_all(),
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
                    Some(profile_id) => api.get_favorites(profile_id).await,
                    None => Ok(Vec::new()),
                }
            }
        },
    )
}

/// Whether one recipe is among the favorites, read from the favorites
/// list so it follows optimistic toggles.
pub struct FavoriteFlag {
    favorites: Query<Vec<Recipe>>,
    recipe_id: RecipeId,
}

impl FavoriteFlag {
    pub fn is_favorite(&self) -> bool {
        self.favorites
            .result()
            .data
            .is_some_and(|recipes| contains(&recipes, self.recipe_id))
    }

    pub fn is_loading(&self) -> bool {
        self.favorites.result().is_loading()
    }

    pub fn subscribe(&self, on_change: impl Fn() + 'static) -> Subscription {
        self.favorites.subscribe(on_change)
    }
}

pub fn use_is_favorite<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
    recipe_id: RecipeId,
) -> FavoriteFlag {
    FavoriteFlag {
        favorites: use_favorites(ctx),
        recipe_id,
    }
}

fn contains(recipes: &[Recipe], recipe_id: RecipeId) -> bool {
    recipes.iter().any(|recipe| recipe.id == recipe_id)
}

/// Add or remove `recipe` from `recipes` by id. Adding twice or removing
/// an absent recipe leaves the list as it was.
fn set_membership(
    mut recipes: Vec<Recipe>,
    recipe: &Recipe,
    favorite: bool,
) -> Vec<Recipe> {
    if favorite {
        if !contains(&recipes, recipe.id) {
            recipes.push(recipe.clone());
        }
    } else {
        recipes.retain(|existing| existing.id != recipe.id);
    }
    recipes
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToggleFavorite {
    pub recipe: Recipe,
    /// Membership before the toggle. The mutation flips it.
    pub is_favorite: bool,
}

/// The optimistic write is the only local patch. The last toggle to settle
/// refetches the list, so back-to-back toggles end on whatever the server
/// holds and an earlier toggle never overwrites a later optimistic write.
pub struct ToggleFavoriteHandler<A> {
    api: Rc<A>,
    auth: AuthContext,
    /// Toggles between `on_mutate` and `on_settled`.
    unsettled: Rc<Cell<usize>>,
}

impl<A: RecipeApi + 'static> MutationHandler for ToggleFavoriteHandler<A> {
    type Variables = ToggleFavorite;
    type Output = FavoriteStatus;

    fn mutation_fn(
        &self,
        variables: ToggleFavorite,
    ) -> LocalBoxFuture<'static, Result<FavoriteStatus, ClientError>> {
        let api = self.api.clone();
        let recipe_id = variables.recipe.id;
        async move {
            if variables.is_favorite {
                api.remove_favorite(recipe_id).await
            } else {
                api.add_favorite(recipe_id).await
            }
        }
        .boxed_local()
    }

    fn on_mutate(
        &self,
        client: &QueryClient,
        variables: &ToggleFavorite,
    ) -> Option<MutationContext> {
        self.unsettled.set(self.unsettled.get() + 1);
        let key = keys::favorites(self.auth.profile_id()?);
        client.cancel_queries(&key);
        let snapshot = client.snapshot(&key);
        if client.get_query_data::<Vec<Recipe>>(&key).is_some() {
            client.update_query_data::<Vec<Recipe>>(&key, |current| {
                set_membership(
                    current.unwrap_or_default(),
                    &variables.recipe,
                    !variables.is_favorite,
                )
            });
        }
        Some(MutationContext::new().with_snapshot(snapshot))
    }

    fn on_settled(&self, client: &QueryClient, _variables: &ToggleFavorite) {
        let unsettled = self.unsettled.get().saturating_sub(1);
        self.unsettled.set(unsettled);
        if unsettled > 0 {
            tracing::debug!(unsettled, "Deferring favorites refetch");
            return;
        }
        if let Some(profile_id) = self.auth.profile_id() {
            client.invalidate_queries(&keys::favorites(profile_id));
        }
    }
}

pub fn use_toggle_favorite<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Mutation<ToggleFavoriteHandler<A>> {
    Mutation::new(
        &ctx.client,
        ToggleFavoriteHandler {
            api: ctx.api.clone(),
            auth: ctx.auth.clone(),
            unsettled: Rc::new(Cell::new(0)),
        },
    )
}
