use payloads::responses::Recipe;
use payloads::{RecipeApi, RecipeId};

use super::HookContext;
use crate::cache::{InfiniteData, Query, QueryClient, QueryOptions, use_query};
use crate::keys;

/// A single recipe. `None` once loaded means the recipe does not exist.
///
/// Until the recipe's own fetch lands, any copy already cached in a recipe
/// list, a user's recipes or the favorites is shown as placeholder data.
pub fn use_recipe<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
    recipe_id: RecipeId,
) -> Query<Option<Recipe>> {
    let api = ctx.api.clone();
    let client = ctx.client.clone();
    let options = QueryOptions::default().placeholder_data(move || {
        cached_copy(&client, recipe_id).map(Some)
    });
    use_query(&ctx.client, keys::recipe(recipe_id), options, move || {
        let api = api.clone();
        async move { api.get_recipe(recipe_id).await }
    })
}

fn cached_copy(client: &QueryClient, recipe_id: RecipeId) -> Option<Recipe> {
    let from_lists = client
        .find_all_data::<InfiniteData<Recipe>>(&keys::recipe_lists())
        .into_iter()
        .find_map(|(_, data)| {
            data.items().find(|recipe| recipe.id == recipe_id).cloned()
        });
    if from_lists.is_some() {
        return from_lists;
    }

    let mut collections =
        client.find_all_data::<Vec<Recipe>>(&keys::recipes().with("user"));
    collections.extend(client.find_all_data::<Vec<Recipe>>(&keys::favorites_all()));
    collections.into_iter().find_map(|(_, recipes)| {
        recipes.into_iter().find(|recipe| recipe.id == recipe_id)
    })
}
