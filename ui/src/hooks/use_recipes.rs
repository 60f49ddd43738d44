use payloads::requests::{ListRecipes, RecipeFilters};
use payloads::responses::Recipe;
use payloads::{ProfileId, RecipeApi};

use super::HookContext;
use crate::cache::{
    InfiniteQuery, Page, Query, QueryOptions, use_infinite_query, use_query,
};
use crate::keys;

/// The recipe list, one page at a time. Each distinct set of filters is
/// cached separately.
pub fn use_recipes<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
    filters: RecipeFilters,
) -> InfiniteQuery<Recipe> {
    let api = ctx.api.clone();
    let page_size = ctx.page_size;
    let key = keys::recipe_list(&filters);
    use_infinite_query(
        &ctx.client,
        key,
        page_size,
        QueryOptions::default(),
        move |page| {
            let api = api.clone();
            let request = ListRecipes::new(page, page_size, &filters);
            async move {
                let list = api.list_recipes(&request).await?;
                Ok(Page {
                    items: list.recipes,
                    page,
                    total: list.total,
                })
            }
        },
    )
}

/// Recipes owned by one profile.
pub fn use_user_recipes<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
    profile_id: ProfileId,
) -> Query<Vec<Recipe>> {
    let api = ctx.api.clone();
    use_query(
        &ctx.client,
        keys::user_recipes(profile_id),
        QueryOptions::default(),
        move || {
            let api = api.clone();
            async move { api.list_user_recipes(profile_id).await }
        },
    )
}
