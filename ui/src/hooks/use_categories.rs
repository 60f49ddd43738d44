use jiff::SignedDuration;
use payloads::RecipeApi;
use payloads::responses::Category;

use super::HookContext;
use crate::cache::{Query, QueryOptions, use_query};
use crate::keys;

/// Categories rarely change.
const CATEGORIES_STALE_TIME: SignedDuration = SignedDuration::from_mins(10);

pub fn use_categories<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Query<Vec<Category>> {
    let api = ctx.api.clone();
    use_query(
        &ctx.client,
        keys::categories(),
        QueryOptions::default().stale_time(CATEGORIES_STALE_TIME),
        move || {
            let api = api.clone();
            async move { api.get_categories().await }
        },
    )
}
