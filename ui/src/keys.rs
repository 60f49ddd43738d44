//! Cache key families.
//!
//! Every key the hooks read or write is built here, so families stay
//! consistent between the queries that fill them and the mutations that
//! invalidate them:
//!
//! | Family | Key |
//! |---|---|
//! | recipe | `["recipes", id]` |
//! | recipe list | `["recipes", "list", search, category]` |
//! | a user's recipes | `["recipes", "user", profile_id]` |
//! | categories | `["categories"]` |
//! | favorites | `["favorites", profile_id]` |
//! | rating summary | `["ratings", recipe_id]` |
//! | user rating | `["ratings", recipe_id, "user", profile_id]` |
//! | comments | `["comments", recipe_id]` |
//! | profile | `["profile", external_uid]` |

use payloads::requests::RecipeFilters;
use payloads::{ExternalUid, ProfileId, RecipeId};

use crate::cache::QueryKey;
use crate::query_key;

pub fn recipes() -> QueryKey {
    query_key!["recipes"]
}

pub fn recipe(recipe_id: RecipeId) -> QueryKey {
    recipes().with(recipe_id)
}

pub fn recipe_lists() -> QueryKey {
    recipes().with("list")
}

/// Absent filters become empty segments so every list key has the same
/// length.
pub fn recipe_list(filters: &RecipeFilters) -> QueryKey {
    recipe_lists()
        .with(filters.search.clone().unwrap_or_default())
        .with(
            filters
                .category
                .map(|category| category.to_string())
                .unwrap_or_default(),
        )
}

pub fn user_recipes(profile_id: ProfileId) -> QueryKey {
    recipes().with("user").with(profile_id)
}

pub fn categories() -> QueryKey {
    query_key!["categories"]
}

pub fn favorites_all() -> QueryKey {
    query_key!["favorites"]
}

pub fn favorites(profile_id: ProfileId) -> QueryKey {
    favorites_all().with(profile_id)
}

pub fn ratings_all() -> QueryKey {
    query_key!["ratings"]
}

pub fn ratings(recipe_id: RecipeId) -> QueryKey {
    ratings_all().with(recipe_id)
}

pub fn user_rating(recipe_id: RecipeId, profile_id: ProfileId) -> QueryKey {
    ratings(recipe_id).with("user").with(profile_id)
}

pub fn comments(recipe_id: RecipeId) -> QueryKey {
    query_key!["comments", recipe_id]
}

pub fn profiles() -> QueryKey {
    query_key!["profile"]
}

pub fn profile(uid: &ExternalUid) -> QueryKey {
    profiles().with(uid.0.clone())
}
