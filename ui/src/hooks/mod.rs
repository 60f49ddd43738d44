//! Domain hooks over the query cache.
//!
//! Each hook takes a [`HookContext`] carrying the cache, the gateway and the
//! session, and returns a mounted [`Query`](crate::cache::Query),
//! [`InfiniteQuery`](crate::cache::InfiniteQuery) or
//! [`Mutation`](crate::cache::Mutation). Dropping the returned value
//! unmounts it.

pub mod use_categories;
pub mod use_comments;
pub mod use_favorites;
pub mod use_profile;
pub mod use_ratings;
pub mod use_recipe;
pub mod use_recipe_mutations;
pub mod use_recipes;

pub use use_categories::use_categories;
pub use use_comments::{
    CreateCommentHandler, DeleteComment, DeleteCommentHandler,
    use_comments, use_create_comment, use_delete_comment,
};
pub use use_favorites::{
    FavoriteFlag, ToggleFavorite, ToggleFavoriteHandler, use_favorites,
    use_is_favorite, use_toggle_favorite,
};
pub use use_profile::{
    UpdateProfileHandler, sync_profile, use_profile, use_update_profile,
};
pub use use_ratings::{
    RateRecipeHandler, use_rate_recipe, use_recipe_rating, use_user_rating,
};
pub use use_recipe::use_recipe;
pub use use_recipe_mutations::{
    CreateRecipeHandler, DELETE_RECIPE_MODAL, DeleteRecipeConfirmation,
    DeleteRecipeHandler, UpdateRecipeHandler, use_create_recipe,
    use_delete_recipe, use_delete_recipe_confirmation, use_update_recipe,
};
pub use use_recipes::{use_recipes, use_user_recipes};

use payloads::{APIClient, RecipeApi};
use std::rc::Rc;

use crate::cache::QueryClient;
use crate::config::ClientConfig;
use crate::contexts::{AuthContext, ModalContext};

/// Everything a hook reads besides its own arguments.
pub struct HookContext<A> {
    pub client: QueryClient,
    pub api: Rc<A>,
    pub auth: AuthContext,
    pub modal: ModalContext,
    pub page_size: u32,
}

impl<A> Clone for HookContext<A> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api: self.api.clone(),
            auth: self.auth.clone(),
            modal: self.modal.clone(),
            page_size: self.page_size,
        }
    }
}

impl<A: RecipeApi + 'static> HookContext<A> {
    pub fn new(
        client: QueryClient,
        api: Rc<A>,
        auth: AuthContext,
        modal: ModalContext,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            api,
            auth,
            modal,
            page_size,
        }
    }
}

impl HookContext<APIClient> {
    /// Production wiring: browser runtime, system clock, real gateway.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            QueryClient::new(config.query.clone()),
            Rc::new(config.api_client()),
            AuthContext::new(),
            ModalContext::new(),
            config.page_size,
        )
    }
}
