//! Recipe create, update and delete. None of these write optimistically:
//! the server assigns ids and timestamps, so the cache waits for the
//! confirmed recipe.

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use payloads::requests::{RecipeDetails, UpdateRecipe};
use payloads::responses::Recipe;
use payloads::{ClientError, RecipeApi, RecipeId};
use std::rc::Rc;

use super::HookContext;
use crate::cache::{Mutation, MutationHandler, QueryClient};
use crate::contexts::ModalContext;
use crate::keys;

/// Invalidate every recipe list, then seed the recipe's own key with the
/// confirmed value so a detail view needs no fetch.
fn store_confirmed(client: &QueryClient, recipe: &Recipe) {
    client.invalidate_queries(&keys::recipes());
    client.set_query_data(&keys::recipe(recipe.id), Some(recipe.clone()));
}

pub struct CreateRecipeHandler<A> {
    api: Rc<A>,
}

impl<A: RecipeApi + 'static> MutationHandler for CreateRecipeHandler<A> {
    type Variables = RecipeDetails;
    type Output = Recipe;

    fn mutation_fn(
        &self,
        variables: RecipeDetails,
    ) -> LocalBoxFuture<'static, Result<Recipe, ClientError>> {
        let api = self.api.clone();
        async move { api.create_recipe(&variables).await }.boxed_local()
    }

    fn on_success(
        &self,
        client: &QueryClient,
        output: &Recipe,
        _variables: &RecipeDetails,
    ) {
        tracing::debug!(recipe_id = %output.id, "Created recipe");
        store_confirmed(client, output);
    }
}

pub fn use_create_recipe<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Mutation<CreateRecipeHandler<A>> {
    Mutation::new(
        &ctx.client,
        CreateRecipeHandler {
            api: ctx.api.clone(),
        },
    )
}

pub struct UpdateRecipeHandler<A> {
    api: Rc<A>,
}

impl<A: RecipeApi + 'static> MutationHandler for UpdateRecipeHandler<A> {
    type Variables = UpdateRecipe;
    type Output = Recipe;

    fn mutation_fn(
        &self,
        variables: UpdateRecipe,
    ) -> LocalBoxFuture<'static, Result<Recipe, ClientError>> {
        let api = self.api.clone();
        async move { api.update_recipe(&variables).await }.boxed_local()
    }

    fn on_success(
        &self,
        client: &QueryClient,
        output: &Recipe,
        _variables: &UpdateRecipe,
    ) {
        store_confirmed(client, output);
    }
}

pub fn use_update_recipe<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Mutation<UpdateRecipeHandler<A>> {
    Mutation::new(
        &ctx.client,
        UpdateRecipeHandler {
            api: ctx.api.clone(),
        },
    )
}

pub struct DeleteRecipeHandler<A> {
    api: Rc<A>,
}

impl<A: RecipeApi + 'static> MutationHandler for DeleteRecipeHandler<A> {
    type Variables = RecipeId;
    type Output = ();

    fn mutation_fn(
        &self,
        variables: RecipeId,
    ) -> LocalBoxFuture<'static, Result<(), ClientError>> {
        let api = self.api.clone();
        async move { api.delete_recipe(variables).await }.boxed_local()
    }

    /// The recipe is gone for good: its own entries are removed rather
    /// than invalidated so nothing can read them again.
    fn on_success(
        &self,
        client: &QueryClient,
        _output: &(),
        recipe_id: &RecipeId,
    ) {
        client.remove_queries(&keys::recipe(*recipe_id));
        client.remove_queries(&keys::comments(*recipe_id));
        client.remove_queries(&keys::ratings(*recipe_id));
        client.invalidate_queries(&keys::recipes());
        client.invalidate_queries(&keys::favorites_all());
    }
}

pub fn use_delete_recipe<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Mutation<DeleteRecipeHandler<A>> {
    Mutation::new(
        &ctx.client,
        DeleteRecipeHandler {
            api: ctx.api.clone(),
        },
    )
}

pub const DELETE_RECIPE_MODAL: &str = "delete-recipe";

/// Ask before deleting: `request` opens the confirmation dialog for a
/// recipe and `confirm` deletes whichever recipe the dialog was opened
/// for.
pub struct DeleteRecipeConfirmation<A: RecipeApi + 'static> {
    modal: ModalContext,
    delete: Mutation<DeleteRecipeHandler<A>>,
}

impl<A: RecipeApi + 'static> DeleteRecipeConfirmation<A> {
    pub fn request(&self, recipe_id: RecipeId) {
        self.modal.open(DELETE_RECIPE_MODAL, recipe_id);
    }

    pub fn is_open(&self) -> bool {
        self.modal.is_open(DELETE_RECIPE_MODAL)
    }

    pub fn pending(&self) -> Option<RecipeId> {
        self.modal.get_data::<RecipeId>(DELETE_RECIPE_MODAL)
    }

    pub fn cancel(&self) {
        self.modal.close(DELETE_RECIPE_MODAL);
    }

    /// Close the dialog and delete its recipe. Returns the deleted id, or
    /// `None` if the dialog was not open.
    pub async fn confirm(&self) -> Result<Option<RecipeId>, ClientError> {
        let Some(recipe_id) = self.pending() else {
            return Ok(None);
        };
        self.modal.close(DELETE_RECIPE_MODAL);
        self.delete.mutate(recipe_id).await?;
        Ok(Some(recipe_id))
    }

    pub fn mutation(&self) -> &Mutation<DeleteRecipeHandler<A>> {
        &self.delete
    }
}

pub fn use_delete_recipe_confirmation<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> DeleteRecipeConfirmation<A> {
    DeleteRecipeConfirmation {
        modal: ctx.modal.clone(),
        delete: use_delete_recipe(ctx),
    }
}
