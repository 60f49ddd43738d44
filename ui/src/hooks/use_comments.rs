use futures::FutureExt;
use futures::future::LocalBoxFuture;
use jiff::SignedDuration;
use payloads::requests::CreateComment;
use payloads::responses::Comment;
use payloads::{ClientError, CommentId, RecipeApi, RecipeId};
use std::rc::Rc;

use super::HookContext;
use crate::cache::{
    Mutation, MutationHandler, Query, QueryClient, QueryOptions, use_query,
};
use crate::keys;

const COMMENTS_STALE_TIME: SignedDuration = SignedDuration::from_secs(30);

/// Live comments on a recipe, oldest first.
pub fn use_comments<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
    recipe_id: RecipeId,
) -> Query<Vec<Comment>> {
    let api = ctx.api.clone();
    use_query(
        &ctx.client,
        keys::comments(recipe_id),
        QueryOptions::default().stale_time(COMMENTS_STALE_TIME),
        move || {
            let api = api.clone();
            async move {
                let comments = api.get_comments(recipe_id).await?;
                Ok(comments
                    .into_iter()
                    .filter(|comment| !comment.is_deleted())
                    .collect())
            }
        },
    )
}

fn settle_comments(client: &QueryClient, recipe_id: RecipeId) {
    client.invalidate_queries(&keys::comments(recipe_id));
    client.invalidate_queries(&keys::recipe(recipe_id));
}

pub struct CreateCommentHandler<A> {
    api: Rc<A>,
}

impl<A: RecipeApi + 'static> MutationHandler for CreateCommentHandler<A> {
    type Variables = CreateComment;
    type Output = Comment;

    fn mutation_fn(
        &self,
        variables: CreateComment,
    ) -> LocalBoxFuture<'static, Result<Comment, ClientError>> {
        let api = self.api.clone();
        async move { api.create_comment(&variables).await }.boxed_local()
    }

    fn on_success(
        &self,
        client: &QueryClient,
        _output: &Comment,
        variables: &CreateComment,
    ) {
        settle_comments(client, variables.recipe_id);
    }
}

pub fn use_create_comment<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Mutation<CreateCommentHandler<A>> {
    Mutation::new(
        &ctx.client,
        CreateCommentHandler {
            api: ctx.api.clone(),
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteComment {
    pub comment_id: CommentId,
    pub recipe_id: RecipeId,
}

pub struct DeleteCommentHandler<A> {
    api: Rc<A>,
}

impl<A: RecipeApi + 'static> MutationHandler for DeleteCommentHandler<A> {
    type Variables = DeleteComment;
    type Output = ();

    fn mutation_fn(
        &self,
        variables: DeleteComment,
    ) -> LocalBoxFuture<'static, Result<(), ClientError>> {
        let api = self.api.clone();
        async move { api.delete_comment(variables.comment_id).await }
            .boxed_local()
    }

    fn on_success(
        &self,
        client: &QueryClient,
        _output: &(),
        variables: &DeleteComment,
    ) {
        settle_comments(client, variables.recipe_id);
    }
}

pub fn use_delete_comment<A: RecipeApi + 'static>(
    ctx: &HookContext<A>,
) -> Mutation<DeleteCommentHandler<A>> {
    Mutation::new(
        &ctx.client,
        DeleteCommentHandler {
            api: ctx.api.clone(),
        },
    )
}
