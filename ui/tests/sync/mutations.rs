use payloads::RatingValue;
use payloads::requests::{CreateComment, RateRecipe, RecipeFilters, UpdateProfile, UpdateRecipe};
use payloads::responses::{FavoriteStatus, Recipe};
use reqwest::StatusCode;
use std::cell::RefCell;
use std::rc::Rc;

use test_helpers::{Endpoint, TestHarness, assert_status_code, mock};
use ui::cache::{CANCELLED, CacheEvent, MutationState};
use ui::hooks::{
    DeleteComment, ToggleFavorite, use_comments, use_create_comment,
    use_create_recipe, use_delete_comment, use_delete_recipe,
    use_delete_recipe_confirmation, use_favorites, use_is_favorite,
    use_profile, use_rate_recipe, use_recipe, use_recipe_rating, use_recipes,
    use_toggle_favorite, use_update_profile, use_update_recipe,
    use_user_rating,
};
use ui::keys;

use super::ids;

#[test]
fn favorite_shows_immediately_and_settles_by_refetch() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Shakshuka");
    h.api.insert_recipe(recipe.clone());
    h.api.set_favorites(alice.id, &[]);
    h.login(&alice);

    let favorites = use_favorites(&h.ctx);
    h.settle();
    assert_eq!(favorites.result().data, Some(vec![]));

    let events = Rc::new(RefCell::new(Vec::new()));
    let _subscription = {
        let events = events.clone();
        h.client()
            .subscribe(move |event| events.borrow_mut().push(event.clone()))
    };

    let gate = h.api.pause(Endpoint::AddFavorite);
    let toggle = use_toggle_favorite(&h.ctx);
    let handle = {
        let toggle = toggle.clone();
        let recipe = recipe.clone();
        h.spawn(async move {
            toggle
                .mutate(ToggleFavorite {
                    recipe,
                    is_favorite: false,
                })
                .await
        })
    };
    h.settle();

    let key = keys::favorites(alice.id);
    let optimistic: Option<Vec<Recipe>> = h.client().get_query_data(&key);
    assert_eq!(optimistic.as_deref().map(ids), Some(vec![recipe.id]));
    assert_eq!(toggle.state(), MutationState::Mutating);
    assert!(toggle.is_pending());
    assert!(h.api.favorite_ids(alice.id).is_empty());

    gate.release();
    let status = h.run(handle)?;
    h.settle();

    assert_eq!(status, FavoriteStatus { is_favorite: true });
    assert_eq!(
        toggle.state(),
        MutationState::Committed(FavoriteStatus { is_favorite: true })
    );
    assert!(!toggle.is_pending());
    assert!(events.borrow().contains(&CacheEvent::Invalidated(key.clone())));
    assert_eq!(h.api.calls(Endpoint::GetFavorites), 2);
    let settled = favorites.result().data.unwrap_or_default();
    assert_eq!(ids(&settled), vec![recipe.id]);
    Ok(())
}

#[test]
fn failed_rating_rolls_back_to_previous_value() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&mock::bob(), "Ramen");
    h.api.insert_recipe(recipe.clone());
    h.api.set_rating(recipe.id, alice.id, 3);
    h.login(&alice);

    let user_rating = use_user_rating(&h.ctx, recipe.id);
    h.settle();
    assert_eq!(user_rating.result().data, Some(Some(3)));

    let gate = h.api.pause(Endpoint::RateRecipe);
    let rate = use_rate_recipe(&h.ctx);
    let handle = {
        let rate = rate.clone();
        h.spawn(async move {
            rate.mutate(RateRecipe {
                recipe_id: recipe.id,
                rating: RatingValue(5),
            })
            .await
        })
    };
    h.settle();
    assert_eq!(user_rating.result().data, Some(Some(5)));

    gate.fail(StatusCode::INTERNAL_SERVER_ERROR, "Rating service down");
    let result = h.run(handle);

    assert_status_code(result, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(user_rating.result().data, Some(Some(3)));
    assert_eq!(
        rate.state(),
        MutationState::RolledBack("Rating service down".to_string())
    );

    h.settle();
    assert_eq!(user_rating.result().data, Some(Some(3)));
    assert_eq!(h.api.rating_of(recipe.id, alice.id), Some(3));
    Ok(())
}

#[test]
fn dropped_rating_call_rolls_back() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&mock::bob(), "Gnocchi");
    h.api.insert_recipe(recipe.clone());
    h.api.set_rating(recipe.id, alice.id, 3);
    h.login(&alice);

    let user_rating = use_user_rating(&h.ctx, recipe.id);
    h.settle();

    let gate = h.api.pause(Endpoint::RateRecipe);
    let rate = use_rate_recipe(&h.ctx);
    let handle = {
        let rate = rate.clone();
        h.spawn(async move {
            rate.mutate(RateRecipe {
                recipe_id: recipe.id,
                rating: RatingValue(5),
            })
            .await
        })
    };
    h.settle();
    assert_eq!(user_rating.result().data, Some(Some(5)));
    assert!(rate.is_pending());

    drop(handle);
    h.settle();

    assert!(!rate.is_pending());
    assert_eq!(rate.state(), MutationState::RolledBack(CANCELLED.to_string()));
    assert_eq!(user_rating.result().data, Some(Some(3)));
    assert_eq!(h.api.calls(Endpoint::GetUserRating), 2);
    assert_eq!(h.api.rating_of(recipe.id, alice.id), Some(3));
    drop(gate);
    Ok(())
}

#[test]
fn failed_unfavorite_restores_list() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Dal");
    h.api.insert_recipe(recipe.clone());
    h.api.set_favorites(alice.id, &[recipe.id]);
    h.login(&alice);

    let flag = use_is_favorite(&h.ctx, recipe.id);
    h.settle();
    assert!(flag.is_favorite());

    h.api.fail_next(
        Endpoint::RemoveFavorite,
        StatusCode::SERVICE_UNAVAILABLE,
        "Try again later",
    );
    let toggle = use_toggle_favorite(&h.ctx);
    let result = h.run(toggle.mutate(ToggleFavorite {
        recipe: recipe.clone(),
        is_favorite: true,
    }));

    assert_status_code(result, StatusCode::SERVICE_UNAVAILABLE);
    assert!(flag.is_favorite());
    h.settle();
    assert!(flag.is_favorite());
    assert_eq!(h.api.favorite_ids(alice.id), vec![recipe.id]);
    Ok(())
}

#[test]
fn toggle_without_profile_skips_optimistic_write() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let recipe = mock::recipe(&mock::alice(), "Bibimbap");
    h.api.insert_recipe(recipe.clone());

    let toggle = use_toggle_favorite(&h.ctx);
    let result = h.run(toggle.mutate(ToggleFavorite {
        recipe,
        is_favorite: false,
    }));

    assert_status_code(result, StatusCode::UNAUTHORIZED);
    assert_eq!(h.api.calls(Endpoint::AddFavorite), 1);
    assert!(
        h.client()
            .find_all_data::<Vec<Recipe>>(&keys::favorites_all())
            .is_empty()
    );
    assert!(matches!(toggle.state(), MutationState::RolledBack(_)));
    Ok(())
}

#[test]
fn toggling_twice_restores_membership() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let kept = mock::recipe(&alice, "Kept");
    let toggled = mock::recipe(&alice, "Toggled");
    h.api.insert_recipes([kept.clone(), toggled.clone()]);
    h.api.set_favorites(alice.id, &[kept.id]);
    h.login(&alice);

    let favorites = use_favorites(&h.ctx);
    h.settle();
    let before = favorites.result().data.unwrap_or_default();

    let toggle = use_toggle_favorite(&h.ctx);
    h.run(toggle.mutate(ToggleFavorite {
        recipe: toggled.clone(),
        is_favorite: false,
    }))?;
    h.settle();
    assert_eq!(
        ids(&favorites.result().data.unwrap_or_default()),
        vec![kept.id, toggled.id]
    );

    h.run(toggle.mutate(ToggleFavorite {
        recipe: toggled,
        is_favorite: true,
    }))?;
    h.settle();
    assert_eq!(favorites.result().data, Some(before));
    Ok(())
}

#[test]
fn back_to_back_toggles_end_on_server_state() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Pho");
    h.api.insert_recipe(recipe.clone());
    h.api.set_favorites(alice.id, &[]);
    h.login(&alice);

    let flag = use_is_favorite(&h.ctx, recipe.id);
    h.settle();
    assert!(!flag.is_favorite());

    let add_gate = h.api.pause(Endpoint::AddFavorite);
    let remove_gate = h.api.pause(Endpoint::RemoveFavorite);
    let toggle = use_toggle_favorite(&h.ctx);
    let add = {
        let toggle = toggle.clone();
        let recipe = recipe.clone();
        h.spawn(async move {
            toggle
                .mutate(ToggleFavorite {
                    recipe,
                    is_favorite: false,
                })
                .await
        })
    };
    h.settle();
    assert!(flag.is_favorite());

    let remove = {
        let toggle = toggle.clone();
        let recipe = recipe.clone();
        h.spawn(async move {
            toggle
                .mutate(ToggleFavorite {
                    recipe,
                    is_favorite: true,
                })
                .await
        })
    };
    h.settle();
    assert!(!flag.is_favorite());

    add_gate.release();
    h.run(add)?;
    h.settle();
    assert!(!flag.is_favorite());
    assert_eq!(h.api.calls(Endpoint::GetFavorites), 1);

    remove_gate.release();
    h.run(remove)?;
    h.settle();

    assert_eq!(h.api.calls(Endpoint::GetFavorites), 2);
    assert!(h.api.favorite_ids(alice.id).is_empty());
    assert!(!flag.is_favorite());
    assert_eq!(
        toggle.state(),
        MutationState::Committed(FavoriteStatus { is_favorite: false })
    );
    Ok(())
}

#[test]
fn rating_refetches_summary() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&mock::bob(), "Paella");
    h.api.insert_recipe(recipe.clone());
    h.login(&alice);

    let summary = use_recipe_rating(&h.ctx, recipe.id);
    h.settle();
    assert_eq!(summary.result().data.map(|s| s.count), Some(0));

    let rate = use_rate_recipe(&h.ctx);
    h.run(rate.mutate(RateRecipe {
        recipe_id: recipe.id,
        rating: RatingValue(4),
    }))?;
    h.settle();

    let settled = summary.result().data.unwrap_or_default();
    assert_eq!(settled.count, 1);
    assert_eq!(settled.average, 4.0);
    assert_eq!(h.api.calls(Endpoint::GetRating), 2);
    Ok(())
}

#[test]
fn created_recipe_is_cached_and_lists_refetch() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    h.login(&alice);

    let list = use_recipes(&h.ctx, RecipeFilters::default());
    h.settle();
    assert_eq!(list.result().data().map(|d| d.items().count()), Some(0));

    let create = use_create_recipe(&h.ctx);
    let created = h.run(create.mutate(mock::recipe_details("Shakshuka")))?;

    let cached: Option<Option<Recipe>> =
        h.client().get_query_data(&keys::recipe(created.id));
    assert_eq!(cached, Some(Some(created.clone())));

    let detail = use_recipe(&h.ctx, created.id);
    assert_eq!(h.api.calls(Endpoint::GetRecipe), 0);
    assert_eq!(detail.result().data.flatten().map(|r| r.title), Some("Shakshuka".to_string()));

    h.settle();
    let titles: Vec<String> = list
        .result()
        .data()
        .map(|d| d.items().map(|r| r.title.clone()).collect())
        .unwrap_or_default();
    assert_eq!(titles, vec!["Shakshuka"]);
    assert_eq!(h.api.calls(Endpoint::ListRecipes), 2);
    Ok(())
}

#[test]
fn invalid_recipe_is_rejected_without_cache_changes() -> anyhow::Result<()> {
    let h = TestHarness::new();
    h.login(&mock::alice());

    let create = use_create_recipe(&h.ctx);
    let result = h.run(create.mutate(mock::recipe_details("   ")));

    assert_status_code(result, StatusCode::BAD_REQUEST);
    assert!(h.client().find_all_data::<Option<Recipe>>(&keys::recipes()).is_empty());
    Ok(())
}

#[test]
fn updated_recipe_replaces_cached_copy() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Soup");
    h.api.insert_recipe(recipe.clone());
    h.login(&alice);

    let detail = use_recipe(&h.ctx, recipe.id);
    h.settle();

    let update = use_update_recipe(&h.ctx);
    let updated = h.run(update.mutate(UpdateRecipe {
        recipe_id: recipe.id,
        details: mock::recipe_details("Better Soup"),
    }))?;
    assert_eq!(updated.title, "Better Soup");
    assert_eq!(
        detail.result().data.flatten().map(|r| r.title),
        Some("Better Soup".to_string())
    );

    h.settle();
    assert_eq!(
        detail.result().data.flatten().map(|r| r.title),
        Some("Better Soup".to_string())
    );
    Ok(())
}

#[test]
fn updating_someone_elses_recipe_is_forbidden() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let recipe = mock::recipe(&mock::alice(), "Soup");
    h.api.insert_recipe(recipe.clone());
    h.login(&mock::bob());

    let update = use_update_recipe(&h.ctx);
    let result = h.run(update.mutate(UpdateRecipe {
        recipe_id: recipe.id,
        details: mock::recipe_details("Stolen Soup"),
    }));

    assert_status_code(result, StatusCode::FORBIDDEN);
    Ok(())
}

#[test]
fn deleted_recipe_leaves_no_trace() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Lasagna");
    h.api.insert_recipe(recipe.clone());
    h.api.set_favorites(alice.id, &[recipe.id]);
    h.login(&alice);

    let list = use_recipes(&h.ctx, RecipeFilters::default());
    let favorites = use_favorites(&h.ctx);
    h.settle();
    {
        let _detail = use_recipe(&h.ctx, recipe.id);
        let _comments = use_comments(&h.ctx, recipe.id);
        let _summary = use_recipe_rating(&h.ctx, recipe.id);
        h.settle();
    }
    assert!(h.client().get_query_data::<Option<Recipe>>(&keys::recipe(recipe.id)).is_some());

    let delete = use_delete_recipe(&h.ctx);
    h.run(delete.mutate(recipe.id))?;

    assert!(h.client().get_query_state::<Option<Recipe>>(&keys::recipe(recipe.id)).is_none());
    assert!(h.client().get_query_state::<()>(&keys::comments(recipe.id)).is_none());
    assert!(h.client().get_query_state::<()>(&keys::ratings(recipe.id)).is_none());

    h.settle();
    assert_eq!(list.result().data().map(|d| d.items().count()), Some(0));
    assert_eq!(favorites.result().data, Some(vec![]));
    assert!(!h.api.has_recipe(recipe.id));
    Ok(())
}

#[test]
fn delete_waits_for_confirmation() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Tiramisu");
    h.api.insert_recipe(recipe.clone());
    h.login(&alice);

    let confirmation = use_delete_recipe_confirmation(&h.ctx);
    assert_eq!(h.run(confirmation.confirm())?, None);

    confirmation.request(recipe.id);
    assert!(confirmation.is_open());
    assert_eq!(confirmation.pending(), Some(recipe.id));
    confirmation.cancel();
    assert!(!confirmation.is_open());
    assert_eq!(h.api.calls(Endpoint::DeleteRecipe), 0);

    confirmation.request(recipe.id);
    assert_eq!(h.run(confirmation.confirm())?, Some(recipe.id));
    assert!(!confirmation.is_open());
    assert_eq!(confirmation.mutation().state(), MutationState::Committed(()));
    assert!(!h.api.has_recipe(recipe.id));
    Ok(())
}

#[test]
fn comments_refetch_after_create_and_delete() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&mock::bob(), "Curry");
    h.api.insert_recipe(recipe.clone());
    h.login(&alice);

    let comments = use_comments(&h.ctx, recipe.id);
    h.settle();
    assert_eq!(comments.result().data, Some(vec![]));

    let create = use_create_comment(&h.ctx);
    let comment = h.run(create.mutate(CreateComment {
        recipe_id: recipe.id,
        body: "Lovely".to_string(),
    }))?;
    h.settle();
    let bodies: Vec<String> = comments
        .result()
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.body)
        .collect();
    assert_eq!(bodies, vec!["Lovely"]);

    let delete = use_delete_comment(&h.ctx);
    h.run(delete.mutate(DeleteComment {
        comment_id: comment.id,
        recipe_id: recipe.id,
    }))?;
    h.settle();
    assert_eq!(comments.result().data, Some(vec![]));
    assert_eq!(h.api.calls(Endpoint::GetComments), 3);
    Ok(())
}

#[test]
fn profile_update_reaches_cache_and_session() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    h.login(&alice);

    let profile = use_profile(&h.ctx);
    h.settle();

    let update = use_update_profile(&h.ctx);
    h.run(update.mutate(UpdateProfile {
        username: "alice".to_string(),
        display_name: Some("Chef Alice".to_string()),
        bio: Some("Bakes on Sundays".to_string()),
    }))?;

    let cached = profile.result().data;
    assert_eq!(
        cached.and_then(|p| p.display_name),
        Some("Chef Alice".to_string())
    );
    assert_eq!(
        h.auth().profile().and_then(|p| p.bio),
        Some("Bakes on Sundays".to_string())
    );
    assert_eq!(h.api.calls(Endpoint::GetProfile), 1);
    Ok(())
}
