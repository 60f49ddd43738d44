use jiff::Span;
use reqwest::StatusCode;
use std::cell::RefCell;
use std::rc::Rc;

use test_helpers::{Endpoint, TestHarness, mock};
use ui::cache::{CacheEvent, FetchStatus, QueryStatus};
use ui::hooks::{
    use_categories, use_comments, use_favorites, use_rate_recipe,
    use_user_rating,
};
use ui::{QueryConfig, keys};

#[test]
fn disabled_query_never_fetches() -> anyhow::Result<()> {
    let h = TestHarness::new();

    let favorites = use_favorites(&h.ctx);
    h.settle();

    let result = favorites.result();
    assert_eq!(h.api.calls(Endpoint::GetFavorites), 0);
    assert_eq!(result.fetch_status, FetchStatus::Idle);
    assert_eq!(result.status, QueryStatus::Idle);
    assert!(result.data.is_none());
    assert!(!favorites.refetch());
    Ok(())
}

#[test]
fn concurrent_mounts_share_one_fetch() -> anyhow::Result<()> {
    let h = TestHarness::new();
    h.api.insert_category(mock::category("Dessert"));

    let first = use_categories(&h.ctx);
    let second = use_categories(&h.ctx);
    assert!(first.result().is_loading());
    h.settle();

    assert_eq!(h.api.calls(Endpoint::GetCategories), 1);
    assert_eq!(first.result().data, second.result().data);
    assert_eq!(first.result().data.map(|c| c.len()), Some(1));
    Ok(())
}

#[test]
fn invalidate_then_mount_fetches_exactly_once() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Soup");
    h.api.insert_recipe(recipe.clone());
    h.api.insert_comment(mock::comment(&recipe, &alice, "First"));

    let comments = use_comments(&h.ctx, recipe.id);
    h.settle();
    drop(comments);
    assert_eq!(h.api.calls(Endpoint::GetComments), 1);

    h.api.insert_comment(mock::comment(&recipe, &alice, "Second"));
    h.client().invalidate_queries(&keys::comments(recipe.id));
    // nothing is watching, so invalidation alone does not fetch
    h.settle();
    assert_eq!(h.api.calls(Endpoint::GetComments), 1);

    let comments = use_comments(&h.ctx, recipe.id);
    h.settle();
    assert_eq!(h.api.calls(Endpoint::GetComments), 2);
    let bodies: Vec<String> = comments
        .result()
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|comment| comment.body)
        .collect();
    assert_eq!(bodies, vec!["First", "Second"]);
    Ok(())
}

#[test]
fn comments_stay_fresh_for_thirty_seconds() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Soup");
    h.api.insert_recipe(recipe.clone());

    drop(use_comments(&h.ctx, recipe.id));
    h.settle();
    assert_eq!(h.api.calls(Endpoint::GetComments), 1);

    h.time_source.advance(Span::new().seconds(29));
    let comments = use_comments(&h.ctx, recipe.id);
    h.settle();
    assert_eq!(h.api.calls(Endpoint::GetComments), 1);
    assert!(!comments.result().is_stale);
    drop(comments);

    h.time_source.advance(Span::new().seconds(2));
    let _comments = use_comments(&h.ctx, recipe.id);
    h.settle();
    assert_eq!(h.api.calls(Endpoint::GetComments), 2);
    Ok(())
}

#[test]
fn deleted_comments_are_hidden() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Soup");
    let mut removed = mock::comment(&recipe, &alice, "Removed");
    removed.deleted_at = Some(mock::base_time());
    h.api.insert_comment(removed);
    h.api.insert_comment(mock::comment(&recipe, &alice, "Kept"));

    let comments = use_comments(&h.ctx, recipe.id);
    h.settle();

    let data = comments.result().data.unwrap_or_default();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].body, "Kept");
    Ok(())
}

#[test]
fn invalidation_refetches_in_background_keeping_data() -> anyhow::Result<()> {
    let h = TestHarness::new();
    h.api.insert_category(mock::category("Dessert"));
    let categories = use_categories(&h.ctx);
    h.settle();

    h.api.insert_category(mock::category("Soup"));
    h.client().invalidate_queries(&keys::categories());

    let during = categories.result();
    assert!(during.is_fetching());
    assert!(!during.is_loading());
    assert_eq!(during.data.map(|c| c.len()), Some(1));

    h.settle();
    let after = categories.result();
    assert_eq!(after.fetch_status, FetchStatus::Idle);
    assert_eq!(after.data.map(|c| c.len()), Some(2));
    Ok(())
}

#[test]
fn failed_refetch_keeps_previous_data() -> anyhow::Result<()> {
    let h = TestHarness::new();
    h.api.insert_category(mock::category("Dessert"));
    let categories = use_categories(&h.ctx);
    h.settle();

    h.api.fail_next(
        Endpoint::GetCategories,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database unavailable",
    );
    assert!(categories.refetch());
    h.settle();

    let result = categories.result();
    assert!(result.is_error());
    assert_eq!(result.error.as_deref(), Some("Database unavailable"));
    assert_eq!(result.data.map(|c| c.len()), Some(1));
    Ok(())
}

#[test]
fn refetch_ignored_while_fetching() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let gate = h.api.pause(Endpoint::GetCategories);
    let categories = use_categories(&h.ctx);
    h.settle();

    assert!(!categories.refetch());
    gate.release();
    h.settle();
    assert_eq!(h.api.calls(Endpoint::GetCategories), 1);
    assert!(categories.result().is_success());
    Ok(())
}

#[test]
fn late_response_discarded_after_optimistic_write() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Soup");
    h.api.insert_recipe(recipe.clone());
    h.login(&alice);
    h.api.set_rating(recipe.id, alice.id, 2);

    let discarded = Rc::new(RefCell::new(Vec::new()));
    let _subscription = {
        let discarded = discarded.clone();
        h.client().subscribe(move |event| {
            if let CacheEvent::FetchDiscarded(key) = event {
                discarded.borrow_mut().push(key.clone());
            }
        })
    };

    let read_gate = h.api.pause(Endpoint::GetUserRating);
    let rating = use_user_rating(&h.ctx, recipe.id);
    h.settle();
    assert!(rating.result().is_fetching());

    let write_gate = h.api.pause(Endpoint::RateRecipe);
    let rate = use_rate_recipe(&h.ctx);
    let handle = {
        let rate = rate.clone();
        let request = payloads::requests::RateRecipe {
            recipe_id: recipe.id,
            rating: payloads::RatingValue(5),
        };
        h.spawn(async move { rate.mutate(request).await })
    };
    h.settle();
    assert_eq!(rating.result().data, Some(Some(5)));
    assert_eq!(rating.result().fetch_status, FetchStatus::Idle);

    // the GET started before the write answers with the old rating
    read_gate.release();
    h.settle();
    assert_eq!(rating.result().data, Some(Some(5)));
    assert_eq!(
        *discarded.borrow(),
        vec![keys::user_rating(recipe.id, alice.id)]
    );

    write_gate.release();
    h.settle();
    h.run(handle)?;
    assert_eq!(rating.result().data, Some(Some(5)));
    assert_eq!(h.api.calls(Endpoint::GetUserRating), 2);
    Ok(())
}

#[test]
fn offline_fetch_waits_for_network() -> anyhow::Result<()> {
    let h = TestHarness::new();
    h.api.insert_category(mock::category("Dessert"));
    h.client().set_online(false);

    let categories = use_categories(&h.ctx);
    h.settle();
    assert_eq!(categories.result().fetch_status, FetchStatus::Paused);
    assert_eq!(h.api.calls(Endpoint::GetCategories), 0);

    h.client().set_online(true);
    h.settle();
    assert_eq!(h.api.calls(Endpoint::GetCategories), 1);
    assert!(categories.result().is_success());
    Ok(())
}

#[test]
fn unobserved_queries_are_garbage_collected() -> anyhow::Result<()> {
    let h = TestHarness::new();
    drop(use_categories(&h.ctx));
    h.settle();
    assert!(
        h.client()
            .get_query_state::<Vec<payloads::responses::Category>>(&keys::categories())
            .is_some()
    );

    h.time_source.advance(Span::new().minutes(4));
    assert_eq!(h.client().collect_garbage(), 0);

    h.time_source.advance(Span::new().minutes(2));
    assert_eq!(h.client().collect_garbage(), 1);
    assert!(
        h.client()
            .get_query_state::<Vec<payloads::responses::Category>>(&keys::categories())
            .is_none()
    );
    Ok(())
}

#[test]
fn failed_queries_retry_until_limit() -> anyhow::Result<()> {
    let h = TestHarness::with_config(QueryConfig {
        retry: 2,
        ..QueryConfig::for_tests()
    });
    h.api.insert_category(mock::category("Dessert"));
    for _ in 0..2 {
        h.api.fail_next(
            Endpoint::GetCategories,
            StatusCode::SERVICE_UNAVAILABLE,
            "Try again",
        );
    }

    let categories = use_categories(&h.ctx);
    h.settle();

    assert_eq!(h.api.calls(Endpoint::GetCategories), 3);
    assert!(categories.result().is_success());
    Ok(())
}

#[test]
fn stale_observer_drop_leaves_new_entry_observed() -> anyhow::Result<()> {
    let h = TestHarness::new();
    h.api.insert_category(mock::category("Soup"));

    let old = use_categories(&h.ctx);
    h.settle();
    h.client().remove_queries(&keys::categories());

    let current = use_categories(&h.ctx);
    h.settle();
    assert_eq!(h.api.calls(Endpoint::GetCategories), 2);

    drop(old);
    h.client().invalidate_queries(&keys::categories());
    h.settle();
    assert_eq!(h.api.calls(Endpoint::GetCategories), 3);

    h.time_source.advance(Span::new().minutes(11));
    assert_eq!(h.client().collect_garbage(), 0);
    assert_eq!(current.result().data.map(|c| c.len()), Some(1));
    Ok(())
}
