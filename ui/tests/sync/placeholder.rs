use payloads::requests::RecipeFilters;
use test_helpers::{Endpoint, TestHarness, mock};
use ui::hooks::{use_favorites, use_recipe, use_recipes, use_user_recipes};

#[test]
fn detail_view_shows_list_copy_while_loading() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipes = mock::recipes(&alice, 3);
    let target = recipes[1].clone();
    h.api.insert_recipes(recipes);

    let list = use_recipes(&h.ctx, RecipeFilters::default());
    h.settle();
    assert!(list.result().query.is_success());

    let gate = h.api.pause(Endpoint::GetRecipe);
    let detail = use_recipe(&h.ctx, target.id);
    h.settle();

    let result = detail.result();
    assert!(result.is_placeholder_data);
    assert!(result.is_fetching());
    assert!(!result.is_loading());
    assert_eq!(
        result.data.flatten().map(|recipe| recipe.title),
        Some(target.title.clone())
    );

    gate.release();
    h.settle();

    let result = detail.result();
    assert!(!result.is_placeholder_data);
    assert!(!result.is_fetching());
    assert_eq!(result.data.flatten().map(|recipe| recipe.id), Some(target.id));
    Ok(())
}

#[test]
fn favorites_seed_detail_view() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&alice, "Focaccia");
    h.api.insert_recipe(recipe.clone());
    h.api.set_favorites(alice.id, &[recipe.id]);
    h.login(&alice);

    let favorites = use_favorites(&h.ctx);
    h.settle();
    assert_eq!(favorites.result().data.map(|f| f.len()), Some(1));

    let _gate = h.api.pause(Endpoint::GetRecipe);
    let detail = use_recipe(&h.ctx, recipe.id);
    let result = detail.result();
    assert!(result.is_placeholder_data);
    assert_eq!(
        result.data.flatten().map(|r| r.title),
        Some("Focaccia".to_string())
    );
    Ok(())
}

#[test]
fn profile_page_seeds_detail_view() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let bob = mock::bob();
    let own = mock::recipe(&alice, "Granola");
    h.api.insert_recipes([own.clone(), mock::recipe(&bob, "Chili")]);

    let owned = use_user_recipes(&h.ctx, alice.id);
    h.settle();
    let titles: Vec<String> = owned
        .result()
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|recipe| recipe.title)
        .collect();
    assert_eq!(titles, vec!["Granola"]);

    let _gate = h.api.pause(Endpoint::GetRecipe);
    let detail = use_recipe(&h.ctx, own.id);
    assert!(detail.result().is_placeholder_data);
    assert_eq!(detail.result().data.flatten().map(|r| r.id), Some(own.id));
    Ok(())
}

#[test]
fn unknown_recipe_has_no_placeholder() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let recipe = mock::recipe(&mock::alice(), "Ghost");

    let detail = use_recipe(&h.ctx, recipe.id);
    let result = detail.result();
    assert!(result.is_loading());
    assert!(!result.is_placeholder_data);
    assert!(result.data.is_none());

    h.settle();
    let result = detail.result();
    assert!(result.is_success());
    assert_eq!(result.data, Some(None));
    Ok(())
}
