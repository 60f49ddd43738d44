use payloads::responses::{Category, Profile, RatingSummary, Recipe};
use reqwest::StatusCode;

use test_helpers::{Endpoint, TestHarness, assert_status_code, mock};
use ui::contexts::AuthState;
use ui::hooks::{sync_profile, use_profile};
use ui::keys;

#[test]
fn sync_stores_profile_in_session_and_cache() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    h.login_unsynced(&alice);
    assert!(h.auth().profile_id().is_none());

    let synced = h.run(sync_profile(&h.ctx))?;

    assert_eq!(synced.as_ref(), Some(&alice));
    assert_eq!(h.auth().profile_id(), Some(alice.id));
    let cached: Option<Profile> =
        h.client().get_query_data(&keys::profile(&alice.external_uid));
    assert_eq!(cached, Some(alice));
    Ok(())
}

#[test]
fn sync_without_session_does_nothing() -> anyhow::Result<()> {
    let h = TestHarness::new();

    assert_eq!(h.run(sync_profile(&h.ctx))?, None);
    assert_eq!(h.api.calls(Endpoint::GetProfile), 0);
    Ok(())
}

#[test]
fn sync_rejects_profile_of_another_user() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    h.login_unsynced(&alice);
    h.api.sign_in(&mock::bob());

    let result = h.run(sync_profile(&h.ctx));

    assert!(matches!(result, Err(payloads::ClientError::Unexpected(_))));
    assert!(h.auth().profile().is_none());
    Ok(())
}

#[test]
fn sync_surfaces_backend_rejection() -> anyhow::Result<()> {
    let h = TestHarness::new();
    h.login_unsynced(&mock::alice());
    h.api.sign_out();

    let result = h.run(sync_profile(&h.ctx));

    assert_status_code(result, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[test]
fn logout_drops_user_scoped_data_only() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    let recipe = mock::recipe(&mock::bob(), "Gumbo");
    h.login(&alice);

    let client = h.client();
    client.set_query_data(&keys::favorites(alice.id), vec![recipe.clone()]);
    client.set_query_data(&keys::profile(&alice.external_uid), alice.clone());
    client.set_query_data(&keys::user_rating(recipe.id, alice.id), Some(4u8));
    client.set_query_data(&keys::ratings(recipe.id), RatingSummary::default());
    client.set_query_data(&keys::categories(), vec![mock::category("Soup")]);
    client.set_query_data(&keys::recipe(recipe.id), Some(recipe.clone()));

    h.auth().logout(client);

    assert_eq!(h.auth().state(), AuthState::LoggedOut);
    assert!(client.get_query_data::<Vec<Recipe>>(&keys::favorites(alice.id)).is_none());
    assert!(
        client
            .get_query_data::<Profile>(&keys::profile(&alice.external_uid))
            .is_none()
    );
    assert!(
        client
            .get_query_data::<Option<u8>>(&keys::user_rating(recipe.id, alice.id))
            .is_none()
    );
    assert!(client.get_query_data::<RatingSummary>(&keys::ratings(recipe.id)).is_some());
    assert!(client.get_query_data::<Vec<Category>>(&keys::categories()).is_some());
    assert!(client.get_query_data::<Option<Recipe>>(&keys::recipe(recipe.id)).is_some());
    Ok(())
}

#[test]
fn profile_query_starts_from_session_copy() -> anyhow::Result<()> {
    let h = TestHarness::new();
    let alice = mock::alice();
    h.login(&alice);

    let profile = use_profile(&h.ctx);
    let result = profile.result();
    assert!(result.is_placeholder_data);
    assert!(result.is_fetching());
    assert_eq!(result.data.map(|p| p.id), Some(alice.id));

    h.settle();
    let result = profile.result();
    assert!(!result.is_placeholder_data);
    assert_eq!(result.data, Some(alice));
    Ok(())
}

#[test]
fn profile_query_disabled_when_signed_out() -> anyhow::Result<()> {
    let h = TestHarness::new();

    let profile = use_profile(&h.ctx);
    h.settle();

    assert!(!profile.is_enabled());
    assert!(profile.result().data.is_none());
    assert_eq!(h.api.calls(Endpoint::GetProfile), 0);
    Ok(())
}
