use crate::{CommentId, ProfileId, RecipeId, requests, responses};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::future::Future;
use std::sync::RwLock;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// An API client for interfacing with the backend.
///
/// Every method is a single request/response translation: no retries, no
/// caching. Callers that need either go through the query cache in `ui`.
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
    access_token: RwLock<Option<SecretString>>,
}

impl APIClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_client(address, reqwest::Client::new())
    }

    pub fn with_client(
        address: impl Into<String>,
        inner_client: reqwest::Client,
    ) -> Self {
        Self {
            address: address.into(),
            inner_client,
            access_token: RwLock::new(None),
        }
    }

    /// Set (or clear) the bearer token issued by the identity provider.
    pub fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.access_token.write() {
            *guard = token.map(SecretString::from);
        }
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}

/// Helper methods for http actions
impl APIClient {
    fn format_url(&self, path: &str) -> String {
        format!("{}/api/{path}", &self.address)
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        let token = self.access_token.read().ok().and_then(|guard| {
            guard
                .as_ref()
                .map(|token| token.expose_secret().to_string())
        });

        #[cfg(target_arch = "wasm32")]
        let request = request.fetch_credentials_include();

        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get(&self, path: &str) -> ReqwestResult {
        let request = self.inner_client.get(self.format_url(path));
        self.authorize(request).send().await
    }

    async fn get_with_query(
        &self,
        path: &str,
        query: &impl Serialize,
    ) -> ReqwestResult {
        let request = self.inner_client.get(self.format_url(path)).query(query);
        self.authorize(request).send().await
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        let request = self.inner_client.post(self.format_url(path)).json(body);
        self.authorize(request).send().await
    }

    async fn empty_post(&self, path: &str) -> ReqwestResult {
        let request = self.inner_client.post(self.format_url(path));
        self.authorize(request).send().await
    }

    async fn put(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        let request = self.inner_client.put(self.format_url(path)).json(body);
        self.authorize(request).send().await
    }

    async fn delete(&self, path: &str) -> ReqwestResult {
        let request = self.inner_client.delete(self.format_url(path));
        self.authorize(request).send().await
    }
}

/// The remote operations the client-side cache is built on.
///
/// `APIClient` is the production implementation; tests substitute an
/// in-memory one. Futures are not required to be `Send`: everything runs on
/// the browser's single event loop.
pub trait RecipeApi {
    fn get_recipe(
        &self,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<Option<responses::Recipe>, ClientError>>;

    fn list_recipes(
        &self,
        details: &requests::ListRecipes,
    ) -> impl Future<Output = Result<responses::RecipeList, ClientError>>;

    fn list_user_recipes(
        &self,
        profile_id: ProfileId,
    ) -> impl Future<Output = Result<Vec<responses::Recipe>, ClientError>>;

    fn create_recipe(
        &self,
        details: &requests::RecipeDetails,
    ) -> impl Future<Output = Result<responses::Recipe, ClientError>>;

    fn update_recipe(
        &self,
        details: &requests::UpdateRecipe,
    ) -> impl Future<Output = Result<responses::Recipe, ClientError>>;

    fn delete_recipe(
        &self,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<(), ClientError>>;

    fn get_categories(
        &self,
    ) -> impl Future<Output = Result<Vec<responses::Category>, ClientError>>;

    fn get_favorites(
        &self,
        profile_id: ProfileId,
    ) -> impl Future<Output = Result<Vec<responses::Recipe>, ClientError>>;

    fn add_favorite(
        &self,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<responses::FavoriteStatus, ClientError>>;

    fn remove_favorite(
        &self,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<responses::FavoriteStatus, ClientError>>;

    fn rate_recipe(
        &self,
        details: &requests::RateRecipe,
    ) -> impl Future<Output = Result<(), ClientError>>;

    fn get_rating(
        &self,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<responses::RatingSummary, ClientError>>;

    /// The signed-in user's rating of a recipe, if they have rated it.
    fn get_user_rating(
        &self,
        profile_id: ProfileId,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<Option<u8>, ClientError>>;

    fn get_comments(
        &self,
        recipe_id: RecipeId,
    ) -> impl Future<Output = Result<Vec<responses::Comment>, ClientError>>;

    fn create_comment(
        &self,
        details: &requests::CreateComment,
    ) -> impl Future<Output = Result<responses::Comment, ClientError>>;

    fn delete_comment(
        &self,
        comment_id: CommentId,
    ) -> impl Future<Output = Result<(), ClientError>>;

    /// The signed-in user's profile. The backend creates it the first time
    /// it sees the identity-provider account.
    fn get_profile(
        &self,
    ) -> impl Future<Output = Result<responses::Profile, ClientError>>;

    fn update_profile(
        &self,
        details: &requests::UpdateProfile,
    ) -> impl Future<Output = Result<responses::Profile, ClientError>>;
}

/// Methods on the backend API
impl RecipeApi for APIClient {
    async fn get_recipe(
        &self,
        recipe_id: RecipeId,
    ) -> Result<Option<responses::Recipe>, ClientError> {
        let response = self.get(&format!("recipes/{recipe_id}")).await?;
        let recipe: Option<responses::Recipe> = ok_body(response).await?;
        Ok(recipe.map(responses::Recipe::normalized))
    }

    async fn list_recipes(
        &self,
        details: &requests::ListRecipes,
    ) -> Result<responses::RecipeList, ClientError> {
        let response = self.get_with_query("recipes", details).await?;
        let mut list: responses::RecipeList = ok_body(response).await?;
        list.recipes = normalize_all(list.recipes);
        Ok(list)
    }

    async fn list_user_recipes(
        &self,
        profile_id: ProfileId,
    ) -> Result<Vec<responses::Recipe>, ClientError> {
        let response =
            self.get(&format!("profiles/{profile_id}/recipes")).await?;
        Ok(normalize_all(ok_body(response).await?))
    }

    async fn create_recipe(
        &self,
        details: &requests::RecipeDetails,
    ) -> Result<responses::Recipe, ClientError> {
        let response = self.post("recipes", details).await?;
        let recipe: responses::Recipe = ok_body(response).await?;
        Ok(recipe.normalized())
    }

    async fn update_recipe(
        &self,
        details: &requests::UpdateRecipe,
    ) -> Result<responses::Recipe, ClientError> {
        let response = self
            .put(&format!("recipes/{}", details.recipe_id), &details.details)
            .await?;
        let recipe: responses::Recipe = ok_body(response).await?;
        Ok(recipe.normalized())
    }

    async fn delete_recipe(
        &self,
        recipe_id: RecipeId,
    ) -> Result<(), ClientError> {
        let response = self.delete(&format!("recipes/{recipe_id}")).await?;
        ok_empty(response).await
    }

    async fn get_categories(
        &self,
    ) -> Result<Vec<responses::Category>, ClientError> {
        let response = self.get("categories").await?;
        ok_body(response).await
    }

    async fn get_favorites(
        &self,
        profile_id: ProfileId,
    ) -> Result<Vec<responses::Recipe>, ClientError> {
        let response = self.get(&format!("favorites/{profile_id}")).await?;
        Ok(normalize_all(ok_body(response).await?))
    }

    async fn add_favorite(
        &self,
        recipe_id: RecipeId,
    ) -> Result<responses::FavoriteStatus, ClientError> {
        let response =
            self.empty_post(&format!("recipes/{recipe_id}/favorite")).await?;
        ok_body(response).await
    }

    async fn remove_favorite(
        &self,
        recipe_id: RecipeId,
    ) -> Result<responses::FavoriteStatus, ClientError> {
        let response =
            self.delete(&format!("recipes/{recipe_id}/favorite")).await?;
        ok_body(response).await
    }

    async fn rate_recipe(
        &self,
        details: &requests::RateRecipe,
    ) -> Result<(), ClientError> {
        if !requests::validate_rating(details.rating.0) {
            return Err(ClientError::Validation(format!(
                "Rating must be between 1 and 5, got {}",
                details.rating
            )));
        }
        let response = self
            .put(&format!("recipes/{}/rating", details.recipe_id), details)
            .await?;
        ok_empty(response).await
    }

    async fn get_rating(
        &self,
        recipe_id: RecipeId,
    ) -> Result<responses::RatingSummary, ClientError> {
        let response = self.get(&format!("recipes/{recipe_id}/rating")).await?;
        ok_body(response).await
    }

    async fn get_user_rating(
        &self,
        profile_id: ProfileId,
        recipe_id: RecipeId,
    ) -> Result<Option<u8>, ClientError> {
        let response = self
            .get(&format!("recipes/{recipe_id}/rating/{profile_id}"))
            .await?;
        ok_body(response).await
    }

    async fn get_comments(
        &self,
        recipe_id: RecipeId,
    ) -> Result<Vec<responses::Comment>, ClientError> {
        let response =
            self.get(&format!("recipes/{recipe_id}/comments")).await?;
        ok_body(response).await
    }

    async fn create_comment(
        &self,
        details: &requests::CreateComment,
    ) -> Result<responses::Comment, ClientError> {
        if let Some(message) =
            requests::validate_comment(&details.body).error_message("Comment")
        {
            return Err(ClientError::Validation(message));
        }
        let response = self.post("comments", details).await?;
        ok_body(response).await
    }

    async fn delete_comment(
        &self,
        comment_id: CommentId,
    ) -> Result<(), ClientError> {
        let response = self.delete(&format!("comments/{comment_id}")).await?;
        ok_empty(response).await
    }

    async fn get_profile(&self) -> Result<responses::Profile, ClientError> {
        let response = self.get("profile").await?;
        ok_body(response).await
    }

    async fn update_profile(
        &self,
        details: &requests::UpdateProfile,
    ) -> Result<responses::Profile, ClientError> {
        let response = self.put("profile", details).await?;
        ok_body(response).await
    }
}

fn normalize_all(recipes: Vec<responses::Recipe>) -> Vec<responses::Recipe> {
    recipes
        .into_iter()
        .map(responses::Recipe::normalized)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing the server's message.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
    /// Rejected before any request was made.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unexpected(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::APIError(status, _) => Some(*status),
            Self::Network(e) => e.status(),
            _ => None,
        }
    }
}

/// Pull a displayable message out of an error response body.
///
/// The backend sends `{"message": "..."}` (or `{"error": "..."}`); plain text
/// bodies are used as-is, and an empty body falls back to a generic message.
pub fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<responses::ErrorMessage>(body)
        && !parsed.message.trim().is_empty()
    {
        return parsed.message;
    }
    let body = body.trim();
    if body.is_empty() || body.starts_with('{') {
        format!("Request failed with status {}", status.as_u16())
    } else {
        body.to_string()
    }
}

async fn api_error(response: reqwest::Response) -> ClientError {
    let status = response.status();
    match response.text().await {
        Ok(body) => ClientError::APIError(status, error_message(status, &body)),
        Err(e) => ClientError::Network(e),
    }
}

/// Deserialize a successful request into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    Ok(())
}
