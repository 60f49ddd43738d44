//! In-memory backend implementing `RecipeApi`.
//!
//! Every call is counted per [`Endpoint`]. Tests can hold a call open with
//! [`MockApi::pause`] to control exactly when its response lands, or make
//! the next call fail with [`MockApi::fail_next`]. Reads compute their
//! response when called, so a paused read returns what the server held at
//! that moment, not at release.

use futures::channel::oneshot;
use payloads::requests::{
    self, CreateComment, ListRecipes, RateRecipe, RecipeDetails, UpdateProfile,
    UpdateRecipe,
};
use payloads::responses::{
    AverageRating, Category, Comment, FavoriteStatus, Profile, Rating,
    RatingSummary, Recipe, RecipeList,
};
use payloads::{ClientError, CommentId, ProfileId, RecipeApi, RecipeId};
use reqwest::StatusCode;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use crate::mock::base_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    GetRecipe,
    ListRecipes,
    ListUserRecipes,
    CreateRecipe,
    UpdateRecipe,
    DeleteRecipe,
    GetCategories,
    GetFavorites,
    AddFavorite,
    RemoveFavorite,
    RateRecipe,
    GetRating,
    GetUserRating,
    GetComments,
    CreateComment,
    DeleteComment,
    GetProfile,
    UpdateProfile,
}

type GateResult = Result<(), (StatusCode, String)>;

/// Holds one paused call open. Dropping it without a decision releases the
/// call.
pub struct Gate {
    sender: Option<oneshot::Sender<GateResult>>,
}

impl Gate {
    pub fn release(mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Ok(()));
        }
    }

    /// Answer the call with an error status instead.
    pub fn fail(mut self, status: StatusCode, message: &str) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Err((status, message.to_string())));
        }
    }
}

impl Drop for Gate {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Ok(()));
        }
    }
}

#[derive(Default)]
struct MockState {
    recipes: Vec<Recipe>,
    categories: Vec<Category>,
    favorites: HashMap<ProfileId, Vec<RecipeId>>,
    ratings: HashMap<(RecipeId, ProfileId), u8>,
    comments: Vec<Comment>,
    profiles: Vec<Profile>,
    current: Option<ProfileId>,
    calls: Vec<Endpoint>,
    list_requests: Vec<ListRecipes>,
    failures: HashMap<Endpoint, VecDeque<(StatusCode, String)>>,
    gates: HashMap<Endpoint, VecDeque<oneshot::Receiver<GateResult>>>,
}

#[derive(Default)]
pub struct MockApi {
    state: RefCell<MockState>,
}

fn api_error(status: StatusCode, message: &str) -> ClientError {
    ClientError::APIError(status, message.to_string())
}

fn unauthorized() -> ClientError {
    api_error(StatusCode::UNAUTHORIZED, "Not signed in")
}

/// Seeding and inspection
impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_recipe(&self, recipe: Recipe) {
        self.state.borrow_mut().recipes.push(recipe);
    }

    pub fn insert_recipes(&self, recipes: impl IntoIterator<Item = Recipe>) {
        self.state.borrow_mut().recipes.extend(recipes);
    }

    pub fn insert_category(&self, category: Category) {
        self.state.borrow_mut().categories.push(category);
    }

    pub fn insert_comment(&self, comment: Comment) {
        self.state.borrow_mut().comments.push(comment);
    }

    /// Register a profile and treat it as the signed-in user.
    pub fn sign_in(&self, profile: &Profile) {
        let mut state = self.state.borrow_mut();
        if !state.profiles.iter().any(|p| p.id == profile.id) {
            state.profiles.push(profile.clone());
        }
        state.current = Some(profile.id);
    }

    pub fn sign_out(&self) {
        self.state.borrow_mut().current = None;
    }

    pub fn set_favorites(&self, profile_id: ProfileId, recipes: &[RecipeId]) {
        self.state
            .borrow_mut()
            .favorites
            .insert(profile_id, recipes.to_vec());
    }

    pub fn set_rating(&self, recipe_id: RecipeId, profile_id: ProfileId, value: u8) {
        self.state
            .borrow_mut()
            .ratings
            .insert((recipe_id, profile_id), value);
    }

    pub fn favorite_ids(&self, profile_id: ProfileId) -> Vec<RecipeId> {
        self.state
            .borrow()
            .favorites
            .get(&profile_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn rating_of(&self, recipe_id: RecipeId, profile_id: ProfileId) -> Option<u8> {
        self.state
            .borrow()
            .ratings
            .get(&(recipe_id, profile_id))
            .copied()
    }

    pub fn has_recipe(&self, recipe_id: RecipeId) -> bool {
        self.state.borrow().recipes.iter().any(|r| r.id == recipe_id)
    }

    /// Number of calls made to `endpoint` so far.
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|call| **call == endpoint)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn list_requests(&self) -> Vec<ListRecipes> {
        self.state.borrow().list_requests.clone()
    }

    /// Hold the next call to `endpoint` open until the returned gate is
    /// released or failed. Several pauses queue up in call order.
    pub fn pause(&self, endpoint: Endpoint) -> Gate {
        let (sender, receiver) = oneshot::channel();
        self.state
            .borrow_mut()
            .gates
            .entry(endpoint)
            .or_default()
            .push_back(receiver);
        Gate {
            sender: Some(sender),
        }
    }

    /// Make the next call to `endpoint` fail with `status`.
    pub fn fail_next(&self, endpoint: Endpoint, status: StatusCode, message: &str) {
        self.state
            .borrow_mut()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back((status, message.to_string()));
    }
}

/// Call plumbing
impl MockApi {
    /// Record the call and hand back its gate, or fail it immediately if a
    /// failure was queued.
    fn begin(
        &self,
        endpoint: Endpoint,
    ) -> Result<Option<oneshot::Receiver<GateResult>>, ClientError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(endpoint);
        if let Some((status, message)) = state
            .failures
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
        {
            return Err(api_error(status, &message));
        }
        Ok(state
            .gates
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front))
    }

    async fn wait(
        gate: Option<oneshot::Receiver<GateResult>>,
    ) -> Result<(), ClientError> {
        let Some(gate) = gate else {
            return Ok(());
        };
        match gate.await {
            Ok(Err((status, message))) => Err(api_error(status, &message)),
            Ok(Ok(())) | Err(oneshot::Canceled) => Ok(()),
        }
    }

    fn current(&self) -> Result<Profile, ClientError> {
        let state = self.state.borrow();
        let current = state.current.ok_or_else(unauthorized)?;
        state
            .profiles
            .iter()
            .find(|profile| profile.id == current)
            .cloned()
            .ok_or_else(unauthorized)
    }

    /// Stored recipe with its ratings attached and normalized, as the
    /// backend would serve it.
    fn served(&self, recipe: &Recipe) -> Recipe {
        let state = self.state.borrow();
        let mut recipe = recipe.clone();
        recipe.ratings = state
            .ratings
            .iter()
            .filter(|((recipe_id, _), _)| *recipe_id == recipe.id)
            .map(|((_, profile_id), rating)| Rating {
                profile_id: *profile_id,
                rating: *rating,
            })
            .collect();
        recipe.normalized()
    }

    fn find_recipe(&self, recipe_id: RecipeId) -> Option<Recipe> {
        let recipe = self
            .state
            .borrow()
            .recipes
            .iter()
            .find(|recipe| recipe.id == recipe_id)
            .cloned()?;
        Some(self.served(&recipe))
    }

    fn require_recipe(&self, recipe_id: RecipeId) -> Result<Recipe, ClientError> {
        self.find_recipe(recipe_id)
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Recipe not found"))
    }

    fn set_favorite(
        &self,
        recipe_id: RecipeId,
        favorite: bool,
    ) -> Result<FavoriteStatus, ClientError> {
        let profile = self.current()?;
        self.require_recipe(recipe_id)?;
        let mut state = self.state.borrow_mut();
        let favorites = state.favorites.entry(profile.id).or_default();
        favorites.retain(|id| *id != recipe_id);
        if favorite {
            favorites.push(recipe_id);
        }
        Ok(FavoriteStatus {
            is_favorite: favorite,
        })
    }
}

impl RecipeApi for MockApi {
    async fn get_recipe(
        &self,
        recipe_id: RecipeId,
    ) -> Result<Option<Recipe>, ClientError> {
        let gate = self.begin(Endpoint::GetRecipe)?;
        let recipe = self.find_recipe(recipe_id);
        Self::wait(gate).await?;
        Ok(recipe)
    }

    async fn list_recipes(
        &self,
        details: &ListRecipes,
    ) -> Result<RecipeList, ClientError> {
        let gate = self.begin(Endpoint::ListRecipes)?;
        self.state.borrow_mut().list_requests.push(details.clone());
        let matching: Vec<Recipe> = self
            .state
            .borrow()
            .recipes
            .iter()
            .filter(|recipe| {
                details.search.as_ref().is_none_or(|search| {
                    recipe.title.to_lowercase().contains(&search.to_lowercase())
                })
            })
            .filter(|recipe| {
                details.category.is_none_or(|category| {
                    recipe.categories.iter().any(|c| c.id == category)
                })
            })
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let skip = (details.page.saturating_sub(1) * details.page_size) as usize;
        let recipes = matching
            .iter()
            .skip(skip)
            .take(details.page_size as usize)
            .map(|recipe| self.served(recipe))
            .collect();
        Self::wait(gate).await?;
        Ok(RecipeList { recipes, total })
    }

    async fn list_user_recipes(
        &self,
        profile_id: ProfileId,
    ) -> Result<Vec<Recipe>, ClientError> {
        let gate = self.begin(Endpoint::ListUserRecipes)?;
        let owned: Vec<Recipe> = self
            .state
            .borrow()
            .recipes
            .iter()
            .filter(|recipe| recipe.owner.id == profile_id)
            .cloned()
            .collect();
        let owned = owned.iter().map(|recipe| self.served(recipe)).collect();
        Self::wait(gate).await?;
        Ok(owned)
    }

    async fn create_recipe(
        &self,
        details: &RecipeDetails,
    ) -> Result<Recipe, ClientError> {
        let gate = self.begin(Endpoint::CreateRecipe)?;
        Self::wait(gate).await?;
        let owner = self.current()?;
        if let Some(message) = requests::validate_recipe_title(&details.title)
            .error_message("Title")
        {
            return Err(api_error(StatusCode::BAD_REQUEST, &message));
        }
        let categories = {
            let state = self.state.borrow();
            state
                .categories
                .iter()
                .filter(|c| details.category_ids.contains(&c.id))
                .cloned()
                .collect()
        };
        let recipe = Recipe {
            id: RecipeId(Uuid::new_v4()),
            owner: owner.summary(),
            title: details.title.clone(),
            description: details.description.clone(),
            prep_time_minutes: details.prep_time_minutes,
            cook_time_minutes: details.cook_time_minutes,
            servings: details.servings,
            ingredients: details.ingredients.clone(),
            steps: details.steps.clone(),
            categories,
            nutrition: details.nutrition.clone(),
            ratings: Vec::new(),
            average_rating: AverageRating::default(),
            created_at: base_time(),
            updated_at: base_time(),
        };
        self.insert_recipe(recipe.clone());
        Ok(recipe.normalized())
    }

    async fn update_recipe(
        &self,
        details: &UpdateRecipe,
    ) -> Result<Recipe, ClientError> {
        let gate = self.begin(Endpoint::UpdateRecipe)?;
        Self::wait(gate).await?;
        let profile = self.current()?;
        {
            let mut state = self.state.borrow_mut();
            let recipe = state
                .recipes
                .iter_mut()
                .find(|recipe| recipe.id == details.recipe_id)
                .ok_or_else(|| {
                    api_error(StatusCode::NOT_FOUND, "Recipe not found")
                })?;
            if recipe.owner.id != profile.id {
                return Err(api_error(StatusCode::FORBIDDEN, "Not your recipe"));
            }
            let edit = &details.details;
            recipe.title = edit.title.clone();
            recipe.description = edit.description.clone();
            recipe.prep_time_minutes = edit.prep_time_minutes;
            recipe.cook_time_minutes = edit.cook_time_minutes;
            recipe.servings = edit.servings;
            recipe.ingredients = edit.ingredients.clone();
            recipe.steps = edit.steps.clone();
            recipe.nutrition = edit.nutrition.clone();
        }
        self.require_recipe(details.recipe_id)
    }

    async fn delete_recipe(&self, recipe_id: RecipeId) -> Result<(), ClientError> {
        let gate = self.begin(Endpoint::DeleteRecipe)?;
        Self::wait(gate).await?;
        let profile = self.current()?;
        let recipe = self.require_recipe(recipe_id)?;
        if recipe.owner.id != profile.id {
            return Err(api_error(StatusCode::FORBIDDEN, "Not your recipe"));
        }
        let mut state = self.state.borrow_mut();
        state.recipes.retain(|recipe| recipe.id != recipe_id);
        for favorites in state.favorites.values_mut() {
            favorites.retain(|id| *id != recipe_id);
        }
        state.ratings.retain(|(id, _), _| *id != recipe_id);
        state.comments.retain(|comment| comment.recipe_id != recipe_id);
        Ok(())
    }

    async fn get_categories(&self) -> Result<Vec<Category>, ClientError> {
        let gate = self.begin(Endpoint::GetCategories)?;
        let categories = self.state.borrow().categories.clone();
        Self::wait(gate).await?;
        Ok(categories)
    }

    async fn get_favorites(
        &self,
        profile_id: ProfileId,
    ) -> Result<Vec<Recipe>, ClientError> {
        let gate = self.begin(Endpoint::GetFavorites)?;
        let favorites = self
            .favorite_ids(profile_id)
            .into_iter()
            .filter_map(|recipe_id| self.find_recipe(recipe_id))
            .collect();
        Self::wait(gate).await?;
        Ok(favorites)
    }

    async fn add_favorite(
        &self,
        recipe_id: RecipeId,
    ) -> Result<FavoriteStatus, ClientError> {
        let gate = self.begin(Endpoint::AddFavorite)?;
        Self::wait(gate).await?;
        self.set_favorite(recipe_id, true)
    }

    async fn remove_favorite(
        &self,
        recipe_id: RecipeId,
    ) -> Result<FavoriteStatus, ClientError> {
        let gate = self.begin(Endpoint::RemoveFavorite)?;
        Self::wait(gate).await?;
        self.set_favorite(recipe_id, false)
    }

    async fn rate_recipe(&self, details: &RateRecipe) -> Result<(), ClientError> {
        let gate = self.begin(Endpoint::RateRecipe)?;
        Self::wait(gate).await?;
        let profile = self.current()?;
        self.require_recipe(details.recipe_id)?;
        self.set_rating(details.recipe_id, profile.id, details.rating.0);
        Ok(())
    }

    async fn get_rating(
        &self,
        recipe_id: RecipeId,
    ) -> Result<RatingSummary, ClientError> {
        let gate = self.begin(Endpoint::GetRating)?;
        let average = self.require_recipe(recipe_id)?.average_rating;
        Self::wait(gate).await?;
        Ok(RatingSummary {
            average: average.rating,
            count: average.count,
        })
    }

    async fn get_user_rating(
        &self,
        profile_id: ProfileId,
        recipe_id: RecipeId,
    ) -> Result<Option<u8>, ClientError> {
        let gate = self.begin(Endpoint::GetUserRating)?;
        let rating = self.rating_of(recipe_id, profile_id);
        Self::wait(gate).await?;
        Ok(rating)
    }

    async fn get_comments(
        &self,
        recipe_id: RecipeId,
    ) -> Result<Vec<Comment>, ClientError> {
        let gate = self.begin(Endpoint::GetComments)?;
        let comments = self
            .state
            .borrow()
            .comments
            .iter()
            .filter(|comment| comment.recipe_id == recipe_id)
            .cloned()
            .collect();
        Self::wait(gate).await?;
        Ok(comments)
    }

    async fn create_comment(
        &self,
        details: &CreateComment,
    ) -> Result<Comment, ClientError> {
        let gate = self.begin(Endpoint::CreateComment)?;
        Self::wait(gate).await?;
        let author = self.current()?;
        self.require_recipe(details.recipe_id)?;
        if let Some(message) =
            requests::validate_comment(&details.body).error_message("Comment")
        {
            return Err(api_error(StatusCode::BAD_REQUEST, &message));
        }
        let comment = Comment {
            id: CommentId(Uuid::new_v4()),
            recipe_id: details.recipe_id,
            author: author.summary(),
            body: details.body.clone(),
            created_at: base_time(),
            deleted_at: None,
        };
        self.insert_comment(comment.clone());
        Ok(comment)
    }

    /// Soft delete: the comment stays stored with `deleted_at` set.
    async fn delete_comment(&self, comment_id: CommentId) -> Result<(), ClientError> {
        let gate = self.begin(Endpoint::DeleteComment)?;
        Self::wait(gate).await?;
        let profile = self.current()?;
        let mut state = self.state.borrow_mut();
        let comment = state
            .comments
            .iter_mut()
            .find(|comment| comment.id == comment_id)
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Comment not found"))?;
        if comment.author.id != profile.id {
            return Err(api_error(StatusCode::FORBIDDEN, "Not your comment"));
        }
        comment.deleted_at = Some(base_time());
        Ok(())
    }

    async fn get_profile(&self) -> Result<Profile, ClientError> {
        let gate = self.begin(Endpoint::GetProfile)?;
        let profile = self.current();
        Self::wait(gate).await?;
        profile
    }

    async fn update_profile(
        &self,
        details: &UpdateProfile,
    ) -> Result<Profile, ClientError> {
        let gate = self.begin(Endpoint::UpdateProfile)?;
        Self::wait(gate).await?;
        let current = self.current()?;
        let mut state = self.state.borrow_mut();
        let profile = state
            .profiles
            .iter_mut()
            .find(|profile| profile.id == current.id)
            .ok_or_else(unauthorized)?;
        profile.username = details.username.clone();
        profile.display_name = details.display_name.clone();
        profile.bio = details.bio.clone();
        Ok(profile.clone())
    }
}
