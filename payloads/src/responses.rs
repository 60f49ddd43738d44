use crate::{CategoryId, CommentId, ExternalUid, ProfileId, RecipeId};
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Profile display information attached to recipes and comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: ProfileId,
    pub username: String,
    pub display_name: Option<String>,
}

/// A user's profile, synced from the identity provider on first sign in.
///
/// `external_uid` identifies the identity-provider account; `id` is what
/// ownership checks and user-scoped queries use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub external_uid: ExternalUid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: Timestamp,
}

impl Profile {
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub step_order: i32,
    pub instruction: String,
}

/// Nutrition per serving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub calories: Option<Decimal>,
    pub protein_grams: Option<Decimal>,
    pub carbohydrate_grams: Option<Decimal>,
    pub fat_grams: Option<Decimal>,
}

/// One user's rating of one recipe, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub profile_id: ProfileId,
    pub rating: u8,
}

/// Mean of a recipe's ratings, or 0 when it has none.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AverageRating {
    pub rating: f64,
    pub count: usize,
}

impl AverageRating {
    pub fn from_ratings(ratings: &[Rating]) -> Self {
        if ratings.is_empty() {
            return Self::default();
        }
        let sum: u32 = ratings.iter().map(|r| u32::from(r.rating)).sum();
        Self {
            rating: f64::from(sum) / ratings.len() as f64,
            count: ratings.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub owner: ProfileSummary,
    pub title: String,
    pub description: Option<String>,
    pub prep_time_minutes: Option<u32>,
    pub cook_time_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<Step>,
    pub categories: Vec<Category>,
    pub nutrition: Option<NutritionFacts>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    /// Derived from `ratings`; see [`Recipe::normalized`].
    #[serde(default)]
    pub average_rating: AverageRating,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Recipe {
    /// Put a recipe as read from the backend into display order: steps by
    /// `step_order` (ties keep their original order) and the average rating
    /// recomputed from the raw ratings.
    pub fn normalized(mut self) -> Self {
        self.steps.sort_by_key(|step| step.step_order);
        self.average_rating = AverageRating::from_ratings(&self.ratings);
        self
    }

    pub fn total_time_minutes(&self) -> Option<u32> {
        match (self.prep_time_minutes, self.cook_time_minutes) {
            (None, None) => None,
            (prep, cook) => Some(prep.unwrap_or(0) + cook.unwrap_or(0)),
        }
    }
}

/// One page of the recipe list as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeList {
    pub recipes: Vec<Recipe>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteStatus {
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: usize,
}

/// Comments are soft-deleted: once `deleted_at` is set they are excluded
/// from reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub recipe_id: RecipeId,
    pub author: ProfileSummary,
    pub body: String,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Comment {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Error body returned by the backend on non-success statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    #[serde(alias = "error")]
    pub message: String,
}
