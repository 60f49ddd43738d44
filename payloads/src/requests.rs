use crate::{CategoryId, RatingValue, RecipeId, responses};
use serde::{Deserialize, Serialize};

pub const RECIPE_TITLE_MAX_LEN: usize = 200;
pub const COMMENT_MAX_LEN: usize = 2000;
pub const DISPLAY_NAME_MAX_LEN: usize = 255;

/// Validation result for free-text fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextValidation {
    Valid,
    Blank,
    TooLong { max: usize },
}

impl TextValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    pub fn error_message(&self, field: &str) -> Option<String> {
        match self {
            Self::Valid => None,
            Self::Blank => Some(format!("{field} cannot be empty")),
            Self::TooLong { max } => {
                Some(format!("{field} must be at most {max} characters"))
            }
        }
    }
}

fn validate_text(text: &str, max: usize) -> TextValidation {
    if text.trim().is_empty() {
        return TextValidation::Blank;
    }
    if text.chars().count() > max {
        return TextValidation::TooLong { max };
    }
    TextValidation::Valid
}

pub fn validate_recipe_title(title: &str) -> TextValidation {
    validate_text(title, RECIPE_TITLE_MAX_LEN)
}

pub fn validate_comment(body: &str) -> TextValidation {
    validate_text(body, COMMENT_MAX_LEN)
}

/// Ratings are whole stars, 1 through 5.
pub fn validate_rating(value: u8) -> bool {
    (RatingValue::MIN..=RatingValue::MAX).contains(&value)
}

/// Filters for the recipe list. Also used as part of the list cache key, so
/// two lists with equal filters share cached pages.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct RecipeFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
}

/// Query string for a page of recipes. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRecipes {
    pub page: u32,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryId>,
}

impl ListRecipes {
    pub fn new(page: u32, page_size: u32, filters: &RecipeFilters) -> Self {
        Self {
            page,
            page_size,
            search: filters.search.clone(),
            category: filters.category,
        }
    }
}

/// Everything the author edits on a recipe. Used for both create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDetails {
    pub title: String,
    pub description: Option<String>,
    pub prep_time_minutes: Option<u32>,
    pub cook_time_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub ingredients: Vec<responses::Ingredient>,
    pub steps: Vec<responses::Step>,
    pub category_ids: Vec<CategoryId>,
    pub nutrition: Option<responses::NutritionFacts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecipe {
    pub recipe_id: RecipeId,
    pub details: RecipeDetails,
}

/// Upserted server-side: one rating per (recipe, user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRecipe {
    pub recipe_id: RecipeId,
    pub rating: RatingValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateComment {
    pub recipe_id: RecipeId,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
}
