//! Canned domain data for tests.
//!
//! Alice and Bob each own a handful of recipes. Timestamps are fixed so
//! equality assertions are stable.

use jiff::Timestamp;
use payloads::requests::RecipeDetails;
use payloads::responses::{
    Category, Comment, Ingredient, NutritionFacts, Profile, Recipe, Step,
};
use payloads::{CategoryId, CommentId, ExternalUid, ProfileId, RecipeId};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Clock start for every harness, and the timestamp on every fixture.
pub fn base_time() -> Timestamp {
    "2025-01-01T00:00:00Z".parse().expect("valid timestamp")
}

pub fn profile(username: &str) -> Profile {
    Profile {
        id: ProfileId(Uuid::new_v4()),
        external_uid: ExternalUid(format!("auth0|{username}")),
        username: username.to_string(),
        display_name: Some(capitalized(username)),
        avatar_url: None,
        bio: None,
        created_at: base_time(),
    }
}

pub fn alice() -> Profile {
    profile("alice")
}

pub fn bob() -> Profile {
    profile("bob")
}

fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn category(name: &str) -> Category {
    Category {
        id: CategoryId(Uuid::new_v4()),
        name: name.to_string(),
    }
}

pub fn recipe(owner: &Profile, title: &str) -> Recipe {
    Recipe {
        id: RecipeId(Uuid::new_v4()),
        owner: owner.summary(),
        title: title.to_string(),
        description: Some(format!("How {} makes {title}", owner.username)),
        prep_time_minutes: Some(10),
        cook_time_minutes: Some(20),
        servings: Some(2),
        ingredients: vec![Ingredient {
            name: "flour".to_string(),
            quantity: Some(Decimal::new(250, 0)),
            unit: Some("g".to_string()),
        }],
        steps: vec![
            Step {
                step_order: 1,
                instruction: "Mix".to_string(),
            },
            Step {
                step_order: 2,
                instruction: "Bake".to_string(),
            },
        ],
        categories: Vec::new(),
        nutrition: Some(NutritionFacts {
            calories: Some(Decimal::new(420, 0)),
            protein_grams: None,
            carbohydrate_grams: None,
            fat_grams: None,
        }),
        ratings: Vec::new(),
        average_rating: Default::default(),
        created_at: base_time(),
        updated_at: base_time(),
    }
}

/// `count` recipes titled "Recipe 1", "Recipe 2", ...
pub fn recipes(owner: &Profile, count: usize) -> Vec<Recipe> {
    (1..=count)
        .map(|n| recipe(owner, &format!("Recipe {n}")))
        .collect()
}

pub fn recipe_details(title: &str) -> RecipeDetails {
    RecipeDetails {
        title: title.to_string(),
        description: None,
        prep_time_minutes: Some(5),
        cook_time_minutes: None,
        servings: Some(1),
        ingredients: Vec::new(),
        steps: vec![Step {
            step_order: 1,
            instruction: "Serve".to_string(),
        }],
        category_ids: Vec::new(),
        nutrition: None,
    }
}

pub fn comment(recipe: &Recipe, author: &Profile, body: &str) -> Comment {
    Comment {
        id: CommentId(Uuid::new_v4()),
        recipe_id: recipe.id,
        author: author.summary(),
        body: body.to_string(),
        created_at: base_time(),
        deleted_at: None,
    }
}
