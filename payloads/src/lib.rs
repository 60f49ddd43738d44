pub mod api_client;
pub mod requests;
pub mod responses;

pub use api_client::{APIClient, ClientError, RecipeApi};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
pub struct RecipeId(pub Uuid);

/// Internal profile id, used for ownership checks and user-scoped queries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
pub struct ProfileId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
pub struct CommentId(pub Uuid);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
pub struct CategoryId(pub Uuid);

/// Identity issued by the external identity provider. A profile is created
/// for it the first time the backend sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub struct ExternalUid(pub String);

/// A single rating value, 1 through 5.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
pub struct RatingValue(pub u8);

impl RatingValue {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Option<Self> {
        requests::validate_rating(value).then_some(Self(value))
    }
}
