use payloads::{CommentId, ProfileId, RecipeId};
use std::fmt;

/// One segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeySegment {
    Str(String),
    Int(i64),
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for KeySegment {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<RecipeId> for KeySegment {
    fn from(value: RecipeId) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<ProfileId> for KeySegment {
    fn from(value: ProfileId) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<CommentId> for KeySegment {
    fn from(value: CommentId) -> Self {
        Self::Str(value.to_string())
    }
}

/// Ordered identifier for a unit of cached server data.
///
/// Keys are equal when their segments are equal. A shorter key names the
/// family of every key it prefixes: `["recipes"]` covers
/// `["recipes", id]` and `["recipes", "list", ...]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
    pub fn new(segments: Vec<KeySegment>) -> Self {
        Self(segments)
    }

    /// Append a segment, builder style.
    pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
        self.0.push(segment.into());
        self
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `prefix` equals this key or is a leading part of it. The
    /// empty key matches everything.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{segment}")?;
        }
        write!(f, "]")
    }
}

/// Build a [`QueryKey`] from anything convertible to [`KeySegment`]:
/// `query_key!["ratings", recipe_id, "user", profile_id]`.
#[macro_export]
macro_rules! query_key {
    ($($segment:expr),* $(,)?) => {
        $crate::cache::QueryKey::new(vec![
            $($crate::cache::KeySegment::from($segment)),*
        ])
    };
}
