use std::fmt::Display;

use crate::models::RecommendationKind;

/// Identity of a cached query: the logical operation plus its parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// One page of the catalogue for a (debounced) search term
    Movies { search: String, page: u32 },
    Movie(u64),
    Similar { movie_id: u64, limit: u32 },
    Recommendations {
        kind: RecommendationKind,
        user_id: u64,
        limit: u32,
    },
}

/// Logical operation a key belongs to, used for prefix invalidation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryFamily {
    Movies,
    Movie,
    Similar,
    Recommendations,
}

impl QueryKey {
    pub fn movies(search: impl Into<String>, page: u32) -> Self {
        QueryKey::Movies {
            search: search.into(),
            page,
        }
    }

    /// Popular recommendations are shared by every user, so the user id is normalised away
    pub fn recommendations(kind: RecommendationKind, user_id: u64, limit: u32) -> Self {
        let user_id = if kind.is_personalized() { user_id } else { 0 };
        QueryKey::Recommendations {
            kind,
            user_id,
            limit,
        }
    }

    pub fn family(&self) -> QueryFamily {
        match self {
            QueryKey::Movies { .. } => QueryFamily::Movies,
            QueryKey::Movie(_) => QueryFamily::Movie,
            QueryKey::Similar { .. } => QueryFamily::Similar,
            QueryKey::Recommendations { .. } => QueryFamily::Recommendations,
        }
    }
}

impl Display for QueryFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueryFamily::Movies => "movies",
            QueryFamily::Movie => "movie",
            QueryFamily::Similar => "similar",
            QueryFamily::Recommendations => "recommendations",
        };
        write!(f, "{}", name)
    }
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKey::Movies { search, page } => write!(f, "movies:{}:{}", page, search),
            QueryKey::Movie(id) => write!(f, "movie:{}", id),
            QueryKey::Similar { movie_id, limit } => write!(f, "similar:{}:{}", movie_id, limit),
            QueryKey::Recommendations {
                kind,
                user_id,
                limit,
            } => write!(f, "recommendations:{}:{}:{}", kind, user_id, limit),
        }
    }
}

/// Selects the cache entries an invalidation applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    All,
    Family(QueryFamily),
    Key(QueryKey),
    /// Every recommendation list shown to `user_id`, including the shared popular list
    Recommendations { user_id: u64 },
}

impl QueryFilter {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            QueryFilter::All => true,
            QueryFilter::Family(family) => key.family() == *family,
            QueryFilter::Key(expected) => key == expected,
            QueryFilter::Recommendations { user_id } => matches!(
                key,
                QueryKey::Recommendations { kind, user_id: owner, .. }
                    if owner == user_id || !kind.is_personalized()
            ),
        }
    }
}
