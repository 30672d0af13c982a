use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Recommendation strategy offered by the backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Hybrid,
    Collaborative,
    ContentBased,
    Popular,
}

impl RecommendationKind {
    /// Tab order in the recommendations view
    pub const ALL: [RecommendationKind; 4] = [
        RecommendationKind::Hybrid,
        RecommendationKind::Collaborative,
        RecommendationKind::ContentBased,
        RecommendationKind::Popular,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RecommendationKind::Hybrid => "Hybrid",
            RecommendationKind::Collaborative => "Collaborative",
            RecommendationKind::ContentBased => "Content-Based",
            RecommendationKind::Popular => "Popular",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RecommendationKind::Hybrid => {
                "Combines collaborative and content-based approaches for the best recommendations"
            }
            RecommendationKind::Collaborative => {
                "Recommendations based on ratings from users with similar taste"
            }
            RecommendationKind::ContentBased => {
                "Recommendations based on movie features like genres, ratings, and release year"
            }
            RecommendationKind::Popular => "Currently trending and popular movies",
        }
    }

    /// Path segment under `/recommendations/`; `None` for popular, which has no endpoint
    pub fn path_segment(&self) -> Option<&'static str> {
        match self {
            RecommendationKind::Hybrid => Some("hybrid"),
            RecommendationKind::Collaborative => Some("collaborative"),
            RecommendationKind::ContentBased => Some("content"),
            RecommendationKind::Popular => None,
        }
    }

    pub fn is_personalized(&self) -> bool {
        self.path_segment().is_some()
    }
}

impl Display for RecommendationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecommendationKind::Hybrid => "hybrid",
            RecommendationKind::Collaborative => "collaborative",
            RecommendationKind::ContentBased => "content",
            RecommendationKind::Popular => "popular",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RecommendationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hybrid" => Ok(RecommendationKind::Hybrid),
            "collaborative" | "collab" => Ok(RecommendationKind::Collaborative),
            "content" | "content-based" | "content_based" => Ok(RecommendationKind::ContentBased),
            "popular" => Ok(RecommendationKind::Popular),
            other => Err(format!("unknown recommendation tab: {}", other)),
        }
    }
}
