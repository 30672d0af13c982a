/// Backend access
///
/// The recommendation backend is an external collaborator reachable only through a fixed set
/// of REST endpoints. Views and the query cache talk to it through the `MovieBackend` trait so
/// tests can substitute a mock for the HTTP implementation.
use crate::{
    error::ClientResult,
    models::{InteractionAck, Movie, RecommendationKind, UserInteraction},
};

pub mod client;
pub mod request_id;

pub use client::{movies_query, HttpMovieClient};

/// Default number of similar movies requested for a details page
pub const DEFAULT_SIMILAR_LIMIT: u32 = 6;

/// Default number of recommendations requested per tab
pub const DEFAULT_RECOMMENDATION_LIMIT: u32 = 10;

/// One operation per backend capability
///
/// Implementations never retry: a failure is reported once and the caller decides what to do.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MovieBackend: Send + Sync {
    /// Fetch one page (1-based) of movies, optionally filtered by a search substring
    async fn list_movies(&self, page: u32, search: Option<String>) -> ClientResult<Vec<Movie>>;

    /// Fetch a single movie; a 404 surfaces as `ClientError::Http { status: 404, .. }`
    async fn get_movie(&self, id: u64) -> ClientResult<Movie>;

    /// Movies similar to `movie_id`, in backend similarity order
    async fn similar_movies(&self, movie_id: u64, limit: u32) -> ClientResult<Vec<Movie>>;

    /// Ranked recommendations; `user_id` is ignored for `RecommendationKind::Popular`
    async fn recommendations(
        &self,
        kind: RecommendationKind,
        user_id: u64,
        limit: u32,
    ) -> ClientResult<Vec<Movie>>;

    /// Post a rating or watch event
    async fn record_interaction(&self, interaction: UserInteraction)
        -> ClientResult<InteractionAck>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
