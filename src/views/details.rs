use std::sync::Arc;

use crate::{
    api::MovieBackend,
    error::{ClientError, ClientResult},
    models::{InteractionAck, Movie, UserInteraction},
    query::{QueryClient, QueryFilter, QueryKey, QueryState, QuerySubscription},
    views::{
        freshness_line, render_movie_list, render_rating, render_stars, title_with_year, View,
        DEFAULT_POSTER,
    },
};

pub const DETAILS_ERROR: &str = "Error loading movie details. Please try again later.";
pub const SIMILAR_ERROR: &str = "Error loading similar movies.";

/// Both regions of the details screen; they load concurrently and fail independently
#[derive(Debug, Clone)]
pub struct DetailsSnapshot {
    pub movie: QueryState<Movie>,
    pub similar: QueryState<Vec<Movie>>,
}

/// One movie with its similar titles and the user's rating controls
pub struct MovieDetailsView {
    backend: Arc<dyn MovieBackend>,
    queries: QueryClient,
    movie_id: u64,
    user_id: u64,
    similar_limit: u32,
    /// Draft rating in stars (0.5-5.0, half steps), not yet submitted
    rating_draft: Option<f64>,
    last_submitted: Option<f64>,
    _subscriptions: [QuerySubscription; 2],
}

impl MovieDetailsView {
    pub fn new(
        backend: Arc<dyn MovieBackend>,
        queries: QueryClient,
        movie_id: u64,
        user_id: u64,
        similar_limit: u32,
    ) -> Self {
        let subscriptions = [
            queries.subscribe(&QueryKey::Movie(movie_id)),
            queries.subscribe(&QueryKey::Similar {
                movie_id,
                limit: similar_limit,
            }),
        ];

        Self {
            backend,
            queries,
            movie_id,
            user_id,
            similar_limit,
            rating_draft: None,
            last_submitted: None,
            _subscriptions: subscriptions,
        }
    }

    pub fn movie_id(&self) -> u64 {
        self.movie_id
    }

    pub fn movie_key(&self) -> QueryKey {
        QueryKey::Movie(self.movie_id)
    }

    pub fn similar_key(&self) -> QueryKey {
        QueryKey::Similar {
            movie_id: self.movie_id,
            limit: self.similar_limit,
        }
    }

    /// Loads the movie and its similar titles concurrently
    pub async fn load(&self) -> DetailsSnapshot {
        let movie_key = self.movie_key();
        let similar_key = self.similar_key();

        let movie_fetch = {
            let backend = Arc::clone(&self.backend);
            let id = self.movie_id;
            move || async move { backend.get_movie(id).await }
        };
        let similar_fetch = {
            let backend = Arc::clone(&self.backend);
            let (id, limit) = (self.movie_id, self.similar_limit);
            move || async move { backend.similar_movies(id, limit).await }
        };

        let (movie, similar) = tokio::join!(
            self.queries.query(&movie_key, movie_fetch),
            self.queries.query(&similar_key, similar_fetch)
        );

        DetailsSnapshot { movie, similar }
    }

    /// Explicitly re-fetches both regions, clearing any error state on success
    pub async fn refresh(&self) -> DetailsSnapshot {
        let backend = Arc::clone(&self.backend);
        let id = self.movie_id;
        let movie_fetch = move || async move { backend.get_movie(id).await };

        let backend = Arc::clone(&self.backend);
        let limit = self.similar_limit;
        let similar_fetch = move || async move { backend.similar_movies(id, limit).await };

        let (movie_key, similar_key) = (self.movie_key(), self.similar_key());
        let (movie, similar) = tokio::join!(
            self.queries.refetch(&movie_key, movie_fetch),
            self.queries.refetch(&similar_key, similar_fetch)
        );

        DetailsSnapshot { movie, similar }
    }

    pub fn rating_draft(&self) -> Option<f64> {
        self.rating_draft
    }

    /// Sets the draft star rating; accepts 0.5 to 5 in half-star steps
    pub fn set_rating_draft(&mut self, stars: f64) -> ClientResult<()> {
        let doubled = stars * 2.0;
        if !(1.0..=10.0).contains(&doubled) || doubled.fract() != 0.0 {
            return Err(ClientError::InvalidInput(format!(
                "rating must be between 0.5 and 5 stars in half steps, got {}",
                stars
            )));
        }

        self.rating_draft = Some(stars);
        Ok(())
    }

    /// Posts the draft rating and invalidates the user's recommendations on success
    pub async fn submit_rating(&mut self) -> ClientResult<InteractionAck> {
        let stars = self
            .rating_draft
            .ok_or_else(|| ClientError::InvalidInput("no rating selected".to_string()))?;

        let interaction = UserInteraction::rating(self.user_id, self.movie_id, stars * 2.0);
        let ack = self.record(interaction).await?;

        self.last_submitted = Some(stars);
        self.rating_draft = None;
        Ok(ack)
    }

    /// Records a watch event without a rating
    pub async fn mark_watched(&self, watch_time: Option<u64>) -> ClientResult<InteractionAck> {
        let interaction = UserInteraction::watched(self.user_id, self.movie_id, watch_time);
        self.record(interaction).await
    }

    async fn record(&self, interaction: UserInteraction) -> ClientResult<InteractionAck> {
        let invalidates = [QueryFilter::Recommendations {
            user_id: self.user_id,
        }];

        self.queries
            .mutate(self.backend.record_interaction(interaction), &invalidates)
            .await
    }

    pub fn render_snapshot(&self, snapshot: &DetailsSnapshot) -> String {
        let mut lines = Vec::new();

        match (&snapshot.movie.data, &snapshot.movie.error) {
            (Some(movie), _) => {
                lines.extend(freshness_line(&snapshot.movie));
                lines.push(self.render_movie(movie));
            }
            (None, Some(err)) if err.is_not_found() => {
                lines.push(format!("Movie #{} was not found.", self.movie_id));
                lines.push(DETAILS_ERROR.to_string());
            }
            (None, Some(_)) => lines.push(DETAILS_ERROR.to_string()),
            (None, None) => lines.push("Loading...".to_string()),
        }

        lines.push(String::new());
        lines.push("Similar movies".to_string());
        match (&snapshot.similar.data, &snapshot.similar.error) {
            (Some(similar), _) => {
                if snapshot.similar.error.is_some() || snapshot.similar.is_refetching() {
                    lines.extend(freshness_line(&snapshot.similar));
                }
                if similar.is_empty() {
                    lines.push("No similar movies found.".to_string());
                } else {
                    lines.push(render_movie_list(similar));
                }
            }
            (None, Some(_)) => lines.push(SIMILAR_ERROR.to_string()),
            (None, None) => lines.push("Loading...".to_string()),
        }

        lines.join("\n")
    }

    fn render_movie(&self, movie: &Movie) -> String {
        let mut lines = vec![title_with_year(movie)];

        lines.push(render_rating(movie));
        if !movie.genres.is_empty() {
            lines.push(format!("Genres: {}", movie.genres.join(", ")));
        }

        lines.push(String::new());
        lines.push("Overview".to_string());
        lines.push(
            movie
                .description
                .clone()
                .unwrap_or_else(|| "No overview available.".to_string()),
        );

        lines.push(String::new());
        if let Some(year) = movie.year {
            lines.push(format!("Release Year: {}", year));
        }
        lines.push(format!(
            "Poster: {}",
            movie.poster_path.as_deref().unwrap_or(DEFAULT_POSTER)
        ));

        match (self.rating_draft, self.last_submitted) {
            (Some(draft), _) => lines.push(format!(
                "Your rating: {} (draft, not saved yet)",
                render_stars(draft)
            )),
            (None, Some(saved)) => lines.push(format!("Your rating: {}", render_stars(saved))),
            (None, None) => lines.push("Your rating: not rated".to_string()),
        }

        lines.join("\n")
    }
}

#[async_trait::async_trait]
impl View for MovieDetailsView {
    fn title(&self) -> String {
        format!("Movie #{}", self.movie_id)
    }

    async fn render(&mut self) -> String {
        let snapshot = self.load().await;
        self.render_snapshot(&snapshot)
    }
}
