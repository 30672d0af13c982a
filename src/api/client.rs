/// HTTP client for the recommendation backend
///
/// Endpoints (relative to the configured base URL):
/// - `GET  /movies/?page=&search=`            one page of movies
/// - `GET  /movies/{id}`                      a single movie
/// - `GET  /recommendations/similar/{id}`     similar movies
/// - `GET  /recommendations/{kind}/{user_id}` hybrid, collaborative, content
/// - `POST /interactions/`                    record a rating/watch event
///
/// Bodies are read as text and parsed here, so malformed payloads become
/// `ClientError::Schema` at this boundary instead of reaching the views.
use crate::{
    api::{
        request_id::{request_span, RequestId},
        MovieBackend,
    },
    config::Config,
    error::{ClientError, ClientResult},
    models::{InteractionAck, Movie, RecommendationKind, UserInteraction},
};
use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{instrument, Instrument};

const USER_AGENT: &str = concat!("reelsight/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct HttpMovieClient {
    http_client: HttpClient,
    base_url: String,
}

/// Query parameters for the movie list: `page` always, `search` only when non-empty
pub fn movies_query(page: u32, search: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("page", page.to_string())];

    if let Some(search) = search.filter(|s| !s.is_empty()) {
        params.push(("search", search.to_string()));
    }

    params
}

impl HttpMovieClient {
    /// Creates a client using the transport's default settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Creates a client from application configuration
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        let mut builder = HttpClient::builder().user_agent(USER_AGENT);

        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let http_client = builder
            .build()
            .map_err(|e| ClientError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issues a GET and parses the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> ClientResult<T> {
        let request_id = RequestId::new();
        let span = request_span("GET", path, &request_id);

        async {
            let mut request = self.http_client.get(self.url(path));
            if !query.is_empty() {
                request = request.query(query);
            }

            let response = request_id.attach(request).send().await?;
            let body = Self::success_body(response).await?;

            serde_json::from_str(&body).map_err(|e| {
                tracing::error!(error = %e, "Failed to parse backend response");
                ClientError::from(e)
            })
        }
        .instrument(span)
        .await
    }

    /// Returns the body of a 2xx response, or an `Http` error carrying the status
    async fn success_body(response: Response) -> ClientResult<String> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Backend returned failure status");

            let message = error_detail(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

            return Err(ClientError::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.text().await?)
    }

    async fn get_movie_list(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> ClientResult<Vec<Movie>> {
        let movies: Vec<Movie> = self.get_json(path, query).await?;
        for movie in &movies {
            movie.validate()?;
        }
        Ok(movies)
    }
}

/// FastAPI-style `{"detail": "..."}` error message, if present
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}

fn require_positive(name: &str, value: u64) -> ClientResult<()> {
    if value == 0 {
        return Err(ClientError::InvalidInput(format!(
            "{} must be positive",
            name
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl MovieBackend for HttpMovieClient {
    #[instrument(skip(self), fields(backend = "http"))]
    async fn list_movies(&self, page: u32, search: Option<String>) -> ClientResult<Vec<Movie>> {
        require_positive("page", page as u64)?;

        let query = movies_query(page, search.as_deref());
        let movies = self.get_movie_list("/movies/", &query).await?;

        tracing::info!(
            page = page,
            search = search.as_deref().unwrap_or(""),
            results = movies.len(),
            "Movie page fetched"
        );

        Ok(movies)
    }

    #[instrument(skip(self), fields(backend = "http"))]
    async fn get_movie(&self, id: u64) -> ClientResult<Movie> {
        require_positive("movie id", id)?;

        let movie: Movie = self.get_json(&format!("/movies/{}", id), &[]).await?;
        movie.validate()?;

        tracing::info!(movie_id = id, title = %movie.title, "Movie fetched");

        Ok(movie)
    }

    #[instrument(skip(self), fields(backend = "http"))]
    async fn similar_movies(&self, movie_id: u64, limit: u32) -> ClientResult<Vec<Movie>> {
        require_positive("movie id", movie_id)?;
        require_positive("limit", limit as u64)?;

        let path = format!("/recommendations/similar/{}", movie_id);
        let movies = self
            .get_movie_list(&path, &[("limit", limit.to_string())])
            .await?;

        tracing::info!(
            movie_id = movie_id,
            results = movies.len(),
            "Similar movies fetched"
        );

        Ok(movies)
    }

    #[instrument(skip(self), fields(backend = "http"))]
    async fn recommendations(
        &self,
        kind: RecommendationKind,
        user_id: u64,
        limit: u32,
    ) -> ClientResult<Vec<Movie>> {
        require_positive("limit", limit as u64)?;

        let movies = match kind.path_segment() {
            Some(segment) => {
                let path = format!("/recommendations/{}/{}", segment, user_id);
                self.get_movie_list(&path, &[("limit", limit.to_string())])
                    .await?
            }
            None => {
                // No popular endpoint: the first page of the catalogue is the popular list
                let mut movies = self
                    .get_movie_list("/movies/", &movies_query(1, None))
                    .await?;
                movies.truncate(limit as usize);
                movies
            }
        };

        tracing::info!(
            kind = %kind,
            user_id = user_id,
            results = movies.len(),
            "Recommendations fetched"
        );

        Ok(movies)
    }

    #[instrument(skip(self), fields(backend = "http"))]
    async fn record_interaction(
        &self,
        interaction: UserInteraction,
    ) -> ClientResult<InteractionAck> {
        interaction.validate()?;

        let path = "/interactions/";
        let request_id = RequestId::new();
        let span = request_span("POST", path, &request_id);

        async {
            let request = self.http_client.post(self.url(path)).json(&interaction);
            let response = request_id.attach(request).send().await?;
            let body = Self::success_body(response).await?;

            let ack = if body.trim().is_empty() {
                InteractionAck(serde_json::Value::Null)
            } else {
                serde_json::from_str(&body)?
            };

            tracing::info!(
                user_id = interaction.user_id,
                movie_id = interaction.movie_id,
                rating = ?interaction.rating,
                watched = interaction.watched,
                "Interaction recorded"
            );

            Ok::<_, ClientError>(ack)
        }
        .instrument(span)
        .await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
