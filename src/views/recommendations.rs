use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::{
    api::MovieBackend,
    error::ClientResult,
    models::{Movie, RecommendationKind},
    query::{QueryClient, QueryKey, QueryState, QuerySubscription},
    views::{freshness_line, render_movie_list, View},
};

pub const RECOMMENDATIONS_ERROR: &str = "Error loading recommendations. Please try again later.";
pub const NO_RECOMMENDATIONS: &str = "Start rating movies to get personalized recommendations!";
pub const NO_POPULAR: &str = "No popular movies available at the moment.";

/// Tabbed recommendations for one user
pub struct RecommendationsView {
    backend: Arc<dyn MovieBackend>,
    queries: QueryClient,
    user_id: u64,
    limit: u32,
    tab: RecommendationKind,
    subscription: Option<QuerySubscription>,
}

impl RecommendationsView {
    pub fn new(
        backend: Arc<dyn MovieBackend>,
        queries: QueryClient,
        user_id: u64,
        limit: u32,
    ) -> Self {
        Self {
            backend,
            queries,
            user_id,
            limit,
            tab: RecommendationKind::Hybrid,
            subscription: None,
        }
    }

    pub fn tab(&self) -> RecommendationKind {
        self.tab
    }

    pub fn set_tab(&mut self, tab: RecommendationKind) {
        self.tab = tab;
    }

    pub fn query_key(&self) -> QueryKey {
        QueryKey::recommendations(self.tab, self.user_id, self.limit)
    }

    /// Current tab's state without waiting
    pub fn observe(&mut self) -> QueryState<Vec<Movie>> {
        let key = self.track();
        self.queries.observe(&key, self.fetcher())
    }

    pub async fn load(&mut self) -> QueryState<Vec<Movie>> {
        let key = self.track();
        self.queries.query(&key, self.fetcher()).await
    }

    pub async fn refresh(&mut self) -> QueryState<Vec<Movie>> {
        let key = self.track();
        self.queries.refetch(&key, self.fetcher()).await
    }

    pub fn render_state(&self, state: &QueryState<Vec<Movie>>) -> String {
        let tabs = RecommendationKind::ALL
            .iter()
            .map(|kind| {
                if *kind == self.tab {
                    format!("[{}]", kind.label())
                } else {
                    kind.label().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" | ");

        let mut lines = vec![
            "Recommendations".to_string(),
            tabs,
            self.tab.description().to_string(),
            String::new(),
        ];

        match (&state.data, &state.error) {
            (None, Some(_)) => lines.push(RECOMMENDATIONS_ERROR.to_string()),
            (None, None) => lines.push("Loading...".to_string()),
            (Some(movies), _) => {
                lines.extend(freshness_line(state));

                if movies.is_empty() {
                    lines.push(self.empty_message().to_string());
                } else {
                    lines.push(render_movie_list(movies));
                }
            }
        }

        lines.join("\n")
    }

    fn empty_message(&self) -> &'static str {
        if self.tab.is_personalized() {
            NO_RECOMMENDATIONS
        } else {
            NO_POPULAR
        }
    }

    fn track(&mut self) -> QueryKey {
        let key = self.query_key();
        if self.subscription.as_ref().map(|s| s.key()) != Some(&key) {
            self.subscription = Some(self.queries.subscribe(&key));
        }
        key
    }

    fn fetcher(
        &self,
    ) -> impl FnOnce() -> BoxFuture<'static, ClientResult<Vec<Movie>>> + Send + 'static {
        let backend = Arc::clone(&self.backend);
        let (kind, user_id, limit) = (self.tab, self.user_id, self.limit);

        move || async move { backend.recommendations(kind, user_id, limit).await }.boxed()
    }
}

#[async_trait::async_trait]
impl View for RecommendationsView {
    fn title(&self) -> String {
        format!("Recommendations ({})", self.tab.label())
    }

    async fn render(&mut self) -> String {
        let state = self.load().await;
        self.render_state(&state)
    }
}
