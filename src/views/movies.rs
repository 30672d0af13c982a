use std::{sync::Arc, time::Duration};

use futures::future::{BoxFuture, FutureExt};

use crate::{
    api::MovieBackend,
    debounce::Debouncer,
    error::ClientResult,
    models::Movie,
    query::{QueryClient, QueryKey, QueryState, QuerySubscription},
    views::{freshness_line, render_movie_list, View},
};

/// Page count shown by the pager; the backend does not report a real total
pub const PLACEHOLDER_PAGE_COUNT: u32 = 10;

pub const MOVIES_ERROR: &str = "Error loading movies. Please try again later.";

/// Searchable, paginated catalogue
pub struct MoviesView {
    backend: Arc<dyn MovieBackend>,
    queries: QueryClient,
    search: Debouncer<String>,
    page: u32,
    subscription: Option<QuerySubscription>,
}

impl MoviesView {
    pub fn new(backend: Arc<dyn MovieBackend>, queries: QueryClient, debounce: Duration) -> Self {
        Self {
            backend,
            queries,
            search: Debouncer::new(String::new(), debounce),
            page: 1,
            subscription: None,
        }
    }

    /// Updates the raw search text and goes back to the first page
    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search.set(text.into());
        self.page = 1;
    }

    pub fn search_text(&self) -> String {
        self.search.input()
    }

    pub fn debounced_search(&self) -> String {
        self.search.current()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn next_page(&mut self) {
        self.page = self.page.saturating_add(1);
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    /// Key for the current page and the debounced (not raw) search text
    pub fn query_key(&self) -> QueryKey {
        QueryKey::movies(self.search.current(), self.page)
    }

    /// Current state without waiting; starts a fetch if needed
    pub fn observe(&mut self) -> QueryState<Vec<Movie>> {
        let key = self.query_key();
        self.track(&key);
        self.queries.observe(&key, self.fetcher())
    }

    /// Waits for the search input to settle, then for the page's first result
    pub async fn load(&mut self) -> QueryState<Vec<Movie>> {
        self.search.settled().await;

        let key = self.query_key();
        self.track(&key);
        self.queries.query(&key, self.fetcher()).await
    }

    /// Re-fetches the current page, leaving an error state behind on success
    pub async fn refresh(&mut self) -> QueryState<Vec<Movie>> {
        let key = self.query_key();
        self.track(&key);
        self.queries.refetch(&key, self.fetcher()).await
    }

    pub fn render_state(&self, state: &QueryState<Vec<Movie>>) -> String {
        let search = self.search.current();
        let mut lines = vec![if search.is_empty() {
            "Movies".to_string()
        } else {
            format!("Movies matching \"{}\"", search)
        }];

        match (&state.data, &state.error) {
            (None, Some(_)) => {
                lines.push(MOVIES_ERROR.to_string());
                return lines.join("\n");
            }
            (None, None) => lines.push("Loading...".to_string()),
            (Some(movies), _) => {
                lines.extend(freshness_line(state));

                if movies.is_empty() {
                    lines.push("No movies found.".to_string());
                } else {
                    lines.push(render_movie_list(movies));
                }
            }
        }

        lines.push(format!(
            "Page {} of {}",
            self.page, PLACEHOLDER_PAGE_COUNT
        ));
        lines.join("\n")
    }

    /// Keeps one subscription on the key currently displayed
    fn track(&mut self, key: &QueryKey) {
        if self.subscription.as_ref().map(|s| s.key()) != Some(key) {
            self.subscription = Some(self.queries.subscribe(key));
        }
    }

    fn fetcher(
        &self,
    ) -> impl FnOnce() -> BoxFuture<'static, ClientResult<Vec<Movie>>> + Send + 'static {
        let backend = Arc::clone(&self.backend);
        let search = self.search.current();
        let page = self.page;

        move || {
            async move {
                let search = (!search.is_empty()).then_some(search);
                backend.list_movies(page, search).await
            }
            .boxed()
        }
    }
}

#[async_trait::async_trait]
impl View for MoviesView {
    fn title(&self) -> String {
        "Movies".to_string()
    }

    async fn render(&mut self) -> String {
        let state = self.load().await;
        self.render_state(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::MockMovieBackend, error::ClientError, views::test_support::movie,
    };
    use mockall::predicate::eq;

    const DEBOUNCE: Duration = Duration::from_millis(500);

    fn view_with(backend: MockMovieBackend) -> MoviesView {
        MoviesView::new(Arc::new(backend), QueryClient::default(), DEBOUNCE)
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_search_drives_query() {
        let mut backend = MockMovieBackend::new();
        backend
            .expect_list_movies()
            .with(eq(2), eq(Some("batman".to_string())))
            .times(1)
            .returning(|_, _| Ok(vec![movie(268, "Batman")]));

        let mut view = view_with(backend);
        for text in ["b", "bat", "batman"] {
            view.set_search(text);
        }
        view.set_page(2);
        assert_eq!(view.search_text(), "batman");
        assert_eq!(view.debounced_search(), "");

        let state = view.load().await;
        assert_eq!(view.query_key(), QueryKey::movies("batman", 2));
        assert_eq!(state.data.map(|m| m.len()), Some(1));
    }

    #[tokio::test]
    async fn test_search_change_resets_page() {
        let mut view = view_with(MockMovieBackend::new());
        view.set_page(4);
        view.set_search("alien");
        assert_eq!(view.page(), 1);
    }

    #[tokio::test]
    async fn test_page_never_drops_below_one() {
        let mut view = view_with(MockMovieBackend::new());
        view.prev_page();
        assert_eq!(view.page(), 1);
        view.set_page(0);
        assert_eq!(view.page(), 1);
        view.next_page();
        view.next_page();
        assert_eq!(view.page(), 3);
    }

    #[tokio::test]
    async fn test_empty_search_is_not_sent() {
        let mut backend = MockMovieBackend::new();
        backend
            .expect_list_movies()
            .with(eq(1), eq(None))
            .times(1)
            .returning(|_, _| Ok(vec![movie(1, "Alien")]));

        let mut view = view_with(backend);
        let text = view.render().await;
        assert!(text.contains("Alien"));
        assert!(text.contains("(updated "));
        assert!(text.contains("Page 1 of 10"));
    }

    #[tokio::test]
    async fn test_error_renders_inline() {
        let mut backend = MockMovieBackend::new();
        backend
            .expect_list_movies()
            .times(1)
            .returning(|_, _| Err(ClientError::Network("connection refused".to_string())));

        let mut view = view_with(backend);
        let text = view.render().await;
        assert!(text.contains(MOVIES_ERROR));
    }

    #[tokio::test]
    async fn test_revisiting_page_uses_cache() {
        let mut backend = MockMovieBackend::new();
        backend
            .expect_list_movies()
            .with(eq(1), eq(None))
            .times(1)
            .returning(|_, _| Ok(vec![movie(1, "Alien")]));
        backend
            .expect_list_movies()
            .with(eq(2), eq(None))
            .times(1)
            .returning(|_, _| Ok(vec![movie(2, "Aliens")]));

        let mut view = view_with(backend);
        view.render().await;
        view.next_page();
        let second = view.render().await;
        assert!(second.contains("Aliens"));
        view.prev_page();
        let first = view.render().await;
        assert!(first.contains("Alien"));
        assert!(first.contains("Page 1 of 10"));
    }
}
