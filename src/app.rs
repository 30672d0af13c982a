/// Composition root and interactive shell
///
/// Builds the backend client, the shared query cache and its garbage collector, then drives
/// the four screens from line-oriented commands.
use std::{str::FromStr, sync::Arc};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    api::{HttpMovieClient, MovieBackend},
    config::Config,
    error::{ClientError, ClientResult},
    models::RecommendationKind,
    query::{GarbageCollectorHandle, QueryClient},
    views::{HomeView, MovieDetailsView, MoviesView, RecommendationsView, View},
};

const HELP: &str = "\
Commands:
  home                 landing screen
  movies               browse the catalogue
  search <text>        search movies by title (empty clears the search)
  page <n> | next | prev
  open <id>            movie details and similar movies
  rate <stars>         rate the open movie, 0.5 to 5 stars in half steps
  watch [seconds]      mark the open movie as watched
  recs [tab]           recommendations: hybrid, collaborative, content, popular
  refresh              re-fetch what is on screen
  help                 this list
  quit";

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Home,
    Movies,
    Search(String),
    Page(u32),
    Next,
    Prev,
    Open(u64),
    Rate(f64),
    Watch(Option<u64>),
    Recommendations(Option<RecommendationKind>),
    Refresh,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> ClientResult<Self> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "home" => Command::Home,
            "movies" => Command::Movies,
            "search" => Command::Search(arg.to_string()),
            "page" => Command::Page(parse_arg(arg, "page number")?),
            "next" => Command::Next,
            "prev" => Command::Prev,
            "open" => Command::Open(parse_arg(arg, "movie id")?),
            "rate" => Command::Rate(parse_arg(arg, "star rating")?),
            "watch" if arg.is_empty() => Command::Watch(None),
            "watch" => Command::Watch(Some(parse_arg(arg, "watch time in seconds")?)),
            "recs" | "recommendations" if arg.is_empty() => Command::Recommendations(None),
            "recs" | "recommendations" => Command::Recommendations(Some(
                RecommendationKind::from_str(arg).map_err(ClientError::InvalidInput)?,
            )),
            "refresh" => Command::Refresh,
            "quit" | "exit" => Command::Quit,
            "" => return Err(ClientError::InvalidInput("empty command".to_string())),
            other => {
                return Err(ClientError::InvalidInput(format!(
                    "unknown command `{}`; type `help`",
                    other
                )))
            }
        };

        Ok(command)
    }
}

fn parse_arg<T: FromStr>(arg: &str, what: &str) -> ClientResult<T> {
    arg.parse()
        .map_err(|_| ClientError::InvalidInput(format!("expected a {}, got `{}`", what, arg)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Home,
    Movies,
    Details,
    Recommendations,
}

pub struct App {
    config: Config,
    backend: Arc<dyn MovieBackend>,
    queries: QueryClient,
    gc: Option<GarbageCollectorHandle>,
    screen: Screen,
    home: HomeView,
    movies: MoviesView,
    details: Option<MovieDetailsView>,
    recommendations: RecommendationsView,
}

impl App {
    /// Wires the HTTP backend from configuration
    pub fn from_config(config: Config) -> ClientResult<Self> {
        let backend: Arc<dyn MovieBackend> = Arc::new(HttpMovieClient::from_config(&config)?);
        Ok(Self::new(config, backend))
    }

    /// Builds the shared cache and views around `backend`; must run inside a tokio runtime
    pub fn new(config: Config, backend: Arc<dyn MovieBackend>) -> Self {
        let queries = QueryClient::new(config.query_config());
        let gc = queries.start_garbage_collector(config.gc_interval());

        let movies = MoviesView::new(
            Arc::clone(&backend),
            queries.clone(),
            config.search_debounce(),
        );
        let recommendations = RecommendationsView::new(
            Arc::clone(&backend),
            queries.clone(),
            config.user_id,
            config.recommendation_limit,
        );

        tracing::info!(
            backend = backend.name(),
            api_base_url = %config.api_base_url,
            user_id = config.user_id,
            "App initialized"
        );

        Self {
            config,
            backend,
            queries,
            gc: Some(gc),
            screen: Screen::Home,
            home: HomeView,
            movies,
            details: None,
            recommendations,
        }
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// Executes one command and returns the text to show
    pub async fn handle(&mut self, command: Command) -> String {
        match self.apply(command).await {
            Ok(Some(notice)) => format!("{}\n\n{}", notice, self.render().await),
            Ok(None) => self.render().await,
            Err(e) => {
                tracing::warn!(error = %e, "Command failed");
                format!("Error: {}", e)
            }
        }
    }

    /// Updates local state; returns an optional notice shown above the screen
    async fn apply(&mut self, command: Command) -> ClientResult<Option<String>> {
        match command {
            Command::Help => return Ok(Some(HELP.to_string())),
            Command::Home => self.screen = Screen::Home,
            Command::Movies => self.screen = Screen::Movies,
            Command::Search(text) => {
                self.movies.set_search(text);
                self.screen = Screen::Movies;
            }
            Command::Page(page) => {
                self.movies.set_page(page);
                self.screen = Screen::Movies;
            }
            Command::Next => {
                self.movies.next_page();
                self.screen = Screen::Movies;
            }
            Command::Prev => {
                self.movies.prev_page();
                self.screen = Screen::Movies;
            }
            Command::Open(id) => {
                if id == 0 {
                    return Err(ClientError::InvalidInput(
                        "movie id must be positive".to_string(),
                    ));
                }
                if self.details.as_ref().map(|d| d.movie_id()) != Some(id) {
                    self.details = Some(MovieDetailsView::new(
                        Arc::clone(&self.backend),
                        self.queries.clone(),
                        id,
                        self.config.user_id,
                        self.config.similar_limit,
                    ));
                }
                self.screen = Screen::Details;
            }
            Command::Rate(stars) => {
                let details = self.open_details()?;
                details.set_rating_draft(stars)?;
                let ack = details.submit_rating().await?;
                return Ok(Some(
                    ack.message()
                        .map(|m| format!("Rating saved: {}", m))
                        .unwrap_or_else(|| "Rating saved".to_string()),
                ));
            }
            Command::Watch(watch_time) => {
                let details = self.open_details()?;
                details.mark_watched(watch_time).await?;
                return Ok(Some("Marked as watched".to_string()));
            }
            Command::Recommendations(tab) => {
                if let Some(tab) = tab {
                    self.recommendations.set_tab(tab);
                }
                self.screen = Screen::Recommendations;
            }
            Command::Refresh => self.refresh().await,
            Command::Quit => {}
        }

        Ok(None)
    }

    fn open_details(&mut self) -> ClientResult<&mut MovieDetailsView> {
        match (self.screen, self.details.as_mut()) {
            (Screen::Details, Some(details)) => Ok(details),
            _ => Err(ClientError::InvalidInput(
                "open a movie first with `open <id>`".to_string(),
            )),
        }
    }

    async fn refresh(&mut self) {
        match self.screen {
            Screen::Home => {}
            Screen::Movies => {
                self.movies.refresh().await;
            }
            Screen::Details => {
                if let Some(details) = &self.details {
                    details.refresh().await;
                }
            }
            Screen::Recommendations => {
                self.recommendations.refresh().await;
            }
        }
    }

    /// Renders the current screen
    pub async fn render(&mut self) -> String {
        let view: &mut dyn View = match (self.screen, self.details.as_mut()) {
            (Screen::Home, _) => &mut self.home,
            (Screen::Movies, _) => &mut self.movies,
            (Screen::Details, Some(details)) => details,
            (Screen::Details, None) => &mut self.home,
            (Screen::Recommendations, _) => &mut self.recommendations,
        };

        let title = view.title();
        let body = view.render().await;
        format!("== {} ==\n{}", title, body)
    }

    /// Stops background work
    pub async fn shutdown(&mut self) {
        if let Some(gc) = self.gc.take() {
            gc.shutdown().await;
        }
        tracing::info!(stats = ?self.queries.stats(), "App shut down");
    }

    /// Reads commands from stdin until `quit` or end of input
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let welcome = self.render().await;
        stdout.write_all(format!("{}\n> ", welcome).as_bytes()).await?;
        stdout.flush().await?;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                stdout.write_all(b"> ").await?;
                stdout.flush().await?;
                continue;
            }

            let output = match Command::parse(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => self.handle(command).await,
                Err(e) => format!("Error: {}", e),
            };

            stdout.write_all(format!("{}\n> ", output).as_bytes()).await?;
            stdout.flush().await?;
        }

        self.shutdown().await;
        Ok(())
    }
}
