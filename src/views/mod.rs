/// Text views over cached query results
///
/// Each view owns only local state (search text, page, tab, rating draft), derives its query
/// keys from that state, and renders whatever the query cache currently holds. Errors render
/// inline; nothing here retries, ranks, or filters.
use crate::{models::Movie, query::QueryState};

pub mod details;
pub mod home;
pub mod movies;
pub mod recommendations;

pub use details::{DetailsSnapshot, MovieDetailsView};
pub use home::HomeView;
pub use movies::MoviesView;
pub use recommendations::RecommendationsView;

/// Shown in place of a missing poster
pub const DEFAULT_POSTER: &str = "/movie-placeholder.jpg";

/// Shown above cached data when the latest refresh failed
pub const REFRESH_FAILED: &str = "(showing earlier results; refreshing failed)";

const DESCRIPTION_PREVIEW_CHARS: usize = 140;

/// A screen that can refresh its queries and render itself
#[async_trait::async_trait]
pub trait View: Send {
    fn title(&self) -> String;

    /// Loads (or reuses) the view's queries and renders the result
    async fn render(&mut self) -> String;
}

/// Five-star display of a 0-5 star value in half steps
pub fn render_stars(stars: f64) -> String {
    let stars = stars.clamp(0.0, 5.0);
    let full = stars.floor() as usize;
    let half = stars - stars.floor() >= 0.5;
    let empty = 5 - full - usize::from(half);

    format!(
        "{}{}{}",
        "★".repeat(full),
        if half { "½" } else { "" },
        "☆".repeat(empty)
    )
}

/// Rating line, e.g. `★★★★☆ 8.4/10`; unrated movies show no number
pub fn render_rating(movie: &Movie) -> String {
    match movie.vote_average {
        Some(average) => format!("{} {:.1}/10", render_stars(movie.stars()), average),
        None => render_stars(0.0),
    }
}

/// Note for a region that has data: a failed refresh, one in progress, or the last update time
fn freshness_line<T>(state: &QueryState<T>) -> Option<String> {
    if state.error.is_some() {
        Some(REFRESH_FAILED.to_string())
    } else if state.is_refetching() {
        Some("(refreshing...)".to_string())
    } else {
        state
            .fetched_at
            .map(|at| format!("(updated {})", at.format("%H:%M:%S UTC")))
    }
}

fn title_with_year(movie: &Movie) -> String {
    match movie.year {
        Some(year) => format!("{} ({})", movie.title, year),
        None => movie.title.clone(),
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_PREVIEW_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Compact multi-line card used by every list
pub fn render_movie_card(movie: &Movie) -> String {
    let mut card = format!(
        "#{:<8} {}\n          {}",
        movie.id,
        title_with_year(movie),
        render_rating(movie)
    );

    if !movie.genres.is_empty() {
        card.push_str(&format!("  [{}]", movie.genres.join(", ")));
    }

    if let Some(description) = movie.description.as_deref().filter(|d| !d.trim().is_empty()) {
        card.push_str(&format!("\n          {}", preview(description)));
    }

    card
}

pub fn render_movie_list(movies: &[Movie]) -> String {
    movies
        .iter()
        .map(render_movie_card)
        .collect::<Vec<_>>()
        .join("\n")
}
