use crate::views::View;

/// Landing screen
#[derive(Debug, Default)]
pub struct HomeView;

#[async_trait::async_trait]
impl View for HomeView {
    fn title(&self) -> String {
        "Home".to_string()
    }

    async fn render(&mut self) -> String {
        [
            "Welcome to Movie Recommendations",
            "",
            "Discover new movies based on your preferences and viewing history.",
            "",
            "  movies          browse the catalogue",
            "  recs            your recommendations",
            "  help            list every command",
        ]
        .join("\n")
    }
}
