use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Highest value on the backend's rating scale
pub const MAX_RATING: f64 = 10.0;

/// A movie as served by the backend
///
/// Read-only from the client's side: records are deserialized, checked, and rendered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: u64,
    pub title: String,
    /// Genre labels; order carries no meaning
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
    /// Poster URI or path
    #[serde(default)]
    pub poster_path: Option<String>,
    /// Average rating on the 0-10 scale
    #[serde(default)]
    pub vote_average: Option<f64>,
}

impl Movie {
    /// Rejects records that deserialized cleanly but break the movie invariants
    pub fn validate(&self) -> ClientResult<()> {
        if self.id == 0 {
            return Err(ClientError::Schema("movie id must be positive".to_string()));
        }

        if self.title.trim().is_empty() {
            return Err(ClientError::Schema(format!(
                "movie {} has an empty title",
                self.id
            )));
        }

        if let Some(rating) = self.vote_average {
            if !(0.0..=MAX_RATING).contains(&rating) {
                return Err(ClientError::Schema(format!(
                    "movie {} has vote_average {} outside 0-10",
                    self.id, rating
                )));
            }
        }

        Ok(())
    }

    /// Rating on the five-star display scale, rounded to the nearest half star
    pub fn stars(&self) -> f64 {
        let stars = self.vote_average.unwrap_or(0.0) / 2.0;
        (stars * 2.0).round() / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inception() -> Movie {
        Movie {
            id: 27205,
            title: "Inception".to_string(),
            genres: vec!["Action".to_string(), "Science Fiction".to_string()],
            year: Some(2010),
            description: Some("A thief who steals corporate secrets".to_string()),
            poster_path: Some("https://image.tmdb.org/t/p/w500/inception.jpg".to_string()),
            vote_average: Some(8.4),
        }
    }

    #[test]
    fn test_movie_deserialization_with_optional_fields_missing() {
        let json = r#"{
            "id": 603,
            "title": "The Matrix",
            "genres": ["Action"],
            "year": 1999
        }"#;

        let movie: Movie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.id, 603);
        assert_eq!(movie.title, "The Matrix");
        assert_eq!(movie.year, Some(1999));
        assert_eq!(movie.description, None);
        assert_eq!(movie.poster_path, None);
        assert_eq!(movie.vote_average, None);
    }

    #[test]
    fn test_movie_deserialization_with_nulls() {
        let json = r#"{
            "id": 603,
            "title": "The Matrix",
            "genres": [],
            "year": null,
            "description": null,
            "poster_path": null,
            "vote_average": 8.2
        }"#;

        let movie: Movie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.year, None);
        assert_eq!(movie.vote_average, Some(8.2));
    }

    #[test]
    fn test_missing_title_fails_to_deserialize() {
        let json = r#"{ "id": 603, "genres": [] }"#;
        assert!(serde_json::from_str::<Movie>(json).is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed_movie() {
        assert!(inception().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_rating_out_of_range() {
        let mut movie = inception();
        movie.vote_average = Some(11.5);
        assert!(matches!(movie.validate(), Err(ClientError::Schema(_))));
    }

    #[test]
    fn test_validate_rejects_blank_title_and_zero_id() {
        let mut movie = inception();
        movie.title = "  ".to_string();
        assert!(movie.validate().is_err());

        let mut movie = inception();
        movie.id = 0;
        assert!(movie.validate().is_err());
    }

    #[test]
    fn test_stars_rounds_to_half() {
        let movie = inception();
        assert_eq!(movie.stars(), 4.0);

        let mut unrated = inception();
        unrated.vote_average = None;
        assert_eq!(unrated.stars(), 0.0);
    }
}
