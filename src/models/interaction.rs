use serde::{Deserialize, Serialize};

use crate::{
    error::{ClientError, ClientResult},
    models::movie::MAX_RATING,
};

/// A user's rating or watch event on a movie
///
/// Write-only: built by the client, posted once, never read back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInteraction {
    pub user_id: u64,
    pub movie_id: u64,
    /// Rating on the 0-10 scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub watched: bool,
    /// Watch duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_time: Option<u64>,
}

impl UserInteraction {
    pub fn rating(user_id: u64, movie_id: u64, rating: f64) -> Self {
        Self {
            user_id,
            movie_id,
            rating: Some(rating),
            watched: true,
            watch_time: None,
        }
    }

    pub fn watched(user_id: u64, movie_id: u64, watch_time: Option<u64>) -> Self {
        Self {
            user_id,
            movie_id,
            rating: None,
            watched: true,
            watch_time,
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.movie_id == 0 {
            return Err(ClientError::InvalidInput(
                "movie id must be positive".to_string(),
            ));
        }

        if let Some(rating) = self.rating {
            if !(0.0..=MAX_RATING).contains(&rating) {
                return Err(ClientError::InvalidInput(format!(
                    "rating {} is outside 0-10",
                    rating
                )));
            }
        }

        Ok(())
    }
}

/// Backend acknowledgement of a recorded interaction
///
/// The payload is opaque; only success or failure of the request matters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct InteractionAck(pub serde_json::Value);

impl InteractionAck {
    /// `message` field when the backend sends one
    pub fn message(&self) -> Option<&str> {
        self.0.get("message").and_then(|m| m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rating_serializes_without_absent_fields() {
        let interaction = UserInteraction::rating(1, 42, 8.0);
        let value = serde_json::to_value(&interaction).unwrap();
        assert_eq!(
            value,
            json!({ "user_id": 1, "movie_id": 42, "rating": 8.0, "watched": true })
        );
    }

    #[test]
    fn test_watched_carries_watch_time() {
        let interaction = UserInteraction::watched(3, 7, Some(5400));
        let value = serde_json::to_value(&interaction).unwrap();
        assert_eq!(
            value,
            json!({ "user_id": 3, "movie_id": 7, "watched": true, "watch_time": 5400 })
        );
    }

    #[test]
    fn test_validate_rejects_out_of_range_rating() {
        let interaction = UserInteraction::rating(1, 42, 10.5);
        assert!(matches!(
            interaction.validate(),
            Err(ClientError::InvalidInput(_))
        ));
        assert!(UserInteraction::rating(1, 42, 0.0).validate().is_ok());
        assert!(UserInteraction::rating(1, 42, 10.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_movie_id() {
        assert!(UserInteraction::watched(1, 0, None).validate().is_err());
    }

    #[test]
    fn test_ack_message() {
        let ack = InteractionAck(json!({ "status": "success", "message": "Interaction recorded" }));
        assert_eq!(ack.message(), Some("Interaction recorded"));
        assert_eq!(InteractionAck(json!("ok")).message(), None);
    }
}
