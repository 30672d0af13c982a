pub mod interaction;
pub mod movie;
pub mod recommendation;

pub use interaction::{InteractionAck, UserInteraction};
pub use movie::{Movie, MAX_RATING};
pub use recommendation::RecommendationKind;
