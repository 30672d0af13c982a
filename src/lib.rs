//! Terminal client for a movie recommendation backend
//!
//! Browses the catalogue, shows movie details with similar titles, records ratings, and
//! presents personalized recommendations. Backend responses go through a stale-while-revalidate
//! query cache shared by every screen.

pub mod api;
pub mod app;
pub mod config;
pub mod debounce;
pub mod error;
pub mod models;
pub mod query;
pub mod views;

pub use app::{App, Command};
pub use config::Config;
pub use error::{ClientError, ClientResult};
