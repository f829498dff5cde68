//! Publishing domain - models and Postgres queries

pub mod content;
pub mod credentials;
pub mod models;
pub mod oauth_states;

pub use models::*;
