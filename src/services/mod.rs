pub mod auth;
pub mod error;
pub mod notify;
pub mod token_exchange;
