pub mod body_store;
pub mod config;
pub mod content_cache;
pub mod error;
pub mod handlers;
pub mod listing_cache;
pub mod metadata_store;
pub mod models;
pub mod progress;
pub mod sanitize;
pub mod server;
pub mod services;
pub mod upstream;
