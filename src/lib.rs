pub mod config;
pub mod error;
pub mod http;
pub mod document;
pub mod api;
pub mod analytics;
pub mod utils;
