pub mod app;
pub mod favorites;
pub mod models;
pub mod query;
pub mod search;
pub mod tmdb;
