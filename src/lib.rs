pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod cursor;
pub mod models;
pub mod slug;
pub mod storage;
