// src/config/mod.rs
pub mod app;
pub mod filters;

pub use app::AppConfig;
