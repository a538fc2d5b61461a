pub mod config;
pub mod document;
pub mod lifecycle;
pub mod models;
pub mod render;

pub use config::constants;
