pub mod actions;
mod app;
pub mod events;
mod requests;

pub use app::App;
