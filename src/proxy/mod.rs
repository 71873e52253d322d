pub mod cache;
pub mod classifier;
pub mod common;
pub mod handlers;
pub mod health;
pub mod mappers;
pub mod middleware;
pub mod monitor;
pub mod queue;
pub mod routes;
pub mod server;
pub mod session_manager;
pub mod state;
pub mod upstream;

pub use server::{AxumServer, AxumStartConfig};
pub use state::AppState;

#[cfg(test)]
pub mod tests;
