pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod node_client;
pub mod repository;
pub mod routes;
pub mod shutdown;
pub mod signature;
pub mod state;

pub use config::Config;
pub use state::AppState;
