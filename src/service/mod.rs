pub use app_error::{AppError, AppResult};
pub use client::Client;
pub use config::{NetworkConfig, ServerConfig, DEFAULT_MAX_FRAME_WORDS, DEFAULT_PORT};
pub use handler::{AnnounceHandler, ServerHandler, SERVER_ID};
pub use server::{Registry, Server, BASE_CONNECTION_ID};
pub use tracing_config::{setup_local_tracing, setup_tracing};

mod app_error;
mod client;
mod config;
mod handler;
mod server;
mod tracing_config;
