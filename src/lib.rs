// Social Feed - posts, replies and likes with a denormalized projection kept consistent with its facts

// Core types - ids, facts, snapshot encoding
pub mod core;

// Infrastructure - fact store trait and its SQLite / PostgreSQL backends
pub mod infrastructure;

// Services - projection builder, feed orchestration, user directory
pub mod services;

// HTTP transport adapter
pub mod feed_interface;

// Application wiring
pub mod app_state;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{ErrorKind, FeedError, FeedResult};
