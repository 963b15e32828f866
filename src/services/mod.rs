// Services - orchestration above the fact store

pub mod feed_service;
pub mod projection_builder;
pub mod user_service;

pub use feed_service::FeedService;
pub use projection_builder::ProjectionBuilder;
pub use user_service::UserService;
