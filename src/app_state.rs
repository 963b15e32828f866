use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::database::{open_store, StoreHandle},
    services::{FeedService, UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub feed: Arc<FeedService>,
    pub users: Arc<UserService>,
    pub store: StoreHandle,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize the store client; it is injected, never global
        let store = open_store(&config.database).await?;
        Ok(Self::from_store(store, config))
    }

    pub fn from_store(store: StoreHandle, config: Config) -> Self {
        Self {
            feed: Arc::new(FeedService::new(store.facts.clone(), config.feed.clone())),
            users: Arc::new(UserService::new(store.users.clone())),
            store,
            config,
        }
    }

    pub async fn shutdown(&self) {
        self.store.close().await;
    }
}
