// User Service - profile and favorite-team updates on the externally owned user directory

use std::sync::Arc;
use tracing::info;

use crate::core::{User, UserId};
use crate::error::{FeedError, FeedResult};
use crate::infrastructure::database::UserDirectory;

const MAX_NAME_LEN: usize = 64;

#[derive(Clone)]
pub struct UserService {
    directory: Arc<dyn UserDirectory>,
}

impl UserService {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    pub async fn upsert_user(&self, id: &str, display_name: &str) -> FeedResult<User> {
        let id = UserId::new(id)?;
        let display_name = display_name.trim();
        validate_name("display_name", display_name)?;
        self.directory.upsert_user(&id, display_name).await
    }

    pub async fn set_favorite_team(&self, id: &str, team_id: &str) -> FeedResult<User> {
        let id = UserId::new(id)?;
        let team_id = team_id.trim();
        validate_name("team_id", team_id)?;
        let user = self.directory.set_favorite_team(&id, team_id).await?;
        info!("User {} favorite team set to {}", id, team_id);
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> FeedResult<User> {
        let id = UserId::new(id)?;
        self.directory
            .get_user(&id)
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("User {} not found", id)))
    }
}

fn validate_name(field: &str, value: &str) -> FeedResult<()> {
    if value.is_empty() {
        return Err(FeedError::Validation(format!("{} must not be empty", field)));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(FeedError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_NAME_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::sqlite_database::SqliteFactStore;

    async fn service() -> UserService {
        UserService::new(Arc::new(SqliteFactStore::new_in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn test_favorite_team_round() {
        let users = service().await;
        users.upsert_user("u1", "  Alice ").await.unwrap();

        let user = users.set_favorite_team("u1", "hawks").await.unwrap();
        assert_eq!(user.display_name, "Alice");
        assert_eq!(user.favorite_team.as_deref(), Some("hawks"));
        assert_eq!(users.get_user("u1").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_input_errors() {
        let users = service().await;
        let err = users.upsert_user("u1", "   ").await.unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));

        let err = users.set_favorite_team("not valid", "hawks").await.unwrap_err();
        assert!(matches!(err, FeedError::Validation(_)));

        let err = users.get_user("ghost").await.unwrap_err();
        assert!(matches!(err, FeedError::NotFound(_)));
    }
}
