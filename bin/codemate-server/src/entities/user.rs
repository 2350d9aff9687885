use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use codemate_core::{Preferences, SkillLevel, StoreError};
use uuid::Uuid;

use super::{SqliteStore, store_error};

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub password_hash: String,
}

/// The profile fields the service reads back. Creation and update times
/// and stored preferences stay in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub skill_level: SkillLevel,
}

/// Accounts and per-user profiles.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates an account with a fresh user id. Duplicate usernames are
    /// [`StoreError::Conflict`].
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, StoreError>;

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Returns the profile, creating a default one first when missing.
    async fn ensure_profile(&self, user_id: &str) -> Result<UserProfile, StoreError>;
}

fn profile_from_row((skill_level,): (String,)) -> UserProfile {
    UserProfile {
        // Unparsable levels fall back to the default.
        skill_level: SkillLevel::from_str(&skill_level).unwrap_or_default(),
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserRecord, StoreError> {
        let record = UserRecord {
            user_id: Uuid::new_v4().to_string(),
            username: username.to_owned(),
            password_hash: password_hash.to_owned(),
        };
        sqlx::query(
            "INSERT INTO users (user_id, username, password_hash, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.user_id)
        .bind(&record.username)
        .bind(&record.password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(record)
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT user_id, username, password_hash FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(row.map(|(user_id, username, password_hash)| UserRecord {
            user_id,
            username,
            password_hash,
        }))
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT skill_level FROM user_profiles WHERE user_id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(row.map(profile_from_row))
    }

    async fn ensure_profile(&self, user_id: &str) -> Result<UserProfile, StoreError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR IGNORE INTO user_profiles \
             (user_id, skill_level, preferences, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(user_id)
        .bind(SkillLevel::default().as_ref())
        .bind(serde_json::to_string(&Preferences::default())?)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        self.get_profile(user_id)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("profile for {user_id} vanished")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn duplicate_usernames_conflict() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let created = store.create_user("alice", "hash").await.unwrap();
        let found = store.find_user("alice").await.unwrap().unwrap();
        assert_eq!(found.user_id, created.user_id);
        assert!(store.find_user("bob").await.unwrap().is_none());

        let err = store.create_user("alice", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn profiles_are_created_once() {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        assert!(store.get_profile("u1").await.unwrap().is_none());
        let first = store.ensure_profile("u1").await.unwrap();
        assert_eq!(first.skill_level, SkillLevel::Intermediate);

        sqlx::query("UPDATE user_profiles SET skill_level = 'advanced' WHERE user_id = 'u1'")
            .execute(&store.pool)
            .await
            .unwrap();
        let second = store.ensure_profile("u1").await.unwrap();
        assert_eq!(second.skill_level, SkillLevel::Advanced);
    }
}
