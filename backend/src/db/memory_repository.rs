use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Database, RepositoryError};
use crate::auth::models::User;
use crate::registry::models::ModelRecord;

/// In-memory registry backend for local development (`DATABASE_BACKEND=memory`)
/// and the integration tests. Same contract as the DynamoDB repository,
/// including slug uniqueness and an atomic usage increment (the write lock
/// spans the whole update).
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<HashMap<Uuid, User>>,
    models: RwLock<HashMap<String, ModelRecord>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryRepository {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        self.users.write().await.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn get_user_by_google_sub(&self, sub: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.google_sub == sub)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(RepositoryError::NotFound);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn create_model(&self, model: &ModelRecord) -> Result<(), RepositoryError> {
        let mut models = self.models.write().await;
        if models.contains_key(&model.slug) {
            return Err(RepositoryError::Conflict(format!(
                "slug already exists: {}",
                model.slug
            )));
        }
        models.insert(model.slug.clone(), model.clone());
        Ok(())
    }

    async fn get_model_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ModelRecord>, RepositoryError> {
        Ok(self.models.read().await.get(slug).cloned())
    }

    async fn list_public_models(&self) -> Result<Vec<ModelRecord>, RepositoryError> {
        Ok(self
            .models
            .read()
            .await
            .values()
            .filter(|m| m.is_public)
            .cloned()
            .collect())
    }

    async fn list_models_by_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ModelRecord>, RepositoryError> {
        Ok(self
            .models
            .read()
            .await
            .values()
            .filter(|m| m.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn increment_usage(&self, slug: &str) -> Result<(), RepositoryError> {
        let mut models = self.models.write().await;
        let model = models.get_mut(slug).ok_or(RepositoryError::NotFound)?;
        model.usage_count += 1;
        Ok(())
    }

    async fn set_visibility(&self, slug: &str, is_public: bool) -> Result<(), RepositoryError> {
        let mut models = self.models.write().await;
        let model = models.get_mut(slug).ok_or(RepositoryError::NotFound)?;
        model.is_public = is_public;
        model.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn delete_model(&self, slug: &str) -> Result<(), RepositoryError> {
        let mut models = self.models.write().await;
        models.remove(slug).ok_or(RepositoryError::NotFound)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::slug::{generate_api_key, generate_slug};
    use shared::{InputType, OutputType};

    fn record(owner: Uuid, name: &str) -> ModelRecord {
        ModelRecord::new(
            owner,
            name.to_string(),
            "a test model".to_string(),
            generate_slug(name),
            generate_api_key(),
            format!("models/{}/abc.h5", owner),
            None,
            InputType::Numeric,
            OutputType::Regression,
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn create_get_delete_roundtrip() {
        let repo = MemoryRepository::new();
        let model = record(Uuid::new_v4(), "house price");
        repo.create_model(&model).await.unwrap();

        let fetched = repo.get_model_by_slug(&model.slug).await.unwrap().unwrap();
        assert_eq!(fetched.id, model.id);
        assert_eq!(fetched.usage_count, 0);

        repo.delete_model(&model.slug).await.unwrap();
        assert!(repo.get_model_by_slug(&model.slug).await.unwrap().is_none());
        assert!(matches!(
            repo.delete_model(&model.slug).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_conflict() {
        let repo = MemoryRepository::new();
        let model = record(Uuid::new_v4(), "dup");
        repo.create_model(&model).await.unwrap();
        assert!(matches!(
            repo.create_model(&model).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn usage_increments_by_one() {
        let repo = MemoryRepository::new();
        let model = record(Uuid::new_v4(), "counter");
        repo.create_model(&model).await.unwrap();

        repo.increment_usage(&model.slug).await.unwrap();
        repo.increment_usage(&model.slug).await.unwrap();
        let fetched = repo.get_model_by_slug(&model.slug).await.unwrap().unwrap();
        assert_eq!(fetched.usage_count, 2);
    }

    #[tokio::test]
    async fn listing_respects_visibility_and_ownership() {
        let repo = MemoryRepository::new();
        let owner = Uuid::new_v4();
        let mut hidden = record(owner, "hidden");
        hidden.is_public = false;
        let visible = record(owner, "visible");
        let other = record(Uuid::new_v4(), "other");
        repo.create_model(&hidden).await.unwrap();
        repo.create_model(&visible).await.unwrap();
        repo.create_model(&other).await.unwrap();

        let public = repo.list_public_models().await.unwrap();
        assert_eq!(public.len(), 2);
        assert!(public.iter().all(|m| m.is_public));

        let mine = repo.list_models_by_owner(owner).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|m| m.owner_id == owner));
    }
}
