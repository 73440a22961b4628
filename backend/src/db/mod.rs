pub mod dynamodb_repository;
pub mod memory_repository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::models::User;
use crate::registry::models::ModelRecord;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Item not found")]
    NotFound,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

/// Persistence seam for users and the model registry. Backed by DynamoDB in
/// deployment and by an in-memory store for local development and tests.
#[async_trait]
pub trait Database: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError>;
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn get_user_by_google_sub(&self, sub: &str) -> Result<Option<User>, RepositoryError>;
    async fn update_user(&self, user: &User) -> Result<(), RepositoryError>;

    async fn create_model(&self, model: &ModelRecord) -> Result<(), RepositoryError>;
    async fn get_model_by_slug(&self, slug: &str)
        -> Result<Option<ModelRecord>, RepositoryError>;
    async fn list_public_models(&self) -> Result<Vec<ModelRecord>, RepositoryError>;
    async fn list_models_by_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ModelRecord>, RepositoryError>;
    /// Atomic at the database level; never a read-modify-write.
    async fn increment_usage(&self, slug: &str) -> Result<(), RepositoryError>;
    async fn set_visibility(&self, slug: &str, is_public: bool) -> Result<(), RepositoryError>;
    async fn delete_model(&self, slug: &str) -> Result<(), RepositoryError>;
}
