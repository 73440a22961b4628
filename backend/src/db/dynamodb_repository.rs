use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use super::{Database, RepositoryError};
use crate::auth::models::User;
use crate::registry::models::ModelRecord;
use shared::{InputType, OutputType};

/// Users and models tables over DynamoDB. The models table is keyed by slug;
/// the users table by id.
#[derive(Clone)]
pub struct DynamoDbRepository {
    client: Client,
    users_table: String,
    models_table: String,
}

impl DynamoDbRepository {
    pub fn new(client: Client, users_table: String, models_table: String) -> Self {
        Self {
            client,
            users_table,
            models_table,
        }
    }

    fn user_item(user: &User) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("id".to_string(), AttributeValue::S(user.id.to_string()));
        item.insert(
            "google_sub".to_string(),
            AttributeValue::S(user.google_sub.clone()),
        );
        item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
        item.insert("name".to_string(), AttributeValue::S(user.name.clone()));
        if let Some(picture_url) = &user.picture_url {
            item.insert(
                "picture_url".to_string(),
                AttributeValue::S(picture_url.clone()),
            );
        }
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(user.created_at.to_rfc3339()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(user.updated_at.to_rfc3339()),
        );
        if let Some(last_login) = &user.last_login {
            item.insert(
                "last_login".to_string(),
                AttributeValue::S(last_login.to_rfc3339()),
            );
        }
        item.insert(
            "is_active".to_string(),
            AttributeValue::Bool(user.is_active),
        );
        item
    }

    fn model_item(model: &ModelRecord) -> Result<HashMap<String, AttributeValue>, RepositoryError> {
        let mut item = HashMap::new();
        item.insert("slug".to_string(), AttributeValue::S(model.slug.clone()));
        item.insert("id".to_string(), AttributeValue::S(model.id.to_string()));
        item.insert(
            "owner_id".to_string(),
            AttributeValue::S(model.owner_id.to_string()),
        );
        item.insert("name".to_string(), AttributeValue::S(model.name.clone()));
        item.insert(
            "description".to_string(),
            AttributeValue::S(model.description.clone()),
        );
        item.insert(
            "api_key".to_string(),
            AttributeValue::S(model.api_key.clone()),
        );
        item.insert(
            "model_key".to_string(),
            AttributeValue::S(model.model_key.clone()),
        );
        if let Some(readme_key) = &model.readme_key {
            item.insert(
                "readme_key".to_string(),
                AttributeValue::S(readme_key.clone()),
            );
        }
        item.insert(
            "input_type".to_string(),
            AttributeValue::S(model.input_type.as_str().to_string()),
        );
        item.insert(
            "output_type".to_string(),
            AttributeValue::S(model.output_type.as_str().to_string()),
        );
        item.insert(
            "input_schema".to_string(),
            AttributeValue::S(serde_json::to_string(&model.input_schema)?),
        );
        item.insert(
            "usage_count".to_string(),
            AttributeValue::N(model.usage_count.to_string()),
        );
        item.insert(
            "is_public".to_string(),
            AttributeValue::Bool(model.is_public),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(model.created_at.to_rfc3339()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(model.updated_at.to_rfc3339()),
        );
        Ok(item)
    }

    fn parse_user_from_item(
        &self,
        item: HashMap<String, AttributeValue>,
    ) -> Result<User, RepositoryError> {
        let id = item
            .get("id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid id".to_string()))?;

        let google_sub = item
            .get("google_sub")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid google_sub".to_string()))?
            .clone();

        let email = item
            .get("email")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid email".to_string()))?
            .clone();

        let name = item
            .get("name")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid name".to_string()))?
            .clone();

        let picture_url = item
            .get("picture_url")
            .and_then(|v| v.as_s().ok())
            .cloned();

        let created_at = item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| RepositoryError::InvalidData("Invalid created_at".to_string()))?;

        let updated_at = item
            .get("updated_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| RepositoryError::InvalidData("Invalid updated_at".to_string()))?;

        let last_login = item
            .get("last_login")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let is_active = *item
            .get("is_active")
            .and_then(|v| v.as_bool().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid is_active".to_string()))?;

        Ok(User {
            id,
            google_sub,
            email,
            name,
            picture_url,
            created_at,
            updated_at,
            last_login,
            is_active,
        })
    }

    fn parse_model_from_item(
        &self,
        item: HashMap<String, AttributeValue>,
    ) -> Result<ModelRecord, RepositoryError> {
        let id = item
            .get("id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid id".to_string()))?;

        let owner_id = item
            .get("owner_id")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid owner_id".to_string()))?;

        let name = item
            .get("name")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid name".to_string()))?
            .clone();

        let description = item
            .get("description")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid description".to_string()))?
            .clone();

        let slug = item
            .get("slug")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid slug".to_string()))?
            .clone();

        let api_key = item
            .get("api_key")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid api_key".to_string()))?
            .clone();

        let model_key = item
            .get("model_key")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid model_key".to_string()))?
            .clone();

        let readme_key = item
            .get("readme_key")
            .and_then(|v| v.as_s().ok())
            .cloned();

        let input_type = item
            .get("input_type")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| InputType::from_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid input_type".to_string()))?;

        let output_type = item
            .get("output_type")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| OutputType::from_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid output_type".to_string()))?;

        let input_schema = item
            .get("input_schema")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| serde_json::from_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid input_schema".to_string()))?;

        let usage_count = item
            .get("usage_count")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid usage_count".to_string()))?;

        let is_public = *item
            .get("is_public")
            .and_then(|v| v.as_bool().ok())
            .ok_or_else(|| RepositoryError::InvalidData("Invalid is_public".to_string()))?;

        let created_at = item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| RepositoryError::InvalidData("Invalid created_at".to_string()))?;

        let updated_at = item
            .get("updated_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| RepositoryError::InvalidData("Invalid updated_at".to_string()))?;

        Ok(ModelRecord {
            id,
            owner_id,
            name,
            description,
            slug,
            api_key,
            model_key,
            readme_key,
            input_type,
            output_type,
            input_schema,
            usage_count,
            is_public,
            created_at,
            updated_at,
        })
    }
}

#[async_trait]
impl Database for DynamoDbRepository {
    async fn create_user(&self, user: &User) -> Result<(), RepositoryError> {
        log::info!(
            "Creating user in DynamoDB table '{}': {}",
            self.users_table,
            user.email
        );

        self.client
            .put_item()
            .table_name(&self.users_table)
            .set_item(Some(Self::user_item(user)))
            .send()
            .await
            .map_err(|e| {
                log::error!("DynamoDB put_item failed for user {}: {:?}", user.email, e);
                RepositoryError::DynamoDb(e.to_string())
            })?;

        Ok(())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        let mut key = HashMap::new();
        key.insert("id".to_string(), AttributeValue::S(user_id.to_string()));

        let result = self
            .client
            .get_item()
            .table_name(&self.users_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            Ok(Some(self.parse_user_from_item(item)?))
        } else {
            Ok(None)
        }
    }

    async fn get_user_by_google_sub(&self, sub: &str) -> Result<Option<User>, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.users_table)
            .filter_expression("google_sub = :google_sub")
            .expression_attribute_values(":google_sub", AttributeValue::S(sub.to_string()))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        if let Some(items) = result.items {
            if let Some(item) = items.into_iter().next() {
                return Ok(Some(self.parse_user_from_item(item)?));
            }
        }
        Ok(None)
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        log::info!("Updating user in DynamoDB: {}", user.email);

        // Full-row overwrite; user rows are small and the id key never changes.
        self.client
            .put_item()
            .table_name(&self.users_table)
            .set_item(Some(Self::user_item(user)))
            .send()
            .await
            .map_err(|e| {
                log::error!(
                    "DynamoDB put_item failed updating user {}: {:?}",
                    user.email,
                    e
                );
                RepositoryError::DynamoDb(e.to_string())
            })?;

        Ok(())
    }

    async fn create_model(&self, model: &ModelRecord) -> Result<(), RepositoryError> {
        log::info!(
            "Creating model '{}' (slug {}) in DynamoDB table '{}'",
            model.name,
            model.slug,
            self.models_table
        );

        self.client
            .put_item()
            .table_name(&self.models_table)
            .set_item(Some(Self::model_item(model)?))
            .condition_expression("attribute_not_exists(slug)")
            .send()
            .await
            .map_err(|e| {
                log::error!("DynamoDB put_item failed for model {}: {:?}", model.slug, e);
                RepositoryError::DynamoDb(e.to_string())
            })?;

        Ok(())
    }

    async fn get_model_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ModelRecord>, RepositoryError> {
        let mut key = HashMap::new();
        key.insert("slug".to_string(), AttributeValue::S(slug.to_string()));

        let result = self
            .client
            .get_item()
            .table_name(&self.models_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        if let Some(item) = result.item {
            Ok(Some(self.parse_model_from_item(item)?))
        } else {
            Ok(None)
        }
    }

    async fn list_public_models(&self) -> Result<Vec<ModelRecord>, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.models_table)
            .filter_expression("is_public = :is_public")
            .expression_attribute_values(":is_public", AttributeValue::Bool(true))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        let mut models = Vec::new();
        for item in result.items.unwrap_or_default() {
            models.push(self.parse_model_from_item(item)?);
        }
        Ok(models)
    }

    async fn list_models_by_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<ModelRecord>, RepositoryError> {
        let result = self
            .client
            .scan()
            .table_name(&self.models_table)
            .filter_expression("owner_id = :owner_id")
            .expression_attribute_values(":owner_id", AttributeValue::S(owner_id.to_string()))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        let mut models = Vec::new();
        for item in result.items.unwrap_or_default() {
            models.push(self.parse_model_from_item(item)?);
        }
        Ok(models)
    }

    async fn increment_usage(&self, slug: &str) -> Result<(), RepositoryError> {
        let mut key = HashMap::new();
        key.insert("slug".to_string(), AttributeValue::S(slug.to_string()));

        // ADD is atomic server-side; no read-modify-write.
        self.client
            .update_item()
            .table_name(&self.models_table)
            .set_key(Some(key))
            .update_expression("ADD usage_count :one")
            .condition_expression("attribute_exists(slug)")
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn set_visibility(&self, slug: &str, is_public: bool) -> Result<(), RepositoryError> {
        let mut key = HashMap::new();
        key.insert("slug".to_string(), AttributeValue::S(slug.to_string()));

        self.client
            .update_item()
            .table_name(&self.models_table)
            .set_key(Some(key))
            .update_expression("SET is_public = :is_public, updated_at = :updated_at")
            .condition_expression("attribute_exists(slug)")
            .expression_attribute_values(":is_public", AttributeValue::Bool(is_public))
            .expression_attribute_values(
                ":updated_at",
                AttributeValue::S(Utc::now().to_rfc3339()),
            )
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn delete_model(&self, slug: &str) -> Result<(), RepositoryError> {
        let mut key = HashMap::new();
        key.insert("slug".to_string(), AttributeValue::S(slug.to_string()));

        self.client
            .delete_item()
            .table_name(&self.models_table)
            .set_key(Some(key))
            .send()
            .await
            .map_err(|e| RepositoryError::DynamoDb(e.to_string()))?;

        Ok(())
    }
}
