use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{InputType, OutputType, SchemaField};
use uuid::Uuid;

/// Registry row for one hosted model. `model_key`/`readme_key` are storage
/// locators and never leave the server; `api_key` is shown once at upload and
/// afterwards only to the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub slug: String,
    pub api_key: String,
    pub model_key: String,
    pub readme_key: Option<String>,
    pub input_type: InputType,
    pub output_type: OutputType,
    pub input_schema: Vec<SchemaField>,
    pub usage_count: i64,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner_id: Uuid,
        name: String,
        description: String,
        slug: String,
        api_key: String,
        model_key: String,
        readme_key: Option<String>,
        input_type: InputType,
        output_type: OutputType,
        input_schema: Vec<SchemaField>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
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
            usage_count: 0,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returned once from a successful upload; the only response that carries the
/// API key unconditionally.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub api_key: String,
    pub api_url: String,
    pub input_type: InputType,
    pub output_type: OutputType,
    pub input_schema: Vec<SchemaField>,
}

impl UploadResponse {
    pub fn from_record(record: &ModelRecord, api_url: String) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            slug: record.slug.clone(),
            api_key: record.api_key.clone(),
            api_url,
            input_type: record.input_type,
            output_type: record.output_type,
            input_schema: record.input_schema.clone(),
        }
    }
}

/// List view. No key material of any kind.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub input_type: InputType,
    pub output_type: OutputType,
    pub usage_count: i64,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&ModelRecord> for ModelSummary {
    fn from(record: &ModelRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            slug: record.slug.clone(),
            description: record.description.clone(),
            input_type: record.input_type,
            output_type: record.output_type,
            usage_count: record.usage_count,
            is_public: record.is_public,
            created_at: record.created_at,
        }
    }
}

/// Detail view. Storage keys are always stripped; `api_key` is populated only
/// when the requester is the owner.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDetail {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub input_type: InputType,
    pub output_type: OutputType,
    pub input_schema: Vec<SchemaField>,
    pub usage_count: i64,
    pub is_public: bool,
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelDetail {
    pub fn from_record(record: &ModelRecord, api_url: String, is_owner: bool) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            slug: record.slug.clone(),
            description: record.description.clone(),
            input_type: record.input_type,
            output_type: record.output_type,
            input_schema: record.input_schema.clone(),
            usage_count: record.usage_count,
            is_public: record.is_public,
            api_url,
            api_key: is_owner.then(|| record.api_key.clone()),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityUpdate {
    pub is_public: bool,
}
