use actix_multipart::Multipart;
use actix_web::{web, Error, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use serde_json::json;
use std::io::Write;
use std::str::FromStr;

use shared::{InputType, OutputType};

use crate::auth::middleware::{AuthenticatedUser, MaybeUser};
use crate::config::AppConfig;
use crate::db::Database;
use crate::registry::models::{
    ModelDetail, ModelRecord, ModelSummary, UploadResponse, VisibilityUpdate,
};
use crate::registry::schema_parse::parse_input_schema;
use crate::registry::slug::{generate_api_key, generate_slug};
use crate::storage::{
    calculate_file_hash, file_extension, model_key, readme_key, validate_upload_size,
    ObjectStorage, StorageError,
};

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: message.to_string(),
    })
}

struct UploadForm {
    name: Option<String>,
    description: String,
    input_type: Option<String>,
    output_type: Option<String>,
    model_file: Option<(String, Option<String>, Vec<u8>)>,
    readme: Option<Vec<u8>>,
}

async fn collect_upload_form(mut payload: Multipart) -> Result<UploadForm, Error> {
    let mut form = UploadForm {
        name: None,
        description: String::new(),
        input_type: None,
        output_type: None,
        model_file: None,
        readme: None,
    };

    while let Ok(Some(mut field)) = payload.try_next().await {
        let field_name = field.name().unwrap_or("").to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(|s| s.to_string());
        let content_type = field.content_type().map(|mime| mime.to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let bytes = chunk?;
            data.write_all(&bytes)?;
        }

        match field_name.as_str() {
            "name" => form.name = Some(String::from_utf8_lossy(&data).trim().to_string()),
            "description" => {
                form.description = String::from_utf8_lossy(&data).trim().to_string()
            }
            "inputType" => {
                form.input_type = Some(String::from_utf8_lossy(&data).trim().to_string())
            }
            "outputType" => {
                form.output_type = Some(String::from_utf8_lossy(&data).trim().to_string())
            }
            "model" => {
                let filename = filename.unwrap_or_else(|| "model.bin".to_string());
                form.model_file = Some((filename, content_type, data));
            }
            "readme" => form.readme = Some(data),
            _ => {}
        }
    }

    Ok(form)
}

/// `POST /api/models` — upload a weights file (plus optional README), mint a
/// slug and API key, and register the model. The response is the one place
/// the key is returned unconditionally.
pub async fn upload_model(
    user: AuthenticatedUser,
    payload: Multipart,
    db: web::Data<dyn Database>,
    storage: web::Data<dyn ObjectStorage>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, Error> {
    let form = collect_upload_form(payload).await?;

    let name = match form.name {
        Some(name) if !name.is_empty() => name,
        _ => return Ok(bad_request("Model name is required")),
    };
    let (filename, content_type, model_bytes) = match form.model_file {
        Some(file) if !file.2.is_empty() => file,
        _ => return Ok(bad_request("Model file is required")),
    };
    let input_type = match form.input_type.as_deref().map(InputType::from_str) {
        Some(Ok(input_type)) => input_type,
        Some(Err(e)) => return Ok(bad_request(&e)),
        None => return Ok(bad_request("inputType is required")),
    };
    let output_type = match form.output_type.as_deref().map(OutputType::from_str) {
        Some(Ok(output_type)) => output_type,
        Some(Err(e)) => return Ok(bad_request(&e)),
        None => return Ok(bad_request("outputType is required")),
    };

    if let Err(StorageError::FileTooLarge) = validate_upload_size(&model_bytes) {
        return Ok(bad_request("Model file too large"));
    }

    let slug = generate_slug(&name);
    let api_key = generate_api_key();

    let file_hash = calculate_file_hash(&model_bytes);
    let model_storage_key = model_key(user.0, &file_hash, file_extension(&filename));
    let model_content_type =
        content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    if let Err(e) = storage
        .put(&model_bytes, &model_storage_key, &model_content_type)
        .await
    {
        error!("Failed to store model file for {}: {:?}", slug, e);
        return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Failed to store model file".to_string(),
        }));
    }

    let mut readme_storage_key = None;
    let mut input_schema = Vec::new();
    if let Some(readme_bytes) = form.readme {
        if !readme_bytes.is_empty() {
            let readme_text = String::from_utf8_lossy(&readme_bytes).into_owned();
            input_schema = parse_input_schema(&readme_text);

            let key = readme_key(user.0, &slug);
            if let Err(e) = storage
                .put(&readme_bytes, &key, "text/markdown")
                .await
            {
                error!("Failed to store README for {}: {:?}", slug, e);
                return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to store README".to_string(),
                }));
            }
            readme_storage_key = Some(key);
        }
    }

    let record = ModelRecord::new(
        user.0,
        name,
        form.description,
        slug,
        api_key,
        model_storage_key,
        readme_storage_key,
        input_type,
        output_type,
        input_schema,
    );

    if let Err(e) = db.create_model(&record).await {
        error!("Failed to save model {}: {:?}", record.slug, e);
        return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Failed to save model".to_string(),
        }));
    }

    info!(
        "Registered model '{}' as {} for user {}",
        record.name, record.slug, record.owner_id
    );

    let api_url = config.predict_url(&record.slug);
    Ok(HttpResponse::Created().json(UploadResponse::from_record(&record, api_url)))
}

/// `GET /api/models` — public models only.
pub async fn list_models(db: web::Data<dyn Database>) -> Result<HttpResponse, Error> {
    match db.list_public_models().await {
        Ok(models) => {
            let summaries: Vec<ModelSummary> = models.iter().map(ModelSummary::from).collect();
            Ok(HttpResponse::Ok().json(summaries))
        }
        Err(e) => {
            error!("Failed to list models: {:?}", e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to list models".to_string(),
            }))
        }
    }
}

/// `GET /api/models/mine`
pub async fn my_models(
    user: AuthenticatedUser,
    db: web::Data<dyn Database>,
) -> Result<HttpResponse, Error> {
    match db.list_models_by_owner(user.0).await {
        Ok(models) => {
            let summaries: Vec<ModelSummary> = models.iter().map(ModelSummary::from).collect();
            Ok(HttpResponse::Ok().json(summaries))
        }
        Err(e) => {
            error!("Failed to list models for user {}: {:?}", user.0, e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to list models".to_string(),
            }))
        }
    }
}

/// `GET /api/models/{slug}` — storage keys are always stripped; the API key
/// appears only when the session belongs to the owner.
pub async fn get_model(
    slug: web::Path<String>,
    maybe_user: MaybeUser,
    db: web::Data<dyn Database>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, Error> {
    let slug = slug.into_inner();

    match db.get_model_by_slug(&slug).await {
        Ok(Some(model)) => {
            let is_owner = maybe_user.0 == Some(model.owner_id);
            let api_url = config.predict_url(&model.slug);
            Ok(HttpResponse::Ok().json(ModelDetail::from_record(&model, api_url, is_owner)))
        }
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: "Model not found".to_string(),
        })),
        Err(e) => {
            error!("Failed to fetch model {}: {:?}", slug, e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch model".to_string(),
            }))
        }
    }
}

/// `GET /api/models/{slug}/readme`
pub async fn get_readme(
    slug: web::Path<String>,
    db: web::Data<dyn Database>,
    storage: web::Data<dyn ObjectStorage>,
) -> Result<HttpResponse, Error> {
    let slug = slug.into_inner();

    let model = match db.get_model_by_slug(&slug).await {
        Ok(Some(model)) => model,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(ErrorResponse {
                error: "Model not found".to_string(),
            }))
        }
        Err(e) => {
            error!("Failed to fetch model {}: {:?}", slug, e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch model".to_string(),
            }));
        }
    };

    let readme_key = match model.readme_key {
        Some(key) => key,
        None => {
            return Ok(HttpResponse::NotFound().json(ErrorResponse {
                error: "Model has no README".to_string(),
            }))
        }
    };

    match storage.get(&readme_key).await {
        Ok(bytes) => Ok(HttpResponse::Ok()
            .content_type("text/markdown; charset=utf-8")
            .body(bytes)),
        Err(StorageError::NotFound(_)) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: "README not found".to_string(),
        })),
        Err(e) => {
            error!("Failed to read README for {}: {:?}", slug, e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to read README".to_string(),
            }))
        }
    }
}

/// `PATCH /api/models/{slug}` — owner-only visibility flip.
pub async fn update_visibility(
    user: AuthenticatedUser,
    slug: web::Path<String>,
    body: web::Json<VisibilityUpdate>,
    db: web::Data<dyn Database>,
) -> Result<HttpResponse, Error> {
    let slug = slug.into_inner();

    let model = match db.get_model_by_slug(&slug).await {
        Ok(Some(model)) => model,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(ErrorResponse {
                error: "Model not found".to_string(),
            }))
        }
        Err(e) => {
            error!("Failed to fetch model {}: {:?}", slug, e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch model".to_string(),
            }));
        }
    };

    if model.owner_id != user.0 {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse {
            error: "Only the owner can modify a model".to_string(),
        }));
    }

    if let Err(e) = db.set_visibility(&slug, body.is_public).await {
        error!("Failed to update visibility for {}: {:?}", slug, e);
        return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Failed to update model".to_string(),
        }));
    }

    Ok(HttpResponse::Ok().json(json!({ "slug": slug, "isPublic": body.is_public })))
}

/// `DELETE /api/models/{slug}` — owner-only. The row goes first so no API
/// response can reference a missing file; the storage objects follow
/// best-effort.
pub async fn delete_model(
    user: AuthenticatedUser,
    slug: web::Path<String>,
    db: web::Data<dyn Database>,
    storage: web::Data<dyn ObjectStorage>,
) -> Result<HttpResponse, Error> {
    let slug = slug.into_inner();

    let model = match db.get_model_by_slug(&slug).await {
        Ok(Some(model)) => model,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(ErrorResponse {
                error: "Model not found".to_string(),
            }))
        }
        Err(e) => {
            error!("Failed to fetch model {}: {:?}", slug, e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch model".to_string(),
            }));
        }
    };

    if model.owner_id != user.0 {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse {
            error: "Only the owner can delete a model".to_string(),
        }));
    }

    if let Err(e) = db.delete_model(&slug).await {
        error!("Failed to delete model {}: {:?}", slug, e);
        return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: "Failed to delete model".to_string(),
        }));
    }

    if let Err(e) = storage.delete(&model.model_key).await {
        error!(
            "Failed to delete weights object {} for {}: {:?}",
            model.model_key, slug, e
        );
    }
    if let Some(readme_key) = &model.readme_key {
        if let Err(e) = storage.delete(readme_key).await {
            error!(
                "Failed to delete README object {} for {}: {:?}",
                readme_key, slug, e
            );
        }
    }

    info!("Deleted model {} for user {}", slug, user.0);
    Ok(HttpResponse::Ok().json(json!({ "message": "Model deleted" })))
}
