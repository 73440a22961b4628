use actix_multipart::Multipart;
use actix_web::{web, Error, HttpMessage, HttpRequest, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::error;
use serde_json::{json, Map, Value};
use std::io::Write;

use crate::db::Database;
use crate::predict::client::{InferenceClient, InferenceError};
use crate::predict::payload::{build_payload, RawInput, UploadedFile};
use crate::storage::ObjectStorage;

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

const API_KEY_HEADER: &str = "X-API-Key";

async fn collect_body(mut payload: web::Payload) -> Result<web::BytesMut, Error> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Drains a multipart body into `RawInput`: parts with a filename become
/// files, plain text parts are folded into the JSON view so the payload
/// builders see one shape.
async fn collect_multipart(mut multipart: Multipart) -> Result<RawInput, Error> {
    let mut raw = RawInput::default();
    let mut text_fields = Map::new();

    while let Ok(Some(mut field)) = multipart.try_next().await {
        let name = field.name().unwrap_or("").to_string();
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

        if let Some(filename) = filename {
            raw.files.insert(
                name,
                UploadedFile {
                    filename,
                    content_type,
                    data,
                },
            );
        } else if !name.is_empty() {
            if let Ok(text) = String::from_utf8(data) {
                text_fields.insert(name, Value::String(text));
            }
        }
    }

    if !text_fields.is_empty() {
        raw.json = Some(Value::Object(text_fields));
    }
    Ok(raw)
}

/// `POST /api/predict/{slug}` — the adaptation layer between whatever the
/// caller sent and the inference service's payload contract. Order matters:
/// unknown slug 404s before the key check, the key check 403s before any
/// input validation, and nothing is forwarded (or counted) on a 400.
pub async fn predict(
    req: HttpRequest,
    slug: web::Path<String>,
    body: web::Payload,
    db: web::Data<dyn Database>,
    storage: web::Data<dyn ObjectStorage>,
    inference: web::Data<InferenceClient>,
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
            error!("Failed to look up model {}: {:?}", slug, e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal server error".to_string(),
            }));
        }
    };

    let provided_key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    if provided_key.is_empty() || provided_key != model.api_key {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse {
            error: "Invalid API key".to_string(),
        }));
    }

    let raw = if req.content_type().starts_with("multipart/form-data") {
        collect_multipart(Multipart::new(req.headers(), body)).await?
    } else {
        let bytes = collect_body(body).await?;
        if bytes.is_empty() {
            RawInput::default()
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => RawInput::from_json(value),
                Err(_) => {
                    return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                        error: "Request body must be valid JSON".to_string(),
                    }))
                }
            }
        }
    };

    let model_path = storage.url_for(&model.model_key);
    let payload = match build_payload(
        model.input_type,
        model.output_type,
        &model_path,
        &model.model_key,
        &raw,
    ) {
        Ok(payload) => payload,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: e.hint().to_string(),
            }))
        }
    };

    let downstream = match inference.predict(&payload).await {
        Ok(body) => body,
        Err(InferenceError::Downstream { status, body }) => {
            error!(
                "Inference service returned {} for model {}: {}",
                status, slug, body
            );
            return Ok(HttpResponse::BadGateway().json(json!({
                "error": "Inference service error",
                "details": body,
            })));
        }
        Err(InferenceError::Transport(e)) => {
            error!("Inference service unreachable for model {}: {}", slug, e);
            return Ok(HttpResponse::BadGateway().json(json!({
                "error": "Inference service unreachable",
                "details": e.to_string(),
            })));
        }
    };

    // Best-effort: the prediction already succeeded, so a failed increment is
    // logged rather than surfaced.
    if let Err(e) = db.increment_usage(&slug).await {
        error!("Failed to increment usage for model {}: {:?}", slug, e);
    }

    let response = match downstream {
        Value::Object(mut map) => {
            map.insert("model".to_string(), Value::String(model.name.clone()));
            Value::Object(map)
        }
        other => json!({ "model": model.name, "result": other }),
    };

    Ok(HttpResponse::Ok().json(response))
}
