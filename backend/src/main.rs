use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;

use backend::auth::google_service::GoogleAuthService;
use backend::auth::jwt::JwtService;
use backend::auth::middleware::AuthMiddleware;
use backend::config::{AppConfig, DatabaseBackend, StorageBackend};
use backend::db::dynamodb_repository::DynamoDbRepository;
use backend::db::memory_repository::MemoryRepository;
use backend::db::Database;
use backend::predict::client::InferenceClient;
use backend::routes::configure_routes;
use backend::storage::local_service::LocalStorage;
use backend::storage::s3_service::S3Storage;
use backend::storage::ObjectStorage;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Configuration error: {}", e),
        )
    })?;

    // Harmless when the memory/local backends are selected.
    let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;

    let db: Arc<dyn Database> = match &config.database {
        DatabaseBackend::DynamoDb {
            users_table,
            models_table,
        } => {
            let client = DynamoDbClient::new(&aws_config);
            Arc::new(DynamoDbRepository::new(
                client,
                users_table.clone(),
                models_table.clone(),
            ))
        }
        DatabaseBackend::Memory => {
            log::warn!("Using in-memory database backend; data will not survive a restart");
            Arc::new(MemoryRepository::new())
        }
    };

    let storage: Arc<dyn ObjectStorage> = match &config.storage {
        StorageBackend::S3 { bucket } => {
            let client = S3Client::new(&aws_config);
            Arc::new(S3Storage::new(client, bucket.clone()))
        }
        StorageBackend::Local { root } => {
            log::info!("Storing uploads under {}", root.display());
            Arc::new(LocalStorage::new(root.clone()))
        }
    };

    let jwt_service = JwtService::new(&config.jwt_secret);
    let google_service = GoogleAuthService::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_redirect_uri.clone(),
    );
    let inference_client =
        InferenceClient::new(config.inference_url.clone(), config.inference_timeout).map_err(
            |e| {
                std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to build inference client: {}", e),
                )
            },
        )?;
    let auth_middleware = AuthMiddleware::new(jwt_service.clone());

    log::info!("Inference service: {}", config.inference_url);
    log::info!("Login: {}/api/auth/google", config.base_url);

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    let db_data = web::Data::from(db);
    let storage_data = web::Data::from(storage);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                        actix_web::http::header::HeaderName::from_static("x-api-key"),
                    ])
                    .max_age(3600),
            )
            .wrap(auth_middleware.clone())
            .app_data(db_data.clone())
            .app_data(storage_data.clone())
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(google_service.clone()))
            .app_data(web::Data::new(inference_client.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
