use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{test, web, App, Error};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use backend::auth::google_service::GoogleAuthService;
use backend::auth::jwt::JwtService;
use backend::auth::middleware::AuthMiddleware;
use backend::auth::models::User;
use backend::config::{AppConfig, DatabaseBackend, StorageBackend};
use backend::db::memory_repository::MemoryRepository;
use backend::db::Database;
use backend::predict::client::InferenceClient;
use backend::registry::models::ModelRecord;
use backend::registry::slug::{generate_api_key, generate_slug};
use backend::routes::configure_routes;
use backend::storage::local_service::LocalStorage;
use backend::storage::{model_key, ObjectStorage};
use shared::{InputType, OutputType};

/// Everything a test needs to stand up the service against the in-memory
/// database, tempdir-backed local storage, and a stub inference service.
pub struct TestContext {
    pub db: Arc<MemoryRepository>,
    pub storage: Arc<LocalStorage>,
    pub jwt: JwtService,
    pub config: AppConfig,
    inference: InferenceClient,
    google: GoogleAuthService,
    _storage_dir: tempfile::TempDir,
}

impl TestContext {
    pub fn new(inference_url: &str) -> Self {
        let storage_dir = tempfile::tempdir().expect("create temp storage dir");
        let config = AppConfig {
            port: 0,
            base_url: "http://localhost:8081".to_string(),
            frontend_url: "http://localhost:8081".to_string(),
            jwt_secret: "integration-test-secret".to_string(),
            google_client_id: "test-client-id".to_string(),
            google_client_secret: "test-client-secret".to_string(),
            google_redirect_uri: "http://localhost:8081/api/auth/google/callback".to_string(),
            database: DatabaseBackend::Memory,
            storage: StorageBackend::Local {
                root: storage_dir.path().to_path_buf(),
            },
            inference_url: inference_url.to_string(),
            inference_timeout: Duration::from_secs(5),
        };

        Self {
            db: Arc::new(MemoryRepository::new()),
            storage: Arc::new(LocalStorage::new(storage_dir.path().to_path_buf())),
            jwt: JwtService::new(&config.jwt_secret),
            inference: InferenceClient::new(
                config.inference_url.clone(),
                config.inference_timeout,
            )
            .expect("build inference client"),
            google: GoogleAuthService::new(
                config.google_client_id.clone(),
                config.google_client_secret.clone(),
                config.google_redirect_uri.clone(),
            ),
            config,
            _storage_dir: storage_dir,
        }
    }

    pub async fn app(
        &self,
    ) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = Error> {
        let db: Arc<dyn Database> = self.db.clone();
        let storage: Arc<dyn ObjectStorage> = self.storage.clone();

        test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(self.jwt.clone()))
                .app_data(web::Data::from(db))
                .app_data(web::Data::from(storage))
                .app_data(web::Data::new(self.jwt.clone()))
                .app_data(web::Data::new(self.google.clone()))
                .app_data(web::Data::new(self.inference.clone()))
                .app_data(web::Data::new(self.config.clone()))
                .configure(configure_routes),
        )
        .await
    }

    pub async fn seed_user(&self, email: &str) -> Uuid {
        let now = chrono::Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            google_sub: format!("google-sub-{}", email),
            email: email.to_string(),
            name: "Test User".to_string(),
            picture_url: None,
            created_at: now,
            updated_at: now,
            last_login: Some(now),
            is_active: true,
        };
        self.db.create_user(&user).await.expect("seed user");
        user.id
    }

    /// Session cookie header value for a seeded user.
    pub fn session_cookie(&self, user_id: Uuid) -> String {
        let token = self.jwt.generate_token(user_id).expect("generate token");
        format!("token={}", token)
    }

    pub async fn seed_model(
        &self,
        owner_id: Uuid,
        name: &str,
        input_type: InputType,
        output_type: OutputType,
    ) -> ModelRecord {
        let weights = b"not real weights";
        let key = model_key(owner_id, &backend::storage::calculate_file_hash(weights), "h5");
        self.storage
            .put(weights, &key, "application/octet-stream")
            .await
            .expect("seed weights object");

        let record = ModelRecord::new(
            owner_id,
            name.to_string(),
            "seeded test model".to_string(),
            generate_slug(name),
            generate_api_key(),
            key,
            None,
            input_type,
            output_type,
            Vec::new(),
        );
        self.db.create_model(&record).await.expect("seed model");
        record
    }

    pub async fn usage_count(&self, slug: &str) -> i64 {
        self.db
            .get_model_by_slug(slug)
            .await
            .expect("fetch model")
            .expect("model exists")
            .usage_count
    }
}

/// Hand-rolled multipart encoder for upload tests.
pub struct MultipartBuilder {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self {
            boundary: "----integration-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
