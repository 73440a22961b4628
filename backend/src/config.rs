use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },
}

/// Which database backs the registry. DynamoDB in deployment, in-memory for
/// local development and tests.
#[derive(Debug, Clone)]
pub enum DatabaseBackend {
    DynamoDb {
        users_table: String,
        models_table: String,
    },
    Memory,
}

/// Where uploaded model weights and READMEs live. S3 in deployment; the local
/// backend writes under a directory shared with the inference process.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    S3 { bucket: String },
    Local { root: PathBuf },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Public base URL of this service, used to build model endpoint URLs.
    pub base_url: String,
    /// Where the OAuth callback sends the browser after a login attempt.
    pub frontend_url: String,
    pub jwt_secret: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_uri: String,
    pub database: DatabaseBackend,
    pub storage: StorageBackend,
    /// Base URL of the Python inference service.
    pub inference_url: String,
    pub inference_timeout: Duration,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8081".to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidVar {
                name: "PORT",
                reason: e.to_string(),
            })?;

        let base_url = required("BASE_URL")?;
        let frontend_url = env::var("FRONTEND_URL").unwrap_or_else(|_| base_url.clone());

        let database = match env::var("DATABASE_BACKEND")
            .unwrap_or_else(|_| "dynamodb".to_string())
            .as_str()
        {
            "dynamodb" => DatabaseBackend::DynamoDb {
                users_table: required("DYNAMODB_USERS_TABLE")?,
                models_table: required("DYNAMODB_MODELS_TABLE")?,
            },
            "memory" => DatabaseBackend::Memory,
            other => {
                return Err(ConfigError::InvalidVar {
                    name: "DATABASE_BACKEND",
                    reason: format!("expected 'dynamodb' or 'memory', got '{}'", other),
                })
            }
        };

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .as_str()
        {
            "s3" => StorageBackend::S3 {
                bucket: required("S3_BUCKET_NAME")?,
            },
            "local" => StorageBackend::Local {
                root: PathBuf::from(required("LOCAL_STORAGE_DIR")?),
            },
            other => {
                return Err(ConfigError::InvalidVar {
                    name: "STORAGE_BACKEND",
                    reason: format!("expected 's3' or 'local', got '{}'", other),
                })
            }
        };

        let inference_timeout = match env::var("INFERENCE_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| ConfigError::InvalidVar {
                    name: "INFERENCE_TIMEOUT_SECS",
                    reason: e.to_string(),
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => Duration::from_secs(120),
        };

        Ok(Self {
            port,
            base_url,
            frontend_url,
            jwt_secret: required("JWT_SECRET")?,
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            google_redirect_uri: required("GOOGLE_REDIRECT_URI")?,
            database,
            storage,
            inference_url: required("INFERENCE_SERVICE_URL")?,
            inference_timeout,
        })
    }

    pub fn predict_url(&self, slug: &str) -> String {
        format!("{}/api/predict/{}", self.base_url.trim_end_matches('/'), slug)
    }
}
