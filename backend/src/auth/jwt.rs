use super::models::Claims;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

/// Sessions last a week; a fresh login re-issues the cookie.
const SESSION_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("JWT decoding error: {0}")]
    Decoding(String),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn generate_token(&self, user_id: Uuid) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::days(SESSION_DAYS);

        let claims = Claims {
            sub: user_id.to_string(),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key).map_err(JwtError::Encoding)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, JwtError> {
        if token.is_empty() {
            return Err(JwtError::InvalidToken);
        }

        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(JwtError::InvalidToken);
        }

        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => {
                let now = Utc::now().timestamp() as usize;
                if token_data.claims.exp < now {
                    log::warn!(
                        "Session token expired. Exp: {}, Now: {}",
                        token_data.claims.exp,
                        now
                    );
                    return Err(JwtError::TokenExpired);
                }
                Ok(token_data.claims)
            }
            Err(err) => {
                log::debug!("Session token decode error: {:?}", err);
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        Err(JwtError::TokenExpired)
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => Err(JwtError::InvalidToken),
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        Err(JwtError::InvalidToken)
                    }
                    _ => Err(JwtError::Decoding(err.to_string())),
                }
            }
        }
    }
}
