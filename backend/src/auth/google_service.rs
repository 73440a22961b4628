use reqwest::Client as HttpClient;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[derive(Error, Debug)]
pub enum GoogleAuthError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("URL parsing failed: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("OAuth error: {0}")]
    OAuthError(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GoogleTokenResponse {
    pub access_token: String,
    pub id_token: Option<String>,
    pub token_type: String,
    pub expires_in: u64,
}

// Google serializes email_verified as a real bool on the v3 endpoint but as a
// string on older ones.
fn deserialize_string_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(serde::de::Error::custom(format!(
                "Invalid boolean string: {}",
                s
            ))),
        },
        _ => Err(serde::de::Error::custom("Expected boolean or string")),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    pub email: String,
    #[serde(deserialize_with = "deserialize_string_bool", default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

impl GoogleUserInfo {
    /// Display name, falling back through the profile fields Google actually
    /// populates.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            if !name.trim().is_empty() {
                return name.trim().to_string();
            }
        }
        let joined = format!(
            "{} {}",
            self.given_name.clone().unwrap_or_default(),
            self.family_name.clone().unwrap_or_default()
        )
        .trim()
        .to_string();
        if joined.is_empty() {
            self.email.clone()
        } else {
            joined
        }
    }
}

/// Drives the Google OAuth2 authorization-code flow. The pending CSRF states
/// live inside the service rather than in a module-level singleton so the
/// whole thing is an injected dependency.
#[derive(Clone)]
pub struct GoogleAuthService {
    http_client: HttpClient,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    pending_states: Arc<Mutex<HashSet<String>>>,
}

impl GoogleAuthService {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            client_id,
            client_secret,
            redirect_uri,
            pending_states: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Generates and remembers a state nonce for CSRF protection.
    pub fn issue_state(&self) -> String {
        let state = Uuid::new_v4().to_string();
        self.pending_states.lock().unwrap().insert(state.clone());
        state
    }

    /// Consumes a state nonce; false means unknown or already used.
    pub fn consume_state(&self, state: &str) -> bool {
        self.pending_states.lock().unwrap().remove(state)
    }

    pub fn get_authorization_url(&self, state: &str) -> Result<String, GoogleAuthError> {
        let mut url = Url::parse(AUTHORIZE_URL)?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", "openid email profile")
            .append_pair("state", state)
            .append_pair("access_type", "online");

        Ok(url.to_string())
    }

    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
    ) -> Result<GoogleTokenResponse, GoogleAuthError> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("client_id", &self.client_id);
        params.insert("client_secret", &self.client_secret);
        params.insert("code", code);
        params.insert("redirect_uri", &self.redirect_uri);

        let response = self
            .http_client
            .post(TOKEN_URL)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleAuthError::OAuthError(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        Ok(response.json::<GoogleTokenResponse>().await?)
    }

    pub async fn get_user_info(
        &self,
        access_token: &str,
    ) -> Result<GoogleUserInfo, GoogleAuthError> {
        let response = self
            .http_client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleAuthError::OAuthError(format!(
                "userinfo endpoint returned {}: {}",
                status, body
            )));
        }

        Ok(response.json::<GoogleUserInfo>().await?)
    }
}
