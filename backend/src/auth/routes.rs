use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpResponse, Result};
use log::{error, info};
use serde_json::json;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::db::Database;

use super::google_service::GoogleAuthService;
use super::jwt::JwtService;
use super::middleware::AuthenticatedUser;
use super::models::{AuthCallbackQuery, AuthUser, User};
use super::SESSION_COOKIE;

#[derive(serde::Serialize)]
struct ErrorResponse {
    error: String,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(7))
        .finish()
}

/// `GET /api/auth/google` — kick off the authorization-code flow.
pub async fn google_login_redirect(
    google_service: web::Data<GoogleAuthService>,
) -> Result<HttpResponse> {
    let state = google_service.issue_state();

    match google_service.get_authorization_url(&state) {
        Ok(auth_url) => {
            info!("Redirecting to Google authorization URL with state protection");
            Ok(HttpResponse::Found()
                .append_header(("Location", auth_url))
                .finish())
        }
        Err(e) => {
            error!("Failed to generate Google authorization URL: {:?}", e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to initiate authentication".to_string(),
            }))
        }
    }
}

/// `GET /api/auth/google/callback` — exchange the code, upsert the user, set
/// the session cookie, and send the browser back to the frontend.
pub async fn google_auth_callback(
    query: web::Query<AuthCallbackQuery>,
    google_service: web::Data<GoogleAuthService>,
    jwt_service: web::Data<JwtService>,
    db: web::Data<dyn Database>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse> {
    // Provider-side errors go back to the frontend rather than a bare JSON page.
    if let Some(error) = &query.error {
        let error_desc = query
            .error_description
            .as_deref()
            .unwrap_or("Unknown error");
        error!("OAuth error received: {} - {}", error, error_desc);

        let frontend_error_url = format!(
            "{}/?error={}&error_description={}",
            config.frontend_url,
            urlencoding::encode(error),
            urlencoding::encode(error_desc)
        );

        return Ok(HttpResponse::Found()
            .append_header(("Location", frontend_error_url))
            .finish());
    }

    match &query.state {
        Some(state) if google_service.consume_state(state) => {
            info!("OAuth state validated and consumed");
        }
        Some(state) => {
            error!("Invalid or expired OAuth state: {}", state);
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: "Invalid authentication state. Possible CSRF attack.".to_string(),
            }));
        }
        None => {
            error!("No state parameter received - possible CSRF attack");
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: "Missing authentication state parameter".to_string(),
            }));
        }
    }

    let code = match &query.code {
        Some(code) => code,
        None => {
            error!("No authorization code received from Google");
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: "No authorization code received".to_string(),
            }));
        }
    };

    let token_response = match google_service.exchange_code_for_tokens(code).await {
        Ok(tokens) => tokens,
        Err(e) => {
            error!("Failed to exchange code for tokens: {:?}", e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to exchange authorization code".to_string(),
            }));
        }
    };

    let user_info = match google_service
        .get_user_info(&token_response.access_token)
        .await
    {
        Ok(info) => info,
        Err(e) => {
            error!("Failed to get user info from Google: {:?}", e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to get user information".to_string(),
            }));
        }
    };

    let final_user = match db.get_user_by_google_sub(&user_info.sub).await {
        Ok(Some(mut existing)) => {
            existing.email = user_info.email.clone();
            existing.name = user_info.display_name();
            existing.picture_url = user_info.picture.clone();
            existing.update_last_login();

            match db.update_user(&existing).await {
                Ok(_) => {
                    info!("Updated existing user: {}", existing.email);
                    existing
                }
                Err(e) => {
                    error!("Failed to update user: {:?}", e);
                    return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                        error: "Failed to update user".to_string(),
                    }));
                }
            }
        }
        Ok(None) => {
            let now = chrono::Utc::now();
            let user = User {
                id: Uuid::new_v4(),
                google_sub: user_info.sub.clone(),
                email: user_info.email.clone(),
                name: user_info.display_name(),
                picture_url: user_info.picture.clone(),
                created_at: now,
                updated_at: now,
                last_login: Some(now),
                is_active: true,
            };
            match db.create_user(&user).await {
                Ok(_) => {
                    info!("Created new user: {}", user.email);
                    user
                }
                Err(e) => {
                    error!("Failed to create user {}: {:?}", user.email, e);
                    return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                        error: "Failed to create user".to_string(),
                    }));
                }
            }
        }
        Err(e) => {
            error!("Failed to look up user by google_sub: {:?}", e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to look up user".to_string(),
            }));
        }
    };

    let jwt_token = match jwt_service.generate_token(final_user.id) {
        Ok(token) => token,
        Err(e) => {
            error!("Failed to generate session token: {:?}", e);
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to generate authentication token".to_string(),
            }));
        }
    };

    info!("User authenticated via Google: {}", final_user.email);

    Ok(HttpResponse::Found()
        .cookie(session_cookie(jwt_token))
        .append_header(("Location", config.frontend_url.clone()))
        .finish())
}

/// `GET /api/auth/me`
pub async fn me(user: AuthenticatedUser, db: web::Data<dyn Database>) -> Result<HttpResponse> {
    if user.0.is_nil() {
        return Ok(HttpResponse::Unauthorized().json(ErrorResponse {
            error: "Invalid user ID".to_string(),
        }));
    }

    match db.get_user_by_id(user.0).await {
        Ok(Some(user_data)) => Ok(HttpResponse::Ok().json(AuthUser::from(user_data))),
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: "User not found".to_string(),
        })),
        Err(e) => {
            error!("Failed to fetch user data for ID {}: {:?}", user.0, e);
            Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to fetch user".to_string(),
            }))
        }
    }
}

/// `POST /api/auth/logout` — sessions are stateless, so logout just removes
/// the cookie.
pub async fn logout() -> Result<HttpResponse> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .finish();
    cookie.make_removal();

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "message": "Logged out successfully" })))
}
