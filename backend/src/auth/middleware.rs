use super::jwt::JwtService;
use super::SESSION_COOKIE;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web, Error, HttpMessage, HttpResponse,
};
use actix_web::{FromRequest, HttpRequest};
use futures::future::{ok, Ready};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

/// Session guard for the protected routes. Verifies the `token` cookie (or an
/// `Authorization: Bearer` header for non-browser callers), then parks the
/// user id in request extensions for the `AuthenticatedUser` extractor.
#[derive(Clone)]
pub struct AuthMiddleware {
    jwt_service: Arc<JwtService>,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self {
            jwt_service: Arc::new(jwt_service),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Arc::new(service),
            jwt_service: self.jwt_service.clone(),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Arc<S>,
    jwt_service: Arc<JwtService>,
}

#[derive(Debug)]
enum AuthError {
    NoCredentials,
    InvalidHeaderFormat,
    NotBearerToken,
    VerificationFailed(String),
    InvalidUuidInClaims(String),
}

impl AuthError {
    fn log_message(&self, path: &str) -> String {
        match self {
            AuthError::NoCredentials => {
                format!("No session cookie or Authorization header for path: {}", path)
            }
            AuthError::InvalidHeaderFormat => format!(
                "Invalid Authorization header format (non-UTF-8) for path: {}",
                path
            ),
            AuthError::NotBearerToken => format!(
                "Authorization header for path {} doesn't start with 'Bearer '",
                path
            ),
            AuthError::VerificationFailed(e) => {
                format!("Session token verification failed for path {}: {}", path, e)
            }
            AuthError::InvalidUuidInClaims(sub) => {
                format!("Invalid UUID in session claims.sub for path {}: {}", path, sub)
            }
        }
    }

    fn client_error_json(&self) -> serde_json::Value {
        let error_message = match self {
            AuthError::InvalidUuidInClaims(_) => "Invalid token claims",
            AuthError::VerificationFailed(_) => "Token verification failed",
            _ => "Missing or invalid authorization token",
        };
        serde_json::json!({"error": error_message})
    }
}

/// Which requests need a verified session. The predict path authenticates
/// with per-model API keys instead, model browsing is public, and the OAuth
/// endpoints must stay reachable to log in at all.
pub(crate) fn requires_auth(method: &Method, path: &str) -> bool {
    if !path.starts_with("/api/") || *method == Method::OPTIONS {
        return false;
    }
    if path.starts_with("/api/predict/") || path == "/api/health" {
        return false;
    }
    if path.starts_with("/api/auth/") {
        return path == "/api/auth/me";
    }
    if path == "/api/models" {
        return *method == Method::POST;
    }
    if path == "/api/models/mine" {
        return true;
    }
    if path.starts_with("/api/models/") {
        return *method == Method::DELETE || *method == Method::PATCH;
    }
    false
}

/// Cookie first, Bearer header as fallback.
fn session_token(req: &ServiceRequest) -> Result<String, AuthError> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return Ok(cookie.value().to_string());
    }
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or(AuthError::NoCredentials)?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthError::InvalidHeaderFormat)?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or(AuthError::NotBearerToken)?;
    Ok(token.to_string())
}

fn validate_request_token(
    req: &ServiceRequest,
    jwt_service: &JwtService,
) -> Result<Uuid, AuthError> {
    let token = session_token(req)?;

    let claims = jwt_service
        .verify_token(&token)
        .map_err(|e| AuthError::VerificationFailed(format!("{:?}", e)))?;

    Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidUuidInClaims(claims.sub.clone()))
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let jwt_service = self.jwt_service.clone();

        Box::pin(async move {
            let path_str = req.path().to_string();

            if !requires_auth(req.method(), &path_str) {
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }
            log::debug!("Auth middleware processing path: {}", &path_str);

            match validate_request_token(&req, &jwt_service) {
                Ok(user_id) => {
                    req.extensions_mut().insert(user_id);
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(auth_error) => {
                    log::warn!("{}", auth_error.log_message(&path_str));

                    let (http_req, _payload) = req.into_parts();
                    let response = HttpResponse::Unauthorized()
                        .json(auth_error.client_error_json())
                        .map_into_right_body();
                    Ok(ServiceResponse::new(http_req, response))
                }
            }
        })
    }
}

/// The user id the middleware verified. Only meaningful on routes behind
/// `AuthMiddleware`.
pub struct AuthenticatedUser(pub Uuid);

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<Uuid>() {
            Some(user_id) => ok(AuthenticatedUser(*user_id)),
            None => {
                log::warn!(
                    "AuthenticatedUser extractor: no user id in request extensions for path: {}",
                    req.path()
                );
                ok(AuthenticatedUser(Uuid::nil()))
            }
        }
    }
}

/// Optional session identity for routes that behave differently for owners
/// (e.g. whether a model's API key is included). Never rejects the request.
pub struct MaybeUser(pub Option<Uuid>);

impl FromRequest for MaybeUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let token = req
            .cookie(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .or_else(|| {
                req.headers()
                    .get("Authorization")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.strip_prefix("Bearer "))
                    .map(|s| s.to_string())
            });

        let user_id = match (token, req.app_data::<web::Data<JwtService>>()) {
            (Some(token), Some(jwt_service)) => jwt_service
                .verify_token(&token)
                .ok()
                .and_then(|claims| Uuid::parse_str(&claims.sub).ok()),
            _ => None,
        };

        ok(MaybeUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::requires_auth;
    use actix_web::http::Method;

    #[test]
    fn predict_and_browsing_are_public() {
        assert!(!requires_auth(&Method::POST, "/api/predict/some-model-1a2b3c4d"));
        assert!(!requires_auth(&Method::GET, "/api/models"));
        assert!(!requires_auth(&Method::GET, "/api/models/some-model-1a2b3c4d"));
        assert!(!requires_auth(
            &Method::GET,
            "/api/models/some-model-1a2b3c4d/readme"
        ));
        assert!(!requires_auth(&Method::GET, "/api/health"));
        assert!(!requires_auth(&Method::GET, "/api/auth/google"));
        assert!(!requires_auth(&Method::GET, "/api/auth/google/callback"));
        assert!(!requires_auth(&Method::POST, "/api/auth/logout"));
    }

    #[test]
    fn cors_preflight_is_never_gated() {
        assert!(!requires_auth(&Method::OPTIONS, "/api/models"));
        assert!(!requires_auth(&Method::OPTIONS, "/api/models/mine"));
        assert!(!requires_auth(&Method::OPTIONS, "/api/models/some-model-1a2b3c4d"));
        assert!(!requires_auth(&Method::OPTIONS, "/api/auth/me"));
    }

    #[test]
    fn mutations_and_private_views_need_a_session() {
        assert!(requires_auth(&Method::POST, "/api/models"));
        assert!(requires_auth(&Method::GET, "/api/models/mine"));
        assert!(requires_auth(&Method::DELETE, "/api/models/some-model-1a2b3c4d"));
        assert!(requires_auth(&Method::PATCH, "/api/models/some-model-1a2b3c4d"));
        assert!(requires_auth(&Method::GET, "/api/auth/me"));
    }
}
