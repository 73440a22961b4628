use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::auth;
use crate::predict;
use crate::registry;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)))
        .service(
            web::resource("/api/predict/{slug}")
                .route(web::post().to(predict::routes::predict)),
        )
        .service(
            web::resource("/api/auth/google")
                .route(web::get().to(auth::routes::google_login_redirect)),
        )
        .service(
            web::resource("/api/auth/google/callback")
                .route(web::get().to(auth::routes::google_auth_callback)),
        )
        .service(web::resource("/api/auth/me").route(web::get().to(auth::routes::me)))
        .service(web::resource("/api/auth/logout").route(web::post().to(auth::routes::logout)))
        .service(
            web::resource("/api/models")
                .route(web::get().to(registry::routes::list_models))
                .route(web::post().to(registry::routes::upload_model)),
        )
        .service(
            web::resource("/api/models/mine").route(web::get().to(registry::routes::my_models)),
        )
        .service(
            web::resource("/api/models/{slug}")
                .route(web::get().to(registry::routes::get_model))
                .route(web::patch().to(registry::routes::update_visibility))
                .route(web::delete().to(registry::routes::delete_model)),
        )
        .service(
            web::resource("/api/models/{slug}/readme")
                .route(web::get().to(registry::routes::get_readme)),
        );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
