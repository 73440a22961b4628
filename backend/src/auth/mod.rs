pub mod google_service;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod routes;

/// Name of the httponly session cookie.
pub const SESSION_COOKIE: &str = "token";
