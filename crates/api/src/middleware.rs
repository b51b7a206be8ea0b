use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AuthState {
    pub api_key: Arc<String>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = extract_api_key(req.headers())?;

    if presented != state.api_key.as_str() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}

fn extract_api_key(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers.get(API_KEY_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;

    let key = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
    if key.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(key)
}
