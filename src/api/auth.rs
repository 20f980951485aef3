use axum::{
    Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, SessionResponse};

/// Lets a request through only when it carries the configured admin key:
/// 1. `X-Api-Key` header
/// 2. `Authorization: Bearer <api_key>` header
///
/// Every admin request is rejected while no key is configured.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config().server.admin_api_key.as_deref() else {
        tracing::warn!("Admin request rejected: no admin key configured");
        return Err(ApiError::Unauthorized(
            "Admin access is not configured".to_string(),
        ));
    };

    match extract_api_key(&headers) {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => {
            tracing::Span::current().record("user_id", "admin");
            Ok(next.run(request).await)
        }
        Some(_) => Err(ApiError::Unauthorized("Invalid API key".to_string())),
        None => Err(ApiError::Unauthorized("Missing API key".to_string())),
    }
}

/// Extract API key from headers
fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(api_key) = headers.get("X-Api-Key")
        && let Ok(key_str) = api_key.to_str()
    {
        return Some(key_str.trim().to_string());
    }

    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    None
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// GET /admin/session
/// Only reachable through the admin middleware, so reaching it means the
/// caller is an administrator.
pub async fn session() -> Json<ApiResponse<SessionResponse>> {
    Json(ApiResponse::success(SessionResponse { admin: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn api_key_from_either_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Api-Key", HeaderValue::from_static("abc"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("abc"));

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer  xyz "));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("xyz"));

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic xyz"));
        assert_eq!(extract_api_key(&headers), None);
    }

    #[test]
    fn key_comparison() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }
}
