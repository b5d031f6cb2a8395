//! Bearer token authentication and role guards.
//!
//! `require_auth` resolves `Authorization: Bearer <token>` to a principal and
//! injects `PrincipalContext`. The guards then narrow it to a `PatientContext`
//! or `DoctorContext` for the route tree they protect.

use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DoctorContext, PatientContext, PrincipalContext};
use crate::auth;
use crate::authorization::authorize;
use crate::models::enums::PrincipalKind;
use crate::models::Principal;

/// Extract the bearer token, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Require a valid token backed by a live session.
///
/// On success: injects `PrincipalContext` for the guard and handlers.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized)?;

    // Session lookup hits SQLite, keep it off the async workers
    let core = ctx.core.clone();
    let lookup_token = token.clone();
    let principal = tokio::task::spawn_blocking(move || -> Result<Principal, ApiError> {
        let conn = core.open_db()?;
        Ok(auth::authenticate(&conn, &core.tokens, &lookup_token)?)
    })
    .await??;

    req.extensions_mut()
        .insert(PrincipalContext { principal, token });

    Ok(next.run(req).await)
}

/// Allow patients only. Must run inside `require_auth`.
pub async fn require_patient(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_kind(req, next, PrincipalKind::Patient).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

/// Allow doctors only. Must run inside `require_auth`.
pub async fn require_doctor(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_kind(req, next, PrincipalKind::Doctor).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_kind(
    mut req: Request<axum::body::Body>,
    next: Next,
    required: PrincipalKind,
) -> Result<Response, ApiError> {
    let principal = req
        .extensions()
        .get::<PrincipalContext>()
        .map(|c| c.principal.clone())
        .ok_or(ApiError::Unauthorized)?;

    authorize(&principal, required)?;
    match principal {
        Principal::Patient(p) => {
            req.extensions_mut().insert(PatientContext(p));
        }
        Principal::Doctor(d) => {
            req.extensions_mut().insert(DoctorContext(d));
        }
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn bearer_token_requires_scheme() {
        assert_eq!(
            bearer_token(&headers("Bearer abc.def.ghi")).as_deref(),
            Some("abc.def.ghi")
        );
        assert!(bearer_token(&headers("Basic abc")).is_none());
        assert!(bearer_token(&headers("Bearer   ")).is_none());
        assert!(bearer_token(&HeaderMap::new()).is_none());
    }
}
