//! Audit logging middleware.
//!
//! Records actor, method, path and response status for every authenticated
//! request. Runs innermost, after the auth layer has injected the principal.

use axum::extract::OriginalUri;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, PrincipalContext};

/// `patient:<id>` or `doctor:<id>`.
fn actor_label(ctx: &PrincipalContext) -> String {
    format!("{}:{}", ctx.principal.kind(), ctx.principal.id())
}

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Nested routers see the stripped path
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();
    let actor = req
        .extensions()
        .get::<PrincipalContext>()
        .map(actor_label)
        .unwrap_or_else(|| "anonymous".to_string());

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        ctx.core
            .log_access(&actor, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
