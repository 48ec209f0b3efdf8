use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::error::ApiError;
use crate::state::AppState;
use crate::token::INVALID_TOKEN;

/// Verifies the bearer token and stores the caller as a `Principal`
/// extension for the handler.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::auth(INVALID_TOKEN))?;

    let principal = state.auth.tokens().principal(bearer.token())?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
