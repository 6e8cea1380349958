use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::utils::{error_response, jwt};

/// Caller identified by a valid token in the `Authorization` header.
#[derive(Debug, Deserialize, Serialize)]
pub struct AuthUser {
    pub email: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        jwt::authenticate(auth_header, &state.config.jwt_secret)
            .map(|email| AuthUser { email })
            .map_err(|rejection| error_response(StatusCode::UNAUTHORIZED, rejection.message()))
    }
}
