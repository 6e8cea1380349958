use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use std::net::SocketAddr;

use crate::{
    db::{operations::store_error_response, Filter},
    middleware::auth::AuthUser,
    state::AppState,
    structure::users::{LoginRequest, LoginResponse, SignupRequest, User, VerifyResponse},
    utils::{error_response, jwt, now_timestamp, password, rate_limit, success_response},
};

pub async fn signup_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(msg) = rate_limit::check_signup_rate_limit(&addr) {
        tracing::warn!(ip = %addr.ip(), "Signup rate limit exceeded");
        return error_response(StatusCode::TOO_MANY_REQUESTS, &msg);
    }

    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let Some((email, plain)) = payload.credentials() else {
        return error_response(StatusCode::BAD_REQUEST, "Email and password required");
    };

    let users = match state.store.collection("USERS") {
        Ok(users) => users,
        Err(e) => return store_error_response(&e),
    };

    match users.find_one(&Filter::eq("email", email.as_str())).await {
        Ok(Some(_)) => return error_response(StatusCode::CONFLICT, "User already exists"),
        Ok(None) => {}
        Err(e) => return store_error_response(&e),
    }

    let password_hash = match password::hash_password(plain, state.config.password_hash_cost) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!(error = %e, "Password hashing failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password");
        }
    };

    let user = User {
        id: None,
        email,
        password_hash,
        created_at: now_timestamp(),
    };
    let doc = match serde_json::to_value(&user) {
        Ok(serde_json::Value::Object(doc)) => doc,
        _ => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode user"),
    };

    match users.insert_one(&doc).await {
        Ok(id) => {
            tracing::info!(user_id = %id, "User created");
            success_response(
                StatusCode::CREATED,
                json!({"message": "User created successfully"}),
            )
        }
        Err(e) => {
            // unique index caught a concurrent signup for the same email
            if let Ok(Some(_)) = users.find_one(&Filter::eq("email", user.email.as_str())).await {
                return error_response(StatusCode::CONFLICT, "User already exists");
            }
            store_error_response(&e)
        }
    }
}

pub async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> impl IntoResponse {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let Some((email, plain)) = payload.credentials() else {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid credentials");
    };

    let users = match state.store.collection("USERS") {
        Ok(users) => users,
        Err(e) => return store_error_response(&e),
    };

    let user: User = match users.find_one(&Filter::eq("email", email.as_str())).await {
        Ok(Some(doc)) => match serde_json::from_value(serde_json::Value::Object(doc)) {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(error = %e, "Stored user document is malformed");
                return error_response(StatusCode::UNAUTHORIZED, "Invalid credentials");
            }
        },
        Ok(None) => return error_response(StatusCode::UNAUTHORIZED, "Invalid credentials"),
        Err(e) => return store_error_response(&e),
    };

    let valid = match password::verify_password(plain, &user.password_hash) {
        Ok(is_valid) => is_valid,
        Err(_) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Password verification failed",
            );
        }
    };

    if !valid {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    match jwt::create_jwt(&user.email, &state.config.jwt_secret) {
        Ok(token) => success_response(StatusCode::OK, LoginResponse { token }),
        Err(e) => {
            tracing::error!(error = %e, "Token creation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create token")
        }
    }
}

pub async fn verify_handler(user: AuthUser) -> impl IntoResponse {
    success_response(
        StatusCode::OK,
        VerifyResponse {
            valid: true,
            email: user.email,
        },
    )
}
