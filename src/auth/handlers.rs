use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{SigninRequest, SigninResponse, SignupRequest, SignupResponse},
        password::{hash_password_async, verify_password_async},
    },
    error::ApiError,
    state::AppState,
    users::repo_types::NewUser,
    validation::{normalize_email, required},
};

const MIN_PASSWORD_LEN: usize = 8;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let Json(payload) = payload?;
    let username = required(payload.username, "username")?;
    let email = normalize_email(&required(payload.email, "email")?)?;
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("password is required"))?;

    if password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ApiError::bad_request("Password too short"));
    }

    if state.store.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(ApiError::Conflict("User already exists with that email.".into()));
    }

    let password_hash = hash_password_async(password).await?;
    let user = state
        .store
        .create_user(NewUser {
            username,
            email,
            password_hash,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            id: user.id,
            username: user.username,
            email: user.email,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<SigninResponse>), ApiError> {
    let Json(payload) = payload?;
    let email = required(payload.email, "email")?.to_lowercase();
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("password is required"))?;

    let Some(user) = state.store.find_user_by_email(&email).await? else {
        warn!(email = %email, "signin unknown email");
        return Err(ApiError::bad_request("User not found."));
    };

    if !verify_password_async(password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "signin invalid password");
        return Err(ApiError::bad_request("Invalid password."));
    }

    let token = state.jwt.sign(user.id)?;
    let mut headers = HeaderMap::new();
    headers.insert(
        "auth-token",
        HeaderValue::from_str(&token).map_err(anyhow::Error::from)?,
    );

    info!(user_id = %user.id, "user signed in");
    Ok((
        headers,
        Json(SigninResponse {
            token,
            expires_in: state.jwt.ttl().as_secs(),
        }),
    ))
}
