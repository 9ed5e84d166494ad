use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser,
    error::ApiError,
    policy::{authorize_profile, ProfileAction},
    state::AppState,
    users::{
        dto::{ProfileResponse, PublicProfile, UpdateProfileRequest},
        repo_types::UserPatch,
    },
    validation::{normalize_email, optional_non_blank, path_id},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/profile", get(get_own_profile))
        .route("/user/profile/:id", get(get_public_profile))
        .route("/user/:id", put(update_profile))
}

#[instrument(skip(state))]
pub async fn get_own_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state.store.find_user(user_id).await?;
    authorize_profile(Some(user_id), user.as_ref(), ProfileAction::ReadOwn)?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn get_public_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicProfile>, ApiError> {
    let id = path_id(&id, "User")?;
    let user = state.store.find_user(id).await?;
    authorize_profile(None, user.as_ref(), ProfileAction::ReadPublic)?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let id = path_id(&id, "User")?;
    let Json(payload) = payload?;

    let target = state.store.find_user(id).await?;
    authorize_profile(Some(caller), target.as_ref(), ProfileAction::Update)?;

    let email = optional_non_blank(payload.email, "email")?
        .map(|e| normalize_email(&e))
        .transpose()?;
    let patch = UserPatch {
        username: optional_non_blank(payload.username, "username")?,
        email,
        profile_info: payload.profile_info,
    };

    let updated = state
        .store
        .update_user(id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = %updated.id, "profile updated");
    Ok(Json(updated.into()))
}
