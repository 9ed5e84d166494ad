use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::CreateReviewRequest;
use crate::{
    auth::AuthUser,
    error::ApiError,
    policy::{authorize_review, ReviewAction},
    reviews::repo_types::{NewReview, Review},
    state::AppState,
    validation::path_id,
};

pub fn review_routes() -> Router<AppState> {
    Router::new().route("/items/:id/reviews", get(list_reviews).post(create_review))
}

#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let item_id = path_id(&id, "Item")?;
    let item = state.store.find_item(item_id).await?;
    authorize_review(None, item.as_ref(), ReviewAction::List)?;
    Ok(Json(state.store.list_reviews(item_id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let item_id = path_id(&id, "Item")?;
    let Json(payload) = payload?;
    let rating = payload
        .rating
        .ok_or_else(|| ApiError::bad_request("rating is required"))?;
    if !(1..=5).contains(&rating) {
        return Err(ApiError::bad_request("rating must be between 1 and 5"));
    }

    let item = state.store.find_item(item_id).await?;
    authorize_review(Some(user_id), item.as_ref(), ReviewAction::Create)?;

    let review = state
        .store
        .create_review(NewReview {
            item_id,
            author_id: user_id,
            rating,
            comment: payload
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        })
        .await?;

    info!(review_id = %review.id, %item_id, "review created");
    Ok((StatusCode::CREATED, Json(review)))
}
