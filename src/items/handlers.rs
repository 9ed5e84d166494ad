use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{MessageResponse, UpdateItemRequest};
use super::services::{read_item_form, remove_images, upload_images};
use crate::{
    auth::AuthUser,
    error::ApiError,
    items::repo_types::{Item, ItemFilter, ItemPatch, NewItem},
    policy::{authorize_item, ItemAction},
    state::AppState,
    validation::{check_price, optional_non_blank, parse_price, path_id, required},
};

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/", get(list_items))
        .route("/items/:id", get(get_item).put(update_item).delete(delete_item))
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/items/create", post(create_item))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

/// POST /items/create (multipart): title, description, price, category, image files.
#[instrument(skip(state, mp))]
pub async fn create_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<Json<Item>, ApiError> {
    authorize_item(Some(user_id), None, ItemAction::Create)?;

    let form = read_item_form(mp?).await?;
    let title = required(form.title, "title")?;
    let description = required(form.description, "description")?;
    let price = parse_price(&required(form.price, "price")?, "price")?;
    let category = required(form.category, "category")?;

    let images = upload_images(&state, user_id, form.files).await?;
    let created = state
        .store
        .create_item(NewItem {
            title,
            description,
            price,
            category,
            seller_id: user_id,
            images: images.clone(),
        })
        .await;
    let item = match created {
        Ok(item) => item,
        Err(e) => {
            remove_images(&state, &images).await;
            return Err(e.into());
        }
    };

    info!(item_id = %item.id, seller_id = %item.seller_id, "item created");
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    let id = path_id(&id, "Item")?;
    let item = state.store.find_item(id).await?;
    authorize_item(None, item.as_ref(), ItemAction::Read)?;
    item.map(Json).ok_or_else(|| ApiError::not_found("Item not found"))
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    filter: Result<Query<ItemFilter>, QueryRejection>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let Query(filter) = filter?;
    let filter = filter.normalized();
    filter.min_price.map(|p| check_price(p, "minPrice")).transpose()?;
    filter.max_price.map(|p| check_price(p, "maxPrice")).transpose()?;
    let items = state.store.list_items(&filter).await?;
    Ok(Json(items))
}

#[instrument(skip(state, payload))]
pub async fn update_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let id = path_id(&id, "Item")?;
    let Json(payload) = payload?;

    let item = state.store.find_item(id).await?;
    authorize_item(Some(user_id), item.as_ref(), ItemAction::Update)?;

    let patch = ItemPatch {
        title: optional_non_blank(payload.title, "title")?,
        description: optional_non_blank(payload.description, "description")?,
        price: payload.price.map(|p| check_price(p, "price")).transpose()?,
        category: optional_non_blank(payload.category, "category")?,
        images: payload.images,
    };

    let updated = state
        .store
        .update_item(id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    info!(item_id = %updated.id, "item updated");
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = path_id(&id, "Item")?;
    let item = state.store.find_item(id).await?;
    authorize_item(Some(user_id), item.as_ref(), ItemAction::Delete)?;

    if !state.store.delete_item(id).await? {
        return Err(ApiError::not_found("Item not found"));
    }
    if let Some(item) = item {
        remove_images(&state, &item.images).await;
    }

    info!(item_id = %id, "item deleted");
    Ok(Json(MessageResponse {
        message: "Item deleted".into(),
    }))
}
