use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{CreateTransactionRequest, HistoryQuery, UpdateStatusRequest};
use crate::{
    auth::AuthUser,
    error::ApiError,
    policy::{authorize_history, authorize_purchase, authorize_status_change},
    state::AppState,
    transactions::repo_types::{NewTransaction, RoleFilter, Transaction, TransactionStatus},
    validation::{check_price, path_id, required},
};

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", post(create_transaction))
        .route("/transactions/:id", get(list_history))
        .route("/transactions/:id/status", put(update_status))
}

#[instrument(skip(state, payload))]
pub async fn create_transaction(
    State(state): State<AppState>,
    AuthUser(buyer_id): AuthUser,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let Json(payload) = payload?;
    let item_id = required(payload.item_id, "itemId")?;
    let quantity = payload
        .quantity
        .ok_or_else(|| ApiError::bad_request("quantity is required"))?;
    if quantity < 1 {
        return Err(ApiError::bad_request("quantity must be at least 1"));
    }
    let total_price = payload
        .total_price
        .ok_or_else(|| ApiError::bad_request("totalPrice is required"))
        .and_then(|p| check_price(p, "totalPrice"))?;

    let item_id = path_id(&item_id, "Item")?;
    let item = state.store.find_item(item_id).await?;
    authorize_purchase(Some(buyer_id), item.as_ref())?;
    let item = item.ok_or_else(|| ApiError::not_found("Item not found"))?;

    let tx = state
        .store
        .create_transaction(NewTransaction {
            item_id: item.id,
            buyer_id,
            seller_id: item.seller_id,
            quantity,
            total_price,
        })
        .await?;

    info!(tx_id = %tx.id, %buyer_id, seller_id = %tx.seller_id, "transaction created");
    Ok((StatusCode::CREATED, Json(tx)))
}

/// GET /transactions/:id?role=buyer|seller. `:id` must be the caller's own id.
#[instrument(skip(state))]
pub async fn list_history(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let subject = Uuid::parse_str(id.trim()).ok();
    authorize_history(Some(caller), subject)?;

    let Query(query) = query?;
    let role = RoleFilter::parse(query.role.as_deref())
        .ok_or_else(|| ApiError::bad_request("role must be buyer or seller"))?;

    Ok(Json(state.store.list_transactions(caller, role).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Transaction>, ApiError> {
    let tx_id = path_id(&id, "Transaction")?;
    let Json(payload) = payload?;
    let status = required(payload.status, "status")?;
    let status = TransactionStatus::parse(&status)
        .ok_or_else(|| ApiError::bad_request("status must be pending, completed or cancelled"))?;

    let tx = state.store.find_transaction(tx_id).await?;
    authorize_status_change(Some(caller), tx.as_ref())?;

    let updated = state
        .store
        .update_transaction_status(tx_id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction not found"))?;

    info!(%tx_id, status = status.as_str(), "transaction status updated");
    Ok(Json(updated))
}
