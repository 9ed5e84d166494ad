//! Authorization rules for every resource.
//!
//! Each rule takes the caller (absent for anonymous requests), the resource as
//! loaded from storage (absent if it does not exist) and the requested action.
//! Checks run in a fixed order: authentication, existence, ownership. A missing
//! resource is reported as "not found" even when the caller would also fail
//! the ownership check.

use tracing::warn;
use uuid::Uuid;

use crate::{
    error::ApiError, items::repo_types::Item, transactions::repo_types::Transaction,
    users::repo_types::User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileAction {
    ReadOwn,
    ReadPublic,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Create,
    Read,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Create,
    List,
}

fn authenticated(caller: Option<Uuid>) -> Result<Uuid, ApiError> {
    caller.ok_or_else(|| ApiError::Unauthenticated("Access token required".into()))
}

fn found<'a, T>(resource: Option<&'a T>, what: &str) -> Result<&'a T, ApiError> {
    resource.ok_or_else(|| ApiError::not_found(format!("{what} not found")))
}

fn owned_by(caller: Uuid, owner: Uuid, action: &str) -> Result<(), ApiError> {
    if caller != owner {
        warn!(%caller, %owner, action, "ownership check failed");
        return Err(ApiError::forbidden(format!("Not allowed to {action}")));
    }
    Ok(())
}

pub fn authorize_profile(
    caller: Option<Uuid>,
    target: Option<&User>,
    action: ProfileAction,
) -> Result<(), ApiError> {
    match action {
        ProfileAction::ReadPublic => {
            found(target, "User")?;
        }
        ProfileAction::ReadOwn => {
            let caller = authenticated(caller)?;
            let user = found(target, "User")?;
            owned_by(caller, user.id, "read this profile")?;
        }
        ProfileAction::Update => {
            let caller = authenticated(caller)?;
            let user = found(target, "User")?;
            owned_by(caller, user.id, "update this profile")?;
        }
    }
    Ok(())
}

/// `item` is ignored for `Create`; the new item's seller is always the caller.
pub fn authorize_item(
    caller: Option<Uuid>,
    item: Option<&Item>,
    action: ItemAction,
) -> Result<(), ApiError> {
    match action {
        ItemAction::Create => {
            authenticated(caller)?;
        }
        ItemAction::Read => {
            found(item, "Item")?;
        }
        ItemAction::Update => {
            let caller = authenticated(caller)?;
            let item = found(item, "Item")?;
            owned_by(caller, item.seller_id, "edit this item")?;
        }
        ItemAction::Delete => {
            let caller = authenticated(caller)?;
            let item = found(item, "Item")?;
            owned_by(caller, item.seller_id, "delete this item")?;
        }
    }
    Ok(())
}

pub fn authorize_review(
    caller: Option<Uuid>,
    item: Option<&Item>,
    action: ReviewAction,
) -> Result<(), ApiError> {
    if action == ReviewAction::Create {
        authenticated(caller)?;
    }
    found(item, "Item")?;
    Ok(())
}

/// The caller becomes the buyer and must not be the item's seller.
pub fn authorize_purchase(caller: Option<Uuid>, item: Option<&Item>) -> Result<(), ApiError> {
    let buyer = authenticated(caller)?;
    let item = found(item, "Item")?;
    if item.seller_id == buyer {
        warn!(%buyer, item_id = %item.id, "self-purchase rejected");
        return Err(ApiError::bad_request("You cannot buy your own item"));
    }
    Ok(())
}

/// History is only ever served for the caller's own id. `subject` is `None`
/// when the path did not hold a valid id.
pub fn authorize_history(caller: Option<Uuid>, subject: Option<Uuid>) -> Result<(), ApiError> {
    let caller = authenticated(caller)?;
    match subject {
        Some(subject) => owned_by(caller, subject, "view these transactions"),
        None => Err(ApiError::forbidden("Not allowed to view these transactions")),
    }
}

/// Only the buyer of record may move a transaction's status. The seller is
/// refused like any other third party.
pub fn authorize_status_change(
    caller: Option<Uuid>,
    tx: Option<&Transaction>,
) -> Result<(), ApiError> {
    let caller = authenticated(caller)?;
    let tx = found(tx, "Transaction")?;
    owned_by(caller, tx.buyer_id, "update this transaction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::repo_types::TransactionStatus;
    use axum::http::StatusCode;
    use time::OffsetDateTime;

    fn status(r: Result<(), ApiError>) -> StatusCode {
        match r {
            Ok(()) => StatusCode::OK,
            Err(e) => e.status(),
        }
    }

    fn user(id: Uuid) -> User {
        User {
            id,
            username: "u".into(),
            email: "u@x.io".into(),
            password_hash: "h".into(),
            profile_info: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn item(seller: Uuid) -> Item {
        let now = OffsetDateTime::now_utc();
        Item {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: "d".into(),
            price: 1.0,
            category: "c".into(),
            seller_id: seller,
            images: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn tx(buyer: Uuid, seller: Uuid) -> Transaction {
        let now = OffsetDateTime::now_utc();
        Transaction {
            id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            buyer_id: buyer,
            seller_id: seller,
            quantity: 1,
            total_price: 1.0,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn profile_rules() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let ua = user(a);
        assert_eq!(status(authorize_profile(None, Some(&ua), ProfileAction::ReadPublic)), StatusCode::OK);
        assert_eq!(status(authorize_profile(None, None, ProfileAction::ReadPublic)), StatusCode::NOT_FOUND);
        assert_eq!(status(authorize_profile(None, Some(&ua), ProfileAction::ReadOwn)), StatusCode::UNAUTHORIZED);
        assert_eq!(status(authorize_profile(Some(a), None, ProfileAction::ReadOwn)), StatusCode::NOT_FOUND);
        assert_eq!(status(authorize_profile(Some(a), Some(&ua), ProfileAction::Update)), StatusCode::OK);
        assert_eq!(status(authorize_profile(Some(b), Some(&ua), ProfileAction::Update)), StatusCode::FORBIDDEN);
        assert_eq!(status(authorize_profile(None, Some(&ua), ProfileAction::Update)), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn item_rules() {
        let (owner, other) = (Uuid::new_v4(), Uuid::new_v4());
        let it = item(owner);
        assert_eq!(status(authorize_item(None, None, ItemAction::Create)), StatusCode::UNAUTHORIZED);
        assert_eq!(status(authorize_item(Some(other), None, ItemAction::Create)), StatusCode::OK);
        assert_eq!(status(authorize_item(None, Some(&it), ItemAction::Read)), StatusCode::OK);
        assert_eq!(status(authorize_item(None, None, ItemAction::Read)), StatusCode::NOT_FOUND);
        for action in [ItemAction::Update, ItemAction::Delete] {
            assert_eq!(status(authorize_item(Some(owner), Some(&it), action)), StatusCode::OK);
            assert_eq!(status(authorize_item(Some(other), Some(&it), action)), StatusCode::FORBIDDEN);
            assert_eq!(status(authorize_item(None, Some(&it), action)), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn missing_resource_wins_over_ownership() {
        let stranger = Uuid::new_v4();
        assert_eq!(status(authorize_item(Some(stranger), None, ItemAction::Delete)), StatusCode::NOT_FOUND);
        assert_eq!(status(authorize_status_change(Some(stranger), None)), StatusCode::NOT_FOUND);
    }

    #[test]
    fn review_rules() {
        let it = item(Uuid::new_v4());
        assert_eq!(status(authorize_review(None, Some(&it), ReviewAction::List)), StatusCode::OK);
        assert_eq!(status(authorize_review(None, Some(&it), ReviewAction::Create)), StatusCode::UNAUTHORIZED);
        assert_eq!(status(authorize_review(Some(Uuid::new_v4()), None, ReviewAction::Create)), StatusCode::NOT_FOUND);
    }

    #[test]
    fn purchase_rules() {
        let (seller, buyer) = (Uuid::new_v4(), Uuid::new_v4());
        let it = item(seller);
        assert_eq!(status(authorize_purchase(Some(buyer), Some(&it))), StatusCode::OK);
        assert_eq!(status(authorize_purchase(Some(seller), Some(&it))), StatusCode::BAD_REQUEST);
        assert_eq!(status(authorize_purchase(Some(buyer), None)), StatusCode::NOT_FOUND);
        assert_eq!(status(authorize_purchase(None, Some(&it))), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn history_is_self_only() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(status(authorize_history(Some(a), Some(a))), StatusCode::OK);
        assert_eq!(status(authorize_history(Some(a), Some(b))), StatusCode::FORBIDDEN);
        assert_eq!(status(authorize_history(Some(a), None)), StatusCode::FORBIDDEN);
        assert_eq!(status(authorize_history(None, Some(a))), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn only_the_buyer_changes_status() {
        let (buyer, seller, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let t = tx(buyer, seller);
        assert_eq!(status(authorize_status_change(Some(buyer), Some(&t))), StatusCode::OK);
        assert_eq!(status(authorize_status_change(Some(seller), Some(&t))), StatusCode::FORBIDDEN);
        assert_eq!(status(authorize_status_change(Some(other), Some(&t))), StatusCode::FORBIDDEN);
    }
}
