use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MarketStore, StoreError, StoreResult};
use crate::{
    items::repo_types::{Item, ItemFilter, ItemPatch, NewItem},
    reviews::repo_types::{NewReview, Review},
    transactions::repo_types::{NewTransaction, RoleFilter, Transaction, TransactionStatus},
    users::repo_types::{NewUser, User, UserPatch},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    items: HashMap<Uuid, Item>,
    transactions: HashMap<Uuid, Transaction>,
    reviews: HashMap<Uuid, Review>,
}

/// Process-local store. Used for `STORE_BACKEND=memory` and in tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> OffsetDateTime) {
    rows.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate("email"));
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            profile_info: None,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        let mut t = self.tables.write().await;
        if let Some(email) = &patch.email {
            if t.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Duplicate("email"));
            }
        }
        Ok(t.users.get_mut(&id).map(|u| {
            u.apply(patch);
            u.clone()
        }))
    }

    async fn create_item(&self, new: NewItem) -> StoreResult<Item> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&new.seller_id) {
            return Err(anyhow::anyhow!("seller {} does not exist", new.seller_id).into());
        }
        let now = OffsetDateTime::now_utc();
        let item = Item {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            price: new.price,
            category: new.category,
            seller_id: new.seller_id,
            images: new.images,
            created_at: now,
            updated_at: now,
        };
        t.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn find_item(&self, id: Uuid) -> StoreResult<Option<Item>> {
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>> {
        let t = self.tables.read().await;
        let mut rows: Vec<Item> = t
            .items
            .values()
            .filter(|item| {
                let seller = t
                    .users
                    .get(&item.seller_id)
                    .map(|u| u.username.as_str())
                    .unwrap_or_default();
                filter.matches(item, seller)
            })
            .cloned()
            .collect();
        newest_first(&mut rows, |i| i.created_at);
        Ok(rows)
    }

    async fn update_item(&self, id: Uuid, patch: ItemPatch) -> StoreResult<Option<Item>> {
        let mut t = self.tables.write().await;
        Ok(t.items.get_mut(&id).map(|item| {
            item.apply(patch, OffsetDateTime::now_utc());
            item.clone()
        }))
    }

    async fn delete_item(&self, id: Uuid) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let removed = t.items.remove(&id).is_some();
        if removed {
            t.reviews.retain(|_, r| r.item_id != id);
        }
        Ok(removed)
    }

    async fn create_transaction(&self, new: NewTransaction) -> StoreResult<Transaction> {
        let mut t = self.tables.write().await;
        for user_id in [new.buyer_id, new.seller_id] {
            if !t.users.contains_key(&user_id) {
                return Err(anyhow::anyhow!("user {} does not exist", user_id).into());
            }
        }
        let now = OffsetDateTime::now_utc();
        let tx = Transaction {
            id: Uuid::new_v4(),
            item_id: new.item_id,
            buyer_id: new.buyer_id,
            seller_id: new.seller_id,
            quantity: new.quantity,
            total_price: new.total_price,
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        t.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn find_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        Ok(self.tables.read().await.transactions.get(&id).cloned())
    }

    async fn list_transactions(&self, user_id: Uuid, role: RoleFilter) -> StoreResult<Vec<Transaction>> {
        let t = self.tables.read().await;
        let mut rows: Vec<Transaction> = t
            .transactions
            .values()
            .filter(|tx| role.matches(tx, user_id))
            .cloned()
            .collect();
        newest_first(&mut rows, |tx| tx.created_at);
        Ok(rows)
    }

    async fn update_transaction_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> StoreResult<Option<Transaction>> {
        let mut t = self.tables.write().await;
        Ok(t.transactions.get_mut(&id).map(|tx| {
            tx.status = status;
            tx.updated_at = OffsetDateTime::now_utc();
            tx.clone()
        }))
    }

    async fn create_review(&self, new: NewReview) -> StoreResult<Review> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&new.author_id) {
            return Err(anyhow::anyhow!("author {} does not exist", new.author_id).into());
        }
        if !t.items.contains_key(&new.item_id) {
            return Err(anyhow::anyhow!("item {} does not exist", new.item_id).into());
        }
        let review = Review {
            id: Uuid::new_v4(),
            item_id: new.item_id,
            author_id: new.author_id,
            rating: new.rating,
            comment: new.comment,
            created_at: OffsetDateTime::now_utc(),
        };
        t.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn list_reviews(&self, item_id: Uuid) -> StoreResult<Vec<Review>> {
        let t = self.tables.read().await;
        let mut rows: Vec<Review> = t
            .reviews
            .values()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |r| r.created_at);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.io", "a")).await.unwrap();
        let err = store.create_user(new_user("a@x.io", "b")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));
    }

    #[tokio::test]
    async fn update_user_rejects_email_taken_by_someone_else() {
        let store = MemoryStore::new();
        let a = store.create_user(new_user("a@x.io", "a")).await.unwrap();
        store.create_user(new_user("b@x.io", "b")).await.unwrap();
        let err = store
            .update_user(
                a.id,
                UserPatch {
                    email: Some("b@x.io".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        // Re-saving your own email is fine.
        let same = store
            .update_user(
                a.id,
                UserPatch {
                    email: Some("a@x.io".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(same.is_some());
    }

    #[tokio::test]
    async fn item_requires_existing_seller() {
        let store = MemoryStore::new();
        let res = store
            .create_item(NewItem {
                title: "t".into(),
                description: "d".into(),
                price: 1.0,
                category: "c".into(),
                seller_id: Uuid::new_v4(),
                images: vec![],
            })
            .await;
        assert!(matches!(res, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn list_items_filters_on_seller_username() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("a@x.io", "Alice")).await.unwrap();
        let bob = store.create_user(new_user("b@x.io", "bob")).await.unwrap();
        for seller in [alice.id, bob.id] {
            store
                .create_item(NewItem {
                    title: "lamp".into(),
                    description: "d".into(),
                    price: 3.0,
                    category: "home".into(),
                    seller_id: seller,
                    images: vec![],
                })
                .await
                .unwrap();
        }
        let filter = ItemFilter {
            author: Some("ali".into()),
            ..Default::default()
        };
        let rows = store.list_items(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].seller_id, alice.id);
    }

    #[tokio::test]
    async fn delete_item_reports_whether_anything_was_removed() {
        let store = MemoryStore::new();
        let alice = store.create_user(new_user("a@x.io", "a")).await.unwrap();
        let item = store
            .create_item(NewItem {
                title: "t".into(),
                description: "d".into(),
                price: 1.0,
                category: "c".into(),
                seller_id: alice.id,
                images: vec![],
            })
            .await
            .unwrap();
        assert!(store.delete_item(item.id).await.unwrap());
        assert!(!store.delete_item(item.id).await.unwrap());
        assert!(store.find_item(item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transaction_requires_existing_parties() {
        let store = MemoryStore::new();
        let seller = store.create_user(new_user("s@x.io", "s")).await.unwrap();
        let res = store
            .create_transaction(NewTransaction {
                item_id: Uuid::new_v4(),
                buyer_id: Uuid::new_v4(),
                seller_id: seller.id,
                quantity: 1,
                total_price: 1.0,
            })
            .await;
        assert!(matches!(res, Err(StoreError::Backend(_))));
        let rows = store.list_transactions(seller.id, RoleFilter::Either).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn review_requires_existing_author() {
        let store = MemoryStore::new();
        let seller = store.create_user(new_user("s@x.io", "s")).await.unwrap();
        let item = store
            .create_item(NewItem {
                title: "t".into(),
                description: "d".into(),
                price: 1.0,
                category: "c".into(),
                seller_id: seller.id,
                images: vec![],
            })
            .await
            .unwrap();
        let res = store
            .create_review(NewReview {
                item_id: item.id,
                author_id: Uuid::new_v4(),
                rating: 4,
                comment: None,
            })
            .await;
        assert!(matches!(res, Err(StoreError::Backend(_))));
        assert!(store.list_reviews(item.id).await.unwrap().is_empty());
    }
}
