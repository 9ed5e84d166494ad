//! Persistence seam. Handlers talk to `dyn MarketStore`; the process picks the
//! Postgres or in-memory implementation at startup.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    items::repo_types::{Item, ItemFilter, ItemPatch, NewItem},
    reviews::repo_types::{NewReview, Review},
    transactions::repo_types::{NewTransaction, RoleFilter, Transaction, TransactionStatus},
    users::repo_types::{NewUser, User, UserPatch},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique column already holds this value.
    #[error("duplicate value for unique field {0}")]
    Duplicate(&'static str),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>>;

    async fn create_item(&self, new: NewItem) -> StoreResult<Item>;
    async fn find_item(&self, id: Uuid) -> StoreResult<Option<Item>>;
    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>>;
    async fn update_item(&self, id: Uuid, patch: ItemPatch) -> StoreResult<Option<Item>>;
    /// Returns `false` when nothing was deleted.
    async fn delete_item(&self, id: Uuid) -> StoreResult<bool>;

    async fn create_transaction(&self, new: NewTransaction) -> StoreResult<Transaction>;
    async fn find_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>>;
    async fn list_transactions(&self, user_id: Uuid, role: RoleFilter) -> StoreResult<Vec<Transaction>>;
    async fn update_transaction_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> StoreResult<Option<Transaction>>;

    async fn create_review(&self, new: NewReview) -> StoreResult<Review>;
    async fn list_reviews(&self, item_id: Uuid) -> StoreResult<Vec<Review>>;
}
