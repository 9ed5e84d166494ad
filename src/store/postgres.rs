use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{MarketStore, StoreError, StoreResult};
use crate::{
    items::repo_types::{Item, ItemFilter, ItemPatch, NewItem},
    reviews::repo_types::{NewReview, Review},
    transactions::repo_types::{
        NewTransaction, RoleFilter, Transaction, TransactionRow, TransactionStatus,
    },
    users::repo_types::{NewUser, User, UserPatch},
};

const USER_COLUMNS: &str = "id, username, email, password_hash, profile_info, created_at";
const ITEM_COLUMNS: &str =
    "id, title, description, price, category, seller_id, images, created_at, updated_at";
const TX_COLUMNS: &str =
    "id, item_id, buyer_id, seller_id, quantity, total_price, status, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

fn map_unique(err: sqlx::Error, field: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(field),
        _ => StoreError::Backend(anyhow::Error::new(err)),
    }
}

/// `%term%` for ILIKE with the wildcard characters in `term` escaped.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn push_item_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ItemFilter) {
    qb.push(" WHERE TRUE");
    if let Some(category) = &filter.category {
        qb.push(" AND i.category = ").push_bind(category.clone());
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND i.price >= ").push_bind(min);
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND i.price <= ").push_bind(max);
    }
    if let Some(title) = &filter.title {
        qb.push(" AND i.title ILIKE ").push_bind(like_pattern(title));
    }
    if let Some(author) = &filter.author {
        qb.push(" AND u.username ILIKE ").push_bind(like_pattern(author));
    }
}

#[async_trait]
impl MarketStore for PgStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique(e, "email"))
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.db)
                .await
                .context("find user by email")?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET username     = COALESCE($2, username),
                   email        = COALESCE($3, email),
                   profile_info = COALESCE($4, profile_info)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.username)
        .bind(patch.email)
        .bind(patch.profile_info)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_unique(e, "email"))
    }

    async fn create_item(&self, new: NewItem) -> StoreResult<Item> {
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (title, description, price, category, seller_id, images)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.price)
        .bind(&new.category)
        .bind(new.seller_id)
        .bind(&new.images)
        .fetch_one(&self.db)
        .await
        .context("insert item")?;
        Ok(item)
    }

    async fn find_item(&self, id: Uuid) -> StoreResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find item")?;
        Ok(item)
    }

    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT i.id, i.title, i.description, i.price, i.category, i.seller_id, i.images, \
             i.created_at, i.updated_at FROM items i JOIN users u ON u.id = i.seller_id",
        );
        push_item_filter(&mut qb, filter);
        qb.push(" ORDER BY i.created_at DESC");
        let rows = qb
            .build_query_as::<Item>()
            .fetch_all(&self.db)
            .await
            .context("list items")?;
        Ok(rows)
    }

    async fn update_item(&self, id: Uuid, patch: ItemPatch) -> StoreResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
               SET title       = COALESCE($2, title),
                   description = COALESCE($3, description),
                   price       = COALESCE($4, price),
                   category    = COALESCE($5, category),
                   images      = COALESCE($6, images),
                   updated_at  = now()
             WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.price)
        .bind(patch.category)
        .bind(patch.images)
        .fetch_optional(&self.db)
        .await
        .context("update item")?;
        Ok(item)
    }

    async fn delete_item(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete item")?;
        Ok(res.rows_affected() > 0)
    }

    async fn create_transaction(&self, new: NewTransaction) -> StoreResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (item_id, buyer_id, seller_id, quantity, total_price, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(new.item_id)
        .bind(new.buyer_id)
        .bind(new.seller_id)
        .bind(new.quantity)
        .bind(new.total_price)
        .bind(TransactionStatus::Pending.as_str())
        .fetch_one(&self.db)
        .await
        .context("insert transaction")?;
        Ok(Transaction::try_from(row)?)
    }

    async fn find_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find transaction")?;
        Ok(row.map(Transaction::try_from).transpose()?)
    }

    async fn list_transactions(&self, user_id: Uuid, role: RoleFilter) -> StoreResult<Vec<Transaction>> {
        let predicate = match role {
            RoleFilter::Buyer => "buyer_id = $1",
            RoleFilter::Seller => "seller_id = $1",
            RoleFilter::Either => "(buyer_id = $1 OR seller_id = $1)",
        };
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE {predicate} ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list transactions")?;
        let txs = rows
            .into_iter()
            .map(Transaction::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(txs)
    }

    async fn update_transaction_status(
        &self,
        id: Uuid,
        status: TransactionStatus,
    ) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
               SET status = $2, updated_at = now()
             WHERE id = $1
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.db)
        .await
        .context("update transaction status")?;
        Ok(row.map(Transaction::try_from).transpose()?)
    }

    async fn create_review(&self, new: NewReview) -> StoreResult<Review> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (item_id, author_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            RETURNING id, item_id, author_id, rating, comment, created_at
            "#,
        )
        .bind(new.item_id)
        .bind(new.author_id)
        .bind(new.rating)
        .bind(new.comment)
        .fetch_one(&self.db)
        .await
        .context("insert review")?;
        Ok(review)
    }

    async fn list_reviews(&self, item_id: Uuid) -> StoreResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, Review>(
            r#"
            SELECT id, item_id, author_id, rating, comment, created_at
              FROM reviews
             WHERE item_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.db)
        .await
        .context("list reviews")?;
        Ok(rows)
    }
}
