use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Purchase record. `seller_id` is a snapshot of the item's seller at creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub item_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i32,
    pub total_price: f64,
    pub status: TransactionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Raw row; `status` is stored as text.
#[derive(Debug, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub item_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i32,
    pub total_price: f64,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = anyhow::Error;

    fn try_from(r: TransactionRow) -> Result<Self, Self::Error> {
        let status = TransactionStatus::parse(&r.status)
            .ok_or_else(|| anyhow::anyhow!("unknown transaction status {:?} in row {}", r.status, r.id))?;
        Ok(Self {
            id: r.id,
            item_id: r.item_id,
            buyer_id: r.buyer_id,
            seller_id: r.seller_id,
            quantity: r.quantity,
            total_price: r.total_price,
            status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub item_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i32,
    pub total_price: f64,
}

/// Which side of a trade a history lookup covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    Buyer,
    Seller,
    Either,
}

impl RoleFilter {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(|s| s.trim().to_lowercase()) {
            None => Some(RoleFilter::Either),
            Some(s) if s.is_empty() => Some(RoleFilter::Either),
            Some(s) if s == "buyer" => Some(RoleFilter::Buyer),
            Some(s) if s == "seller" => Some(RoleFilter::Seller),
            Some(_) => None,
        }
    }

    pub fn matches(&self, tx: &Transaction, user_id: Uuid) -> bool {
        match self {
            RoleFilter::Buyer => tx.buyer_id == user_id,
            RoleFilter::Seller => tx.seller_id == user_id,
            RoleFilter::Either => tx.buyer_id == user_id || tx.seller_id == user_id,
        }
    }
}
