use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub item_id: Uuid,
    pub author_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub item_id: Uuid,
    pub author_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}
