use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: Option<i32>,
    pub comment: Option<String>,
}
