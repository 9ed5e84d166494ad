use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// JSON body for `PUT /items/:id`. `sellerId`, if sent, is ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// One uploaded image from a multipart body.
#[derive(Debug)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Raw text fields and files from the create-item form, before validation.
#[derive(Debug, Default)]
pub struct ItemForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub files: Vec<UploadItem>,
}
