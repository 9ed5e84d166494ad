use anyhow::Context;
use axum::extract::Multipart;
use tracing::warn;
use uuid::Uuid;

use super::dto::{ItemForm, UploadItem};
use crate::{error::ApiError, state::AppState};

/// Collects the create-item form. Unknown fields (including any `sellerId`)
/// are dropped on the floor.
pub async fn read_item_form(mut mp: Multipart) -> Result<ItemForm, ApiError> {
    let mut form = ItemForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" | "images" | "images[]" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                if !body.is_empty() {
                    form.files.push(UploadItem { body, content_type });
                }
            }
            "title" | "description" | "price" | "category" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                let slot = match name.as_str() {
                    "title" => &mut form.title,
                    "description" => &mut form.description,
                    "price" => &mut form.price,
                    _ => &mut form.category,
                };
                *slot = Some(text);
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Uploads every image and returns their public URLs in input order.
/// All or nothing: if one upload fails, the ones before it are removed.
pub async fn upload_images(
    st: &AppState,
    seller_id: Uuid,
    images: Vec<UploadItem>,
) -> anyhow::Result<Vec<String>> {
    let mut urls = Vec::with_capacity(images.len());
    for img in images {
        let ext = ext_from_mime(&img.content_type).unwrap_or("bin");
        let key = format!("items/{}/{}.{}", seller_id, Uuid::new_v4(), ext);
        let put = st
            .storage
            .put_object(&key, img.body, &img.content_type)
            .await
            .with_context(|| format!("put_object {}", key));
        if let Err(e) = put {
            remove_images(st, &urls).await;
            return Err(e);
        }
        urls.push(st.storage.public_url(&key));
    }
    Ok(urls)
}

/// Best effort: a failed delete leaves an orphaned object, nothing more.
pub async fn remove_images(st: &AppState, urls: &[String]) {
    for url in urls {
        let Some(key) = st.storage.key_from_url(url) else {
            continue;
        };
        if let Err(e) = st.storage.delete_object(&key).await {
            warn!(error = %e, key = %key, "could not delete item image");
        }
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
