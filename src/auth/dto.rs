use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for sign-up. Fields are optional so a missing one is reported
/// as a validation error rather than a body parse failure.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Created account as returned to the client; never includes the hash.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninResponse {
    pub token: String,
    pub expires_in: u64,
}
