use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload. Carries nothing but the identity and its validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,   // user ID
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
}
