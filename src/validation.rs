use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::error::ApiError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trimmed value of a required text field; absent or blank is a 400.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{field} is required")))
}

/// Like `required`, but absence is fine; only a present-but-blank value is rejected.
pub(crate) fn optional_non_blank(value: Option<String>, field: &str) -> Result<Option<String>, ApiError> {
    match value {
        None => Ok(None),
        Some(v) => required(Some(v), field).map(Some),
    }
}

pub(crate) fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    Ok(email)
}

pub(crate) fn check_price(price: f64, field: &str) -> Result<f64, ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::bad_request(format!("{field} must be a non-negative number")));
    }
    Ok(price)
}

pub(crate) fn parse_price(raw: &str, field: &str) -> Result<f64, ApiError> {
    let price = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ApiError::bad_request(format!("{field} must be a number")))?;
    check_price(price, field)
}

/// Path ids that are not UUIDs cannot name anything, so they read as "not found".
pub(crate) fn path_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::not_found(format!("{what} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.io"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.io"));
    }

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required(Some("  x ".into()), "title").unwrap(), "x");
        assert!(required(Some("   ".into()), "title").is_err());
        let err = required(None, "title").unwrap_err();
        assert_eq!(err.to_string(), "title is required");
    }

    #[test]
    fn optional_non_blank_allows_absence() {
        assert_eq!(optional_non_blank(None, "x").unwrap(), None);
        assert!(optional_non_blank(Some("".into()), "x").is_err());
    }

    #[test]
    fn prices() {
        assert_eq!(parse_price(" 50 ", "price").unwrap(), 50.0);
        assert!(parse_price("-1", "price").is_err());
        assert!(parse_price("NaN", "price").is_err());
        assert!(parse_price("cheap", "price").is_err());
    }

    #[test]
    fn malformed_path_id_is_not_found() {
        let err = path_id("nope", "Item").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
