//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest account id accepted; ladder ids are 32-bit, Steam64 ids have 17 digits.
const MAX_ACCOUNT_ID_LEN: usize = 20;

/// Validates that a ladder account id is a non-empty string of ASCII digits.
///
/// # Examples
///
/// ```ignore
/// validate_account_id("123456789")  // Ok
/// validate_account_id(" 42 ")       // Ok - surrounding spaces are trimmed
/// validate_account_id("12ab")       // Err - not numeric
/// ```
pub fn validate_account_id(id: &str) -> Result<(), ValidationError> {
    let id = id.trim();
    if id.is_empty() || id.len() > MAX_ACCOUNT_ID_LEN {
        let mut err = ValidationError::new("account_id_length");
        err.message = Some(
            format!(
                "Account ID must be 1 to {MAX_ACCOUNT_ID_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("account_id_format");
        err.message = Some("Account ID must contain only digits".into());
        return Err(err);
    }

    Ok(())
}
