//! Common validation utilities for `validator` custom rules.

use validator::ValidationError;

/// Number of digits in a one-time password.
pub const OTP_LENGTH: usize = 6;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Rejects strings that are empty after trimming.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("blank", "Value must not be blank"))
    } else {
        Ok(())
    }
}

/// Usernames: 3-50 characters of letters, digits, `.`, `_` or `-`.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(error(
            "username_length",
            "Username must be between 3 and 50 characters",
        ));
    }
    if username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        Ok(())
    } else {
        Err(error(
            "username_charset",
            "Username may only contain letters, digits, '.', '_' and '-'",
        ))
    }
}

/// Phone numbers: digits with optional leading `+`, spaces and dashes; 7-15 digits.
pub fn validate_contact_number(number: &str) -> Result<(), ValidationError> {
    let trimmed = number.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
    {
        return Err(error(
            "contact_number_charset",
            "Contact number may only contain digits, spaces, dashes and a leading '+'",
        ));
    }
    let digits = body.chars().filter(char::is_ascii_digit).count();
    if (7..=15).contains(&digits) {
        Ok(())
    } else {
        Err(error(
            "contact_number_length",
            "Contact number must contain between 7 and 15 digits",
        ))
    }
}

/// One-time passwords are exactly six ASCII digits.
pub fn validate_otp_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == OTP_LENGTH && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(error("otp_format", "OTP must be a 6-digit code"))
    }
}
