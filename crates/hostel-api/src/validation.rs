use uuid::Uuid;

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot in the
/// domain with something on both sides of it.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn check_password(password: &str, message: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(message));
    }
    Ok(())
}

/// Trimmed value, or `None` when blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Path and query ids are taken as strings so that a malformed id reads as
/// "not found" rather than a framework rejection.
pub fn parse_id(raw: &str) -> Option<Uuid> {
    raw.trim().parse().ok()
}
