use crate::error::{AppError, AppResult};
use lettre::Address;
use url::Url;

const MIN_PASSWORD_LENGTH: usize = 8;

pub fn required_text(field: &'static str, value: &str, max_chars: usize) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(field, format!("{field} is required")));
    }
    if trimmed.chars().count() > max_chars {
        return Err(AppError::validation(
            field,
            format!("{field} must be {max_chars} characters or less"),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max_chars: usize,
) -> AppResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => required_text(field, text, max_chars).map(Some),
    }
}

/// Parses the address and lowercases its domain part.
pub fn normalize_email(value: &str) -> AppResult<String> {
    let address = value
        .trim()
        .parse::<Address>()
        .map_err(|_| AppError::validation("email", "invalid email address"))?;
    let normalized = format!("{}@{}", address.user(), address.domain().to_lowercase());
    required_text("email", &normalized, 255)
}

pub fn validate_password(password: &str, confirm: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(
            "password",
            format!("password must be at least {MIN_PASSWORD_LENGTH} characters"),
        ));
    }
    if password != confirm {
        return Err(AppError::validation(
            "password_confirm",
            "passwords do not match",
        ));
    }
    Ok(())
}

pub fn validate_review_url(value: &str) -> AppResult<String> {
    let url = Url::parse(value.trim())
        .map_err(|_| AppError::validation("review_url", "review_url must be an absolute URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::validation(
            "review_url",
            "review_url must use http or https",
        ));
    }
    required_text("review_url", url.as_str(), 200)
}
