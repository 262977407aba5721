use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AdminError, Result};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AdminError::validation(format!("{field} is required")));
    }
    Ok(())
}

pub fn require_email(email: &str) -> Result<()> {
    require("Email", email)?;
    if !is_valid_email(email.trim()) {
        return Err(AdminError::validation(format!("'{}' is not a valid email address", email.trim())));
    }
    Ok(())
}
