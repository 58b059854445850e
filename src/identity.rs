//! Storage identity for summaries.
//!
//! The key is `"{title}_{date}"`: re-ingesting the same document on the same
//! day lands on the same key and overwrites instead of duplicating.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("document title is empty")]
    EmptyTitle,
    #[error("document date is empty")]
    EmptyDate,
}

/// Build the composite key, rejecting empty components.
pub fn identity(title: &str, date: &str) -> Result<String, IdentityError> {
    if title.trim().is_empty() {
        return Err(IdentityError::EmptyTitle);
    }
    if date.trim().is_empty() {
        return Err(IdentityError::EmptyDate);
    }
    Ok(format!("{}_{}", title, date))
}

/// [`identity`] with an ISO-8601 calendar date.
pub fn identity_for(title: &str, date: NaiveDate) -> Result<String, IdentityError> {
    identity(title, &date.format("%Y-%m-%d").to_string())
}
