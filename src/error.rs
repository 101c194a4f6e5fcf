//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the HTTP frontend,
//! the identity service and the content repository, along with a mapper to
//! HTTP status codes.
//!
//! Constraint violations (duplicate email, duplicate title) and bad
//! credentials are expected outcomes, recovered at the request boundary into
//! a user-facing retry prompt. Authorization and missing-entity failures are
//! terminal for the request (403/404).

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Validation { code: String, message: String },
    DuplicateEmail { code: String, message: String },
    DuplicateTitle { code: String, message: String },
    NoSuchAccount { code: String, message: String },
    WrongPassword { code: String, message: String },
    Unauthorized { code: String, message: String },
    Forbidden { code: String, message: String },
    NotFound { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::DuplicateEmail { code, .. }
            | AppError::DuplicateTitle { code, .. }
            | AppError::NoSuchAccount { code, .. }
            | AppError::WrongPassword { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::DuplicateEmail { message, .. }
            | AppError::DuplicateTitle { message, .. }
            | AppError::NoSuchAccount { message, .. }
            | AppError::WrongPassword { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn duplicate_email<S: Into<String>>(code: S, msg: S) -> Self { AppError::DuplicateEmail { code: code.into(), message: msg.into() } }
    pub fn duplicate_title<S: Into<String>>(code: S, msg: S) -> Self { AppError::DuplicateTitle { code: code.into(), message: msg.into() } }
    pub fn no_such_account<S: Into<String>>(code: S, msg: S) -> Self { AppError::NoSuchAccount { code: code.into(), message: msg.into() } }
    pub fn wrong_password<S: Into<String>>(code: S, msg: S) -> Self { AppError::WrongPassword { code: code.into(), message: msg.into() } }
    pub fn unauthorized<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthorized { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// True for failures the request boundary recovers into a form redisplay
    /// rather than a terminal HTTP error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. }
                | AppError::DuplicateEmail { .. }
                | AppError::DuplicateTitle { .. }
                | AppError::NoSuchAccount { .. }
                | AppError::WrongPassword { .. }
        )
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::DuplicateEmail { .. } | AppError::DuplicateTitle { .. } => 409,
            AppError::NoSuchAccount { .. } | AppError::WrongPassword { .. } => 401,
            AppError::Unauthorized { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: infrastructure faults surface as Internal
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}
