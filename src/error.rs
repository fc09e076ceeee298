//! Unified application error model.
//! One enum covers validation failures shown back to the user, missing documents,
//! authentication redirects and the fatal configuration/I-O cases, along with the
//! HTTP status each one maps to.

use thiserror::Error;

use crate::documents::names::{ALLOWED_EXTENSIONS, MAX_NAME_LEN};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Name must be between 1 and {} characters.", MAX_NAME_LEN)]
    InvalidLength,
    #[error("File already exists.")]
    AlreadyExists,
    #[error("File extension must be one of: {}", ALLOWED_EXTENSIONS.join(", "))]
    InvalidExtension,
    #[error("Name must not contain path separators or start with a dot.")]
    InvalidName,
    #[error("{0} not found.")]
    NotFound(String),
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Username is already taken.")]
    UsernameTaken,
    #[error("Username and password must not be blank.")]
    BlankCredentials,
    #[error("Sign in to view and edit files.")]
    Unauthenticated,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AppError::InvalidLength => "invalid_length",
            AppError::AlreadyExists => "already_exists",
            AppError::InvalidExtension => "invalid_extension",
            AppError::InvalidName => "invalid_name",
            AppError::NotFound(_) => "not_found",
            AppError::PasswordMismatch => "password_mismatch",
            AppError::UsernameTaken => "username_taken",
            AppError::BlankCredentials => "blank_credentials",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Configuration(_) => "configuration_error",
            AppError::Io(_) => "io_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Errors that are answered by redisplaying the submitted form.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidLength
                | AppError::AlreadyExists
                | AppError::InvalidExtension
                | AppError::InvalidName
                | AppError::PasswordMismatch
                | AppError::UsernameTaken
                | AppError::BlankCredentials
        )
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            e if e.is_validation() => 422,
            AppError::NotFound(_) => 404,
            AppError::Unauthenticated => 401,
            _ => 500,
        }
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self { AppError::Configuration(msg.into()) }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal(msg.into()) }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::InvalidLength.http_status(), 422);
        assert_eq!(AppError::AlreadyExists.http_status(), 422);
        assert_eq!(AppError::InvalidExtension.http_status(), 422);
        assert_eq!(AppError::PasswordMismatch.http_status(), 422);
        assert_eq!(AppError::UsernameTaken.http_status(), 422);
        assert_eq!(AppError::NotFound("a.txt".into()).http_status(), 404);
        assert_eq!(AppError::Unauthenticated.http_status(), 401);
        assert_eq!(AppError::configuration("users.yml missing").http_status(), 500);
        assert_eq!(AppError::internal("boom").http_status(), 500);
    }

    #[test]
    fn messages_match_form_copy() {
        assert_eq!(AppError::InvalidLength.to_string(), "Name must be between 1 and 100 characters.");
        assert_eq!(AppError::AlreadyExists.to_string(), "File already exists.");
        assert_eq!(AppError::InvalidExtension.to_string(), "File extension must be one of: .txt, .md");
        assert_eq!(AppError::NotFound("notes.md".into()).to_string(), "notes.md not found.");
        assert_eq!(AppError::Unauthenticated.to_string(), "Sign in to view and edit files.");
    }

    #[test]
    fn io_errors_convert_and_are_not_validation() {
        let e: AppError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(e.code_str(), "io_error");
        assert!(!e.is_validation());
    }
}
