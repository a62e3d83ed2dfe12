//! Error types for Basecoin

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric result codes reported back to the consensus engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ResultCode {
    Ok = 0,
    InternalError = 1,
    EncodingError = 2,
    Unauthorized = 4,
    InsufficientFunds = 5,
    UnknownRequest = 6,
}

impl ResultCode {
    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// Raw transaction bytes could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
    /// Business-rule rejection raised by the transaction handler.
    #[error("{log}")]
    Handler { code: ResultCode, log: String },
    #[error("unknown base option: {0}")]
    UnknownOption(String),
    #[error("{0}")]
    Encoding(String),
    #[error("Unknown request: {0}")]
    UnknownRequest(String),
    /// The store could not durably commit. Never recoverable.
    #[error("Fatal store error: {0}")]
    StoreFatal(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Bincode error: {0}")]
    BincodeError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Convenience constructor for handler implementations.
    pub fn handler(code: ResultCode, log: impl Into<String>) -> Self {
        AppError::Handler {
            code,
            log: log.into(),
        }
    }

    pub fn code(&self) -> ResultCode {
        match self {
            AppError::Decode(_) | AppError::Encoding(_) | AppError::BincodeError(_) => {
                ResultCode::EncodingError
            }
            AppError::Handler { code, .. } => *code,
            AppError::UnknownOption(_) | AppError::UnknownRequest(_) => ResultCode::UnknownRequest,
            AppError::StoreFatal(_)
            | AppError::DatabaseError(_)
            | AppError::IoError(_)
            | AppError::ConfigError(_) => ResultCode::InternalError,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::StoreFatal(_))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for AppError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        AppError::BincodeError(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;
