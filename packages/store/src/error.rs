use std::fmt;

use watchpay::PayoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreError {
    kind: ErrorKind,
    code: &'static str,
    message: String,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    fn new(kind: ErrorKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!("Internal error: {}", msg);
        Self::new(ErrorKind::Internal, "INTERNAL_ERROR", msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Not found: {}", msg);
        Self::new(ErrorKind::NotFound, "NOT_FOUND", msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Bad request: {}", msg);
        Self::new(ErrorKind::BadRequest, "BAD_REQUEST", msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::warn!("Conflict: {}", msg);
        Self::new(ErrorKind::Conflict, "CONFLICT", msg)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<sea_orm::DbErr> for StoreError {
    fn from(err: sea_orm::DbErr) -> Self {
        tracing::error!("Database error: {:?}", err);
        Self::new(ErrorKind::Internal, "DATABASE_ERROR", err.to_string())
    }
}

impl From<sea_orm::TransactionError<StoreError>> for StoreError {
    fn from(err: sea_orm::TransactionError<StoreError>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(db_err) => db_err.into(),
            sea_orm::TransactionError::Transaction(store_err) => store_err,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        Self::new(ErrorKind::Internal, "JSON_ERROR", err.to_string())
    }
}

impl From<PayoutError> for StoreError {
    fn from(err: PayoutError) -> Self {
        match err {
            PayoutError::NoRevenueData { .. } | PayoutError::NoAssignments { .. } => {
                Self::not_found(err.to_string())
            }
            PayoutError::InvalidMonth(_)
            | PayoutError::InvalidRate { .. }
            | PayoutError::Negative { .. } => Self::bad_request(err.to_string()),
        }
    }
}

#[macro_export]
macro_rules! not_found {
    ($($arg:tt)*) => {
        $crate::error::StoreError::not_found(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! bad_request {
    ($($arg:tt)*) => {
        $crate::error::StoreError::bad_request(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! conflict {
    ($($arg:tt)*) => {
        $crate::error::StoreError::conflict(format!($($arg)*))
    };
}
