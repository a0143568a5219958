//! Repository error types
//!
//! Every repository operation fails with a [`RepositoryError`] that records
//! which operation failed, a coarse [`RepositoryErrorKind`], and the entity
//! type involved.
//!
//! # Example
//!
//! ```rust
//! use storekit::repository::{RepositoryError, RepositoryErrorKind};
//!
//! let error = RepositoryError::not_found("User");
//! assert!(matches!(error.kind, RepositoryErrorKind::NotFound));
//! assert!(error.is_not_found());
//! ```

use std::fmt;

/// Operation being performed when the repository error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryOperation {
    /// Persisting a new entity
    Create,
    /// Updating matching rows
    Update,
    /// Deleting matching rows
    Delete,
    /// Reading exactly one row
    Get,
    /// Reading zero or more rows
    List,
    /// Counting matching rows
    Count,
    /// Beginning, committing or rolling back a unit of work
    Transaction,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Get => write!(f, "get"),
            Self::List => write!(f, "list"),
            Self::Count => write!(f, "count"),
            Self::Transaction => write!(f, "transaction"),
        }
    }
}

/// Category of repository error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryErrorKind {
    /// A singular read matched no rows
    NotFound,
    /// Unique, foreign key, not-null or check constraint violated
    ConstraintViolation,
    /// The request was rejected before reaching the store
    ValidationFailed,
    /// Failed to reach the store
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// The caller's context was cancelled
    Cancelled,
    /// Any other store failure
    DatabaseError,
    /// A row could not be converted to or from an entity
    SerializationError,
    /// The backend cannot honor a directive
    Unsupported,
    /// The unit of work could not be committed and was rolled back
    TransactionAborted,
}

impl fmt::Display for RepositoryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::TransactionAborted => write!(f, "transaction_aborted"),
        }
    }
}

/// Structured repository error with operation context
///
/// # Example
///
/// ```rust
/// use storekit::repository::{RepositoryError, RepositoryOperation};
///
/// let error = RepositoryError::constraint_violation(
///     RepositoryOperation::Create,
///     "duplicate key value violates unique constraint \"users_pkey\"",
/// )
/// .with_entity("User");
/// println!("{}", error);
/// assert!(!error.is_retriable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryError {
    /// The operation being performed when the error occurred
    pub operation: RepositoryOperation,
    /// The category of error
    pub kind: RepositoryErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of entity involved (e.g., "User", "Order")
    pub entity_type: Option<String>,
}

impl RepositoryError {
    /// Create a new repository error
    pub fn new(
        operation: RepositoryOperation,
        kind: RepositoryErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
        }
    }

    /// Create a "not found" error for a singular read
    pub fn not_found(entity_type: impl Into<String>) -> Self {
        Self {
            operation: RepositoryOperation::Get,
            kind: RepositoryErrorKind::NotFound,
            message: "record not found".to_string(),
            entity_type: Some(entity_type.into()),
        }
    }

    /// Create a constraint violation error
    pub fn constraint_violation(
        operation: RepositoryOperation,
        message: impl Into<String>,
    ) -> Self {
        Self::new(operation, RepositoryErrorKind::ConstraintViolation, message)
    }

    /// Create a validation failed error
    pub fn validation_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ValidationFailed, message)
    }

    /// Create a connection failed error
    pub fn connection_failed(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::ConnectionFailed, message)
    }

    /// Create a timeout error
    pub fn timeout(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Timeout, message)
    }

    /// Create a cancellation error
    pub fn cancelled(operation: RepositoryOperation) -> Self {
        Self::new(
            operation,
            RepositoryErrorKind::Cancelled,
            "context cancelled",
        )
    }

    /// Create a database error
    pub fn database_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::DatabaseError, message)
    }

    /// Create a serialization error
    pub fn serialization_error(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::SerializationError, message)
    }

    /// Create an unsupported-directive error
    pub fn unsupported(operation: RepositoryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, RepositoryErrorKind::Unsupported, message)
    }

    /// Create a transaction aborted error
    pub fn transaction_aborted(message: impl Into<String>) -> Self {
        Self::new(
            RepositoryOperation::Transaction,
            RepositoryErrorKind::TransactionAborted,
            message,
        )
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: RepositoryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether this is the distinguished "no rows" outcome of a singular read
    pub fn is_not_found(&self) -> bool {
        self.kind == RepositoryErrorKind::NotFound
    }

    /// Check if this error is retriable (transient errors that may succeed on retry)
    ///
    /// # Example
    ///
    /// ```rust
    /// use storekit::repository::{RepositoryError, RepositoryOperation};
    ///
    /// assert!(RepositoryError::timeout(RepositoryOperation::List, "pool timed out").is_retriable());
    /// assert!(!RepositoryError::not_found("User").is_retriable());
    /// ```
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            RepositoryErrorKind::ConnectionFailed
                | RepositoryErrorKind::Timeout
                | RepositoryErrorKind::TransactionAborted
        )
    }

    /// Categorize a sqlx error raised while performing `operation`
    #[cfg(feature = "database")]
    pub fn from_sqlx(operation: RepositoryOperation, err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::RowNotFound => Self::new(operation, RepositoryErrorKind::NotFound, "record not found"),
            E::PoolTimedOut => Self::timeout(operation, "connection pool timed out"),
            E::PoolClosed => Self::connection_failed(operation, "connection pool is closed"),
            E::Io(e) => Self::connection_failed(operation, e.to_string()),
            E::Tls(e) => Self::connection_failed(operation, format!("TLS error: {}", e)),
            E::WorkerCrashed => Self::connection_failed(operation, "database worker crashed"),
            E::ColumnDecode { index, source } => Self::serialization_error(
                operation,
                format!("failed to decode column {}: {}", index, source),
            ),
            E::Decode(e) => Self::serialization_error(operation, e.to_string()),
            E::TypeNotFound { type_name } => {
                Self::serialization_error(operation, format!("type not found: {}", type_name))
            }
            E::Database(db_err) => {
                let is_not_null = db_err.code().as_deref() == Some("23502");
                if db_err.is_unique_violation()
                    || db_err.is_foreign_key_violation()
                    || db_err.is_check_violation()
                    || is_not_null
                {
                    Self::constraint_violation(operation, db_err.to_string())
                } else {
                    Self::database_error(operation, db_err.to_string())
                }
            }
            other => Self::database_error(operation, other.to_string()),
        }
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Repository {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(ref entity_type) = self.entity_type {
            write!(f, " [{}]", entity_type)?;
        }
        Ok(())
    }
}

impl std::error::Error for RepositoryError {}
