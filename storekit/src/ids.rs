//! Prefixed, time-sortable identifiers
//!
//! Identifiers follow the TypeID format (`<prefix>_<base32 uuidv7>`), so a
//! value found in a log line says what it identifies and sorts by creation
//! time.
//!
//! - [`RequestId`] (`req_...`) tags every [`Context`](crate::context::Context)
//! - [`TransactionId`] (`tx_...`) tags one unit of work opened by
//!   [`Repository::transaction`](crate::repository::Repository::transaction)
//!
//! ```rust
//! use storekit::ids::{RequestId, TransactionId};
//!
//! let request_id = RequestId::new();
//! assert!(request_id.as_str().starts_with("req_"));
//! assert!(TransactionId::new().as_str().starts_with("tx_"));
//! ```

use mti::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Error type for identifier parsing.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The value could not be parsed as a valid TypeID.
    #[error("failed to parse identifier: {0}")]
    Parse(#[from] MagicTypeIdError),

    /// The prefix was not the expected value.
    #[error("invalid prefix: expected '{expected}', got '{actual}'")]
    InvalidPrefix {
        /// The expected prefix.
        expected: String,
        /// The actual prefix found.
        actual: String,
    },
}

fn parse_prefixed(s: &str, prefix: &str) -> Result<MagicTypeId, IdError> {
    let id = MagicTypeId::from_str(s)?;
    if id.prefix().as_str() != prefix {
        return Err(IdError::InvalidPrefix {
            expected: prefix.to_string(),
            actual: id.prefix().as_str().to_string(),
        });
    }
    Ok(id)
}

/// Identifier of one caller request, carried in every log record
///
/// # Example
///
/// ```rust
/// use storekit::ids::RequestId;
/// use std::str::FromStr;
///
/// let parsed = RequestId::from_str("req_01h455vb4pex5vsknk084sn02q").unwrap();
/// assert_eq!(parsed.prefix(), "req");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(MagicTypeId);

impl RequestId {
    /// The prefix used for request IDs
    pub const PREFIX: &'static str = "req";

    /// Creates a new request ID with a UUIDv7 (time-sortable).
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    /// Returns the request ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the prefix portion of the ID.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.0.prefix().as_str()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed(s, Self::PREFIX).map(Self)
    }
}

/// Identifier of one unit of work
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(MagicTypeId);

impl TransactionId {
    /// The prefix used for transaction IDs
    pub const PREFIX: &'static str = "tx";

    /// Creates a new transaction ID with a UUIDv7 (time-sortable).
    #[must_use]
    pub fn new() -> Self {
        Self(Self::PREFIX.create_type_id::<V7>())
    }

    /// Returns the transaction ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed(s, Self::PREFIX).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_new() {
        let id = RequestId::new();
        assert!(id.as_str().starts_with("req_"));
        assert_eq!(id.prefix(), "req");
        // prefix (3) + underscore (1) + suffix (26)
        assert_eq!(id.as_str().len(), 30);
    }

    #[test]
    fn test_request_id_parse() {
        let id_str = "req_01h455vb4pex5vsknk084sn02q";
        let id = RequestId::from_str(id_str).unwrap();
        assert_eq!(id.as_str(), id_str);
        assert_eq!(id.to_string(), id_str);
    }

    #[test]
    fn test_invalid_prefix() {
        let result = RequestId::from_str("tx_01h455vb4pex5vsknk084sn02q");
        match result.unwrap_err() {
            IdError::InvalidPrefix { expected, actual } => {
                assert_eq!(expected, "req");
                assert_eq!(actual, "tx");
            }
            other => panic!("Expected InvalidPrefix error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_format() {
        assert!(matches!(
            RequestId::from_str("req_invalid"),
            Err(IdError::Parse(_))
        ));
    }

    #[test]
    fn test_transaction_id_round_trip_and_ordering() {
        let first = TransactionId::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = TransactionId::new();

        assert!(first < second);
        assert_eq!(TransactionId::from_str(first.as_str()).unwrap(), first);
    }
}
