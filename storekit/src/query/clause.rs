//! Low-level query clauses
//!
//! Clauses are appended verbatim by the `clauses` directive and reach the
//! backend in the order they were supplied.

use super::filter::OrderDirection;

/// Row lock strength for `SELECT ... FOR <strength>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrength {
    /// `FOR UPDATE`
    Update,
    /// `FOR SHARE`
    Share,
}

impl LockStrength {
    /// SQL suffix for this lock strength
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Update => "FOR UPDATE",
            Self::Share => "FOR SHARE",
        }
    }
}

/// A low-level clause fragment
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Order rows by a column
    OrderBy {
        /// Column to sort on
        column: String,
        /// Sort direction
        direction: OrderDirection,
    },
    /// Lock selected rows for the rest of the transaction
    Locking(LockStrength),
    /// Raw SQL appended after the HAVING clause
    Raw(String),
}

impl Clause {
    /// Order by `column` in `direction`
    pub fn order_by(column: impl Into<String>, direction: OrderDirection) -> Self {
        Self::OrderBy {
            column: column.into(),
            direction,
        }
    }

    /// Ascending order by `column`
    pub fn asc(column: impl Into<String>) -> Self {
        Self::order_by(column, OrderDirection::Ascending)
    }

    /// Descending order by `column`
    pub fn desc(column: impl Into<String>) -> Self {
        Self::order_by(column, OrderDirection::Descending)
    }

    /// `FOR UPDATE`
    #[must_use]
    pub const fn for_update() -> Self {
        Self::Locking(LockStrength::Update)
    }

    /// `FOR SHARE`
    #[must_use]
    pub const fn for_share() -> Self {
        Self::Locking(LockStrength::Share)
    }

    /// Raw SQL fragment
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }
}
