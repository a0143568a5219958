//! Entity descriptors and untyped rows
//!
//! Backends never reflect over entity types. Instead each entity describes
//! its table, primary key and columns, and converts itself to and from a
//! [`Row`].
//!
//! # Example
//!
//! ```rust
//! use storekit::repository::{Entity, RepositoryError, Row};
//! use storekit::query::Value;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for User {
//!     const TABLE: &'static str = "users";
//!
//!     fn columns() -> &'static [&'static str] {
//!         &["id", "name"]
//!     }
//!
//!     fn to_row(&self) -> Row {
//!         Row::new().with("id", self.id).with("name", self.name.as_str())
//!     }
//!
//!     fn from_row(row: &Row) -> Result<Self, RepositoryError> {
//!         Ok(Self {
//!             id: row.get_i64("id")?,
//!             name: row.get_string("name")?,
//!         })
//!     }
//!
//!     fn set_primary_key(&mut self, key: Value) {
//!         if let Some(id) = key.as_i64() {
//!             self.id = id;
//!         }
//!     }
//! }
//!
//! let user = User { id: 0, name: "a".into() };
//! assert_eq!(User::entity_name(), "User");
//! assert_eq!(user.primary_key(), Value::Integer(0));
//! ```

use std::collections::BTreeMap;

use super::error::{RepositoryError, RepositoryOperation};
use crate::query::Value;

static NULL: Value = Value::Null;

/// Column name to value mapping for one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `column` and return the row, for building rows inline
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Value of `column`; absent columns read as [`Value::Null`]
    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// Keep only the columns for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.values.retain(|column, _| keep(column));
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Integer column; Null reads as 0
    pub fn get_i64(&self, column: &str) -> Result<i64, RepositoryError> {
        match self.get(column) {
            Value::Integer(n) => Ok(*n),
            Value::Null => Ok(0),
            other => Err(mismatch(column, "integer", other)),
        }
    }

    /// Float column; Null reads as 0.0, integers widen
    pub fn get_f64(&self, column: &str) -> Result<f64, RepositoryError> {
        match self.get(column) {
            Value::Float(n) => Ok(*n),
            Value::Integer(n) => Ok(*n as f64),
            Value::Null => Ok(0.0),
            other => Err(mismatch(column, "float", other)),
        }
    }

    /// Boolean column; Null reads as false
    pub fn get_bool(&self, column: &str) -> Result<bool, RepositoryError> {
        match self.get(column) {
            Value::Boolean(b) => Ok(*b),
            Value::Null => Ok(false),
            other => Err(mismatch(column, "boolean", other)),
        }
    }

    /// String column; Null reads as empty
    pub fn get_string(&self, column: &str) -> Result<String, RepositoryError> {
        match self.get(column) {
            Value::String(s) => Ok(s.clone()),
            Value::Null => Ok(String::new()),
            other => Err(mismatch(column, "string", other)),
        }
    }

    /// Nullable string column
    pub fn get_opt_string(&self, column: &str) -> Result<Option<String>, RepositoryError> {
        match self.get(column) {
            Value::String(s) => Ok(Some(s.clone())),
            Value::Null => Ok(None),
            other => Err(mismatch(column, "string", other)),
        }
    }
}

fn mismatch(column: &str, expected: &str, actual: &Value) -> RepositoryError {
    RepositoryError::serialization_error(
        RepositoryOperation::Get,
        format!(
            "column '{}' holds {}, expected {}",
            column,
            actual.type_name(),
            expected
        ),
    )
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Describes how an entity type maps onto a table
///
/// `PRIMARY_KEY` names a single column. A key of [`Value::Null`] or integer
/// `0` means "not assigned yet": create lets the store assign one and hands
/// it back through [`set_primary_key`](Entity::set_primary_key), and update
/// does not restrict by it.
pub trait Entity: Send + Sync + Sized + 'static {
    /// Table holding this entity
    const TABLE: &'static str;

    /// Primary key column
    const PRIMARY_KEY: &'static str = "id";

    /// All persisted columns, primary key included
    fn columns() -> &'static [&'static str];

    fn to_row(&self) -> Row;

    fn from_row(row: &Row) -> Result<Self, RepositoryError>;

    /// Store the key assigned on create
    fn set_primary_key(&mut self, key: Value);

    /// Current primary key value
    fn primary_key(&self) -> Value {
        self.to_row().get(Self::PRIMARY_KEY).clone()
    }

    /// Name used in diagnostics; the unqualified type name by default
    fn entity_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }
}

/// Whether `key` counts as "not assigned yet"
pub(crate) fn is_unset_key(key: &Value) -> bool {
    matches!(key, Value::Null | Value::Integer(0))
        || matches!(key, Value::String(s) if s.is_empty())
}
