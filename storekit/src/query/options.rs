//! Composable query options
//!
//! A [`QueryOption`] is one directive. Directives are collected into a
//! [`QueryOptions`] accumulator by [`build_options`], left to right, starting
//! from [`QueryOptions::default()`]. Append-style directives (clauses,
//! preloads, joins, scopes) keep earlier entries; `select` and `omit` replace
//! them; every other directive overwrites its field.
//!
//! # Example
//!
//! ```rust
//! use storekit::query::{build_options, with_distinct, with_limit, with_offset, QueryOptions};
//!
//! let chained = QueryOptions::default().limit(10).offset(5).distinct(true);
//! let built = build_options([with_limit(10), with_offset(5), with_distinct(true)]);
//! assert_eq!(chained, built);
//! ```

use super::builder::{QueryBuilder, Scope};
use super::clause::Clause;
use super::filter::{Filter, OrderDirection};

/// A single query directive
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOption {
    /// Set the row filter
    Filter(Filter),
    /// Set the row limit (values `<= 0` are left unapplied)
    Limit(i64),
    /// Set the row offset (values `<= 0` are left unapplied)
    Offset(i64),
    /// Append low-level clauses
    Clauses(Vec<Clause>),
    /// Append relations to eager-load
    Preload(Vec<String>),
    /// Replace the selected columns
    Select(Vec<String>),
    /// Replace the omitted columns
    Omit(Vec<String>),
    /// Append join expressions
    Join(Vec<String>),
    /// Set the group-by expression
    Group(String),
    /// Set the group filter
    Having(Filter),
    /// Set the distinct flag
    Distinct(bool),
    /// Append a scope
    Scope(Scope),
    /// Set the terminal transform
    Custom(Scope),
}

impl QueryOption {
    /// Fold this directive into `options`
    pub fn apply(self, options: &mut QueryOptions) {
        match self {
            Self::Filter(filter) => options.filter = Some(filter),
            Self::Limit(limit) => options.limit = limit,
            Self::Offset(offset) => options.offset = offset,
            Self::Clauses(clauses) => options.clauses.extend(clauses),
            Self::Preload(preloads) => options.preloads.extend(preloads),
            Self::Select(selects) => options.selects = selects,
            Self::Omit(omit) => options.omit = omit,
            Self::Join(joins) => options.joins.extend(joins),
            Self::Group(group) => options.group = group,
            Self::Having(having) => options.having = Some(having),
            Self::Distinct(distinct) => options.distinct = distinct,
            Self::Scope(scope) => options.scopes.push(scope),
            Self::Custom(custom) => options.custom = Some(custom),
        }
    }
}

/// Set the row filter
pub fn with_filter(filter: impl Into<Filter>) -> QueryOption {
    QueryOption::Filter(filter.into())
}

/// Set the row limit
pub fn with_limit(limit: i64) -> QueryOption {
    QueryOption::Limit(limit)
}

/// Set the row offset
pub fn with_offset(offset: i64) -> QueryOption {
    QueryOption::Offset(offset)
}

/// Append low-level clauses
pub fn with_clauses(clauses: impl IntoIterator<Item = Clause>) -> QueryOption {
    QueryOption::Clauses(clauses.into_iter().collect())
}

/// Append relations to eager-load
pub fn with_preload<S: Into<String>>(preloads: impl IntoIterator<Item = S>) -> QueryOption {
    QueryOption::Preload(preloads.into_iter().map(Into::into).collect())
}

/// Replace the selected columns
pub fn with_select<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> QueryOption {
    QueryOption::Select(columns.into_iter().map(Into::into).collect())
}

/// Replace the omitted columns
pub fn with_omit<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> QueryOption {
    QueryOption::Omit(columns.into_iter().map(Into::into).collect())
}

/// Append join expressions
pub fn with_join<S: Into<String>>(joins: impl IntoIterator<Item = S>) -> QueryOption {
    QueryOption::Join(joins.into_iter().map(Into::into).collect())
}

/// Set the group-by expression
pub fn with_group(group: impl Into<String>) -> QueryOption {
    QueryOption::Group(group.into())
}

/// Set the group filter
pub fn with_having(having: impl Into<Filter>) -> QueryOption {
    QueryOption::Having(having.into())
}

/// Set the distinct flag
pub fn with_distinct(distinct: bool) -> QueryOption {
    QueryOption::Distinct(distinct)
}

/// Append a scope
pub fn with_scope(scope: Scope) -> QueryOption {
    QueryOption::Scope(scope)
}

/// Set the terminal transform
pub fn with_custom(custom: Scope) -> QueryOption {
    QueryOption::Custom(custom)
}

/// Accumulated directives for one operation
///
/// The default value is the empty accumulator: no filter, `limit` and
/// `offset` of 0 (unset), no clauses or projections, no group or having,
/// not distinct, no scopes and no terminal transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Row filter
    pub filter: Option<Filter>,
    /// Row limit, 0 for unbounded
    pub limit: i64,
    /// Row offset, 0 for none
    pub offset: i64,
    /// Low-level clauses, in order
    pub clauses: Vec<Clause>,
    /// Relations to eager-load, in order
    pub preloads: Vec<String>,
    /// Selected columns, empty for all
    pub selects: Vec<String>,
    /// Omitted columns
    pub omit: Vec<String>,
    /// Join expressions, in order
    pub joins: Vec<String>,
    /// Group-by expression, empty for none
    pub group: String,
    /// Group filter
    pub having: Option<Filter>,
    /// Deduplicate rows
    pub distinct: bool,
    /// Query transforms, in order
    pub scopes: Vec<Scope>,
    /// Terminal transform, applied last
    pub custom: Option<Scope>,
}

/// Fold `options` into a fresh accumulator, left to right
pub fn build_options(options: impl IntoIterator<Item = QueryOption>) -> QueryOptions {
    let mut built = QueryOptions::default();
    for option in options {
        option.apply(&mut built);
    }
    built
}

impl QueryOptions {
    /// Fold one more directive into this accumulator
    #[must_use]
    pub fn with(mut self, option: QueryOption) -> Self {
        option.apply(&mut self);
        self
    }

    /// Set the row filter
    #[must_use]
    pub fn filter(self, filter: impl Into<Filter>) -> Self {
        self.with(with_filter(filter))
    }

    /// Append relations to eager-load
    #[must_use]
    pub fn preload<S: Into<String>>(self, preloads: impl IntoIterator<Item = S>) -> Self {
        self.with(with_preload(preloads))
    }

    /// Append join expressions
    #[must_use]
    pub fn join<S: Into<String>>(self, joins: impl IntoIterator<Item = S>) -> Self {
        self.with(with_join(joins))
    }

    /// Set the row limit
    #[must_use]
    pub fn limit(self, limit: i64) -> Self {
        self.with(with_limit(limit))
    }

    /// Set the row offset
    #[must_use]
    pub fn offset(self, offset: i64) -> Self {
        self.with(with_offset(offset))
    }

    /// Set the distinct flag
    #[must_use]
    pub fn distinct(self, distinct: bool) -> Self {
        self.with(with_distinct(distinct))
    }

    /// Set the group-by expression
    #[must_use]
    pub fn group(self, group: impl Into<String>) -> Self {
        self.with(with_group(group))
    }

    /// Set the group filter
    #[must_use]
    pub fn having(self, having: impl Into<Filter>) -> Self {
        self.with(with_having(having))
    }

    /// Set the terminal transform
    #[must_use]
    pub fn custom(self, custom: Scope) -> Self {
        self.with(with_custom(custom))
    }

    /// Append an `ORDER BY` clause
    #[must_use]
    pub fn order_by(self, column: impl Into<String>, direction: OrderDirection) -> Self {
        self.with(with_clauses([Clause::order_by(column, direction)]))
    }

    /// Page through results: `limit = page_size`, `offset = (page - 1) * page_size`
    ///
    /// Pages are 1-based; page 0 is treated like page 1.
    ///
    /// # Example
    ///
    /// ```rust
    /// use storekit::query::QueryOptions;
    ///
    /// let opts = QueryOptions::default().page(3, 20);
    /// assert_eq!(opts.limit, 20);
    /// assert_eq!(opts.offset, 40);
    /// ```
    #[must_use]
    pub fn page(self, page: i64, page_size: i64) -> Self {
        let offset = page.saturating_sub(1).max(0).saturating_mul(page_size);
        self.with(with_limit(page_size)).with(with_offset(offset))
    }

    /// Apply every directive to `builder` in the fixed precedence order
    pub fn apply_to(self, builder: &mut dyn QueryBuilder) {
        super::apply::apply_options(builder, Some(self));
    }

    /// Decompose back into directives that rebuild an equal accumulator
    #[must_use]
    pub fn into_options(self) -> Vec<QueryOption> {
        let mut options = Vec::new();
        if let Some(filter) = self.filter {
            options.push(QueryOption::Filter(filter));
        }
        if self.limit != 0 {
            options.push(QueryOption::Limit(self.limit));
        }
        if self.offset != 0 {
            options.push(QueryOption::Offset(self.offset));
        }
        if !self.clauses.is_empty() {
            options.push(QueryOption::Clauses(self.clauses));
        }
        if !self.preloads.is_empty() {
            options.push(QueryOption::Preload(self.preloads));
        }
        if !self.selects.is_empty() {
            options.push(QueryOption::Select(self.selects));
        }
        if !self.omit.is_empty() {
            options.push(QueryOption::Omit(self.omit));
        }
        if !self.joins.is_empty() {
            options.push(QueryOption::Join(self.joins));
        }
        if !self.group.is_empty() {
            options.push(QueryOption::Group(self.group));
        }
        if let Some(having) = self.having {
            options.push(QueryOption::Having(having));
        }
        if self.distinct {
            options.push(QueryOption::Distinct(true));
        }
        options.extend(self.scopes.into_iter().map(QueryOption::Scope));
        if let Some(custom) = self.custom {
            options.push(QueryOption::Custom(custom));
        }
        options
    }
}

/// Lets a chained `QueryOptions` be passed wherever directives are accepted
impl IntoIterator for QueryOptions {
    type Item = QueryOption;
    type IntoIter = std::vec::IntoIter<QueryOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_options().into_iter()
    }
}
