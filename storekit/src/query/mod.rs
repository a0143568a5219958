//! Composable query options and their fixed-order applier
//!
//! Callers describe what an operation should touch with [`QueryOption`]
//! directives (or the chainable [`QueryOptions`] builder). Repositories fold
//! them into a [`QueryOptions`] with [`build_options`] and hand the result to
//! [`apply_options`], which drives a backend's [`QueryBuilder`] in a fixed
//! precedence order.
//!
//! # Example
//!
//! ```rust
//! use storekit::query::{build_options, with_filter, with_limit, Filter, QueryOptions};
//!
//! let opts = build_options([with_filter(Filter::eq("name", "a")), with_limit(1)]);
//! assert_eq!(opts.limit, 1);
//!
//! let page = QueryOptions::default().filter(Filter::eq("name", "a")).page(2, 25);
//! assert_eq!(page.offset, 25);
//! ```

mod apply;
mod builder;
mod clause;
mod filter;
mod options;

pub use apply::apply_options;
pub use builder::{QueryBuilder, Scope};
pub use clause::{Clause, LockStrength};
pub use filter::{Filter, FilterCondition, FilterOperator, OrderDirection, Value};
pub use options::{
    build_options, with_clauses, with_custom, with_distinct, with_filter, with_group, with_having,
    with_join, with_limit, with_offset, with_omit, with_preload, with_scope, with_select,
    QueryOption, QueryOptions,
};

/// One-letter aliases for the option constructors
///
/// ```rust
/// use storekit::query::short::{d, f, l, o};
/// use storekit::query::{build_options, Filter, QueryOptions};
///
/// let opts = build_options([f(Filter::eq("name", "a")), l(10), o(5), d(true)]);
/// assert_eq!(
///     opts,
///     QueryOptions::default().filter(Filter::eq("name", "a")).limit(10).offset(5).distinct(true)
/// );
/// ```
pub mod short {
    pub use super::options::{
        with_clauses as c, with_custom as cf, with_distinct as d, with_filter as f,
        with_group as g, with_having as h, with_join as j, with_limit as l, with_offset as o,
        with_preload as p, with_scope as s,
    };
}

#[cfg(test)]
pub(crate) use builder::testing;
