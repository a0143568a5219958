//! The query-building capability backends expose to the option applier

use std::fmt;
use std::sync::Arc;

use super::clause::Clause;
use super::filter::Filter;

/// Minimal surface of a backend's in-flight query
///
/// The option applier only talks to backends through this trait, so
/// [`QueryOptions`](super::QueryOptions) stays independent of any concrete
/// store. The trait is object safe; scopes receive `&mut dyn QueryBuilder`.
///
/// Repeated `filter` calls are conjunctive. Repeated `limit`, `offset`,
/// `group` and `having` calls overwrite. `select` and `omit` replace the
/// projection they control. `clause`, `preload` and `join` append.
pub trait QueryBuilder {
    /// Restrict rows by a predicate
    fn filter(&mut self, filter: Filter);

    /// Cap the number of rows returned
    fn limit(&mut self, limit: i64);

    /// Skip the first `offset` rows
    fn offset(&mut self, offset: i64);

    /// Append a low-level clause
    fn clause(&mut self, clause: Clause);

    /// Eager-load a named relation
    fn preload(&mut self, relation: String);

    /// Project onto the given columns
    fn select(&mut self, columns: Vec<String>);

    /// Exclude the given columns from the projection
    fn omit(&mut self, columns: Vec<String>);

    /// Append a join expression
    fn join(&mut self, join: String);

    /// Group rows by a column expression
    fn group(&mut self, group: String);

    /// Restrict groups by a predicate
    fn having(&mut self, having: Filter);

    /// Deduplicate result rows
    fn distinct(&mut self);
}

type ScopeFn = dyn Fn(&mut dyn QueryBuilder) + Send + Sync;

/// A reusable query transform
///
/// Used both for the `scopes` directive and for the terminal `custom`
/// transform. Two scopes compare equal only when they share the same
/// underlying closure.
///
/// # Example
///
/// ```rust
/// use storekit::query::{Filter, QueryBuilder, Scope};
///
/// let active = Scope::new(|q: &mut dyn QueryBuilder| q.filter(Filter::eq("active", true)));
/// let copy = active.clone();
/// assert_eq!(active, copy);
/// ```
#[derive(Clone)]
pub struct Scope(Arc<ScopeFn>);

impl Scope {
    /// Wrap a closure as a scope
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut dyn QueryBuilder) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Run the transform against `builder`
    pub fn apply(&self, builder: &mut dyn QueryBuilder) {
        (self.0)(builder);
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Scope(..)")
    }
}
