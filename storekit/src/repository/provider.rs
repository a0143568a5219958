//! Backend capabilities consumed by repositories
//!
//! A backend supplies a [`ConnectionProvider`]. For each call the provider
//! yields a [`Handle`] bound to the caller's [`Context`]; for each
//! transaction it yields a [`UnitOfWork`], which is a handle that can also be
//! committed or rolled back.
//!
//! Handles work in untyped [`Row`]s; the repository converts between rows
//! and entities.

use std::future::Future;

use super::entity::{Entity, Row};
use super::error::RepositoryError;
use crate::context::Context;
use crate::query::{QueryBuilder, Value};

/// Yields handles scoped to one call or one unit of work
///
/// Must be safe to call concurrently from independent calls.
pub trait ConnectionProvider: Send + Sync {
    /// Handle for a single non-transactional call
    type Handle: Handle;

    /// Handle bound to an open unit of work
    type Tx: UnitOfWork;

    /// Acquire a handle for one operation
    fn db(
        &self,
        ctx: &Context,
    ) -> impl Future<Output = Result<Self::Handle, RepositoryError>> + Send;

    /// Open a unit of work
    fn begin(&self, ctx: &Context)
        -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;
}

/// An in-flight, backend-bound execution surface
///
/// `query::<T>()` starts a query against `T`'s table; the repository refines
/// it through [`QueryBuilder`] and passes it back to one of the executing
/// methods.
pub trait Handle: Send {
    /// The backend's query under construction
    type Query: QueryBuilder + Send;

    /// Start a query against `T`'s table
    fn query<T: Entity>(&self) -> Self::Query;

    /// Insert one row into `T`'s table, returning its primary key
    fn insert<T: Entity>(
        &mut self,
        ctx: &Context,
        row: Row,
    ) -> impl Future<Output = Result<Value, RepositoryError>> + Send;

    /// Write `changes` to every row matching `query`, returning the count
    ///
    /// Backends narrow `changes` to the query's projection and refuse a
    /// query with no filter.
    fn update(
        &mut self,
        ctx: &Context,
        query: Self::Query,
        changes: Row,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// Delete every row matching `query`, returning the count
    fn delete(
        &mut self,
        ctx: &Context,
        query: Self::Query,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// First row matching `query`, if any
    fn first(
        &mut self,
        ctx: &Context,
        query: Self::Query,
    ) -> impl Future<Output = Result<Option<Row>, RepositoryError>> + Send;

    /// Every row matching `query`
    fn find(
        &mut self,
        ctx: &Context,
        query: Self::Query,
    ) -> impl Future<Output = Result<Vec<Row>, RepositoryError>> + Send;

    /// Number of rows (or groups) matching `query`
    fn count(
        &mut self,
        ctx: &Context,
        query: Self::Query,
    ) -> impl Future<Output = Result<i64, RepositoryError>> + Send;
}

/// A handle bound to one open unit of work
pub trait UnitOfWork: Handle + Sized {
    /// Make every write in this unit durable
    fn commit(self, ctx: &Context) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Discard every write in this unit
    fn rollback(self, ctx: &Context) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
