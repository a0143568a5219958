//! The CRUD surface shared by repositories and transaction scopes
//!
//! Uses RPITIT (Return Position Impl Trait In Traits) for async methods
//! without `async_trait`.

use std::future::Future;

use super::entity::Entity;
use super::error::RepositoryError;
use crate::context::Context;
use crate::query::QueryOption;

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// CRUD operations over entity type `T`
///
/// Implemented by [`Repository`](super::Repository), which acquires a fresh
/// handle per call, and by [`TxScope`](super::TxScope), which runs every call
/// on its unit of work. Code written against `Crud<T>` runs unchanged in
/// both.
///
/// Failures are reported to the configured logger, except the not-found
/// outcome of [`get`](Crud::get), and then returned unchanged in kind.
///
/// # Example
///
/// ```rust,ignore
/// use storekit::prelude::*;
///
/// async fn rename<R: Crud<User>>(repo: &R, ctx: &Context, from: &str, to: &str) -> RepositoryResult<u64> {
///     let changes = User { id: 0, name: to.to_string() };
///     repo.update(ctx, &changes, [with_filter(Filter::eq("name", from))]).await
/// }
/// ```
pub trait Crud<T: Entity>: Send + Sync {
    /// Persist one entity as-is
    ///
    /// When the store assigns a primary key it is written back into `entity`.
    fn create(
        &self,
        ctx: &Context,
        entity: &mut T,
    ) -> impl Future<Output = RepositoryResult<()>> + Send;

    /// Write `entity`'s non-key, non-null columns to the targeted rows
    ///
    /// Targets rows matching the options and, when `entity` carries a
    /// primary key, that key. `select` and `omit` narrow the columns that
    /// are written. Returns the number of rows updated.
    ///
    /// An update left without any filter once the options are applied
    /// fails with `ValidationFailed`. Limit, offset, ordering, locking,
    /// grouping and distinct fail with `Unsupported`.
    fn update(
        &self,
        ctx: &Context,
        entity: &T,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Delete rows matching the options, returning the number deleted
    ///
    /// Filtering rules match [`update`](Crud::update): no filter is
    /// `ValidationFailed`, result-shaping directives are `Unsupported`.
    fn delete(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> impl Future<Output = RepositoryResult<u64>> + Send;

    /// Exactly one row, or a `NotFound` error
    fn get(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> impl Future<Output = RepositoryResult<T>> + Send;

    /// Zero or more rows, in store order unless the options impose one
    fn list(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> impl Future<Output = RepositoryResult<Vec<T>>> + Send;

    /// Number of matching rows; pagination is ignored, and projection only
    /// counts when combined with distinct
    fn count(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> impl Future<Output = RepositoryResult<i64>> + Send;
}
