//! The transaction-bound view of a repository

use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::entity::Entity;
use super::error::RepositoryOperation;
use super::logger::Logger;
use super::ops;
use super::provider::UnitOfWork;
use super::traits::{Crud, RepositoryResult};
use crate::context::Context;
use crate::ids::TransactionId;
use crate::query::{build_options, QueryOption};

/// CRUD access to `T` inside one open unit of work
///
/// Only [`Repository::transaction`](super::Repository::transaction) creates
/// one, and only for the duration of its callback. Every operation runs on
/// the same unit of work; failures are logged as `"<entity> tx <op> failed"`
/// with the transaction ID attached.
pub struct TxScope<T, X> {
    tx: Mutex<X>,
    id: TransactionId,
    logger: Arc<dyn Logger>,
    ctx: Context,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, X: UnitOfWork> TxScope<T, X> {
    pub(crate) fn new(tx: X, id: TransactionId, logger: Arc<dyn Logger>, ctx: Context) -> Self {
        Self {
            tx: Mutex::new(tx),
            id,
            logger,
            ctx,
            _entity: PhantomData,
        }
    }

    pub(crate) fn into_parts(self) -> (X, TransactionId) {
        (self.tx.into_inner(), self.id)
    }

    /// The context the transaction was opened with
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    fn report<R>(
        &self,
        ctx: &Context,
        operation: RepositoryOperation,
        result: RepositoryResult<R>,
    ) -> RepositoryResult<R> {
        ops::report::<T, R>(self.logger.as_ref(), ctx, Some(&self.id), operation, result)
    }
}

impl<T: Entity, X: UnitOfWork> Crud<T> for TxScope<T, X> {
    async fn create(&self, ctx: &Context, entity: &mut T) -> RepositoryResult<()> {
        let mut tx = self.tx.lock().await;
        let result = ops::create(&mut *tx, ctx, entity).await;
        self.report(ctx, RepositoryOperation::Create, result)
    }

    async fn update(
        &self,
        ctx: &Context,
        entity: &T,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<u64> {
        let options = build_options(opts);
        let mut tx = self.tx.lock().await;
        let result = ops::update(&mut *tx, ctx, entity, options).await;
        self.report(ctx, RepositoryOperation::Update, result)
    }

    async fn delete(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<u64> {
        let options = build_options(opts);
        let mut tx = self.tx.lock().await;
        let result = ops::delete::<T, _>(&mut *tx, ctx, options).await;
        self.report(ctx, RepositoryOperation::Delete, result)
    }

    async fn get(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<T> {
        let options = build_options(opts);
        let mut tx = self.tx.lock().await;
        let result = ops::get(&mut *tx, ctx, options).await;
        self.report(ctx, RepositoryOperation::Get, result)
    }

    async fn list(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<Vec<T>> {
        let options = build_options(opts);
        let mut tx = self.tx.lock().await;
        let result = ops::list(&mut *tx, ctx, options).await;
        self.report(ctx, RepositoryOperation::List, result)
    }

    async fn count(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<i64> {
        let options = build_options(opts);
        let mut tx = self.tx.lock().await;
        let result = ops::count::<T, _>(&mut *tx, ctx, options).await;
        self.report(ctx, RepositoryOperation::Count, result)
    }
}
