//! The generic repository

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::entity::Entity;
use super::error::{RepositoryError, RepositoryOperation};
use super::logger::{Logger, NoopLogger};
use super::ops;
use super::provider::{ConnectionProvider, UnitOfWork};
use super::traits::{Crud, RepositoryResult};
use super::tx::TxScope;
use crate::context::Context;
use crate::ids::TransactionId;
use crate::query::{build_options, QueryOption};

/// CRUD access to entity type `T` through connection provider `P`
///
/// Build one per entity type and keep it for the life of the service. Every
/// call acquires its own handle from the provider, so a repository can be
/// shared across tasks.
///
/// # Example
///
/// ```rust,ignore
/// use storekit::prelude::*;
/// use storekit::backend::memory::MemoryStore;
///
/// let repo = Repository::<User, _>::new(MemoryStore::new()).with_logger(TracingLogger);
/// let ctx = Context::new();
///
/// let mut user = User { id: 0, name: "a".into() };
/// repo.create(&ctx, &mut user).await?;
/// let found = repo.get(&ctx, [with_filter(Filter::eq("name", "a"))]).await?;
/// assert_eq!(found, user);
/// ```
pub struct Repository<T, P> {
    provider: P,
    logger: Arc<dyn Logger>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, P: ConnectionProvider> Repository<T, P> {
    /// Repository over `provider` that logs nothing
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            logger: Arc::new(NoopLogger),
            _entity: PhantomData,
        }
    }

    /// Report failures to `logger`
    #[must_use]
    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Report failures to a shared logger
    #[must_use]
    pub fn with_shared_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run `f` inside one unit of work
    ///
    /// The scope handed to `f` runs every operation on the same unit of
    /// work. When `f` returns `Ok` the unit is committed; a commit failure
    /// is returned as `TransactionAborted`. When `f` returns `Err` the unit
    /// is rolled back and that error is returned unchanged. A failed
    /// rollback is logged and never replaces the callback's error.
    ///
    /// The scope cannot outlive the callback.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// repo.transaction(&ctx, |tx| {
    ///     let ctx = tx.context().clone();
    ///     Box::pin(async move {
    ///         let mut user = User { id: 0, name: "b".into() };
    ///         tx.create(&ctx, &mut user).await?;
    ///         tx.delete(&ctx, [with_filter(Filter::eq("name", "a"))]).await?;
    ///         Ok::<_, RepositoryError>(())
    ///     })
    /// })
    /// .await?;
    /// ```
    pub async fn transaction<R, E, F>(&self, ctx: &Context, f: F) -> Result<R, E>
    where
        F: for<'t> FnOnce(&'t mut TxScope<T, P::Tx>) -> BoxFuture<'t, Result<R, E>> + Send,
        E: From<RepositoryError> + Send,
        R: Send,
    {
        let tx_id = TransactionId::new();
        let tx = match self.provider.begin(ctx).await {
            Ok(tx) => tx,
            Err(err) => {
                let err = err
                    .with_operation(RepositoryOperation::Transaction)
                    .with_entity(T::entity_name());
                ops::log_error::<T>(self.logger.as_ref(), ctx, Some(&tx_id), &err);
                return Err(E::from(err));
            }
        };
        tracing::debug!(tx_id = %tx_id, entity = T::entity_name(), "transaction started");

        let mut scope = TxScope::new(tx, tx_id, Arc::clone(&self.logger), ctx.clone());
        let outcome = f(&mut scope).await;
        let (tx, tx_id) = scope.into_parts();

        match outcome {
            Ok(value) => match tx.commit(ctx).await {
                Ok(()) => {
                    tracing::debug!(tx_id = %tx_id, "transaction committed");
                    Ok(value)
                }
                Err(err) => {
                    let err = RepositoryError::transaction_aborted(format!(
                        "commit failed: {}",
                        err.message
                    ))
                    .with_entity(T::entity_name());
                    ops::log_error::<T>(self.logger.as_ref(), ctx, Some(&tx_id), &err);
                    Err(E::from(err))
                }
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback(ctx).await {
                    let rollback_err = rollback_err
                        .with_operation(RepositoryOperation::Transaction)
                        .with_entity(T::entity_name());
                    ops::log_error::<T>(self.logger.as_ref(), ctx, Some(&tx_id), &rollback_err);
                }
                tracing::debug!(tx_id = %tx_id, "transaction rolled back");
                Err(err)
            }
        }
    }
}

impl<T, P: fmt::Debug> fmt::Debug for Repository<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &std::any::type_name::<T>())
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

impl<T: Entity, P: ConnectionProvider> Crud<T> for Repository<T, P> {
    async fn create(&self, ctx: &Context, entity: &mut T) -> RepositoryResult<()> {
        let result = async {
            let mut handle = self.provider.db(ctx).await?;
            ops::create(&mut handle, ctx, entity).await
        }
        .await;
        ops::report::<T, _>(self.logger.as_ref(), ctx, None, RepositoryOperation::Create, result)
    }

    async fn update(
        &self,
        ctx: &Context,
        entity: &T,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<u64> {
        let options = build_options(opts);
        let result = async {
            let mut handle = self.provider.db(ctx).await?;
            ops::update(&mut handle, ctx, entity, options).await
        }
        .await;
        ops::report::<T, _>(self.logger.as_ref(), ctx, None, RepositoryOperation::Update, result)
    }

    async fn delete(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<u64> {
        let options = build_options(opts);
        let result = async {
            let mut handle = self.provider.db(ctx).await?;
            ops::delete::<T, _>(&mut handle, ctx, options).await
        }
        .await;
        ops::report::<T, _>(self.logger.as_ref(), ctx, None, RepositoryOperation::Delete, result)
    }

    async fn get(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<T> {
        let options = build_options(opts);
        let result = async {
            let mut handle = self.provider.db(ctx).await?;
            ops::get(&mut handle, ctx, options).await
        }
        .await;
        ops::report::<T, _>(self.logger.as_ref(), ctx, None, RepositoryOperation::Get, result)
    }

    async fn list(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<Vec<T>> {
        let options = build_options(opts);
        let result = async {
            let mut handle = self.provider.db(ctx).await?;
            ops::list(&mut handle, ctx, options).await
        }
        .await;
        ops::report::<T, _>(self.logger.as_ref(), ctx, None, RepositoryOperation::List, result)
    }

    async fn count(
        &self,
        ctx: &Context,
        opts: impl IntoIterator<Item = QueryOption> + Send,
    ) -> RepositoryResult<i64> {
        let options = build_options(opts);
        let result = async {
            let mut handle = self.provider.db(ctx).await?;
            ops::count::<T, _>(&mut handle, ctx, options).await
        }
        .await;
        ops::report::<T, _>(self.logger.as_ref(), ctx, None, RepositoryOperation::Count, result)
    }
}
