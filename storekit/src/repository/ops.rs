//! Operation bodies shared by `Repository` and `TxScope`
//!
//! Each function runs one operation on an already-acquired handle. Callers
//! decide where the handle comes from and how failures are reported.

use super::entity::{is_unset_key, Entity, Row};
use super::error::{RepositoryError, RepositoryOperation};
use super::logger::{log_failure, Field, Logger};
use super::provider::Handle;
use super::traits::RepositoryResult;
use crate::context::Context;
use crate::ids::TransactionId;
use crate::query::{apply_options, Filter, QueryBuilder, QueryOptions, Value};

pub(crate) async fn create<T: Entity, H: Handle>(
    handle: &mut H,
    ctx: &Context,
    entity: &mut T,
) -> RepositoryResult<()> {
    let key = handle.insert::<T>(ctx, entity.to_row()).await?;
    entity.set_primary_key(key);
    Ok(())
}

pub(crate) async fn update<T: Entity, H: Handle>(
    handle: &mut H,
    ctx: &Context,
    entity: &T,
    options: QueryOptions,
) -> RepositoryResult<u64> {
    let mut key = Value::Null;
    let mut changes = entity.to_row();
    if let Some(value) = changes.remove(T::PRIMARY_KEY) {
        key = value;
    }
    let changes: Row = changes
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .collect();
    if changes.is_empty() {
        return Err(RepositoryError::validation_failed(
            RepositoryOperation::Update,
            "no non-null columns to update",
        ));
    }

    // The backend refuses the write if this leaves the query unfiltered
    let mut query = handle.query::<T>();
    if !is_unset_key(&key) {
        query.filter(Filter::eq(T::PRIMARY_KEY, key));
    }
    apply_options(&mut query, Some(options));
    handle.update(ctx, query, changes).await
}

pub(crate) async fn delete<T: Entity, H: Handle>(
    handle: &mut H,
    ctx: &Context,
    options: QueryOptions,
) -> RepositoryResult<u64> {
    let mut query = handle.query::<T>();
    apply_options(&mut query, Some(options));
    handle.delete(ctx, query).await
}

pub(crate) async fn get<T: Entity, H: Handle>(
    handle: &mut H,
    ctx: &Context,
    options: QueryOptions,
) -> RepositoryResult<T> {
    let mut query = handle.query::<T>();
    apply_options(&mut query, Some(options));
    match handle.first(ctx, query).await? {
        Some(row) => T::from_row(&row),
        None => Err(RepositoryError::not_found(T::entity_name())),
    }
}

pub(crate) async fn list<T: Entity, H: Handle>(
    handle: &mut H,
    ctx: &Context,
    options: QueryOptions,
) -> RepositoryResult<Vec<T>> {
    let mut query = handle.query::<T>();
    apply_options(&mut query, Some(options));
    handle
        .find(ctx, query)
        .await?
        .iter()
        .map(T::from_row)
        .collect()
}

pub(crate) async fn count<T: Entity, H: Handle>(
    handle: &mut H,
    ctx: &Context,
    options: QueryOptions,
) -> RepositoryResult<i64> {
    let mut query = handle.query::<T>();
    apply_options(&mut query, Some(options));
    handle.count(ctx, query).await
}

/// Stamp `operation` and the entity onto a failure and report it
///
/// Not-found outcomes are returned without being logged.
pub(crate) fn report<T: Entity, R>(
    logger: &dyn Logger,
    ctx: &Context,
    tx: Option<&TransactionId>,
    operation: RepositoryOperation,
    result: RepositoryResult<R>,
) -> RepositoryResult<R> {
    result.map_err(|err| {
        let err = err
            .with_operation(operation)
            .with_entity(T::entity_name());
        if !err.is_not_found() {
            log_error::<T>(logger, ctx, tx, &err);
        }
        err
    })
}

/// Report `err` as-is, without re-stamping its operation
pub(crate) fn log_error<T: Entity>(
    logger: &dyn Logger,
    ctx: &Context,
    tx: Option<&TransactionId>,
    err: &RepositoryError,
) {
    let entity = T::entity_name();
    let mut fields = vec![
        Field::new("entity", entity),
        Field::new("operation", err.operation),
        Field::new("kind", err.kind),
        Field::new("error", err),
    ];
    let message = match tx {
        Some(id) => {
            fields.push(Field::new("tx_id", id));
            format!("{} tx {} failed", entity, err.operation)
        }
        None => format!("{} {} failed", entity, err.operation),
    };
    log_failure(logger, ctx, &message, &fields);
}
