//! # storekit
//!
//! Generic repositories over pluggable stores, driven by composable query
//! options.
//!
//! ## Features
//!
//! - **Query options**: functional directives and a chainable builder that
//!   fold into one [`QueryOptions`](query::QueryOptions) value
//! - **Fixed-order applier**: options reach the backend in one deterministic
//!   precedence order, whatever order they were written in
//! - **Repositories**: create, update, delete, get, list and count over any
//!   entity type, with failures reported through a pluggable logger
//! - **Transactions**: a callback-scoped view that commits on success and
//!   rolls back on error
//! - **Backends**: an in-memory store, and PostgreSQL through sqlx
//!   (feature `database`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use storekit::prelude::*;
//! use storekit::backend::memory::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let users = Repository::<User, _>::new(MemoryStore::new()).with_logger(TracingLogger);
//!     let ctx = Context::new();
//!
//!     users.create(&ctx, &mut User { id: 0, name: "a".into() }).await?;
//!     let found = users.get(&ctx, [with_filter(Filter::eq("name", "a"))]).await?;
//!     assert_eq!(users.count(&ctx, QueryOptions::default()).await?, 1);
//!
//!     users
//!         .transaction(&ctx, |tx| {
//!             Box::pin(async move {
//!                 let ctx = tx.context().clone();
//!                 tx.delete(&ctx, [with_filter(Filter::eq("id", found.id))]).await?;
//!                 Ok::<_, RepositoryError>(())
//!             })
//!         })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod observability;
pub mod query;
pub mod repository;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, DatabaseConfig, ServiceConfig};
    pub use crate::context::Context;
    pub use crate::error::{Error, Result};
    pub use crate::ids::{RequestId, TransactionId};
    pub use crate::observability::init_tracing;

    pub use crate::query::{
        build_options, with_clauses, with_custom, with_distinct, with_filter, with_group,
        with_having, with_join, with_limit, with_offset, with_omit, with_preload, with_scope,
        with_select, Clause, Filter, FilterCondition, FilterOperator, OrderDirection,
        QueryBuilder, QueryOption, QueryOptions, Scope, Value,
    };

    pub use crate::repository::{
        ConnectionProvider, Crud, Entity, Field, Logger, NoopLogger, Repository,
        RepositoryError, RepositoryErrorKind, RepositoryOperation, RepositoryResult, Row,
        TracingLogger, TxScope,
    };
}
