//! Generic repositories over pluggable backends
//!
//! - [`Entity`]: how a record type maps onto a table
//! - [`ConnectionProvider`], [`Handle`], [`UnitOfWork`]: what a backend supplies
//! - [`Repository`]: CRUD over one entity type, plus [`Repository::transaction`]
//! - [`TxScope`]: the same CRUD surface bound to one unit of work
//! - [`Crud`]: the surface both share
//! - [`Logger`]: where failures are reported
//!
//! # Example
//!
//! ```rust,ignore
//! use storekit::prelude::*;
//! use storekit::backend::memory::MemoryStore;
//!
//! let repo = Repository::<User, _>::new(MemoryStore::new());
//! let ctx = Context::new();
//!
//! repo.create(&ctx, &mut User { id: 0, name: "a".into() }).await?;
//! assert_eq!(repo.count(&ctx, QueryOptions::default()).await?, 1);
//!
//! let missing = repo.get(&ctx, [with_filter(Filter::eq("name", "z"))]).await;
//! assert!(missing.unwrap_err().is_not_found());
//! ```

mod entity;
mod error;
mod logger;
mod ops;
mod provider;
mod store;
mod traits;
mod tx;

pub use entity::{Entity, Row};
pub(crate) use entity::is_unset_key;
pub use error::{RepositoryError, RepositoryErrorKind, RepositoryOperation};
pub use logger::{Field, Logger, NoopLogger, TracingLogger};
pub use provider::{ConnectionProvider, Handle, UnitOfWork};
pub use store::Repository;
pub use traits::{Crud, RepositoryResult};
pub use tx::TxScope;
