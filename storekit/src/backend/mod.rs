//! Storage backends
//!
//! - [`memory`]: in-process tables, always available
//! - `postgres`: PostgreSQL through sqlx (feature `database`)
//!
//! Both record queries into a [`QueryPlan`] and interpret it on execution.

pub mod memory;
mod plan;
#[cfg(feature = "database")]
pub mod postgres;

pub use plan::QueryPlan;
