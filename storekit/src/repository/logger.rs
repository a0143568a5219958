//! Failure logging capability
//!
//! Repositories report failed operations to a [`Logger`]. Logging is best
//! effort: a logger that panics is contained and the caller's result is
//! returned untouched.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::context::Context;

/// One structured key/value attached to a failure record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub value: String,
}

impl Field {
    pub fn new(key: &'static str, value: impl fmt::Display) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

/// Sink for structured failure records
pub trait Logger: Send + Sync {
    /// Record a failure; must not fail the caller
    fn error(&self, ctx: &Context, message: &str, fields: &[Field]);
}

/// Discards every record; the default when no logger is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn error(&self, _ctx: &Context, _message: &str, _fields: &[Field]) {}
}

/// Forwards failure records to `tracing` as error events
///
/// The `entity`, `operation`, `kind` and `error` fields become event fields
/// of the same name; anything else is rendered into `extra` as `key=value`
/// pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, ctx: &Context, message: &str, fields: &[Field]) {
        let lookup = |key: &str| {
            fields
                .iter()
                .find(|f| f.key == key)
                .map(|f| f.value.as_str())
                .unwrap_or_default()
        };
        let extra = fields
            .iter()
            .filter(|f| !matches!(f.key, "entity" | "operation" | "kind" | "error"))
            .map(|f| format!("{}={}", f.key, f.value))
            .collect::<Vec<_>>()
            .join(" ");

        tracing::error!(
            request_id = %ctx.request_id(),
            entity = lookup("entity"),
            operation = lookup("operation"),
            kind = lookup("kind"),
            error = lookup("error"),
            extra = %extra,
            "{}",
            message
        );
    }
}

/// Call `logger`, swallowing any panic it raises
pub(crate) fn log_failure(logger: &dyn Logger, ctx: &Context, message: &str, fields: &[Field]) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| logger.error(ctx, message, fields)));
    if outcome.is_err() {
        tracing::warn!(
            request_id = %ctx.request_id(),
            "failure logger panicked; record dropped: {}",
            message
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// A record captured by [`CapturingLogger`]
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct Record {
        pub message: String,
        pub fields: Vec<Field>,
    }

    impl Record {
        pub fn field(&self, key: &str) -> Option<&str> {
            self.fields
                .iter()
                .find(|f| f.key == key)
                .map(|f| f.value.as_str())
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct CapturingLogger {
        records: Mutex<Vec<Record>>,
    }

    impl CapturingLogger {
        pub fn records(&self) -> Vec<Record> {
            self.records.lock().unwrap().clone()
        }
    }

    impl Logger for CapturingLogger {
        fn error(&self, _ctx: &Context, message: &str, fields: &[Field]) {
            self.records.lock().unwrap().push(Record {
                message: message.to_string(),
                fields: fields.to_vec(),
            });
        }
    }

    #[derive(Debug, Default)]
    pub(crate) struct PanickingLogger;

    impl Logger for PanickingLogger {
        fn error(&self, _ctx: &Context, _message: &str, _fields: &[Field]) {
            panic!("logger exploded");
        }
    }
}
