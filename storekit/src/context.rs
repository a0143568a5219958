//! Per-call execution context
//!
//! A [`Context`] travels with every repository call. It identifies the
//! request in failure logs and carries a cancellation signal that backends
//! honor between and during store round trips.
//!
//! # Example
//!
//! ```rust
//! use storekit::context::Context;
//!
//! let ctx = Context::new();
//! let child = ctx.child();
//! ctx.cancel();
//! assert!(child.is_cancelled());
//! assert_eq!(child.request_id(), ctx.request_id());
//! ```

use tokio_util::sync::CancellationToken;

use crate::ids::RequestId;

/// Request identity plus cancellation for one logical call
#[derive(Debug, Clone, Default)]
pub struct Context {
    request_id: RequestId,
    cancellation: CancellationToken,
}

impl Context {
    /// Fresh context with a new request ID
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for an existing request ID
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Derive a context sharing this request ID that is cancelled with it
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            cancellation: self.cancellation.child_token(),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_live() {
        let ctx = Context::new();
        assert!(!ctx.is_cancelled());
        assert!(ctx.request_id().as_str().starts_with("req_"));
    }

    #[test]
    fn test_child_does_not_cancel_parent() {
        let parent = Context::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_external_token() {
        let token = CancellationToken::new();
        let ctx = Context::new().with_cancellation(token.clone());
        token.cancel();
        ctx.cancellation().cancelled().await;
        assert!(ctx.is_cancelled());
    }
}
