//! Request-scoped context passed explicitly through every layer.
//!
//! A [`RequestContext`] carries the operation ID used for log correlation,
//! the acting user (if any) and a cancellation token. Waits on cache locks,
//! transactions and store I/O all race against [`RequestContext::cancelled`].

use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Per-request fields and cancellation.
///
/// Cloning shares the same cancellation token. Use [`child`](Self::child)
/// for sub-operations that may be cancelled independently of the parent.
#[derive(Debug, Clone)]
pub struct RequestContext {
    operation_id: String,
    op_user_id: Option<String>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Creates a context with the given operation ID and a fresh token.
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self { operation_id: operation_id.into(), op_user_id: None, cancel: CancellationToken::new() }
    }

    /// Creates a context for work not tied to an inbound request.
    ///
    /// The operation ID is random so log lines can still be correlated.
    #[must_use]
    pub fn background() -> Self {
        let id: u64 = rand::rng().random();
        Self::new(format!("bg-{id:016x}"))
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_op_user(mut self, user_id: impl Into<String>) -> Self {
        self.op_user_id = Some(user_id.into());
        self
    }

    /// Replaces the cancellation token, e.g. with one owned by a server
    /// shutdown handler.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Derives a context cancelled whenever `self` is, but which can also be
    /// cancelled on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            operation_id: self.operation_id.clone(),
            op_user_id: self.op_user_id.clone(),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn op_user_id(&self) -> Option<&str> {
        self.op_user_id.as_deref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancels this context and all of its children.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once the context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}
