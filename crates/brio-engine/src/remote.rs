//! The remote side-effect seam.

use crate::error::RemoteError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;

/// An asynchronous, nullary remote side-effect bound to a mutation.
///
/// The engine treats an `Err` as failure and forwards the error value
/// opaquely. Retries re-invoke `run` on the same action, so implementations
/// that are not idempotent should not be combined with a retry budget.
#[async_trait]
pub trait RemoteAction: Send + Sync {
    /// Perform the remote call.
    async fn run(&self) -> Result<(), RemoteError>;
}

/// Adapter wrapping a plain async closure as a [`RemoteAction`].
pub(crate) struct FnRemote {
    f: Box<dyn Fn() -> BoxFuture<'static, Result<(), RemoteError>> + Send + Sync>,
}

impl FnRemote {
    pub(crate) fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RemoteError>> + Send + 'static,
    {
        Self {
            f: Box::new(move || Box::pin(f())),
        }
    }
}

#[async_trait]
impl RemoteAction for FnRemote {
    async fn run(&self) -> Result<(), RemoteError> {
        (self.f)().await
    }
}
