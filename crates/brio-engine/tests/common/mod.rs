//! Shared helpers for the engine integration tests.

use brio_engine::RemoteError;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub type RemoteFuture = Pin<Box<dyn Future<Output = Result<(), RemoteError>> + Send>>;

/// A remote action resolved manually from the test body.
///
/// Send `Ok(())` through the returned sender to resolve the remote call,
/// or `Err(message)` to reject it.
pub fn gate() -> (
    oneshot::Sender<Result<(), String>>,
    impl Fn() -> RemoteFuture + Send + Sync + 'static,
) {
    let (sender, receiver) = oneshot::channel::<Result<(), String>>();
    let receiver = Arc::new(Mutex::new(Some(receiver)));
    let remote = move || -> RemoteFuture {
        let receiver = receiver.lock().unwrap().take();
        Box::pin(async move {
            match receiver {
                Some(receiver) => match receiver.await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(message)) => Err(message.into()),
                    Err(_) => Err("gate dropped".into()),
                },
                None => Err("remote invoked more than once".into()),
            }
        })
    };
    (sender, remote)
}

/// Poll a condition on the current-thread runtime until it holds.
pub async fn until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
