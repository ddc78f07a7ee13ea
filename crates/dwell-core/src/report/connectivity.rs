use async_trait::async_trait;
use tokio::sync::watch;

/// Answers "is the device currently reachable".
#[async_trait]
pub trait ConnectivityOracle: Send + Sync {
    async fn is_reachable(&self) -> bool;

    /// Reachability changes, if the platform can push them.
    ///
    /// Used to replay the offline queue on reconnect. Oracles that can only
    /// be polled return `None`.
    fn watch(&self) -> Option<watch::Receiver<bool>> {
        None
    }
}
