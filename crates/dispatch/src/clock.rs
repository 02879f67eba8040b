//! Time source for the polling loops.

use std::time::Duration;

use async_trait::async_trait;

/// Monotonic clock plus sleep, injected so the polling loops can be driven
/// without real waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    /// Suspends the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}
