use anyhow::Result;

use crate::daemon::storage::entities::TickEvent;

/// Represents an event processor. The sampler only knows it hands ticks to someone, which keeps
/// the door open for sinks other than the local store.
pub trait EventProcessor {
    fn process_next(&mut self, message: TickEvent) -> impl std::future::Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
