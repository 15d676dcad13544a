use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::daemon::storage::{aggregation_store::AggregationStore, entities::TickEvent};

use super::module::EventProcessor;

/// Bridges [ProcessingModule](super::ProcessingModule) and the [AggregationStore]. Being the only
/// consumer of the tick channel makes it the only writer, so ticks land one at a time and in
/// order.
pub struct StoreWriter {
    store: Arc<dyn AggregationStore>,
}

impl StoreWriter {
    pub fn new(store: Arc<dyn AggregationStore>) -> Self {
        Self { store }
    }
}

impl EventProcessor for StoreWriter {
    async fn process_next(&mut self, message: TickEvent) -> Result<()> {
        let store = self.store.clone();
        // SQLite calls block, keep them off the timer thread.
        tokio::task::spawn_blocking(move || store.record_tick(&message))
            .await
            .context("Store write panicked")?
    }

    async fn finalize(&mut self) -> Result<()> {
        let store = self.store.clone();
        let today = tokio::task::spawn_blocking(move || store.today_stats())
            .await
            .context("Store read panicked")??;
        info!("Tick stream closed, today so far {today:?}");
        debug!("No writes pending");
        Ok(())
    }
}
