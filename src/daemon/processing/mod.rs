use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use super::storage::entities::TickEvent;

pub mod module;
pub mod store_writer;

/// Represents consumer of ticks. This module is responsible for receiving ticks and handing them
/// to the processor one by one. A failed tick is logged and dropped, the loop keeps going.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<TickEvent>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<TickEvent>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    /// Runs until every sender is dropped.
    pub async fn run(mut self) -> Result<()> {
        while let Some(tick) = self.receiver.recv().await {
            debug!("Processing tick {:?}", tick);
            let summary = format!("{} {}:00", tick.date, tick.hour);
            match self.processor.process_next(tick).await {
                Ok(_) => {
                    info!("Processed tick {summary}")
                }
                Err(e) => {
                    error!("Dropped tick {summary}: {e:?}")
                }
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}
