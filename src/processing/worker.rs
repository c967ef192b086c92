use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::metrics;
use crate::models::Item;
use crate::processing::ItemProcessor;

/// Bounded ingest queue between the ingestion collaborator and the
/// worker pool. Backpressure is the sender awaiting capacity.
pub fn ingest_queue(capacity: usize) -> (mpsc::Sender<Item>, mpsc::Receiver<Item>) {
    mpsc::channel(capacity)
}

/// Pool of pipeline workers pulling from the shared ingest queue.
///
/// Items are independent, so workers need no coordination beyond the
/// queue itself; all cross-item races are settled at the store. The
/// pool drains naturally when every sender is dropped.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(
        processor: Arc<ItemProcessor>,
        receiver: mpsc::Receiver<Item>,
        workers: usize,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let processor = Arc::clone(&processor);
            let receiver = Arc::clone(&receiver);
            handles.push(tokio::spawn(async move {
                tracing::debug!(worker_id = worker_id, "Pipeline worker started");
                loop {
                    // Lock only to receive; processing runs unlocked so
                    // workers overlap.
                    let item = { receiver.lock().await.recv().await };
                    match item {
                        Some(item) => {
                            let item_id = item.id;
                            if let Err(e) = processor.process_item(item).await {
                                metrics::ITEMS_PROCESSED_TOTAL
                                    .with_label_values(&["failed"])
                                    .inc();
                                tracing::error!(
                                    worker_id = worker_id,
                                    item_id = %item_id,
                                    error = %e,
                                    "Item processing failed"
                                );
                            }
                        }
                        None => break,
                    }
                }
                tracing::debug!(worker_id = worker_id, "Pipeline worker stopped");
            }));
        }

        Self { handles }
    }

    /// Wait for all workers to drain and exit. Call after dropping the
    /// last sender.
    pub async fn join(self) {
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Pipeline worker panicked");
            }
        }
    }
}
