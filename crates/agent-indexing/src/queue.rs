//! Sync queue and consumer pool.
//!
//! One producer (the trigger) enqueues one message per chain; a pool of
//! workers takes messages off the queue and hands each to a
//! [`MessageHandler`]. Messages travel as their JSON wire form.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agent_types::QueueMessage;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::IndexingError;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Processes one queue message. Failures are the handler's to record.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: QueueMessage);
}

#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn add(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn done(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Producer side of the sync queue.
#[derive(Clone)]
pub struct SyncQueue {
    tx: mpsc::Sender<String>,
    pending: Arc<Pending>,
}

/// Consumer side of the sync queue, shared by the pool's workers.
pub struct QueueReceiver {
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
    pending: Arc<Pending>,
}

/// Create a bounded sync queue.
pub fn sync_queue(capacity: usize) -> (SyncQueue, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = Arc::new(Pending::default());
    (
        SyncQueue {
            tx,
            pending: pending.clone(),
        },
        QueueReceiver {
            rx: Arc::new(Mutex::new(rx)),
            pending,
        },
    )
}

impl SyncQueue {
    /// Enqueue a message, waiting for capacity.
    pub async fn send(&self, message: &QueueMessage) -> Result<(), IndexingError> {
        let json = message
            .to_json()
            .map_err(|e| IndexingError::Serialization(e.to_string()))?;

        self.pending.add();
        if self.tx.send(json).await.is_err() {
            self.pending.done();
            return Err(IndexingError::Queue("sync queue is closed".to_string()));
        }
        Ok(())
    }

    /// Messages enqueued and not yet fully handled.
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// Wait until every enqueued message has been handled.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
impl QueueReceiver {
    /// Take the raw channel back, for tests that read messages directly.
    pub(crate) async fn into_inner(self) -> mpsc::Receiver<String> {
        match Arc::try_unwrap(self.rx) {
            Ok(rx) => rx.into_inner(),
            Err(_) => panic!("queue receiver is shared"),
        }
    }
}

/// Worker pool draining a [`QueueReceiver`].
pub struct ConsumerPool {
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl ConsumerPool {
    /// Spawn `workers` workers. They stop when `cancel` fires or the queue
    /// closes; a message already being handled runs to completion.
    pub fn start(
        receiver: QueueReceiver,
        handler: Arc<dyn MessageHandler>,
        workers: usize,
        cancel: CancellationToken,
    ) -> Self {
        let workers = workers.max(1);
        let handles = (0..workers)
            .map(|worker| {
                let rx = receiver.rx.clone();
                let pending = receiver.pending.clone();
                let handler = handler.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    run_worker(worker, rx, pending, handler, cancel).await;
                })
            })
            .collect();

        info!(workers, "Sync consumer pool started");
        Self { handles, cancel }
    }

    /// Stop the workers and wait for them to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Sync worker ended abnormally");
            }
        }
        info!("Sync consumer pool stopped");
    }
}

async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
    pending: Arc<Pending>,
    handler: Arc<dyn MessageHandler>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            raw = async { rx.lock().await.recv().await } => raw,
        };
        let Some(raw) = next else {
            debug!(worker, "Sync queue closed");
            break;
        };

        match QueueMessage::from_json(&raw) {
            Ok(message) => {
                debug!(worker, "Handling queue message");
                handler.handle(message).await;
            }
            Err(e) => warn!(worker, error = %e, raw = %raw, "Dropping malformed queue message"),
        }
        pending.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_types::ChainSyncMessage;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: StdMutex<Vec<u64>>,
    }

    #[async_trait]
    impl MessageHandler for Recorder {
        async fn handle(&self, message: QueueMessage) {
            let QueueMessage::ChainSync(msg) = message;
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.seen.lock().unwrap().push(msg.chain_id);
        }
    }

    #[tokio::test]
    async fn test_pool_drains_queue() {
        let (queue, receiver) = sync_queue(8);
        let recorder = Arc::new(Recorder::default());
        let pool = ConsumerPool::start(receiver, recorder.clone(), 3, CancellationToken::new());

        for chain in [1, 2, 3, 4, 5] {
            queue
                .send(&QueueMessage::ChainSync(ChainSyncMessage::new(chain)))
                .await
                .unwrap();
        }
        queue.wait_idle().await;

        let mut seen = recorder.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(queue.pending(), 0);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_idle_on_empty_queue() {
        let (queue, _receiver) = sync_queue(1);
        tokio::time::timeout(Duration::from_secs(1), queue.wait_idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (queue, receiver) = sync_queue(1);
        drop(receiver);
        let err = queue
            .send(&QueueMessage::ChainSync(ChainSyncMessage::new(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexingError::Queue(_)));
        assert_eq!(queue.pending(), 0);
    }
}
