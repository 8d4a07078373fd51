//! Fire-and-forget persistence.
//!
//! Mutations enqueue a `(key, value)` pair and return immediately. A single
//! writer task drains the queue in order, so the last mutation is always the
//! last write. Failures are logged and never reach the UI.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::host::KeyValueStore;

enum WriteOp {
    Set { key: &'static str, value: String },
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct Persister {
    tx: Option<mpsc::UnboundedSender<WriteOp>>,
}

impl Persister {
    /// Start the writer task. Without storage every save is a no-op.
    pub fn spawn(storage: Option<Arc<dyn KeyValueStore>>) -> Self {
        let Some(storage) = storage else {
            debug!("persist: no host storage, changes stay in memory");
            return Self { tx: None };
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Set { key, value } => {
                        if let Err(e) = storage.set(key, value).await {
                            error!("persist: saving {} failed: {}", key, e);
                        } else {
                            debug!("persist: saved {}", key);
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("persist: writer stopped");
        });
        Self { tx: Some(tx) }
    }

    /// A persister that drops every write.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn save(&self, key: &'static str, value: String) {
        if let Some(tx) = &self.tx {
            if tx.send(WriteOp::Set { key, value }).is_err() {
                error!("persist: writer gone, {} not saved", key);
            }
        }
    }

    /// Resolves once every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let Some(tx) = &self.tx else { return };
        let (done_tx, done_rx) = oneshot::channel();
        if tx.send(WriteOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = Arc::new(MemoryStore::new());
        let persister = Persister::spawn(Some(store.clone() as Arc<dyn KeyValueStore>));
        for i in 0..50 {
            persister.save("k", i.to_string());
        }
        persister.flush().await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("49"));
    }

    #[tokio::test]
    async fn test_disabled_is_noop() {
        let persister = Persister::disabled();
        persister.save("k", "v".to_string());
        persister.flush().await;
    }
}
