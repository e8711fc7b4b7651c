//! Upload progress broker (component E): per-upload event store with
//! fan-out to bounded SSE subscriber channels. Generalizes the
//! publish/subscribe shape of the teacher's `cluster.rs::ClusterManager`
//! (an `on_*` notification surface over in-process state) from
//! fire-and-forget logging into a real multi-subscriber broadcast with
//! completion retention and background GC.

use crate::models::UploadEvent;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const SUBSCRIBER_CAPACITY: usize = 32;
const ENTRY_TTL: chrono::Duration = chrono::Duration::minutes(5);
const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

pub type EventReceiver = mpsc::Receiver<UploadEvent>;

struct UploadEntry {
    last_event: Option<UploadEvent>,
    completed_at: Option<DateTime<Utc>>,
    subscribers: Vec<mpsc::Sender<UploadEvent>>,
}

impl UploadEntry {
    fn new() -> Self {
        Self {
            last_event: None,
            completed_at: None,
            subscribers: Vec::new(),
        }
    }
}

pub struct ProgressBroker {
    entries: RwLock<HashMap<String, Arc<Mutex<UploadEntry>>>>,
}

impl ProgressBroker {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(&self, upload_id: &str) {
        let mut entries = self.entries.write().await;
        entries.insert(upload_id.to_string(), Arc::new(Mutex::new(UploadEntry::new())));
    }

    pub async fn publish(&self, upload_id: &str, event: UploadEvent) {
        let entry = {
            let entries = self.entries.read().await;
            match entries.get(upload_id) {
                Some(e) => e.clone(),
                None => return,
            }
        };

        let mut entry = entry.lock().await;
        if event.is_terminal() {
            entry.completed_at = Some(Utc::now());
        }
        entry.last_event = Some(event.clone());

        entry.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Returns a receiver and an idempotent unsubscribe closure. Unknown
    /// upload ids get an immediately-closed empty channel. Already
    /// completed uploads get their `lastEvent` replayed once, then close.
    pub async fn subscribe(&self, upload_id: &str) -> (EventReceiver, Box<dyn FnOnce() + Send>) {
        let entry = {
            let entries = self.entries.read().await;
            entries.get(upload_id).cloned()
        };

        let Some(entry) = entry else {
            let (_, rx) = mpsc::channel(1);
            return (rx, Box::new(|| {}));
        };

        let mut guard = entry.lock().await;
        if let Some(completed_at) = guard.completed_at {
            let _ = completed_at;
            let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
            if let Some(last) = guard.last_event.clone() {
                let _ = tx.try_send(last);
            }
            drop(tx);
            return (rx, Box::new(|| {}));
        }

        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        guard.subscribers.push(tx.clone());
        drop(guard);

        let entry_for_unsub = entry.clone();
        let tx_for_unsub = tx;
        let unsubscribe = Box::new(move || {
            tokio::spawn(async move {
                let mut guard = entry_for_unsub.lock().await;
                guard.subscribers.retain(|s| !s.same_channel(&tx_for_unsub));
            });
        });

        (rx, unsubscribe)
    }

    pub fn start_cleanup(self: Arc<Self>, cancel: CancellationToken) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep_expired().await;
                    }
                }
            }
        });
    }

    async fn sweep_expired(&self) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let mut expired = Vec::new();
        for (id, entry) in entries.iter() {
            let guard = entry.lock().await;
            if let Some(completed_at) = guard.completed_at {
                if now - completed_at > ENTRY_TTL {
                    expired.push(id.clone());
                }
            }
        }
        for id in &expired {
            entries.remove(id);
        }
        if !expired.is_empty() {
            debug!("progress broker GC'd {} completed entries", expired.len());
        }
    }
}

impl Default for ProgressBroker {
    fn default() -> Self {
        Self::new()
    }
}
