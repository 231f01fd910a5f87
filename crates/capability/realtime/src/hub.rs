use crate::event::RealtimeEvent;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// 每个订阅者的待发送队列长度。
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// 订阅句柄：接收已序列化的事件文本。
pub struct Subscription {
    id: String,
    receiver: mpsc::Receiver<Arc<str>>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.receiver.try_recv().ok()
    }
}

/// 实时广播中心。
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    capacity: usize,
    subscribers: RwLock<HashMap<String, mpsc::Sender<Arc<str>>>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                capacity: capacity.max(1),
                subscribers: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        let id = uuid::Uuid::new_v4().to_string();
        match self.inner.subscribers.write() {
            Ok(mut subscribers) => {
                subscribers.insert(id.clone(), sender);
                info!(target: "scada.realtime", subscriber_id = %id, total = subscribers.len(), "subscriber_added");
            }
            Err(_) => warn!(target: "scada.realtime", "subscriber_lock_failed"),
        }
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: &str) {
        if let Ok(mut subscribers) = self.inner.subscribers.write() {
            if subscribers.remove(id).is_some() {
                info!(target: "scada.realtime", subscriber_id = id, total = subscribers.len(), "subscriber_removed");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// 向全部订阅者投递，返回成功投递数。投递失败的订阅者被移除。
    pub fn broadcast(&self, event: &RealtimeEvent) -> usize {
        let payload: Arc<str> = match serde_json::to_string(event) {
            Ok(text) => Arc::from(text),
            Err(err) => {
                warn!(target: "scada.realtime", kind = event.kind(), error = %err, "event_serialize_failed");
                return 0;
            }
        };
        let Ok(mut subscribers) = self.inner.subscribers.write() else {
            warn!(target: "scada.realtime", "subscriber_lock_failed");
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|id, sender| match sender.try_send(Arc::clone(&payload)) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!(target: "scada.realtime", subscriber_id = %id, "subscriber_lagging_dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(target: "scada.realtime", subscriber_id = %id, "subscriber_closed_dropped");
                false
            }
        });
        delivered
    }
}
