//! 進度事件

use serde::{Deserialize, Serialize};
use textile_core::OrderStatus;
use tokio::sync::broadcast;
use uuid::Uuid;

/// 履約進度事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ProgressEvent {
    /// 某步驟完成 `completed / total`
    Step {
        order_id: String,
        title: String,
        completed: usize,
        total: usize,
    },
    /// 訂單狀態已重算
    OrderUpdated {
        order_id: String,
        status: OrderStatus,
    },
    TaskFinished {
        task_id: Uuid,
        order_id: String,
    },
    TaskFailed {
        task_id: Uuid,
        order_id: String,
        message: String,
    },
}

impl ProgressEvent {
    pub fn step(order_id: &str, title: &str, completed: usize, total: usize) -> Self {
        ProgressEvent::Step {
            order_id: order_id.to_string(),
            title: title.to_string(),
            completed,
            total,
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            ProgressEvent::Step { order_id, .. }
            | ProgressEvent::OrderUpdated { order_id, .. }
            | ProgressEvent::TaskFinished { order_id, .. }
            | ProgressEvent::TaskFailed { order_id, .. } => order_id,
        }
    }
}

/// 進度接收端
pub trait ProgressSink: Send + Sync {
    fn publish(&self, event: ProgressEvent);
}

/// 丟棄所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn publish(&self, _event: ProgressEvent) {}
}

/// 廣播進度事件給所有訂閱者
#[derive(Debug, Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ProgressSink for ProgressBus {
    fn publish(&self, event: ProgressEvent) {
        // 沒有訂閱者時直接丟棄
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_delivers_to_subscribers() {
        let bus = ProgressBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(ProgressEvent::step("PO-1", "Creating Work Orders", 1, 3));

        let event = rx.try_recv().unwrap();
        assert_eq!(event.order_id(), "PO-1");
        assert_eq!(event, ProgressEvent::step("PO-1", "Creating Work Orders", 1, 3));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = ProgressBus::default();
        bus.publish(ProgressEvent::OrderUpdated {
            order_id: "PO-1".into(),
            status: OrderStatus::ToBill,
        });
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_string(&ProgressEvent::step("PO-9", "Transferring Fabric", 0, 1)).unwrap();
        assert!(json.contains(r#""type":"Step""#));
        assert!(json.contains(r#""total":1"#));
    }
}
