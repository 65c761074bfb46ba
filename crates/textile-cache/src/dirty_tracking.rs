//! 待重算訂單追蹤

use std::collections::BTreeSet;

/// 髒標記追蹤器
///
/// 同一訂單在一批下游事件中被多次標記時，只需重算一次。
#[derive(Debug, Default)]
pub struct DirtyTracker {
    dirty_orders: BTreeSet<String>,
}

impl DirtyTracker {
    /// 創建新的追蹤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 標記訂單待重算，回傳是否為新標記
    pub fn mark_dirty(&mut self, order_id: impl Into<String>) -> bool {
        self.dirty_orders.insert(order_id.into())
    }

    /// 檢查訂單是否待重算
    pub fn is_dirty(&self, order_id: &str) -> bool {
        self.dirty_orders.contains(order_id)
    }

    pub fn len(&self) -> usize {
        self.dirty_orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty_orders.is_empty()
    }

    /// 取出所有待重算訂單並清空
    pub fn take_dirty(&mut self) -> Vec<String> {
        std::mem::take(&mut self.dirty_orders).into_iter().collect()
    }

    /// 清除所有髒標記
    pub fn clear(&mut self) {
        self.dirty_orders.clear();
    }
}
