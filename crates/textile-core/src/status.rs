//! 訂單整體狀態

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 訂單整體狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Draft,
    ToCreateItems,
    ToConfirmOrder,
    NotStarted,
    InProcess,
    ToProduce,
    ToDeliver,
    ToBill,
    Completed,
    Closed,
    Stopped,
    Cancelled,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "Draft",
            OrderStatus::ToCreateItems => "To Create Items",
            OrderStatus::ToConfirmOrder => "To Confirm Order",
            OrderStatus::NotStarted => "Not Started",
            OrderStatus::InProcess => "In Process",
            OrderStatus::ToProduce => "To Produce",
            OrderStatus::ToDeliver => "To Deliver",
            OrderStatus::ToBill => "To Bill",
            OrderStatus::Completed => "Completed",
            OrderStatus::Closed => "Closed",
            OrderStatus::Stopped => "Stopped",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 狀態變更紀錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusComment {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
}

impl StatusComment {
    pub fn new(from: OrderStatus, to: OrderStatus) -> Self {
        Self {
            from,
            to,
            at: Utc::now(),
        }
    }

    pub fn message(&self) -> String {
        format!("狀態由 {} 變更為 {}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_message() {
        let comment = StatusComment::new(OrderStatus::ToProduce, OrderStatus::ToDeliver);
        assert!(comment.message().contains("To Produce"));
        assert!(comment.message().contains("To Deliver"));
    }
}
