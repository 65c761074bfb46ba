//! 訂單整體狀態機
//!
//! 由上而下逐條比對，第一條成立者即為結果

use rust_decimal::Decimal;
use textile_core::{DocStatus, ManualOverride, Order, OrderStatus, StageStatus};

use crate::profile::StatusRules;

/// 狀態機輸入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusInput {
    pub doc_status: DocStatus,
    pub manual_override: Option<ManualOverride>,
    pub artifacts_resolved: bool,
    /// 確認階段百分比（印花外部客戶為訂購，內部客戶為工單）
    pub confirmation_percent: Decimal,
    pub produced: StageStatus,
    pub delivered: StageStatus,
    pub billed: StageStatus,
    /// 單一生產階段的狀態（塗層）
    pub production_stage: StageStatus,
    /// 是否已有生產紀錄
    pub has_production_entry: bool,
}

impl StatusInput {
    /// 從訂單目前的階段看板取值
    pub fn from_order(order: &Order, rules: &StatusRules, has_production_entry: bool) -> Self {
        let (confirmation_percent, production_stage) = match rules {
            StatusRules::Fulfillment {
                confirmation_stage, ..
            } => (order.stages.percent(*confirmation_stage), StageStatus::NotApplicable),
            StatusRules::Production { stage } => (Decimal::ZERO, order.stages.status(*stage)),
        };

        Self {
            doc_status: order.doc_status,
            manual_override: order.manual_override,
            artifacts_resolved: order.all_artifacts_resolved(),
            confirmation_percent,
            produced: order.stages.produced.status,
            delivered: order.stages.delivered.status,
            billed: order.stages.billed.status,
            production_stage,
            has_production_entry,
        }
    }
}

/// 狀態機
pub struct StatusStateMachine;

impl StatusStateMachine {
    /// 推導整體狀態
    pub fn derive(rules: &StatusRules, input: &StatusInput) -> OrderStatus {
        match input.doc_status {
            DocStatus::Draft => OrderStatus::Draft,
            DocStatus::Cancelled => OrderStatus::Cancelled,
            DocStatus::Submitted => match input.manual_override {
                Some(ManualOverride::Closed) => OrderStatus::Closed,
                Some(ManualOverride::Stopped) => OrderStatus::Stopped,
                None => match rules {
                    StatusRules::Fulfillment {
                        confirmation_status,
                        ..
                    } => Self::fulfillment(*confirmation_status, input),
                    StatusRules::Production { .. } => Self::production(input),
                },
            },
        }
    }

    fn fulfillment(confirmation_status: OrderStatus, input: &StatusInput) -> OrderStatus {
        if !input.artifacts_resolved {
            OrderStatus::ToCreateItems
        } else if input.confirmation_percent < Decimal::ONE_HUNDRED {
            confirmation_status
        } else if input.produced == StageStatus::Pending {
            OrderStatus::ToProduce
        } else if input.delivered == StageStatus::Pending {
            OrderStatus::ToDeliver
        } else if input.billed == StageStatus::Pending {
            OrderStatus::ToBill
        } else {
            OrderStatus::Completed
        }
    }

    fn production(input: &StatusInput) -> OrderStatus {
        if input.production_stage == StageStatus::Completed {
            OrderStatus::Completed
        } else if input.has_production_entry {
            OrderStatus::InProcess
        } else {
            OrderStatus::NotStarted
        }
    }

    /// 重算並寫回訂單，狀態改變時附加紀錄
    pub fn apply(order: &mut Order, rules: &StatusRules, has_production_entry: bool) -> OrderStatus {
        let input = StatusInput::from_order(order, rules, has_production_entry);
        let next = Self::derive(rules, &input);

        if next != order.status {
            tracing::info!(order = %order.id, from = %order.status, to = %next, "訂單狀態變更");
        }
        order.transition_to(next);
        next
    }
}
