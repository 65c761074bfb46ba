//! 下游單據回呼
//!
//! 銷售訂單、工單、轉移、裝箱、出貨、發票、塗層紀錄提交或取消時呼叫，
//! 重算所參照訂單的階段與整體狀態，並檢查受影響階段的允差。

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use textile_cache::DirtyTracker;
use textile_calc::{profile_for, AllowanceValidator};
use textile_core::{DocumentKind, Order, OrderStatus, Result, Stage};

use crate::context::OperationContext;
use crate::gateway::Backend;
use crate::orchestrator::{FulfillmentOrchestrator, StartReport};

/// 下游單據事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEvent {
    pub order_id: String,
    pub kind: DocumentKind,
}

impl DocumentEvent {
    pub fn new(order_id: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            order_id: order_id.into(),
            kind,
        }
    }
}

impl<B: Backend> FulfillmentOrchestrator<B> {
    /// 單一下游單據提交或取消
    pub fn on_document_event(
        &mut self,
        order_id: &str,
        kind: DocumentKind,
        ctx: &OperationContext,
    ) -> Result<OrderStatus> {
        let mut order = self.backend.load_order(order_id)?;
        self.apply_document_event(&mut order, kind, ctx)?;
        self.notify(&order);
        Ok(order.status)
    }

    /// 一批下游事件；同一訂單只重算一次
    ///
    /// 每張訂單各自回報結果，單一訂單失敗不影響其他訂單的重算
    pub fn on_document_events(
        &mut self,
        events: &[DocumentEvent],
    ) -> Vec<(String, Result<OrderStatus>)> {
        let mut tracker = DirtyTracker::new();
        let mut stages: BTreeMap<&str, Vec<Stage>> = BTreeMap::new();

        for event in events {
            tracker.mark_dirty(event.order_id.as_str());
            let affected = stages.entry(event.order_id.as_str()).or_default();
            for stage in event.kind.affected_stages() {
                if !affected.contains(stage) {
                    affected.push(*stage);
                }
            }
        }

        let mut results = Vec::with_capacity(tracker.len());
        for order_id in tracker.take_dirty() {
            let affected = stages.get(order_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let result = self.recompute_after_events(&order_id, affected);
            if let Err(err) = &result {
                tracing::warn!(order = %order_id, "下游事件重算失敗：{}", err);
            }
            results.push((order_id, result));
        }

        results
    }

    fn recompute_after_events(&mut self, order_id: &str, affected: &[Stage]) -> Result<OrderStatus> {
        let mut order = self.backend.load_order(order_id)?;
        self.recompute(&mut order)?;
        self.notify(&order);

        AllowanceValidator::new(profile_for(order.kind), &self.settings)
            .validate_stages(&order, affected)?;
        Ok(order.status)
    }

    /// 重算並檢查允差；未受保護時，銷售訂單提交可接續建立工單
    pub(crate) fn apply_document_event(
        &mut self,
        order: &mut Order,
        kind: DocumentKind,
        ctx: &OperationContext,
    ) -> Result<()> {
        self.recompute(order)?;

        let profile = profile_for(order.kind);
        AllowanceValidator::new(profile, &self.settings)
            .validate_stages(order, kind.affected_stages())?;

        let continue_with_work_orders = kind == DocumentKind::SalesOrder
            && !ctx.is_guarded()
            && self.settings.auto_work_orders_on_sales_order
            && order.is_submitted()
            && !order.is_closed()
            && profile.is_applicable(Stage::WorkOrdered)
            && order.stages.percent(Stage::WorkOrdered) < Decimal::ONE_HUNDRED;

        if continue_with_work_orders {
            tracing::debug!("銷售訂單已提交，接續建立訂單 {} 的工單", order.id);
            let mut report = StartReport::new(&order.id);
            self.work_order_step(order, &ctx.guarded(), &mut report)?;
        }

        Ok(())
    }
}
