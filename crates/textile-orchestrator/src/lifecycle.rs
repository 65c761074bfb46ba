//! 訂單生命週期操作：儲存、提交、取消、關閉與重新開啟

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use textile_calc::{order_title, recalculate_order, ArtifactResolver, OrderValidator};
use textile_core::{
    DocStatus, FulfillmentError, ManualOverride, Order, OrderKind, OrderStatus, Result,
};

use crate::artifacts::TransferDraft;
use crate::context::OperationContext;
use crate::gateway::Backend;
use crate::orchestrator::{FulfillmentOrchestrator, StartReport};

/// 手動狀態操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusUpdate {
    Close,
    Stop,
    Reopen,
}

impl<B: Backend> FulfillmentOrchestrator<B> {
    /// 補預設值、換算數量、設定標題並驗證
    fn prepare(&mut self, order: &mut Order, for_submit: bool) -> Result<()> {
        OrderValidator::apply_order_defaults(order);
        let table = self.table();
        recalculate_order(order, &table, &self.settings.precision)?;
        order.title = Some(order_title(order));
        OrderValidator::new(&self.settings).validate(order, for_submit)
    }

    /// 儲存草稿
    pub fn save_draft(&mut self, mut order: Order) -> Result<Order> {
        if order.doc_status != DocStatus::Draft {
            return Err(FulfillmentError::NotDraft(order.id.clone()));
        }
        self.prepare(&mut order, false)?;
        self.recompute(&mut order)?;
        Ok(order)
    }

    /// 提交訂單：驗證、帶入可重用的產品與 BOM、重算狀態
    pub fn submit(&mut self, order_id: &str) -> Result<OrderStatus> {
        let mut order = self.backend.load_order(order_id)?;
        if order.doc_status != DocStatus::Draft {
            return Err(FulfillmentError::NotDraft(order.id.clone()));
        }

        self.prepare(&mut order, true)?;
        self.prefill_existing_artifacts(&mut order)?;
        order.doc_status = DocStatus::Submitted;

        self.recompute(&mut order)?;
        self.notify(&order);
        tracing::info!("訂單 {} 已提交，狀態 {}", order.id, order.status);
        Ok(order.status)
    }

    fn prefill_existing_artifacts(&self, order: &mut Order) -> Result<()> {
        let candidates = self.backend.prior_orders(order.kind)?;
        let resolver = ArtifactResolver::new(&candidates);

        for idx in 0..order.lines.len() {
            if order.lines[idx].item_code.is_none() {
                order.lines[idx].item_code = resolver.find_existing_item(order, &order.lines[idx]);
            }

            // 塗層的 BOM 於啟動時取物料預設 BOM
            if order.kind == OrderKind::Coating || order.lines[idx].bom.is_some() {
                continue;
            }
            if let Some(item) = order.lines[idx].item_code.clone() {
                order.lines[idx].bom = resolver.find_existing_bom(order, &item);
            }
        }

        order.items_created = order.all_artifacts_resolved();
        Ok(())
    }

    /// 取消訂單；已關閉的訂單須先重新開啟
    pub fn cancel(&mut self, order_id: &str) -> Result<OrderStatus> {
        let mut order = self.backend.load_order(order_id)?;
        if order.is_closed() {
            return Err(FulfillmentError::CancelClosedOrder(order.id.clone()));
        }
        if !order.is_submitted() {
            return Err(FulfillmentError::NotSubmitted(order.id.clone()));
        }

        order.doc_status = DocStatus::Cancelled;
        self.recompute(&mut order)?;
        self.notify(&order);
        tracing::info!("訂單 {} 已取消", order.id);
        Ok(order.status)
    }

    /// 關閉、停止或重新開啟；未提交的訂單不受影響
    pub fn update_status(&mut self, order_id: &str, update: StatusUpdate) -> Result<OrderStatus> {
        let mut order = self.backend.load_order(order_id)?;
        if !order.is_submitted() {
            return Ok(order.status);
        }

        match update {
            StatusUpdate::Close => {
                self.backend.set_linked_documents_closed(&order.id, true)?;
                order.manual_override = Some(ManualOverride::Closed);
            }
            StatusUpdate::Stop => {
                order.manual_override = Some(ManualOverride::Stopped);
            }
            StatusUpdate::Reopen => {
                if order.is_closed() {
                    self.backend.set_linked_documents_closed(&order.id, false)?;
                }
                order.manual_override = None;
            }
        }

        self.recompute(&mut order)?;
        self.notify(&order);
        Ok(order.status)
    }

    /// 批次關閉或重新開啟
    pub fn close_or_reopen_many(
        &mut self,
        order_ids: &[&str],
        update: StatusUpdate,
    ) -> Result<Vec<OrderStatus>> {
        order_ids
            .iter()
            .map(|order_id| self.update_status(order_id, update))
            .collect()
    }

    /// 檢查是否可單獨建立產品與 BOM
    pub fn check_can_create_artifacts(&self, order_id: &str) -> Result<Order> {
        let order = self.backend.load_order(order_id)?;
        if !order.is_submitted() {
            return Err(FulfillmentError::NotSubmitted(order.id.clone()));
        }
        if order.all_artifacts_resolved() {
            return Err(FulfillmentError::ArtifactsAlreadyCreated(order.id.clone()));
        }
        Ok(order)
    }

    /// 單獨建立產品與 BOM
    pub fn create_artifacts(&mut self, order_id: &str) -> Result<StartReport> {
        self.check_can_create_artifacts(order_id)?;
        self.execute_create_artifacts(order_id, &OperationContext::root())
    }

    /// 建立產品與 BOM 的本體；同步與背景執行共用
    pub fn execute_create_artifacts(
        &mut self,
        order_id: &str,
        ctx: &OperationContext,
    ) -> Result<StartReport> {
        let mut order = self.backend.load_order(order_id)?;
        let mut report = StartReport::new(order_id);

        self.create_artifacts_step(&mut order, ctx, &mut report)?;

        if ctx.is_guarded() {
            self.backend.save_order(&order)?;
        } else {
            self.recompute(&mut order)?;
            self.notify(&order);
        }

        report.status = order.status;
        Ok(report)
    }

    /// 單獨建立工單
    pub fn create_work_orders(&mut self, order_id: &str) -> Result<StartReport> {
        let mut order = self.backend.load_order(order_id)?;
        if !order.is_submitted() {
            return Err(FulfillmentError::NotSubmitted(order.id.clone()));
        }

        let mut report = StartReport::new(order_id);
        self.recompute(&mut order)?;
        self.work_order_step(&mut order, &OperationContext::root().guarded(), &mut report)?;
        self.recompute(&mut order)?;
        self.notify(&order);

        report.status = order.status;
        Ok(report)
    }

    /// 布料轉移草稿，預設數量為尚未轉移的布料長度
    pub fn make_transfer_draft(
        &mut self,
        order_id: &str,
        qty: Option<Decimal>,
    ) -> Result<TransferDraft> {
        let order = self.backend.load_order(order_id)?;
        if !order.all_artifacts_resolved() {
            return Err(FulfillmentError::ArtifactsMissing(order.id.clone()));
        }
        if order.skip_transfer {
            return Err(FulfillmentError::TransferNotRequired(order.id.clone()));
        }

        let table = self.table();
        self.drafter(&table).transfer(&order, qty)
    }

    /// 布料庫存檢查；允許負庫存時不檢查
    pub fn check_fabric_stock(&self, order: &Order, qty: Decimal) -> Result<()> {
        if qty <= Decimal::ZERO || self.settings.allow_negative_stock {
            return Ok(());
        }

        let item = order
            .fabric
            .item
            .as_deref()
            .ok_or_else(|| FulfillmentError::MissingMandatory("Fabric Item".to_string()))?;
        let available = self
            .backend
            .stock_qty(item, order.warehouses.source.as_deref());

        if qty > available {
            tracing::warn!("布料 {} 庫存不足：需要 {}，可用 {}", item, qty, available);
            return Err(FulfillmentError::InsufficientStock {
                item: item.to_string(),
                required: qty,
                available,
            });
        }

        Ok(())
    }
}
