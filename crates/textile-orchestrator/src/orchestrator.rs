//! 履約流程主控
//!
//! `start` 依序執行：
//! 1. 建立（或重用）產品與 BOM
//! 2. 轉移布料至在製倉
//! 3. 建立銷售訂單
//! 4. 建立工單
//! 5. 重算階段與整體狀態並檢查允差
//!
//! 每一步先檢查自身的完成條件，已完成即略過；失敗時中止後續步驟，
//! 已完成步驟的結果保留，重新呼叫即可從中斷處繼續。

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use textile_cache::ConversionCache;
use textile_calc::dedup::ItemFingerprint;
use textile_calc::{
    profile_for, AllowanceValidator, ArtifactResolver, StatusEngine, StatusStateMachine,
    UnitConversionTable,
};
use textile_core::numeric::round_to;
use textile_core::{
    DocumentKind, DownstreamSnapshot, FulfillmentError, FulfillmentSettings, Order, OrderKind,
    OrderStatus, Result, Stage, Uom,
};

use crate::artifacts::ArtifactDrafter;
use crate::context::OperationContext;
use crate::gateway::Backend;
use crate::progress::{NoopProgress, ProgressEvent, ProgressSink};

/// 建立的單據種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreatedKind {
    Item,
    Bom,
    Transfer,
    SalesOrder,
    WorkOrder,
}

/// 建立的單據
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDocument {
    pub kind: CreatedKind,
    pub name: String,
    pub order_line: Option<String>,
}

/// 一次履約操作的結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReport {
    pub order_id: String,
    pub created: Vec<CreatedDocument>,
    pub status: OrderStatus,
}

impl StartReport {
    pub fn new(order_id: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            created: Vec::new(),
            status: OrderStatus::default(),
        }
    }

    fn push(&mut self, kind: CreatedKind, name: String, order_line: Option<&str>) {
        self.created.push(CreatedDocument {
            kind,
            name,
            order_line: order_line.map(String::from),
        });
    }

    /// 指定種類的建立數量
    pub fn count(&self, kind: CreatedKind) -> usize {
        self.created.iter().filter(|d| d.kind == kind).count()
    }

    /// 是否沒有建立任何單據
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
    }
}

/// 履約主控器
pub struct FulfillmentOrchestrator<B> {
    pub(crate) backend: B,
    pub(crate) settings: FulfillmentSettings,
    cache: ConversionCache,
    progress: Arc<dyn ProgressSink>,
}

impl<B: Backend> FulfillmentOrchestrator<B> {
    /// 創建新的主控器
    pub fn new(backend: B, settings: FulfillmentSettings) -> Self {
        Self {
            backend,
            settings,
            cache: ConversionCache::new(),
            progress: Arc::new(NoopProgress),
        }
    }

    /// 建構器模式：設置進度接收端
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn settings(&self) -> &FulfillmentSettings {
        &self.settings
    }

    /// 更新設定並清除換算緩存
    pub fn update_settings(&mut self, settings: FulfillmentSettings) {
        self.settings = settings;
        self.cache.invalidate();
    }

    /// 單位換算變更事件
    pub fn on_uom_conversion_changed(&mut self, from: &Uom, to: &Uom) -> bool {
        self.cache.invalidate_on_uom_change(from, to)
    }

    pub fn conversion_cache(&self) -> &ConversionCache {
        &self.cache
    }

    pub(crate) fn table(&mut self) -> UnitConversionTable {
        self.cache.table(&self.settings).clone()
    }

    pub(crate) fn drafter<'s>(&'s self, table: &'s UnitConversionTable) -> ArtifactDrafter<'s> {
        ArtifactDrafter::new(&self.settings, table, &self.backend)
    }

    pub(crate) fn publish(&self, event: ProgressEvent) {
        self.progress.publish(event);
    }

    fn publish_step(
        &self,
        order: &Order,
        ctx: &OperationContext,
        title: &str,
        completed: usize,
        total: usize,
    ) {
        if ctx.publishes_progress() {
            self.publish(ProgressEvent::step(&order.id, title, completed, total));
        }
    }

    /// 通知觀察者訂單已更新
    pub(crate) fn notify(&self, order: &Order) {
        self.publish(ProgressEvent::OrderUpdated {
            order_id: order.id.clone(),
            status: order.status,
        });
    }

    /// 依下游資料重算階段與整體狀態並儲存
    pub(crate) fn recompute(&mut self, order: &mut Order) -> Result<DownstreamSnapshot> {
        let snapshot = self.backend.snapshot(&order.id)?;
        let engine = StatusEngine::for_order(order, self.settings.precision);
        engine.refresh(order, &snapshot);

        let rules = engine.profile().status_rules(order);
        StatusStateMachine::apply(order, &rules, snapshot.has_coating_entry());

        self.backend.save_order(order)?;
        Ok(snapshot)
    }

    /// 啟動前檢查：已提交、未關閉、布料庫存足夠
    ///
    /// 回傳訂單與實際要轉移的數量（不需轉移時為 None）
    pub fn prepare_start(
        &self,
        order_id: &str,
        transfer_qty: Option<Decimal>,
    ) -> Result<(Order, Option<Decimal>)> {
        let order = self.backend.load_order(order_id)?;

        if !order.is_submitted() {
            return Err(FulfillmentError::NotSubmitted(order.id.clone()));
        }
        if order.is_closed() {
            return Err(FulfillmentError::OrderClosed(order.id.clone()));
        }

        let transfers =
            !order.skip_transfer && profile_for(order.kind).is_applicable(Stage::Transferred);
        let transfer_qty = match transfer_qty {
            Some(qty) if transfers => {
                let qty = round_to(qty, self.settings.precision.total);
                self.check_fabric_stock(&order, qty)?;
                Some(qty)
            }
            _ => None,
        };

        Ok((order, transfer_qty))
    }

    /// 啟動訂單（同步執行）
    pub fn start(&mut self, order_id: &str, transfer_qty: Option<Decimal>) -> Result<StartReport> {
        let (_, transfer_qty) = self.prepare_start(order_id, transfer_qty)?;
        self.execute_start(order_id, transfer_qty, &OperationContext::root())
    }

    /// 履約步驟本體；同步與背景執行共用
    pub fn execute_start(
        &mut self,
        order_id: &str,
        transfer_qty: Option<Decimal>,
        ctx: &OperationContext,
    ) -> Result<StartReport> {
        let mut order = self.backend.load_order(order_id)?;
        let mut report = StartReport::new(order_id);
        let profile = profile_for(order.kind);

        tracing::info!("開始履約：訂單 {}，明細 {} 筆", order.id, order.lines.len());

        // Step 1-4 期間，下游回呼只重算狀態
        let guarded = ctx.guarded();
        self.recompute(&mut order)?;

        // Step 1: 產品與 BOM
        if !order.all_artifacts_resolved() {
            tracing::debug!("Step 1: 建立產品與 BOM");
            self.create_artifacts_step(&mut order, &guarded, &mut report)?;
        }

        // Step 2: 布料轉移
        if let Some(qty) = transfer_qty.filter(|qty| *qty > Decimal::ZERO) {
            let needed = !order.skip_transfer
                && profile.is_applicable(Stage::Transferred)
                && order.stages.percent(Stage::Transferred) < Decimal::ONE_HUNDRED;
            if needed {
                tracing::debug!("Step 2: 轉移布料 {}", qty);
                self.transfer_step(&mut order, qty, &guarded, &mut report)?;
            }
        }

        // Step 3: 銷售訂單
        if profile.is_applicable(Stage::Ordered)
            && !order.is_internal_customer
            && order.stages.percent(Stage::Ordered) < Decimal::ONE_HUNDRED
        {
            tracing::debug!("Step 3: 建立銷售訂單");
            self.sales_order_step(&mut order, &guarded, &mut report)?;
        }

        // Step 4: 工單
        if profile.is_applicable(Stage::WorkOrdered)
            && order.stages.percent(Stage::WorkOrdered) < Decimal::ONE_HUNDRED
        {
            tracing::debug!("Step 4: 建立工單");
            self.work_order_step(&mut order, &guarded, &mut report)?;
        }

        // Step 5: 重算狀態並檢查允差
        tracing::debug!("Step 5: 重算狀態");
        self.recompute(&mut order)?;
        AllowanceValidator::new(profile, &self.settings)
            .validate_stages(&order, &[Stage::Ordered, Stage::WorkOrdered])?;
        self.notify(&order);

        report.status = order.status;
        if report.is_noop() {
            tracing::debug!("訂單 {} 各步驟皆已完成，未建立單據", order.id);
        }
        tracing::info!(
            "履約完成：訂單 {}，建立單據 {} 張，狀態 {}",
            order.id,
            report.created.len(),
            order.status
        );
        Ok(report)
    }

    /// 為缺少產品或 BOM 的明細建立（或重用）
    pub(crate) fn create_artifacts_step(
        &mut self,
        order: &mut Order,
        ctx: &OperationContext,
        report: &mut StartReport,
    ) -> Result<()> {
        let candidates = self.backend.prior_orders(order.kind)?;
        let table = self.table();
        let total = order.lines.len();

        for idx in 0..total {
            self.resolve_line_artifacts(order, idx, &candidates, &table, report)?;
            // 每行完成即保存，失敗時已建立的部分不會遺失
            self.backend.save_order(order)?;
            self.publish_step(order, ctx, "Creating Design Items and BOMs", idx + 1, total);
        }

        order.items_created = order.all_artifacts_resolved();
        self.backend.save_order(order)
    }

    fn resolve_line_artifacts(
        &mut self,
        order: &mut Order,
        idx: usize,
        candidates: &[Order],
        table: &UnitConversionTable,
        report: &mut StartReport,
    ) -> Result<()> {
        let resolver = ArtifactResolver::new(candidates);
        let line_id = order.lines[idx].id.clone();

        if !has_value(&order.lines[idx].item_code) {
            let existing = sibling_item(order, idx)
                .or_else(|| resolver.find_existing_item(order, &order.lines[idx]));

            let item = match existing {
                Some(item) => item,
                None => match order.kind {
                    OrderKind::Print => {
                        let draft = self.drafter(table).design_item(order, &order.lines[idx])?;
                        let name = self.backend.create_item(&draft)?;
                        tracing::debug!("建立圖案物料 {}（第 {} 行）", name, idx + 1);
                        report.push(CreatedKind::Item, name.clone(), Some(line_id.as_str()));
                        order.lines[idx].item_name = Some(draft.item_name);
                        name
                    }
                    OrderKind::Pretreatment => {
                        return Err(FulfillmentError::MissingMandatory("Ready Fabric Item".into()))
                    }
                    OrderKind::Coating => {
                        return Err(FulfillmentError::MissingMandatory("Fabric Item".into()))
                    }
                },
            };
            order.lines[idx].item_code = Some(item);
        }

        if !has_value(&order.lines[idx].bom) {
            let item = order.lines[idx].item_code.clone().unwrap_or_default();
            let existing = sibling_bom(order, &item)
                .or_else(|| resolver.find_existing_bom(order, &item));

            let bom = match existing {
                Some(bom) => bom,
                None => {
                    let draft = match order.kind {
                        OrderKind::Print => {
                            Some(self.drafter(table).design_bom(order, &order.lines[idx])?)
                        }
                        OrderKind::Pretreatment => Some(self.drafter(table).ready_fabric_bom(order)?),
                        OrderKind::Coating => None,
                    };

                    match draft {
                        Some(draft) => {
                            let name = self.backend.create_bom(&draft)?;
                            tracing::debug!("建立 BOM {}（第 {} 行）", name, idx + 1);
                            report.push(CreatedKind::Bom, name.clone(), Some(line_id.as_str()));
                            name
                        }
                        None => self.drafter(table).coating_bom(order)?,
                    }
                }
            };
            order.lines[idx].bom = Some(bom);
        }

        Ok(())
    }

    fn transfer_step(
        &mut self,
        order: &mut Order,
        qty: Decimal,
        ctx: &OperationContext,
        report: &mut StartReport,
    ) -> Result<()> {
        self.publish_step(order, ctx, "Transferring Fabric", 0, 1);

        let table = self.table();
        let draft = self.drafter(&table).transfer(order, Some(qty))?;
        let name = self.backend.create_transfer(&draft)?;
        tracing::info!("布料已轉移至在製倉（{} {}）：{}", draft.qty, draft.uom, name);
        report.push(CreatedKind::Transfer, name, None);

        self.apply_document_event(order, DocumentKind::StockTransfer, ctx)?;
        self.publish_step(order, ctx, "Transferring Fabric", 1, 1);
        Ok(())
    }

    fn sales_order_step(
        &mut self,
        order: &mut Order,
        ctx: &OperationContext,
        report: &mut StartReport,
    ) -> Result<()> {
        let table = self.table();
        let Some(draft) = self.drafter(&table).sales_order(order) else {
            tracing::debug!("訂單 {} 沒有待下單數量", order.id);
            return Ok(());
        };

        self.publish_step(order, ctx, "Creating Sales Order", 0, 1);
        let name = self.backend.create_sales_order(&draft)?;
        tracing::info!("建立銷售訂單 {}（{} 行）", name, draft.lines.len());
        report.push(CreatedKind::SalesOrder, name, None);

        self.apply_document_event(order, DocumentKind::SalesOrder, ctx)?;
        self.publish_step(order, ctx, "Creating Sales Order", 1, 1);
        Ok(())
    }

    /// 為未開立工單的剩餘數量建立工單
    pub(crate) fn work_order_step(
        &mut self,
        order: &mut Order,
        ctx: &OperationContext,
        report: &mut StartReport,
    ) -> Result<()> {
        if !order.all_artifacts_resolved() {
            return Err(FulfillmentError::ArtifactsMissing(order.id.clone()));
        }

        let snapshot = self.backend.snapshot(&order.id)?;
        let table = self.table();
        let drafts = self.drafter(&table).work_orders(order, &snapshot)?;
        if drafts.is_empty() {
            tracing::debug!("訂單 {} 的工單已建立", order.id);
            return Ok(());
        }

        let total = drafts.len();
        for (idx, draft) in drafts.iter().enumerate() {
            let name = self.backend.create_work_order(draft)?;
            tracing::debug!("建立工單 {}：{} {}", name, draft.item, draft.qty);
            report.push(CreatedKind::WorkOrder, name, Some(draft.order_line.as_str()));
            self.publish_step(order, ctx, "Creating Work Orders", idx + 1, total);
        }

        self.apply_document_event(order, DocumentKind::WorkOrder, ctx)
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// 同一訂單中指紋相同、已有產品的明細
fn sibling_item(order: &Order, idx: usize) -> Option<String> {
    if order.kind != OrderKind::Print {
        return None;
    }
    let fingerprint = ItemFingerprint::of(order, &order.lines[idx]);
    order
        .lines
        .iter()
        .enumerate()
        .find(|(i, l)| {
            *i != idx && has_value(&l.item_code) && ItemFingerprint::of(order, l) == fingerprint
        })
        .and_then(|(_, l)| l.item_code.clone())
}

/// 同一訂單中相同產品已有的 BOM
fn sibling_bom(order: &Order, item: &str) -> Option<String> {
    order
        .lines
        .iter()
        .find(|l| l.item_code.as_deref() == Some(item) && has_value(&l.bom))
        .and_then(|l| l.bom.clone())
}
