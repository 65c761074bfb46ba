//! 記憶體後端
//!
//! 以記憶體實作全部協作者介面，供測試與示範使用。建立單據即視為提交，
//! 並立即反映到該訂單的下游彙總資料。

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use textile_core::{
    DocStatus, DownstreamSnapshot, FulfillmentError, Order, OrderKind, QtyRow, Result,
    SalesOrderLineRow, TransferDirection, TransferRow, Uom, WorkOrderRow, WorkOrderState,
};
use uuid::Uuid;

use crate::artifacts::{BomDraft, ItemDraft, SalesOrderDraft, TransferDraft, WorkOrderDraft};
use crate::gateway::{DocumentGateway, DownstreamSource, ItemCatalog, OrderStore};
use crate::orchestrator::CreatedKind;

/// 已建立的單據（名稱與草稿）
#[derive(Debug, Clone, Default)]
pub struct CreatedDocuments {
    pub items: Vec<(String, ItemDraft)>,
    pub boms: Vec<(String, BomDraft)>,
    pub transfers: Vec<(String, TransferDraft)>,
    pub sales_orders: Vec<(String, SalesOrderDraft)>,
    pub work_orders: Vec<(String, WorkOrderDraft)>,
}

impl CreatedDocuments {
    pub fn count(&self, kind: CreatedKind) -> usize {
        match kind {
            CreatedKind::Item => self.items.len(),
            CreatedKind::Bom => self.boms.len(),
            CreatedKind::Transfer => self.transfers.len(),
            CreatedKind::SalesOrder => self.sales_orders.len(),
            CreatedKind::WorkOrder => self.work_orders.len(),
        }
    }
}

/// 記憶體後端
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    orders: BTreeMap<String, Order>,
    downstream: BTreeMap<String, DownstreamSnapshot>,
    default_boms: BTreeMap<String, String>,
    inconvertible: BTreeSet<String>,
    stock: BTreeMap<String, Decimal>,
    linked_closed: BTreeMap<String, bool>,
    failing: Option<CreatedKind>,
    created: CreatedDocuments,
}

fn new_name(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：設置物料的預設 BOM
    pub fn with_default_bom(mut self, item: impl Into<String>, bom: impl Into<String>) -> Self {
        self.default_boms.insert(item.into(), bom.into());
        self
    }

    /// 建構器模式：設置物料庫存（不分倉庫）
    pub fn with_stock(mut self, item: impl Into<String>, qty: Decimal) -> Self {
        self.stock.insert(item.into(), qty);
        self
    }

    /// 標記物料無法換算為任何單位
    pub fn set_inconvertible(&mut self, item: impl Into<String>) {
        self.inconvertible.insert(item.into());
    }

    /// 之後建立指定種類的單據時回傳錯誤
    pub fn fail_on(&mut self, kind: CreatedKind) {
        self.failing = Some(kind);
    }

    pub fn clear_failure(&mut self) {
        self.failing = None;
    }

    pub fn insert_order(&mut self, order: Order) {
        self.orders.insert(order.id.clone(), order);
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn created(&self) -> &CreatedDocuments {
        &self.created
    }

    /// 關聯單據是否已關閉
    pub fn linked_documents_closed(&self, order_id: &str) -> bool {
        self.linked_closed.get(order_id).copied().unwrap_or(false)
    }

    pub fn downstream(&self, order_id: &str) -> Option<&DownstreamSnapshot> {
        self.downstream.get(order_id)
    }

    /// 直接修改下游資料，模擬外部單據變動
    pub fn downstream_mut(&mut self, order_id: &str) -> &mut DownstreamSnapshot {
        self.downstream.entry(order_id.to_string()).or_default()
    }

    /// 完成該訂單所有工單的生產與裝箱
    pub fn complete_work_orders(&mut self, order_id: &str) {
        for work_order in &mut self.downstream_mut(order_id).work_orders {
            work_order.produced_qty = work_order.qty;
            work_order.state = WorkOrderState::Completed;
            work_order.packed = true;
        }
    }

    /// 為每筆銷售訂單明細建立出貨明細
    pub fn deliver_sales_orders(&mut self, order_id: &str) {
        let snapshot = self.downstream_mut(order_id);
        let rows: Vec<QtyRow> = snapshot
            .submitted_sales_order_lines()
            .map(|row| QtyRow {
                document: format!("DN-{}", row.row_id),
                order_line: row.order_line.clone(),
                stock_qty: row.stock_qty,
                doc_status: DocStatus::Submitted,
            })
            .collect();
        snapshot.delivery_lines.extend(rows);
        for row in &mut snapshot.sales_order_lines {
            row.to_deliver = false;
        }
    }

    /// 為每筆銷售訂單明細開立發票
    pub fn bill_sales_orders(&mut self, order_id: &str) {
        let snapshot = self.downstream_mut(order_id);
        let rows: Vec<QtyRow> = snapshot
            .submitted_sales_order_lines()
            .map(|row| QtyRow {
                document: format!("SINV-{}", row.row_id),
                order_line: row.order_line.clone(),
                stock_qty: row.stock_qty,
                doc_status: DocStatus::Submitted,
            })
            .collect();
        snapshot.invoice_lines.extend(rows);
        for row in &mut snapshot.sales_order_lines {
            row.to_bill = false;
        }
    }

    fn check_failure(&self, kind: CreatedKind) -> Result<()> {
        match self.failing {
            Some(failing) if failing == kind => Err(FulfillmentError::Collaborator(format!(
                "無法建立 {:?}",
                kind
            ))),
            _ => Ok(()),
        }
    }
}

impl OrderStore for InMemoryBackend {
    fn load_order(&self, order_id: &str) -> Result<Order> {
        self.orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.to_string()))
    }

    fn save_order(&mut self, order: &Order) -> Result<()> {
        self.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    fn prior_orders(&self, kind: OrderKind) -> Result<Vec<Order>> {
        Ok(self
            .orders
            .values()
            .filter(|o| o.kind == kind)
            .cloned()
            .collect())
    }
}

impl DownstreamSource for InMemoryBackend {
    fn snapshot(&self, order_id: &str) -> Result<DownstreamSnapshot> {
        Ok(self.downstream.get(order_id).cloned().unwrap_or_default())
    }
}

impl ItemCatalog for InMemoryBackend {
    fn default_bom(&self, item: &str) -> Option<String> {
        self.default_boms.get(item).cloned()
    }

    fn is_convertible(&self, item: &str, _uom: &Uom) -> bool {
        !self.inconvertible.contains(item)
    }

    fn stock_qty(&self, item: &str, _warehouse: Option<&str>) -> Decimal {
        self.stock.get(item).copied().unwrap_or(Decimal::ZERO)
    }
}

impl DocumentGateway for InMemoryBackend {
    fn create_item(&mut self, draft: &ItemDraft) -> Result<String> {
        self.check_failure(CreatedKind::Item)?;
        let name = new_name("ITEM");
        self.created.items.push((name.clone(), draft.clone()));
        Ok(name)
    }

    fn create_bom(&mut self, draft: &BomDraft) -> Result<String> {
        self.check_failure(CreatedKind::Bom)?;
        let name = new_name("BOM");
        self.default_boms.insert(draft.item.clone(), name.clone());
        self.created.boms.push((name.clone(), draft.clone()));
        Ok(name)
    }

    fn create_transfer(&mut self, draft: &TransferDraft) -> Result<String> {
        self.check_failure(CreatedKind::Transfer)?;
        let name = new_name("STE");
        self.downstream_mut(&draft.order_id).transfers.push(TransferRow {
            entry: name.clone(),
            item: draft.item.clone(),
            qty: draft.qty,
            direction: TransferDirection::IntoWip,
            doc_status: DocStatus::Submitted,
        });
        self.created.transfers.push((name.clone(), draft.clone()));
        Ok(name)
    }

    fn create_sales_order(&mut self, draft: &SalesOrderDraft) -> Result<String> {
        self.check_failure(CreatedKind::SalesOrder)?;
        let name = new_name("SO");
        let rows = draft.lines.iter().enumerate().map(|(idx, line)| SalesOrderLineRow {
            sales_order: name.clone(),
            row_id: format!("{}-{}", name, idx + 1),
            order_line: line.order_line.clone(),
            stock_qty: line.qty,
            doc_status: DocStatus::Submitted,
            to_deliver: true,
            to_bill: true,
        });
        let rows: Vec<SalesOrderLineRow> = rows.collect();
        self.downstream_mut(&draft.order_id).sales_order_lines.extend(rows);
        self.created.sales_orders.push((name.clone(), draft.clone()));
        Ok(name)
    }

    fn create_work_order(&mut self, draft: &WorkOrderDraft) -> Result<String> {
        self.check_failure(CreatedKind::WorkOrder)?;
        let name = new_name("WO");
        self.downstream_mut(&draft.order_id).work_orders.push(WorkOrderRow {
            work_order: name.clone(),
            order_line: draft.order_line.clone(),
            sales_order_line: draft.sales_order_line.clone(),
            qty: draft.qty,
            produced_qty: Decimal::ZERO,
            doc_status: DocStatus::Submitted,
            state: WorkOrderState::NotStarted,
            packed: false,
        });
        self.created.work_orders.push((name.clone(), draft.clone()));
        Ok(name)
    }

    fn set_linked_documents_closed(&mut self, order_id: &str, closed: bool) -> Result<()> {
        self.linked_closed.insert(order_id.to_string(), closed);
        Ok(())
    }
}
