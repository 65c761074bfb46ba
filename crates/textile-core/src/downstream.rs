//! 下游單據彙總資料（唯讀）
//!
//! 每種下游單據只提供：明細參照、數量（庫存單位）、提交狀態與細部狀態

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::DocStatus;
use crate::stage::Stage;

/// 下游單據種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    SalesOrder,
    WorkOrder,
    StockTransfer,
    PackingSlip,
    DeliveryNote,
    SalesInvoice,
    CoatingEntry,
}

impl DocumentKind {
    /// 單據變動時需要重新檢查允差的階段
    pub fn affected_stages(&self) -> &'static [Stage] {
        match self {
            DocumentKind::SalesOrder => &[Stage::Ordered],
            DocumentKind::WorkOrder => &[Stage::WorkOrdered, Stage::Produced],
            DocumentKind::StockTransfer => &[Stage::Transferred],
            DocumentKind::PackingSlip => &[Stage::Packed],
            DocumentKind::DeliveryNote => &[Stage::Delivered],
            DocumentKind::SalesInvoice => &[Stage::Billed],
            DocumentKind::CoatingEntry => &[Stage::Coated],
        }
    }
}

/// 銷售訂單明細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLineRow {
    pub sales_order: String,
    /// 銷售訂單明細ID
    pub row_id: String,
    /// 對應的訂單明細
    pub order_line: String,
    pub stock_qty: Decimal,
    pub doc_status: DocStatus,
    /// 銷售訂單尚待出貨
    pub to_deliver: bool,
    /// 銷售訂單尚待開票
    pub to_bill: bool,
}

/// 工單細部狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WorkOrderState {
    #[default]
    NotStarted,
    InProcess,
    Completed,
    Stopped,
}

/// 工單
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderRow {
    pub work_order: String,
    pub order_line: String,
    /// 來源銷售訂單明細（外部客戶）
    pub sales_order_line: Option<String>,
    pub qty: Decimal,
    pub produced_qty: Decimal,
    pub doc_status: DocStatus,
    pub state: WorkOrderState,
    /// 裝箱是否完成
    pub packed: bool,
}

impl WorkOrderRow {
    /// 是否仍有待生產數量
    pub fn has_pending_production(&self) -> bool {
        matches!(self.state, WorkOrderState::NotStarted | WorkOrderState::InProcess)
    }
}

/// 布料移轉方向（相對於在製品倉）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferDirection {
    IntoWip,
    OutOfWip,
}

/// 布料移轉明細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRow {
    pub entry: String,
    pub item: String,
    pub qty: Decimal,
    pub direction: TransferDirection,
    pub doc_status: DocStatus,
}

impl TransferRow {
    /// 移入為正、移出為負
    pub fn signed_qty(&self) -> Decimal {
        match self.direction {
            TransferDirection::IntoWip => self.qty,
            TransferDirection::OutOfWip => -self.qty,
        }
    }
}

/// 裝箱、出貨、發票等只含數量的明細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QtyRow {
    pub document: String,
    pub order_line: String,
    pub stock_qty: Decimal,
    pub doc_status: DocStatus,
}

/// 塗層生產紀錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoatingEntryRow {
    pub entry: String,
    pub qty: Decimal,
    pub doc_status: DocStatus,
}

/// 參照同一訂單的所有下游單據
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamSnapshot {
    pub sales_order_lines: Vec<SalesOrderLineRow>,
    pub work_orders: Vec<WorkOrderRow>,
    pub transfers: Vec<TransferRow>,
    pub packing_lines: Vec<QtyRow>,
    pub delivery_lines: Vec<QtyRow>,
    pub invoice_lines: Vec<QtyRow>,
    pub coating_entries: Vec<CoatingEntryRow>,
}

fn submitted(status: DocStatus) -> bool {
    status == DocStatus::Submitted
}

impl DownstreamSnapshot {
    pub fn is_empty(&self) -> bool {
        self.sales_order_lines.is_empty()
            && self.work_orders.is_empty()
            && self.transfers.is_empty()
            && self.packing_lines.is_empty()
            && self.delivery_lines.is_empty()
            && self.invoice_lines.is_empty()
            && self.coating_entries.is_empty()
    }

    pub fn submitted_sales_order_lines(&self) -> impl Iterator<Item = &SalesOrderLineRow> {
        self.sales_order_lines.iter().filter(|r| submitted(r.doc_status))
    }

    pub fn submitted_work_orders(&self) -> impl Iterator<Item = &WorkOrderRow> {
        self.work_orders.iter().filter(|r| submitted(r.doc_status))
    }

    pub fn submitted_transfers(&self) -> impl Iterator<Item = &TransferRow> {
        self.transfers.iter().filter(|r| submitted(r.doc_status))
    }

    pub fn submitted_packing_lines(&self) -> impl Iterator<Item = &QtyRow> {
        self.packing_lines.iter().filter(|r| submitted(r.doc_status))
    }

    pub fn submitted_delivery_lines(&self) -> impl Iterator<Item = &QtyRow> {
        self.delivery_lines.iter().filter(|r| submitted(r.doc_status))
    }

    pub fn submitted_invoice_lines(&self) -> impl Iterator<Item = &QtyRow> {
        self.invoice_lines.iter().filter(|r| submitted(r.doc_status))
    }

    pub fn submitted_coating_entries(&self) -> impl Iterator<Item = &CoatingEntryRow> {
        self.coating_entries.iter().filter(|r| submitted(r.doc_status))
    }

    /// 是否有已提交的銷售訂單
    pub fn has_sales_order(&self) -> bool {
        self.submitted_sales_order_lines().next().is_some()
    }

    /// 是否有已提交的塗層生產紀錄
    pub fn has_coating_entry(&self) -> bool {
        self.submitted_coating_entries().next().is_some()
    }

    /// 指定銷售訂單明細已開立的工單數量
    pub fn work_order_qty_for_sales_line(&self, row_id: &str) -> Decimal {
        self.submitted_work_orders()
            .filter(|w| w.sales_order_line.as_deref() == Some(row_id))
            .map(|w| w.qty)
            .sum()
    }
}
