//! 外部協作者介面
//!
//! 訂單儲存、下游單據查詢、物料主檔與單據建立皆由外部系統提供，
//! 引擎只提供欄位值與建立順序。

use rust_decimal::Decimal;
use textile_core::{DownstreamSnapshot, Order, OrderKind, Result, Uom};

use crate::artifacts::{BomDraft, ItemDraft, SalesOrderDraft, TransferDraft, WorkOrderDraft};

/// 訂單儲存
pub trait OrderStore {
    fn load_order(&self, order_id: &str) -> Result<Order>;

    fn save_order(&mut self, order: &Order) -> Result<()>;

    /// 同種類的既有訂單，供重複物料比對
    fn prior_orders(&self, kind: OrderKind) -> Result<Vec<Order>>;
}

/// 下游單據查詢
pub trait DownstreamSource {
    /// 參照該訂單的所有下游單據（含草稿與已取消，由引擎過濾）
    fn snapshot(&self, order_id: &str) -> Result<DownstreamSnapshot>;
}

/// 物料主檔
pub trait ItemCatalog {
    /// 物料（或其範本）的預設 BOM
    fn default_bom(&self, item: &str) -> Option<String>;

    fn is_convertible(&self, item: &str, uom: &Uom) -> bool;

    fn stock_qty(&self, item: &str, warehouse: Option<&str>) -> Decimal;
}

/// 單據建立（建立即提交）
pub trait DocumentGateway {
    fn create_item(&mut self, draft: &ItemDraft) -> Result<String>;

    fn create_bom(&mut self, draft: &BomDraft) -> Result<String>;

    fn create_transfer(&mut self, draft: &TransferDraft) -> Result<String>;

    fn create_sales_order(&mut self, draft: &SalesOrderDraft) -> Result<String>;

    fn create_work_order(&mut self, draft: &WorkOrderDraft) -> Result<String>;

    /// 關閉或重新開啟訂單的關聯單據
    fn set_linked_documents_closed(&mut self, order_id: &str, closed: bool) -> Result<()>;
}

/// 引擎所需的全部協作者
pub trait Backend: OrderStore + DownstreamSource + ItemCatalog + DocumentGateway + Send {}

impl<T> Backend for T where T: OrderStore + DownstreamSource + ItemCatalog + DocumentGateway + Send {}
