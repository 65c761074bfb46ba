//! # Textile Core
//!
//! 訂單履約引擎的核心資料模型與類型定義

pub mod downstream;
pub mod numeric;
pub mod order;
pub mod settings;
pub mod stage;
pub mod status;

// Re-export 主要類型
pub use downstream::{
    CoatingEntryRow, DocumentKind, DownstreamSnapshot, QtyRow, SalesOrderLineRow,
    TransferDirection, TransferRow, WorkOrderRow, WorkOrderState,
};
pub use order::{
    ComponentKind, DocStatus, FabricDetails, LineProgress, ManualOverride, Order, OrderDefaults,
    OrderKind, OrderLine, OrderTotals, ProcessComponent, ProcessConfig, QtyType, Uom, Warehouses,
};
pub use settings::{AllowanceKind, FulfillmentSettings, Precision};
pub use stage::{Stage, StageBoard, StageProgress, StageStatus};
pub use status::{OrderStatus, StatusComment};

use rust_decimal::Decimal;

/// 錯誤分類（對應驗證、允差、配置、外部協作者四類）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 使用者可修正的驗證錯誤，只中止當前操作
    Validation,
    /// 下游數量超過允差
    Allowance,
    /// 結構或配置缺失，中止整個流程
    Configuration,
    /// 外部單據建立或讀取失敗
    Collaborator,
}

/// 履約引擎錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("第 {row} 行：數量必須大於 0")]
    InvalidQty { row: usize },

    #[error("第 {row} 行：圖案尺寸不可為空")]
    MissingDimensions { row: usize },

    #[error("第 {row} 行：按片計量時必須提供圖案高度與間距")]
    MissingPanelDimensions { row: usize },

    #[error("第 {row} 行：損耗率不可為零")]
    WastageRequired { row: usize },

    #[error("第 {row} 行：損耗率 {wastage}% 不可超過生產超額允差 {allowance}%")]
    WastageAboveAllowance {
        row: usize,
        wastage: Decimal,
        allowance: Decimal,
    },

    #[error("{0} 為必填")]
    MissingMandatory(String),

    #[error("訂單 {0} 沒有任何明細")]
    EmptyLines(String),

    #[error("明細 {0} 的數量換算溢位")]
    QuantityOverflow(String),

    #[error("計劃交貨日期不可早於訂單日期")]
    InvalidDeliveryDate,

    #[error("訂單 {0} 尚未提交")]
    NotSubmitted(String),

    #[error("訂單 {0} 不是草稿，不可提交")]
    NotDraft(String),

    #[error("訂單 {0} 已關閉")]
    OrderClosed(String),

    #[error("已關閉的訂單 {0} 不可取消，請先重新開啟")]
    CancelClosedOrder(String),

    #[error("訂單 {0} 的產品與 BOM 已建立")]
    ArtifactsAlreadyCreated(String),

    #[error("訂單 {0} 請先建立產品與 BOM")]
    ArtifactsMissing(String),

    #[error("訂單 {0} 請先建立銷售訂單")]
    SalesOrderMissing(String),

    #[error("訂單 {0} 不需要轉移布料")]
    TransferNotRequired(String),

    #[error("物料 {item} 庫存不足：需要 {required}，可用 {available}")]
    InsufficientStock {
        item: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("第 {row} 行：{stage} 數量 {qty} 超過允許上限 {max_allowed}")]
    AllowanceExceeded {
        row: usize,
        stage: Stage,
        qty: Decimal,
        max_allowed: Decimal,
    },

    #[error("缺少配置: {0}")]
    MissingConfiguration(String),

    #[error("無法建立 BOM：{item} 無法轉換為 {uom}")]
    NotConvertible { item: String, uom: String },

    #[error("無法建立 BOM：{0} 沒有預設 BOM")]
    MissingDefaultBom(String),

    #[error("無效的設定: {0}")]
    InvalidSettings(String),

    #[error("找不到訂單: {0}")]
    OrderNotFound(String),

    #[error("外部單據錯誤: {0}")]
    Collaborator(String),

    #[error("背景佇列已關閉")]
    QueueClosed,
}

impl FulfillmentError {
    /// 取得錯誤分類
    pub fn category(&self) -> ErrorCategory {
        match self {
            FulfillmentError::AllowanceExceeded { .. } => ErrorCategory::Allowance,
            FulfillmentError::MissingConfiguration(_)
            | FulfillmentError::NotConvertible { .. }
            | FulfillmentError::MissingDefaultBom(_)
            | FulfillmentError::InvalidSettings(_) => ErrorCategory::Configuration,
            FulfillmentError::OrderNotFound(_)
            | FulfillmentError::Collaborator(_)
            | FulfillmentError::QueueClosed => ErrorCategory::Collaborator,
            _ => ErrorCategory::Validation,
        }
    }

    /// 是否為致命錯誤（應中止整個履約流程）
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }
}

pub type Result<T> = std::result::Result<T, FulfillmentError>;
