//! 訂單模型（印花、前處理、塗層訂單）

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stage::{Stage, StageBoard};
use crate::status::{OrderStatus, StatusComment};

/// 訂單種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// 印花訂單
    Print,
    /// 布料前處理訂單
    Pretreatment,
    /// 塗層訂單
    Coating,
}

/// 單據提交狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DocStatus {
    #[default]
    Draft,
    Submitted,
    Cancelled,
}

/// 手動覆寫狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManualOverride {
    Closed,
    Stopped,
}

/// 計量單位
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Uom {
    #[default]
    Meter,
    Yard,
    Inch,
    Panel,
    Other(String),
}

impl Uom {
    /// 解析單位名稱（不分大小寫）
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "meter" => Uom::Meter,
            "yard" => Uom::Yard,
            "inch" => Uom::Inch,
            "panel" => Uom::Panel,
            _ => Uom::Other(name.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Uom::Meter => "Meter",
            Uom::Yard => "Yard",
            Uom::Inch => "Inch",
            Uom::Panel => "Panel",
            Uom::Other(name) => name.as_str(),
        }
    }

    pub fn is_panel(&self) -> bool {
        matches!(self, Uom::Panel)
    }

    /// 是否為長度換算表內建的基本單位
    pub fn is_base_length(&self) -> bool {
        matches!(self, Uom::Meter | Uom::Yard | Uom::Inch)
    }
}

impl fmt::Display for Uom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 數量類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QtyType {
    /// 數量代表印花長度
    #[default]
    PrintQty,
    /// 數量代表布料長度（含損耗）
    FabricQty,
}

impl QtyType {
    pub fn label(&self) -> &'static str {
        match self {
            QtyType::PrintQty => "Print Qty",
            QtyType::FabricQty => "Fabric Qty",
        }
    }
}

/// 製程組件種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Coating,
    Softener,
    SublimationPaper,
    ProtectionPaper,
    Singeing,
    Desizing,
    Bleaching,
}

impl ComponentKind {
    /// 印花製程組件
    pub const PRINTING: [ComponentKind; 4] = [
        ComponentKind::Coating,
        ComponentKind::Softener,
        ComponentKind::SublimationPaper,
        ComponentKind::ProtectionPaper,
    ];

    /// 前處理製程組件
    pub const PRETREATMENT: [ComponentKind; 3] = [
        ComponentKind::Singeing,
        ComponentKind::Desizing,
        ComponentKind::Bleaching,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Coating => "Coating Item",
            ComponentKind::Softener => "Softener Item",
            ComponentKind::SublimationPaper => "Sublimation Paper Item",
            ComponentKind::ProtectionPaper => "Protection Paper Item",
            ComponentKind::Singeing => "Singeing Item",
            ComponentKind::Desizing => "Desizing Item",
            ComponentKind::Bleaching => "Bleaching Item",
        }
    }
}

/// 製程組件設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessComponent {
    pub kind: ComponentKind,

    /// 組件物料
    pub item: Option<String>,

    /// 是否為必要組件
    pub required: bool,

    /// 是否依布重計算耗用量
    pub by_fabric_weight: bool,
}

impl ProcessComponent {
    /// 創建新的製程組件
    pub fn new(kind: ComponentKind, item: impl Into<String>) -> Self {
        Self {
            kind,
            item: Some(item.into()),
            required: true,
            by_fabric_weight: false,
        }
    }

    /// 建構器模式：設置是否必要
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// 建構器模式：設置依布重耗用
    pub fn with_by_fabric_weight(mut self, by_fabric_weight: bool) -> Self {
        self.by_fabric_weight = by_fabric_weight;
        self
    }

    /// 是否已指定物料
    pub fn has_item(&self) -> bool {
        self.item.as_deref().is_some_and(|item| !item.is_empty())
    }
}

/// 製程配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// 製程物料（印花製程）
    pub process_item: Option<String>,

    pub components: Vec<ProcessComponent>,
}

impl ProcessConfig {
    pub fn new(process_item: impl Into<String>) -> Self {
        Self {
            process_item: Some(process_item.into()),
            components: Vec::new(),
        }
    }

    /// 建構器模式：加入組件（同種類組件會被取代）
    pub fn with_component(mut self, component: ProcessComponent) -> Self {
        self.components.retain(|c| c.kind != component.kind);
        self.components.push(component);
        self
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&ProcessComponent> {
        self.components.iter().find(|c| c.kind == kind)
    }

    /// 組件是否標記為必要
    pub fn is_required(&self, kind: ComponentKind) -> bool {
        self.component(kind).is_some_and(|c| c.required)
    }

    /// 必要組件
    pub fn required_components(&self) -> impl Iterator<Item = &ProcessComponent> {
        self.components.iter().filter(|c| c.required)
    }

    /// 清除未標記為必要的組件物料
    pub fn clear_unrequired(&mut self) {
        for component in self.components.iter_mut().filter(|c| !c.required) {
            component.item = None;
            component.by_fabric_weight = false;
        }
    }
}

/// 布料資訊
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricDetails {
    /// 布料物料（印花/塗層為坯布，前處理為胚布）
    pub item: Option<String>,

    /// 布料材質
    pub material: Option<String>,

    /// 材質縮寫（用於訂單標題）
    pub material_abbr: Option<String>,

    /// 幅寬（英吋）
    pub width: Decimal,

    /// 克重（g/m²）
    pub gsm: Decimal,

    /// 吸收率（%）
    pub per_pickup: Decimal,
}

impl FabricDetails {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: Some(item.into()),
            ..Default::default()
        }
    }

    /// 建構器模式：設置幅寬、克重與吸收率
    pub fn with_weight(mut self, width: Decimal, gsm: Decimal, per_pickup: Decimal) -> Self {
        self.width = width;
        self.gsm = gsm;
        self.per_pickup = per_pickup;
        self
    }

    /// 建構器模式：設置材質
    pub fn with_material(mut self, material: impl Into<String>, abbr: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self.material_abbr = Some(abbr.into());
        self
    }
}

/// 訂單層級的明細預設值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDefaults {
    pub uom: Uom,
    pub length_uom: Uom,
    pub qty_type: QtyType,
    pub per_wastage: Decimal,
    pub gap: Decimal,
}

impl Default for OrderDefaults {
    fn default() -> Self {
        Self {
            uom: Uom::Meter,
            length_uom: Uom::Meter,
            qty_type: QtyType::PrintQty,
            per_wastage: Decimal::ZERO,
            gap: Decimal::ZERO,
        }
    }
}

/// 倉庫設定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouses {
    /// 布料來源倉
    pub source: Option<String>,
    /// 在製品倉
    pub wip: Option<String>,
    /// 成品倉
    pub fg: Option<String>,
}

/// 訂單合計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total_print_length: Decimal,
    pub total_fabric_length: Decimal,
    pub total_panel_qty: Decimal,
}

/// 明細的下游彙總數量（庫存單位）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineProgress {
    pub ordered_qty: Decimal,
    pub work_order_qty: Decimal,
    pub produced_qty: Decimal,
    pub packed_qty: Decimal,
    pub delivered_qty: Decimal,
    pub billed_qty: Decimal,
    pub coated_qty: Decimal,
}

impl LineProgress {
    /// 取得階段數量；布料移轉為訂單層級，明細上恆為 0
    pub fn get(&self, stage: Stage) -> Decimal {
        match stage {
            Stage::Ordered => self.ordered_qty,
            Stage::Transferred => Decimal::ZERO,
            Stage::WorkOrdered => self.work_order_qty,
            Stage::Produced => self.produced_qty,
            Stage::Packed => self.packed_qty,
            Stage::Delivered => self.delivered_qty,
            Stage::Billed => self.billed_qty,
            Stage::Coated => self.coated_qty,
        }
    }

    pub fn set(&mut self, stage: Stage, qty: Decimal) {
        match stage {
            Stage::Ordered => self.ordered_qty = qty,
            Stage::Transferred => {}
            Stage::WorkOrdered => self.work_order_qty = qty,
            Stage::Produced => self.produced_qty = qty,
            Stage::Packed => self.packed_qty = qty,
            Stage::Delivered => self.delivered_qty = qty,
            Stage::Billed => self.billed_qty = qty,
            Stage::Coated => self.coated_qty = qty,
        }
    }
}

/// 訂單明細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// 明細ID
    pub id: String,

    pub design_name: Option<String>,
    pub design_image: Option<String>,

    /// 圖案寬度（英吋）
    pub design_width: Decimal,
    /// 圖案高度（英吋）
    pub design_height: Decimal,
    /// 圖案間距（英吋）；未填時由訂單預設值補上
    pub design_gap: Option<Decimal>,

    // 輸入
    pub qty: Decimal,
    pub uom: Option<Uom>,
    pub length_uom: Option<Uom>,
    pub stock_uom: Uom,
    pub qty_type: Option<QtyType>,
    pub per_wastage: Option<Decimal>,

    // 衍生欄位
    pub panel_based_qty: bool,
    pub panel_length_inch: Decimal,
    pub panel_length_meter: Decimal,
    pub panel_length_yard: Decimal,
    pub print_length: Decimal,
    pub fabric_length: Decimal,
    pub stock_print_length: Decimal,
    pub stock_fabric_length: Decimal,
    pub panel_qty: Decimal,

    /// 下游彙總數量
    pub progress: LineProgress,

    /// 已解析的成品物料
    pub item_code: Option<String>,
    pub item_name: Option<String>,
    /// 已解析的 BOM
    pub bom: Option<String>,
}

impl OrderLine {
    /// 創建新的訂單明細
    pub fn new(id: impl Into<String>, qty: Decimal, uom: Uom) -> Self {
        Self {
            id: id.into(),
            design_name: None,
            design_image: None,
            design_width: Decimal::ZERO,
            design_height: Decimal::ZERO,
            design_gap: None,
            qty,
            uom: Some(uom),
            length_uom: None,
            stock_uom: Uom::Meter,
            qty_type: None,
            per_wastage: None,
            panel_based_qty: false,
            panel_length_inch: Decimal::ZERO,
            panel_length_meter: Decimal::ZERO,
            panel_length_yard: Decimal::ZERO,
            print_length: Decimal::ZERO,
            fabric_length: Decimal::ZERO,
            stock_print_length: Decimal::ZERO,
            stock_fabric_length: Decimal::ZERO,
            panel_qty: Decimal::ZERO,
            progress: LineProgress::default(),
            item_code: None,
            item_name: None,
            bom: None,
        }
    }

    /// 建構器模式：設置圖案
    pub fn with_design(
        mut self,
        name: impl Into<String>,
        image: impl Into<String>,
        width: Decimal,
        height: Decimal,
    ) -> Self {
        self.design_name = Some(name.into());
        self.design_image = Some(image.into());
        self.design_width = width;
        self.design_height = height;
        self
    }

    /// 建構器模式：設置圖案間距
    pub fn with_gap(mut self, gap: Decimal) -> Self {
        self.design_gap = Some(gap);
        self
    }

    /// 圖案間距，未填視為 0
    pub fn gap(&self) -> Decimal {
        self.design_gap.unwrap_or_default()
    }

    /// 建構器模式：設置損耗率
    pub fn with_wastage(mut self, per_wastage: Decimal) -> Self {
        self.per_wastage = Some(per_wastage);
        self
    }

    /// 建構器模式：設置數量類型
    pub fn with_qty_type(mut self, qty_type: QtyType) -> Self {
        self.qty_type = Some(qty_type);
        self
    }

    /// 建構器模式：設置長度單位
    pub fn with_length_uom(mut self, length_uom: Uom) -> Self {
        self.length_uom = Some(length_uom);
        self
    }

    /// 建構器模式：設置庫存單位
    pub fn with_stock_uom(mut self, stock_uom: Uom) -> Self {
        self.stock_uom = stock_uom;
        self
    }

    pub fn is_panel(&self) -> bool {
        self.uom.as_ref().is_some_and(Uom::is_panel)
    }

    /// 成品物料與 BOM 是否皆已解析
    pub fn has_artifacts(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        filled(&self.item_code) && filled(&self.bom)
    }
}

/// 訂單
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// 訂單ID
    pub id: String,

    pub kind: OrderKind,

    /// 建立時間（重複比對時以最新者為準）
    pub created_at: DateTime<Utc>,

    pub transaction_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,

    pub company: String,
    pub customer: String,
    pub customer_name: Option<String>,

    /// 內部客戶（自用），不建立銷售訂單
    pub is_internal_customer: bool,

    pub fabric: FabricDetails,

    /// 產出物料（前處理為成品布）
    pub product_item: Option<String>,

    pub process: ProcessConfig,

    pub defaults: OrderDefaults,

    pub warehouses: Warehouses,

    pub lines: Vec<OrderLine>,

    pub doc_status: DocStatus,
    pub manual_override: Option<ManualOverride>,
    pub status: OrderStatus,

    /// 跳過布料移轉
    pub skip_transfer: bool,

    /// 需要裝箱單
    pub packing_slip_required: bool,

    pub title: Option<String>,

    pub totals: OrderTotals,

    pub stages: StageBoard,

    /// 已移轉至在製品倉的布料淨數量
    pub fabric_transfer_qty: Decimal,

    pub items_created: bool,

    /// 狀態變更紀錄
    pub comments: Vec<StatusComment>,
}

impl Order {
    /// 創建新的草稿訂單
    pub fn new(id: impl Into<String>, kind: OrderKind, customer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            created_at: Utc::now(),
            transaction_date: None,
            delivery_date: None,
            company: String::new(),
            customer: customer.into(),
            customer_name: None,
            is_internal_customer: false,
            fabric: FabricDetails::default(),
            product_item: None,
            process: ProcessConfig::default(),
            defaults: OrderDefaults::default(),
            warehouses: Warehouses::default(),
            lines: Vec::new(),
            doc_status: DocStatus::Draft,
            manual_override: None,
            status: OrderStatus::Draft,
            skip_transfer: false,
            packing_slip_required: false,
            title: None,
            totals: OrderTotals::default(),
            stages: StageBoard::default(),
            fabric_transfer_qty: Decimal::ZERO,
            items_created: false,
            comments: Vec::new(),
        }
    }

    /// 建構器模式：設置建立時間
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// 建構器模式：設置公司
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    /// 建構器模式：設置為內部客戶
    pub fn with_internal_customer(mut self, internal: bool) -> Self {
        self.is_internal_customer = internal;
        self
    }

    /// 建構器模式：設置布料
    pub fn with_fabric(mut self, fabric: FabricDetails) -> Self {
        self.fabric = fabric;
        self
    }

    /// 建構器模式：設置產出物料
    pub fn with_product_item(mut self, item: impl Into<String>) -> Self {
        self.product_item = Some(item.into());
        self
    }

    /// 建構器模式：設置製程
    pub fn with_process(mut self, process: ProcessConfig) -> Self {
        self.process = process;
        self
    }

    /// 建構器模式：設置明細預設值
    pub fn with_defaults(mut self, defaults: OrderDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// 建構器模式：設置倉庫
    pub fn with_warehouses(mut self, warehouses: Warehouses) -> Self {
        self.warehouses = warehouses;
        self
    }

    /// 建構器模式：設置日期
    pub fn with_dates(mut self, transaction_date: NaiveDate, delivery_date: Option<NaiveDate>) -> Self {
        self.transaction_date = Some(transaction_date);
        self.delivery_date = delivery_date;
        self
    }

    /// 建構器模式：設置跳過布料移轉
    pub fn with_skip_transfer(mut self, skip: bool) -> Self {
        self.skip_transfer = skip;
        self
    }

    /// 建構器模式：設置需要裝箱單
    pub fn with_packing_slip_required(mut self, required: bool) -> Self {
        self.packing_slip_required = required;
        self
    }

    /// 建構器模式：加入明細
    pub fn with_line(mut self, line: OrderLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn is_submitted(&self) -> bool {
        self.doc_status == DocStatus::Submitted
    }

    pub fn is_closed(&self) -> bool {
        self.manual_override == Some(ManualOverride::Closed)
    }

    pub fn is_stopped(&self) -> bool {
        self.manual_override == Some(ManualOverride::Stopped)
    }

    /// 所有明細是否皆已解析成品物料與 BOM
    pub fn all_artifacts_resolved(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(OrderLine::has_artifacts)
    }

    pub fn line(&self, line_id: &str) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn line_mut(&mut self, line_id: &str) -> Option<&mut OrderLine> {
        self.lines.iter_mut().find(|l| l.id == line_id)
    }

    /// 明細列號（從 1 開始），用於錯誤訊息
    pub fn row_of(&self, line_id: &str) -> usize {
        self.lines
            .iter()
            .position(|l| l.id == line_id)
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    /// 變更狀態並留下紀錄
    pub fn transition_to(&mut self, status: OrderStatus) {
        if self.status != status {
            self.comments.push(StatusComment::new(self.status, status));
            self.status = status;
        }
    }
}
