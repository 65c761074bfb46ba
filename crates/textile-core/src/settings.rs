//! 履約引擎設定（唯讀輸入）

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{FulfillmentError, Result};

/// 允差類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllowanceKind {
    /// 不允許超量
    None,
    /// 生產超額
    Production,
    /// 出貨超額
    Delivery,
    /// 開票超額
    Billing,
}

/// 各欄位小數位數
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Precision {
    /// 印花/布料長度
    pub length: u32,
    pub panel_qty: u32,
    /// 訂單合計
    pub total: u32,
    /// 階段數量
    pub stage_qty: u32,
    pub percent: u32,
    /// 工單數量（剩餘量無條件進位）
    pub work_order_qty: u32,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            length: 3,
            panel_qty: 3,
            total: 3,
            stage_qty: 3,
            percent: 3,
            work_order_qty: 3,
        }
    }
}

/// 履約設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FulfillmentSettings {
    /// 英吋換公尺（未設定時使用 0.0254）
    pub inch_to_meter: Option<Decimal>,

    /// 碼換公尺（未設定時使用 0.9144）
    pub yard_to_meter: Option<Decimal>,

    /// 額外換算係數，鍵為 "{from}_to_{to}"
    pub extra_conversion_factors: BTreeMap<String, Decimal>,

    /// 生產超額允差（%）
    pub over_production_pct: Decimal,

    /// 出貨超額允差（%）
    pub over_delivery_pct: Decimal,

    /// 開票超額允差（%）
    pub over_billing_pct: Decimal,

    /// 損耗率是否必填
    pub wastage_mandatory: bool,

    /// 是否允許負庫存
    pub allow_negative_stock: bool,

    /// 圖案成品的預設物料群組
    pub default_design_item_group: Option<String>,

    /// 超過此明細數時改以背景工作執行
    pub background_line_threshold: usize,

    /// 銷售訂單提交後自動建立工單
    pub auto_work_orders_on_sales_order: bool,

    /// 前處理：退漿為必要製程
    pub desizing_mandatory: bool,

    /// 前處理：燒毛為必要製程
    pub singeing_mandatory: bool,

    pub precision: Precision,
}

impl Default for FulfillmentSettings {
    fn default() -> Self {
        Self {
            inch_to_meter: None,
            yard_to_meter: None,
            extra_conversion_factors: BTreeMap::new(),
            over_production_pct: Decimal::ZERO,
            over_delivery_pct: Decimal::ZERO,
            over_billing_pct: Decimal::ZERO,
            wastage_mandatory: false,
            allow_negative_stock: false,
            default_design_item_group: None,
            background_line_threshold: 5,
            auto_work_orders_on_sales_order: false,
            desizing_mandatory: false,
            singeing_mandatory: false,
            precision: Precision::default(),
        }
    }
}

impl FulfillmentSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// 從 JSON 載入設定（缺少的欄位使用預設值）
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FulfillmentError::InvalidSettings(e.to_string()))
    }

    /// 建構器模式：設置英吋換公尺係數
    pub fn with_inch_to_meter(mut self, factor: Decimal) -> Self {
        self.inch_to_meter = Some(factor);
        self
    }

    /// 建構器模式：設置碼換公尺係數
    pub fn with_yard_to_meter(mut self, factor: Decimal) -> Self {
        self.yard_to_meter = Some(factor);
        self
    }

    /// 建構器模式：加入額外換算係數
    pub fn with_conversion_factor(mut self, from: &str, to: &str, factor: Decimal) -> Self {
        self.extra_conversion_factors
            .insert(format!("{}_to_{}", from, to).to_lowercase(), factor);
        self
    }

    /// 建構器模式：設置生產超額允差
    pub fn with_over_production_pct(mut self, pct: Decimal) -> Self {
        self.over_production_pct = pct;
        self
    }

    /// 建構器模式：設置出貨超額允差
    pub fn with_over_delivery_pct(mut self, pct: Decimal) -> Self {
        self.over_delivery_pct = pct;
        self
    }

    /// 建構器模式：設置開票超額允差
    pub fn with_over_billing_pct(mut self, pct: Decimal) -> Self {
        self.over_billing_pct = pct;
        self
    }

    /// 建構器模式：設置損耗率必填
    pub fn with_wastage_mandatory(mut self, mandatory: bool) -> Self {
        self.wastage_mandatory = mandatory;
        self
    }

    /// 建構器模式：設置是否允許負庫存
    pub fn with_allow_negative_stock(mut self, allow: bool) -> Self {
        self.allow_negative_stock = allow;
        self
    }

    /// 建構器模式：設置圖案物料群組
    pub fn with_default_design_item_group(mut self, group: impl Into<String>) -> Self {
        self.default_design_item_group = Some(group.into());
        self
    }

    /// 建構器模式：設置背景執行門檻
    pub fn with_background_line_threshold(mut self, threshold: usize) -> Self {
        self.background_line_threshold = threshold;
        self
    }

    /// 建構器模式：設置銷售訂單提交後自動建立工單
    pub fn with_auto_work_orders_on_sales_order(mut self, enabled: bool) -> Self {
        self.auto_work_orders_on_sales_order = enabled;
        self
    }

    /// 建構器模式：設置前處理必要製程
    pub fn with_pretreatment_mandatory(mut self, desizing: bool, singeing: bool) -> Self {
        self.desizing_mandatory = desizing;
        self.singeing_mandatory = singeing;
        self
    }

    /// 建構器模式：設置精度
    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// 取得允差百分比
    pub fn allowance_pct(&self, kind: AllowanceKind) -> Decimal {
        match kind {
            AllowanceKind::None => Decimal::ZERO,
            AllowanceKind::Production => self.over_production_pct,
            AllowanceKind::Delivery => self.over_delivery_pct,
            AllowanceKind::Billing => self.over_billing_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let settings = FulfillmentSettings::default();
        assert_eq!(settings.background_line_threshold, 5);
        assert_eq!(settings.precision.length, 3);
        assert!(settings.inch_to_meter.is_none());
        assert_eq!(settings.allowance_pct(AllowanceKind::None), Decimal::ZERO);
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let settings = FulfillmentSettings::from_json_str(
            r#"{ "over_delivery_pct": "10", "default_design_item_group": "Printed Designs" }"#,
        )
        .unwrap();

        assert_eq!(settings.allowance_pct(AllowanceKind::Delivery), dec!(10));
        assert_eq!(settings.default_design_item_group.as_deref(), Some("Printed Designs"));
        assert_eq!(settings.background_line_threshold, 5);
    }

    #[test]
    fn test_from_json_invalid() {
        let err = FulfillmentSettings::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, FulfillmentError::InvalidSettings(_)));
    }

    #[test]
    fn test_extra_conversion_key_is_lowercase() {
        let settings = FulfillmentSettings::new().with_conversion_factor("Meter", "Yard", dec!(1.0936));
        assert_eq!(
            settings.extra_conversion_factors.get("meter_to_yard"),
            Some(&dec!(1.0936))
        );
    }
}
