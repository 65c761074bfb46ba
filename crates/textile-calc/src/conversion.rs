//! 長度單位換算表

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use textile_core::{FulfillmentSettings, Uom};

/// 1 英吋 = 0.0254 公尺
pub const DEFAULT_INCH_TO_METER: Decimal = dec!(0.0254);

/// 1 碼 = 0.9144 公尺
pub const DEFAULT_YARD_TO_METER: Decimal = dec!(0.9144);

/// 換算表
///
/// 鍵為小寫的 `"{from}_to_{to}"`。查無對應（或設定值為 0）時一律回傳 1，不會報錯。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitConversionTable {
    factors: BTreeMap<String, Decimal>,
}

impl Default for UnitConversionTable {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl UnitConversionTable {
    /// 創建換算表，未提供或為 0 的係數使用物理常數
    pub fn new(inch_to_meter: Option<Decimal>, yard_to_meter: Option<Decimal>) -> Self {
        let pick = |value: Option<Decimal>, fallback: Decimal| {
            value.filter(|v| !v.is_zero()).unwrap_or(fallback)
        };

        let mut factors = BTreeMap::new();
        factors.insert(
            "inch_to_meter".to_string(),
            pick(inch_to_meter, DEFAULT_INCH_TO_METER),
        );
        factors.insert(
            "yard_to_meter".to_string(),
            pick(yard_to_meter, DEFAULT_YARD_TO_METER),
        );
        factors.insert("meter_to_meter".to_string(), Decimal::ONE);

        Self { factors }
    }

    /// 從設定建立
    pub fn from_settings(settings: &FulfillmentSettings) -> Self {
        let mut table = Self::new(settings.inch_to_meter, settings.yard_to_meter);
        for (key, factor) in &settings.extra_conversion_factors {
            table.factors.insert(key.to_lowercase(), *factor);
        }
        table
    }

    /// 換算係數
    pub fn factor(&self, from: &Uom, to: &Uom) -> Decimal {
        self.factor_by_name(from.as_str(), to.as_str())
    }

    /// 以單位名稱查詢換算係數（不分大小寫）
    pub fn factor_by_name(&self, from: &str, to: &str) -> Decimal {
        let key = format!("{}_to_{}", from, to).to_lowercase();
        match self.factors.get(&key) {
            Some(factor) if !factor.is_zero() => *factor,
            _ => Decimal::ONE,
        }
    }

    /// 設置換算係數
    pub fn set_factor(&mut self, from: &str, to: &str, factor: Decimal) {
        self.factors
            .insert(format!("{}_to_{}", from, to).to_lowercase(), factor);
    }

    pub fn inch_to_meter(&self) -> Decimal {
        self.factor_by_name("inch", "meter")
    }

    pub fn yard_to_meter(&self) -> Decimal {
        self.factor_by_name("yard", "meter")
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}
