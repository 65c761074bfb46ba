//! 換算係數緩存
//!
//! 由呼叫端建立並持有，每個行程或每個請求一份。
//! 換算設定變更時透過 `invalidate_*` 清除。

use textile_calc::UnitConversionTable;
use textile_core::{FulfillmentSettings, Uom};

/// 換算表緩存
#[derive(Debug, Default)]
pub struct ConversionCache {
    table: Option<UnitConversionTable>,
    builds: usize,
}

impl ConversionCache {
    /// 創建空緩存
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得換算表，未建立時依設定建立
    pub fn table(&mut self, settings: &FulfillmentSettings) -> &UnitConversionTable {
        if self.table.is_none() {
            self.builds += 1;
            tracing::debug!("建立換算表（第 {} 次）", self.builds);
        }
        self.table
            .get_or_insert_with(|| UnitConversionTable::from_settings(settings))
    }

    /// 是否已有換算表
    pub fn is_warm(&self) -> bool {
        self.table.is_some()
    }

    /// 換算表建立次數
    pub fn builds(&self) -> usize {
        self.builds
    }

    /// 無條件清除
    pub fn invalidate(&mut self) {
        if self.table.take().is_some() {
            tracing::debug!("換算表緩存已清除");
        }
    }

    /// 單位換算變更事件：涉及公尺、碼或英吋時清除緩存
    ///
    /// 回傳是否清除
    pub fn invalidate_on_uom_change(&mut self, from: &Uom, to: &Uom) -> bool {
        if from.is_base_length() || to.is_base_length() {
            tracing::info!(%from, %to, "長度單位換算變更，清除緩存");
            self.invalidate();
            true
        } else {
            false
        }
    }
}
