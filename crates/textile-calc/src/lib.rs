//! # Textile Calculation Engine
//!
//! 數量換算、訂單合計、重複物料比對、階段狀態與整體狀態推導

pub mod allowance;
pub mod conversion;
pub mod dedup;
pub mod profile;
pub mod quantity;
pub mod state_machine;
pub mod totals;
pub mod tracker;
pub mod validation;

// Re-export 主要類型
pub use allowance::AllowanceValidator;
pub use conversion::UnitConversionTable;
pub use dedup::ArtifactResolver;
pub use profile::{
    profile_for, AllowanceRule, CoatingProfile, GateContext, OpenDocuments, OrderProfile,
    PretreatmentProfile, PrintProfile, StageGate, StatusRules,
};
pub use quantity::LineQuantityCalculator;
pub use state_machine::{StatusInput, StatusStateMachine};
pub use totals::OrderTotalsAggregator;
pub use tracker::{completion_status, StatusEngine};
pub use validation::{order_title, OrderValidator};

use textile_core::{Order, Precision, Result};

/// 重算所有明細與訂單合計
pub fn recalculate_order(
    order: &mut Order,
    table: &UnitConversionTable,
    precision: &Precision,
) -> Result<()> {
    let profile = profile_for(order.kind);
    for line in &mut order.lines {
        profile.recalculate_line(line, table, precision)?;
    }
    OrderTotalsAggregator::apply(order, precision);
    Ok(())
}
