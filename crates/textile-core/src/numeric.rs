//! 數值捨入工具

use rust_decimal::{Decimal, RoundingStrategy};

/// 依欄位精度四捨五入
pub fn round_to(value: Decimal, decimal_places: u32) -> Decimal {
    value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero)
}

/// 依欄位精度無條件進位
pub fn round_up_to(value: Decimal, decimal_places: u32) -> Decimal {
    value.round_dp_with_strategy(decimal_places, RoundingStrategy::ToPositiveInfinity)
}

/// 百分比（分母為零時回傳 0）
pub fn percentage(completed: Decimal, reference: Decimal) -> Decimal {
    if reference.is_zero() {
        Decimal::ZERO
    } else {
        completed / reference * Decimal::ONE_HUNDRED
    }
}
