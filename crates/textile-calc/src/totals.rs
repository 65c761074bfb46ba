//! 訂單合計

use rust_decimal::Decimal;
use textile_core::numeric::round_to;
use textile_core::{Order, OrderLine, OrderTotals, Precision};

/// 訂單合計彙總器
pub struct OrderTotalsAggregator;

impl OrderTotalsAggregator {
    /// 加總所有明細後再各自四捨五入
    pub fn aggregate(lines: &[OrderLine], precision: &Precision) -> OrderTotals {
        let (print, fabric, panels) = lines.iter().fold(
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            |(print, fabric, panels), line| {
                (
                    print + line.stock_print_length,
                    fabric + line.stock_fabric_length,
                    panels + line.panel_qty,
                )
            },
        );

        OrderTotals {
            total_print_length: round_to(print, precision.total),
            total_fabric_length: round_to(fabric, precision.total),
            total_panel_qty: round_to(panels, precision.total),
        }
    }

    /// 重算並寫回訂單
    pub fn apply(order: &mut Order, precision: &Precision) {
        order.totals = Self::aggregate(&order.lines, precision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use textile_core::Uom;

    fn line_with_stock(id: &str, stock_print: Decimal) -> OrderLine {
        let mut line = OrderLine::new(id, Decimal::ONE, Uom::Meter);
        line.stock_print_length = stock_print;
        line.stock_fabric_length = stock_print;
        line
    }

    #[test]
    fn test_sum_precedes_rounding() {
        // 各行先四捨五入會得到 0.002，先加總則為 0.001
        let lines = vec![line_with_stock("L1", dec!(0.0006)), line_with_stock("L2", dec!(0.0006))];
        let totals = OrderTotalsAggregator::aggregate(&lines, &Precision::default());

        assert_eq!(totals.total_print_length, dec!(0.001));
    }

    #[test]
    fn test_empty_order() {
        let totals = OrderTotalsAggregator::aggregate(&[], &Precision::default());
        assert_eq!(totals, OrderTotals::default());
    }

    proptest! {
        #[test]
        fn prop_totals_idempotent(values in proptest::collection::vec(0u32..1_000_000, 0..20)) {
            let lines: Vec<OrderLine> = values
                .iter()
                .enumerate()
                .map(|(i, v)| line_with_stock(&format!("L{i}"), Decimal::new(*v as i64, 4)))
                .collect();

            let first = OrderTotalsAggregator::aggregate(&lines, &Precision::default());
            let second = OrderTotalsAggregator::aggregate(&lines, &Precision::default());
            let expected: Decimal = lines.iter().map(|l| l.stock_print_length).sum();

            prop_assert_eq!(first, second);
            prop_assert_eq!(first.total_print_length, round_to(expected, 3));
        }
    }
}
