//! 下游數量允差檢查

use rust_decimal::Decimal;
use textile_core::numeric::round_to;
use textile_core::{FulfillmentError, FulfillmentSettings, Order, Result, Stage};

use crate::profile::{AllowanceRule, OrderProfile};

/// 允差檢查器
pub struct AllowanceValidator<'a> {
    profile: &'a dyn OrderProfile,
    settings: &'a FulfillmentSettings,
}

impl<'a> AllowanceValidator<'a> {
    pub fn new(profile: &'a dyn OrderProfile, settings: &'a FulfillmentSettings) -> Self {
        Self { profile, settings }
    }

    /// 允許上限 = 基準 × (100 + 允差%) / 100
    pub fn max_allowed(&self, rule: &AllowanceRule) -> Decimal {
        let pct = self.settings.allowance_pct(rule.kind);
        round_to(
            rule.reference * (Decimal::ONE_HUNDRED + pct) / Decimal::ONE_HUNDRED,
            self.settings.precision.stage_qty,
        )
    }

    /// 檢查單一階段
    pub fn validate_stage(&self, order: &Order, stage: Stage) -> Result<()> {
        if !self.profile.is_applicable(stage) {
            return Ok(());
        }
        if self.profile.is_order_level(stage) {
            return self.validate_order_total(order, stage);
        }

        for (idx, line) in order.lines.iter().enumerate() {
            let Some(rule) = self.profile.allowance_rule(stage, line) else {
                continue;
            };
            self.check(order, stage, idx, line.progress.get(stage), &rule)?;
        }

        Ok(())
    }

    /// 訂單層級階段：總量對照各行基準加總
    fn validate_order_total(&self, order: &Order, stage: Stage) -> Result<()> {
        let mut total = None::<AllowanceRule>;
        let mut qty = Decimal::ZERO;
        for line in &order.lines {
            let Some(rule) = self.profile.allowance_rule(stage, line) else {
                continue;
            };
            qty += line.progress.get(stage);
            total = Some(match total {
                Some(sum) => AllowanceRule {
                    reference: sum.reference + rule.reference,
                    ..sum
                },
                None => rule,
            });
        }

        match total {
            // 超出部分記在最後一行
            Some(rule) => self.check(order, stage, order.lines.len() - 1, qty, &rule),
            None => Ok(()),
        }
    }

    fn check(
        &self,
        order: &Order,
        stage: Stage,
        idx: usize,
        qty: Decimal,
        rule: &AllowanceRule,
    ) -> Result<()> {
        let max_allowed = self.max_allowed(rule);
        if qty <= max_allowed {
            return Ok(());
        }

        tracing::warn!(
            order = %order.id,
            row = idx + 1,
            %stage,
            %qty,
            %max_allowed,
            "下游數量超過允差"
        );
        Err(FulfillmentError::AllowanceExceeded {
            row: idx + 1,
            stage,
            qty,
            max_allowed,
        })
    }

    /// 依序檢查多個階段
    pub fn validate_stages(&self, order: &Order, stages: &[Stage]) -> Result<()> {
        stages
            .iter()
            .try_for_each(|stage| self.validate_stage(order, *stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::profile_for;
    use rust_decimal_macros::dec;
    use textile_core::{OrderKind, OrderLine, Uom};

    fn order_with_progress(stage: Stage, qty: Decimal) -> Order {
        let mut line = OrderLine::new("L1", dec!(10), Uom::Meter);
        line.stock_print_length = dec!(10);
        line.stock_fabric_length = dec!(11);
        line.progress.set(stage, qty);
        Order::new("PO-1", OrderKind::Print, "CUST").with_line(line)
    }

    #[test]
    fn test_delivery_within_allowance() {
        let settings = FulfillmentSettings::new().with_over_delivery_pct(dec!(10));
        let validator = AllowanceValidator::new(profile_for(OrderKind::Print), &settings);

        let order = order_with_progress(Stage::Delivered, dec!(11));
        assert!(validator.validate_stage(&order, Stage::Delivered).is_ok());
    }

    #[test]
    fn test_over_delivery_reports_quantities() {
        let settings = FulfillmentSettings::new().with_over_delivery_pct(dec!(10));
        let validator = AllowanceValidator::new(profile_for(OrderKind::Print), &settings);

        let order = order_with_progress(Stage::Delivered, dec!(11.5));
        match validator.validate_stage(&order, Stage::Delivered) {
            Err(FulfillmentError::AllowanceExceeded {
                row,
                qty,
                max_allowed,
                ..
            }) => {
                assert_eq!(row, 1);
                assert_eq!(qty, dec!(11.5));
                assert_eq!(max_allowed, dec!(11));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_ordered_has_no_tolerance() {
        let settings = FulfillmentSettings::new().with_over_production_pct(dec!(50));
        let validator = AllowanceValidator::new(profile_for(OrderKind::Print), &settings);

        let order = order_with_progress(Stage::Ordered, dec!(10.001));
        assert!(validator.validate_stage(&order, Stage::Ordered).is_err());
    }

    #[test]
    fn test_produced_ceiling_is_fabric_length() {
        let settings = FulfillmentSettings::new();
        let validator = AllowanceValidator::new(profile_for(OrderKind::Print), &settings);

        let order = order_with_progress(Stage::Produced, dec!(11));
        assert!(validator.validate_stage(&order, Stage::Produced).is_ok());
    }

    #[test]
    fn test_coated_allowance_is_checked_on_order_total() {
        let settings = FulfillmentSettings::new().with_over_production_pct(dec!(10));
        let validator = AllowanceValidator::new(profile_for(OrderKind::Coating), &settings);

        let mut order = Order::new("CO-1", OrderKind::Coating, "CUST");
        for (id, coated) in [("L1", dec!(50)), ("L2", dec!(55))] {
            let mut line = OrderLine::new(id, dec!(50), Uom::Meter);
            line.stock_print_length = dec!(50);
            line.progress.set(Stage::Coated, coated);
            order.lines.push(line);
        }
        assert!(validator.validate_stage(&order, Stage::Coated).is_ok());

        order.lines[1].progress.set(Stage::Coated, dec!(61));
        match validator.validate_stage(&order, Stage::Coated) {
            Err(FulfillmentError::AllowanceExceeded {
                row,
                qty,
                max_allowed,
                ..
            }) => {
                assert_eq!(row, 2);
                assert_eq!(qty, dec!(111));
                assert_eq!(max_allowed, dec!(110));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_inapplicable_stage_is_skipped() {
        let settings = FulfillmentSettings::new();
        let validator = AllowanceValidator::new(profile_for(OrderKind::Print), &settings);

        let order = order_with_progress(Stage::Coated, dec!(1000));
        assert!(validator.validate_stages(&order, &[Stage::Coated, Stage::Transferred]).is_ok());
    }
}
