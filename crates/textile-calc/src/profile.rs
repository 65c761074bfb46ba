//! 訂單種類設定
//!
//! 三種訂單共用同一套狀態引擎，差異集中在此：明細換算方式、各階段分母、
//! 適用階段、不適用/允差完成條件、允差類型與狀態規則。

use rust_decimal::Decimal;
use textile_core::{
    AllowanceKind, Order, OrderKind, OrderLine, OrderStatus, Precision, Result, Stage, StageBoard,
};

use crate::conversion::UnitConversionTable;
use crate::quantity::LineQuantityCalculator;

/// 階段判斷條件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageGate {
    /// 結構上不適用
    pub not_applicable: bool,
    /// 未達 100% 但已無待辦單據，視為完成
    pub within_allowance: bool,
}

impl StageGate {
    pub fn new(not_applicable: bool, within_allowance: bool) -> Self {
        Self {
            not_applicable,
            within_allowance,
        }
    }
}

/// 仍開放中的下游單據
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenDocuments {
    /// 有工單尚待生產
    pub to_produce: bool,
    /// 有工單尚未裝箱
    pub to_pack: bool,
    /// 有銷售訂單尚待出貨
    pub to_deliver: bool,
    /// 有銷售訂單尚待開票
    pub to_bill: bool,
}

/// 階段判斷所需的上下文
pub struct GateContext<'a> {
    pub order: &'a Order,
    pub board: &'a StageBoard,
    pub open: OpenDocuments,
}

impl GateContext<'_> {
    pub fn percent(&self, stage: Stage) -> Decimal {
        self.board.percent(stage)
    }

    fn started(&self, stage: Stage) -> bool {
        !self.percent(stage).is_zero()
    }

    fn complete(&self, stage: Stage) -> bool {
        self.percent(stage) >= Decimal::ONE_HUNDRED
    }
}

/// 允差規則：類型與基準數量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceRule {
    pub kind: AllowanceKind,
    pub reference: Decimal,
}

/// 整體狀態規則
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusRules {
    /// 訂單 → 工單 → 生產 → 出貨 → 開票
    Fulfillment {
        confirmation_stage: Stage,
        confirmation_status: OrderStatus,
    },
    /// 單一生產階段（塗層）
    Production { stage: Stage },
}

/// 訂單種類的共用介面
pub trait OrderProfile: Send + Sync {
    fn kind(&self) -> OrderKind;

    /// 重新計算明細衍生欄位
    fn recalculate_line(
        &self,
        line: &mut OrderLine,
        table: &UnitConversionTable,
        precision: &Precision,
    ) -> Result<()>;

    /// 階段百分比的分母
    fn stage_denominator(&self, _stage: Stage, line: &OrderLine) -> Decimal {
        line.stock_print_length
    }

    /// 適用階段
    fn applicable_stages(&self) -> &'static [Stage];

    /// 不適用與允差完成條件（關閉/取消由狀態引擎統一處理）
    fn stage_gate(&self, stage: Stage, ctx: &GateContext<'_>) -> StageGate;

    /// 允差規則；布料移轉沒有明細層級的允差
    fn allowance_rule(&self, stage: Stage, line: &OrderLine) -> Option<AllowanceRule> {
        let (kind, reference) = match stage {
            Stage::Transferred => return None,
            Stage::Ordered => (AllowanceKind::None, line.stock_print_length),
            Stage::WorkOrdered | Stage::Packed | Stage::Coated => {
                (AllowanceKind::Production, line.stock_print_length)
            }
            // 生產上限為含損耗的布料長度
            Stage::Produced => (AllowanceKind::None, line.stock_fabric_length),
            Stage::Delivered => (AllowanceKind::Delivery, line.stock_print_length),
            Stage::Billed => (AllowanceKind::Billing, line.stock_print_length),
        };
        Some(AllowanceRule { kind, reference })
    }

    fn status_rules(&self, order: &Order) -> StatusRules;

    /// 以訂單總量計算百分比與允差（不按明細封頂）
    fn is_order_level(&self, _stage: Stage) -> bool {
        false
    }

    fn is_applicable(&self, stage: Stage) -> bool {
        self.applicable_stages().contains(&stage)
    }
}

/// 印花訂單
pub struct PrintProfile;

/// 布料前處理訂單
pub struct PretreatmentProfile;

/// 塗層訂單
pub struct CoatingProfile;

/// 取得訂單種類設定
pub fn profile_for(kind: OrderKind) -> &'static dyn OrderProfile {
    match kind {
        OrderKind::Print => &PrintProfile,
        OrderKind::Pretreatment => &PretreatmentProfile,
        OrderKind::Coating => &CoatingProfile,
    }
}

impl OrderProfile for PrintProfile {
    fn kind(&self) -> OrderKind {
        OrderKind::Print
    }

    fn recalculate_line(
        &self,
        line: &mut OrderLine,
        table: &UnitConversionTable,
        precision: &Precision,
    ) -> Result<()> {
        LineQuantityCalculator::calculate(line, table, precision)
    }

    fn applicable_stages(&self) -> &'static [Stage] {
        &[
            Stage::Ordered,
            Stage::Transferred,
            Stage::WorkOrdered,
            Stage::Produced,
            Stage::Packed,
            Stage::Delivered,
            Stage::Billed,
        ]
    }

    fn stage_gate(&self, stage: Stage, ctx: &GateContext<'_>) -> StageGate {
        let order = ctx.order;
        let internal = order.is_internal_customer;

        match stage {
            Stage::Ordered => StageGate::new(internal, false),
            Stage::Transferred => StageGate::new(
                order.skip_transfer,
                order.fabric_transfer_qty >= order.totals.total_print_length,
            ),
            Stage::WorkOrdered => StageGate::default(),
            Stage::Produced => StageGate::new(
                !ctx.started(Stage::WorkOrdered),
                ctx.complete(Stage::WorkOrdered)
                    && ctx.started(Stage::Produced)
                    && !ctx.open.to_produce,
            ),
            Stage::Packed => StageGate::new(
                internal || !order.packing_slip_required || !ctx.started(Stage::Produced),
                ctx.complete(Stage::WorkOrdered) && ctx.started(Stage::Packed) && !ctx.open.to_pack,
            ),
            Stage::Delivered => StageGate::new(
                internal || (!ctx.started(Stage::Ordered) && !ctx.started(Stage::WorkOrdered)),
                ctx.complete(Stage::Ordered)
                    && ctx.started(Stage::Delivered)
                    && !ctx.open.to_deliver,
            ),
            Stage::Billed => StageGate::new(
                internal || !ctx.started(Stage::Ordered),
                ctx.complete(Stage::Ordered) && ctx.started(Stage::Billed) && !ctx.open.to_bill,
            ),
            Stage::Coated => StageGate::new(true, false),
        }
    }

    fn status_rules(&self, order: &Order) -> StatusRules {
        // 內部客戶不建立銷售訂單，以工單確認訂單
        let confirmation_stage = if order.is_internal_customer {
            Stage::WorkOrdered
        } else {
            Stage::Ordered
        };

        StatusRules::Fulfillment {
            confirmation_stage,
            confirmation_status: OrderStatus::ToConfirmOrder,
        }
    }
}

impl OrderProfile for PretreatmentProfile {
    fn kind(&self) -> OrderKind {
        OrderKind::Pretreatment
    }

    fn recalculate_line(
        &self,
        line: &mut OrderLine,
        table: &UnitConversionTable,
        precision: &Precision,
    ) -> Result<()> {
        LineQuantityCalculator::calculate_stock_qty(line, table, precision)
    }

    fn applicable_stages(&self) -> &'static [Stage] {
        &[
            Stage::Ordered,
            Stage::WorkOrdered,
            Stage::Produced,
            Stage::Packed,
            Stage::Delivered,
            Stage::Billed,
        ]
    }

    fn stage_gate(&self, stage: Stage, ctx: &GateContext<'_>) -> StageGate {
        let order = ctx.order;

        match stage {
            Stage::Ordered | Stage::WorkOrdered => StageGate::default(),
            Stage::Produced => StageGate::new(
                !ctx.started(Stage::Ordered),
                ctx.complete(Stage::WorkOrdered)
                    && ctx.started(Stage::Produced)
                    && !ctx.open.to_produce,
            ),
            // 前處理的裝箱以銷售訂單為前提，不看工單
            Stage::Packed => StageGate::new(
                !order.packing_slip_required || !ctx.started(Stage::Produced),
                ctx.complete(Stage::Ordered) && ctx.started(Stage::Packed) && !ctx.open.to_pack,
            ),
            Stage::Delivered => StageGate::new(
                !ctx.started(Stage::Ordered),
                ctx.complete(Stage::Ordered)
                    && ctx.started(Stage::Delivered)
                    && !ctx.open.to_deliver,
            ),
            Stage::Billed => StageGate::new(
                !ctx.started(Stage::Ordered),
                ctx.complete(Stage::Ordered) && ctx.started(Stage::Billed) && !ctx.open.to_bill,
            ),
            Stage::Transferred | Stage::Coated => StageGate::new(true, false),
        }
    }

    fn status_rules(&self, _order: &Order) -> StatusRules {
        StatusRules::Fulfillment {
            confirmation_stage: Stage::Ordered,
            confirmation_status: OrderStatus::NotStarted,
        }
    }
}

impl OrderProfile for CoatingProfile {
    fn kind(&self) -> OrderKind {
        OrderKind::Coating
    }

    fn recalculate_line(
        &self,
        line: &mut OrderLine,
        table: &UnitConversionTable,
        precision: &Precision,
    ) -> Result<()> {
        LineQuantityCalculator::calculate_stock_qty(line, table, precision)
    }

    fn applicable_stages(&self) -> &'static [Stage] {
        &[Stage::Coated]
    }

    fn stage_gate(&self, stage: Stage, ctx: &GateContext<'_>) -> StageGate {
        match stage {
            // 塗層只有數量判斷，沒有允差完成路徑
            Stage::Coated => StageGate::new(ctx.order.is_stopped(), false),
            _ => StageGate::new(true, false),
        }
    }

    fn is_order_level(&self, stage: Stage) -> bool {
        stage == Stage::Coated
    }

    fn status_rules(&self, _order: &Order) -> StatusRules {
        StatusRules::Production {
            stage: Stage::Coated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use textile_core::{StageProgress, StageStatus};

    fn board(entries: &[(Stage, Decimal)]) -> StageBoard {
        let mut board = StageBoard::default();
        for (stage, percent) in entries {
            *board.get_mut(*stage) = StageProgress::new(*percent, StageStatus::Pending);
        }
        board
    }

    #[test]
    fn test_profile_for_kind() {
        assert_eq!(profile_for(OrderKind::Print).kind(), OrderKind::Print);
        assert_eq!(profile_for(OrderKind::Coating).applicable_stages(), &[Stage::Coated]);
        assert!(!profile_for(OrderKind::Pretreatment).is_applicable(Stage::Transferred));
    }

    #[test]
    fn test_print_produced_not_applicable_before_work_orders() {
        let order = Order::new("PO-1", OrderKind::Print, "CUST");
        let board = board(&[(Stage::Ordered, dec!(100))]);
        let ctx = GateContext {
            order: &order,
            board: &board,
            open: OpenDocuments::default(),
        };

        assert!(PrintProfile.stage_gate(Stage::Produced, &ctx).not_applicable);
    }

    #[test]
    fn test_print_production_within_allowance() {
        let order = Order::new("PO-1", OrderKind::Print, "CUST");
        let board = board(&[(Stage::WorkOrdered, dec!(100)), (Stage::Produced, dec!(98.5))]);

        let closed_out = GateContext {
            order: &order,
            board: &board,
            open: OpenDocuments::default(),
        };
        assert!(PrintProfile.stage_gate(Stage::Produced, &closed_out).within_allowance);

        let still_running = GateContext {
            order: &order,
            board: &board,
            open: OpenDocuments {
                to_produce: true,
                ..Default::default()
            },
        };
        assert!(!PrintProfile.stage_gate(Stage::Produced, &still_running).within_allowance);
    }

    #[test]
    fn test_internal_customer_confirms_with_work_orders() {
        let order = Order::new("PO-1", OrderKind::Print, "SELF").with_internal_customer(true);
        match PrintProfile.status_rules(&order) {
            StatusRules::Fulfillment {
                confirmation_stage, ..
            } => assert_eq!(confirmation_stage, Stage::WorkOrdered),
            other => panic!("unexpected rules {other:?}"),
        }
    }

    #[test]
    fn test_produced_allowance_uses_fabric_length() {
        let mut line = OrderLine::new("L1", dec!(9), textile_core::Uom::Meter);
        line.stock_print_length = dec!(9);
        line.stock_fabric_length = dec!(10);

        let rule = PrintProfile.allowance_rule(Stage::Produced, &line).unwrap();
        assert_eq!(rule.reference, dec!(10));
        assert_eq!(rule.kind, AllowanceKind::None);
        assert!(PrintProfile.allowance_rule(Stage::Transferred, &line).is_none());
    }
}
