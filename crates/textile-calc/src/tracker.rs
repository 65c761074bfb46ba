//! 階段狀態追蹤
//!
//! 彙總下游單據數量到每一行明細，計算各階段百分比與三態標籤

use rust_decimal::Decimal;
use textile_core::numeric::{percentage, round_to};
use textile_core::{
    DocStatus, DownstreamSnapshot, LineProgress, Order, Precision, Stage, StageBoard, StageStatus,
};

use crate::profile::{profile_for, GateContext, OpenDocuments, OrderProfile, StageGate};

/// 三態判斷：不適用 / 完成（含允差完成）/ 待辦
pub fn completion_status(percent: Decimal, gate: StageGate) -> StageStatus {
    if gate.not_applicable {
        StageStatus::NotApplicable
    } else if percent >= Decimal::ONE_HUNDRED || gate.within_allowance {
        StageStatus::Completed
    } else {
        StageStatus::Pending
    }
}

/// 狀態引擎（以訂單種類設定組合）
pub struct StatusEngine<'a> {
    profile: &'a dyn OrderProfile,
    precision: Precision,
}

impl<'a> StatusEngine<'a> {
    pub fn new(profile: &'a dyn OrderProfile, precision: Precision) -> Self {
        Self { profile, precision }
    }

    pub fn profile(&self) -> &'a dyn OrderProfile {
        self.profile
    }

    /// 彙總下游數量到明細（僅已提交的訂單與單據）
    pub fn aggregate(&self, order: &mut Order, snapshot: &DownstreamSnapshot) {
        let precision = self.precision.stage_qty;

        if !order.is_submitted() {
            for line in &mut order.lines {
                line.progress = LineProgress::default();
            }
            order.fabric_transfer_qty = Decimal::ZERO;
            return;
        }

        let coated_total: Decimal = snapshot.submitted_coating_entries().map(|e| e.qty).sum();

        for line in order.lines.iter_mut() {
            let id = line.id.clone();
            let matches = |order_line: &str| order_line == id;

            let ordered: Decimal = snapshot
                .submitted_sales_order_lines()
                .filter(|r| matches(&r.order_line))
                .map(|r| r.stock_qty)
                .sum();
            let (work_ordered, produced) = snapshot
                .submitted_work_orders()
                .filter(|w| matches(&w.order_line))
                .fold((Decimal::ZERO, Decimal::ZERO), |(qty, done), w| {
                    (qty + w.qty, done + w.produced_qty)
                });
            let packed: Decimal = snapshot
                .submitted_packing_lines()
                .filter(|r| matches(&r.order_line))
                .map(|r| r.stock_qty)
                .sum();
            let delivered: Decimal = snapshot
                .submitted_delivery_lines()
                .filter(|r| matches(&r.order_line))
                .map(|r| r.stock_qty)
                .sum();
            let billed: Decimal = snapshot
                .submitted_invoice_lines()
                .filter(|r| matches(&r.order_line))
                .map(|r| r.stock_qty)
                .sum();

            line.progress = LineProgress {
                ordered_qty: round_to(ordered, precision),
                work_order_qty: round_to(work_ordered, precision),
                produced_qty: round_to(produced, precision),
                packed_qty: round_to(packed, precision),
                delivered_qty: round_to(delivered, precision),
                billed_qty: round_to(billed, precision),
                coated_qty: Decimal::ZERO,
            };
        }

        // 塗層紀錄屬於訂單層級：依序填滿各行，超出部分記在最後一行
        let mut remaining = coated_total;
        let last = order.lines.len().saturating_sub(1);
        for (idx, line) in order.lines.iter_mut().enumerate() {
            let share = if idx == last {
                remaining
            } else {
                remaining.min(line.stock_print_length).max(Decimal::ZERO)
            };
            remaining -= share;
            line.progress.coated_qty = round_to(share, precision);
        }

        let fabric_item = order.fabric.item.clone().unwrap_or_default();
        let transferred: Decimal = snapshot
            .submitted_transfers()
            .filter(|t| t.item == fabric_item)
            .map(|t| t.signed_qty())
            .sum();
        order.fabric_transfer_qty = round_to(transferred, precision);
    }

    /// 階段百分比：每行取 min(階段數量, 分母) 加總後除以分母總和
    pub fn stage_percentage(&self, order: &Order, stage: Stage) -> Decimal {
        if stage == Stage::Transferred {
            let total = order.totals.total_print_length;
            let moved = order.fabric_transfer_qty.min(total).max(Decimal::ZERO);
            return round_to(percentage(moved, total), self.precision.percent);
        }

        let (capped, total, reference) = order.lines.iter().fold(
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            |(capped, total, reference), line| {
                let denominator = self.profile.stage_denominator(stage, line);
                let qty = line.progress.get(stage);
                (capped + qty.min(denominator), total + qty, reference + denominator)
            },
        );

        let completed = if self.profile.is_order_level(stage) {
            total.min(reference)
        } else {
            capped
        };
        round_to(percentage(completed, reference), self.precision.percent)
    }

    /// 是否仍有開放中的下游單據
    pub fn open_documents(order: &Order, snapshot: &DownstreamSnapshot) -> OpenDocuments {
        if !order.is_submitted() {
            return OpenDocuments::default();
        }

        OpenDocuments {
            to_produce: snapshot
                .submitted_work_orders()
                .any(|w| w.has_pending_production()),
            to_pack: snapshot.submitted_work_orders().any(|w| !w.packed),
            to_deliver: snapshot.submitted_sales_order_lines().any(|s| s.to_deliver),
            to_bill: snapshot.submitted_sales_order_lines().any(|s| s.to_bill),
        }
    }

    /// 依下游資料重算所有階段
    pub fn refresh(&self, order: &mut Order, snapshot: &DownstreamSnapshot) {
        self.aggregate(order, snapshot);
        order.items_created = order.all_artifacts_resolved();

        let applicable = self.profile.applicable_stages();
        let mut board = StageBoard::default();
        for &stage in applicable {
            board.get_mut(stage).percent = self.stage_percentage(order, stage);
        }

        let open = Self::open_documents(order, snapshot);

        let statuses: Vec<(Stage, StageStatus)> = {
            let ctx = GateContext {
                order: &*order,
                board: &board,
                open,
            };
            applicable
                .iter()
                .map(|&stage| {
                    let gate = self.profile.stage_gate(stage, &ctx);
                    (stage, completion_status(board.percent(stage), gate))
                })
                .collect()
        };

        for (stage, status) in statuses {
            board.get_mut(stage).status = status;
        }
        if order.is_closed() || order.doc_status == DocStatus::Cancelled {
            board.force_not_applicable();
        }

        tracing::debug!(
            order = %order.id,
            ordered = %board.percent(Stage::Ordered),
            produced = %board.percent(Stage::Produced),
            delivered = %board.percent(Stage::Delivered),
            "階段狀態已重算"
        );

        order.stages = board;
    }
}

impl StatusEngine<'static> {
    /// 依訂單種類建立
    pub fn for_order(order: &Order, precision: Precision) -> Self {
        Self::new(profile_for(order.kind), precision)
    }
}
