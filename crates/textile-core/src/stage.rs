//! 履約階段與階段狀態

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 履約階段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Ordered,
    Transferred,
    WorkOrdered,
    Produced,
    Packed,
    Delivered,
    Billed,
    Coated,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Ordered,
        Stage::Transferred,
        Stage::WorkOrdered,
        Stage::Produced,
        Stage::Packed,
        Stage::Delivered,
        Stage::Billed,
        Stage::Coated,
    ];

    /// 階段關鍵字
    pub fn keyword(&self) -> &'static str {
        match self {
            Stage::Ordered => "Order",
            Stage::Transferred => "Transfer",
            Stage::WorkOrdered => "Work Order",
            Stage::Produced => "Produce",
            Stage::Packed => "Pack",
            Stage::Delivered => "Deliver",
            Stage::Billed => "Bill",
            Stage::Coated => "Coat",
        }
    }

    /// 完成標籤
    pub fn completed_label(&self) -> &'static str {
        match self {
            Stage::Ordered => "Ordered",
            Stage::Transferred => "Transferred",
            Stage::WorkOrdered => "Work Ordered",
            Stage::Produced => "Produced",
            Stage::Packed => "Packed",
            Stage::Delivered => "Delivered",
            Stage::Billed => "Billed",
            Stage::Coated => "Coated",
        }
    }

    /// 待辦標籤
    pub fn pending_label(&self) -> &'static str {
        match self {
            Stage::Ordered => "To Order",
            Stage::Transferred => "To Transfer",
            Stage::WorkOrdered => "To Work Order",
            Stage::Produced => "To Produce",
            Stage::Packed => "To Pack",
            Stage::Delivered => "To Deliver",
            Stage::Billed => "To Bill",
            Stage::Coated => "To Coat",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

pub const NOT_APPLICABLE: &str = "Not Applicable";

/// 階段三態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StageStatus {
    #[default]
    NotApplicable,
    Pending,
    Completed,
}

impl StageStatus {
    /// 對應的字串標籤（下游依此判斷）
    pub fn label(&self, stage: Stage) -> &'static str {
        match self {
            StageStatus::NotApplicable => NOT_APPLICABLE,
            StageStatus::Pending => stage.pending_label(),
            StageStatus::Completed => stage.completed_label(),
        }
    }
}

/// 單一階段的百分比與狀態
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub percent: Decimal,
    pub status: StageStatus,
}

impl StageProgress {
    pub fn new(percent: Decimal, status: StageStatus) -> Self {
        Self { percent, status }
    }
}

/// 訂單所有階段的看板
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBoard {
    pub ordered: StageProgress,
    pub transferred: StageProgress,
    pub work_ordered: StageProgress,
    pub produced: StageProgress,
    pub packed: StageProgress,
    pub delivered: StageProgress,
    pub billed: StageProgress,
    pub coated: StageProgress,
}

impl StageBoard {
    pub fn get(&self, stage: Stage) -> &StageProgress {
        match stage {
            Stage::Ordered => &self.ordered,
            Stage::Transferred => &self.transferred,
            Stage::WorkOrdered => &self.work_ordered,
            Stage::Produced => &self.produced,
            Stage::Packed => &self.packed,
            Stage::Delivered => &self.delivered,
            Stage::Billed => &self.billed,
            Stage::Coated => &self.coated,
        }
    }

    pub fn get_mut(&mut self, stage: Stage) -> &mut StageProgress {
        match stage {
            Stage::Ordered => &mut self.ordered,
            Stage::Transferred => &mut self.transferred,
            Stage::WorkOrdered => &mut self.work_ordered,
            Stage::Produced => &mut self.produced,
            Stage::Packed => &mut self.packed,
            Stage::Delivered => &mut self.delivered,
            Stage::Billed => &mut self.billed,
            Stage::Coated => &mut self.coated,
        }
    }

    pub fn percent(&self, stage: Stage) -> Decimal {
        self.get(stage).percent
    }

    pub fn status(&self, stage: Stage) -> StageStatus {
        self.get(stage).status
    }

    /// 階段字串標籤
    pub fn label(&self, stage: Stage) -> &'static str {
        self.status(stage).label(stage)
    }

    /// 將所有階段狀態設為不適用（百分比保留）
    pub fn force_not_applicable(&mut self) {
        for stage in Stage::ALL {
            self.get_mut(stage).status = StageStatus::NotApplicable;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(Stage::Ordered, "Ordered", "To Order")]
    #[case(Stage::Transferred, "Transferred", "To Transfer")]
    #[case(Stage::WorkOrdered, "Work Ordered", "To Work Order")]
    #[case(Stage::Produced, "Produced", "To Produce")]
    #[case(Stage::Packed, "Packed", "To Pack")]
    #[case(Stage::Delivered, "Delivered", "To Deliver")]
    #[case(Stage::Billed, "Billed", "To Bill")]
    #[case(Stage::Coated, "Coated", "To Coat")]
    fn test_stage_labels(#[case] stage: Stage, #[case] done: &str, #[case] pending: &str) {
        assert_eq!(StageStatus::Completed.label(stage), done);
        assert_eq!(StageStatus::Pending.label(stage), pending);
        assert_eq!(StageStatus::NotApplicable.label(stage), "Not Applicable");
    }

    #[test]
    fn test_force_not_applicable_keeps_percent() {
        let mut board = StageBoard::default();
        *board.get_mut(Stage::Delivered) = StageProgress::new(dec!(100), StageStatus::Completed);

        board.force_not_applicable();

        assert_eq!(board.label(Stage::Delivered), "Not Applicable");
        assert_eq!(board.percent(Stage::Delivered), dec!(100));
    }
}
