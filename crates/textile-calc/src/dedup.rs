//! 成品物料與 BOM 的重複比對
//!
//! 在先前已提交的訂單中尋找指紋相同的成品物料與 BOM，找到即重用

use rust_decimal::Decimal;
use textile_core::{ComponentKind, Order, OrderKind, OrderLine, ProcessComponent};

/// 成品物料指紋（每次比對時即時計算）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFingerprint<'a> {
    pub customer: &'a str,
    pub fabric_item: Option<&'a str>,
    pub design_image: Option<&'a str>,
    pub design_width: Decimal,
    pub design_height: Decimal,
}

impl<'a> ItemFingerprint<'a> {
    pub fn of(order: &'a Order, line: &'a OrderLine) -> Self {
        Self {
            customer: order.customer.as_str(),
            fabric_item: order.fabric.item.as_deref(),
            design_image: line.design_image.as_deref(),
            design_width: line.design_width,
            design_height: line.design_height,
        }
    }
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn same_fabric_weight(a: &Order, b: &Order) -> bool {
    a.fabric.gsm == b.fabric.gsm
        && a.fabric.per_pickup == b.fabric.per_pickup
        && a.fabric.width == b.fabric.width
}

/// 兩邊組件是否一致；兩邊都沒有亦視為一致
fn same_component(
    current: &Order,
    candidate: &Order,
    mine: Option<&ProcessComponent>,
    theirs: Option<&ProcessComponent>,
) -> bool {
    match (mine, theirs) {
        (Some(m), Some(t)) => {
            m.item == t.item
                && m.by_fabric_weight == t.by_fabric_weight
                && (!m.by_fabric_weight || same_fabric_weight(current, candidate))
        }
        (None, None) => true,
        _ => false,
    }
}

/// 印花：製程物料相同，且必要組件逐一相同；本單不要求的組件，候選單也不可要求
fn print_process_matches(current: &Order, candidate: &Order) -> bool {
    if candidate.process.process_item != current.process.process_item {
        return false;
    }

    ComponentKind::PRINTING.iter().all(|&kind| {
        let mine = current.process.component(kind).filter(|c| c.required);
        let theirs = candidate.process.component(kind).filter(|c| c.required);
        same_component(current, candidate, mine, theirs)
    })
}

/// 前處理：有指定的組件必須相同，未指定的組件候選單也必須未指定
fn pretreatment_process_matches(current: &Order, candidate: &Order) -> bool {
    ComponentKind::PRETREATMENT.iter().all(|&kind| {
        let mine = current.process.component(kind).filter(|c| c.has_item());
        let theirs = candidate.process.component(kind).filter(|c| c.has_item());
        same_component(current, candidate, mine, theirs)
    })
}

/// 重複物料比對器
pub struct ArtifactResolver<'a> {
    candidates: &'a [Order],
}

impl<'a> ArtifactResolver<'a> {
    pub fn new(candidates: &'a [Order]) -> Self {
        Self { candidates }
    }

    /// 已提交、非本單、同種類的訂單，最新建立者在前
    fn qualifying(&self, order: &Order) -> Vec<&'a Order> {
        let mut found: Vec<&'a Order> = self
            .candidates
            .iter()
            .filter(|c| c.id != order.id && c.kind == order.kind && c.is_submitted())
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found
    }

    /// 尋找可重用的成品物料
    ///
    /// 前處理的成品為成品布，塗層的成品為布料本身，不需比對
    pub fn find_existing_item(&self, order: &Order, line: &OrderLine) -> Option<String> {
        match order.kind {
            OrderKind::Print => {
                let fingerprint = ItemFingerprint::of(order, line);
                let found = self.qualifying(order).into_iter().find_map(|candidate| {
                    candidate
                        .lines
                        .iter()
                        .find(|l| {
                            has_value(&l.item_code) && ItemFingerprint::of(candidate, l) == fingerprint
                        })
                        .and_then(|l| l.item_code.clone())
                });

                match &found {
                    Some(item) => tracing::debug!(order = %order.id, line = %line.id, %item, "重用既有圖案物料"),
                    None => tracing::debug!(order = %order.id, line = %line.id, "沒有可重用的圖案物料"),
                }
                found
            }
            OrderKind::Pretreatment => order.product_item.clone(),
            OrderKind::Coating => order.fabric.item.clone(),
        }
    }

    /// 尋找可重用的 BOM
    ///
    /// 塗層使用物料的預設 BOM，不在此比對
    pub fn find_existing_bom(&self, order: &Order, item: &str) -> Option<String> {
        let found = match order.kind {
            OrderKind::Print => self
                .qualifying(order)
                .into_iter()
                .filter(|candidate| print_process_matches(order, candidate))
                .find_map(|candidate| {
                    candidate
                        .lines
                        .iter()
                        .find(|l| l.item_code.as_deref() == Some(item) && has_value(&l.bom))
                        .and_then(|l| l.bom.clone())
                }),
            OrderKind::Pretreatment => {
                if !has_value(&order.product_item) || !has_value(&order.fabric.item) {
                    return None;
                }
                self.qualifying(order)
                    .into_iter()
                    .filter(|candidate| {
                        candidate.product_item == order.product_item
                            && candidate.fabric.item == order.fabric.item
                            && pretreatment_process_matches(order, candidate)
                    })
                    .find_map(|candidate| {
                        candidate
                            .lines
                            .iter()
                            .find(|l| has_value(&l.bom))
                            .and_then(|l| l.bom.clone())
                    })
            }
            OrderKind::Coating => None,
        };

        if let Some(bom) = &found {
            tracing::debug!(order = %order.id, %item, %bom, "重用既有 BOM");
        }
        found
    }
}
