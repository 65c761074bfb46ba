//! 下游單據草稿
//!
//! 只產生欄位值，實際建立交由 [`DocumentGateway`](crate::gateway::DocumentGateway)。

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use textile_calc::UnitConversionTable;
use textile_core::numeric::{round_to, round_up_to};
use textile_core::{
    ComponentKind, DownstreamSnapshot, FulfillmentError, FulfillmentSettings, Order, OrderLine,
    ProcessComponent, Result, Uom,
};

use crate::gateway::ItemCatalog;

/// 單位換算（1 `from_uom` = `to_qty` `to_uom`）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UomConversion {
    pub from_uom: Uom,
    pub to_uom: Uom,
    pub to_qty: Decimal,
}

/// 圖案物料草稿
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub item_name: String,
    pub item_group: String,
    pub stock_uom: Uom,
    pub fabric_item: String,
    pub customer: String,
    pub image: Option<String>,
    pub design_width: Decimal,
    pub design_height: Decimal,
    pub design_gap: Decimal,
    pub per_wastage: Decimal,
    pub uom_conversions: Vec<UomConversion>,
}

/// BOM 明細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    pub item: String,
    pub qty: Decimal,
    pub uom: Uom,
    /// 生產時不需轉移（製程與組件）
    pub skip_transfer: bool,
}

/// BOM 草稿（每 1 單位成品）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomDraft {
    pub item: String,
    pub quantity: Decimal,
    pub lines: Vec<BomLine>,
}

/// 布料轉移草稿（原料倉 → 在製倉）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDraft {
    pub order_id: String,
    pub company: String,
    pub item: String,
    pub qty: Decimal,
    pub uom: Uom,
    pub from_warehouse: Option<String>,
    pub to_warehouse: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLineDraft {
    pub order_line: String,
    pub item: String,
    pub item_name: Option<String>,
    pub bom: Option<String>,
    pub qty: Decimal,
    pub uom: Uom,
}

/// 銷售訂單草稿
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderDraft {
    pub order_id: String,
    pub company: String,
    pub customer: String,
    pub delivery_date: Option<NaiveDate>,
    pub warehouse: Option<String>,
    pub lines: Vec<SalesOrderLineDraft>,
}

/// 工單草稿
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderDraft {
    pub order_id: String,
    pub order_line: String,
    pub sales_order_line: Option<String>,
    pub item: String,
    pub bom: Option<String>,
    pub qty: Decimal,
    pub warehouse: Option<String>,
    pub customer: String,
}

fn required<'a>(value: &'a Option<String>, label: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FulfillmentError::MissingMandatory(label.to_string()))
}

/// 草稿產生器
pub struct ArtifactDrafter<'a> {
    settings: &'a FulfillmentSettings,
    table: &'a UnitConversionTable,
    catalog: &'a dyn ItemCatalog,
}

impl<'a> ArtifactDrafter<'a> {
    pub fn new(
        settings: &'a FulfillmentSettings,
        table: &'a UnitConversionTable,
        catalog: &'a dyn ItemCatalog,
    ) -> Self {
        Self {
            settings,
            table,
            catalog,
        }
    }

    /// 印花圖案物料
    pub fn design_item(&self, order: &Order, line: &OrderLine) -> Result<ItemDraft> {
        let fabric_item = required(&order.fabric.item, "Fabric Item")?;
        let item_group = self.settings.default_design_item_group.clone().ok_or_else(|| {
            FulfillmentError::MissingConfiguration(
                "Default Item Group for Printed Design Item".to_string(),
            )
        })?;

        let mut uom_conversions = vec![UomConversion {
            from_uom: Uom::Panel,
            to_uom: Uom::Meter,
            to_qty: line.panel_length_meter,
        }];

        let uses_yard = [line.uom.as_ref(), line.length_uom.as_ref(), Some(&line.stock_uom)]
            .into_iter()
            .flatten()
            .any(|uom| *uom == Uom::Yard);
        if uses_yard {
            uom_conversions.push(UomConversion {
                from_uom: Uom::Yard,
                to_uom: Uom::Meter,
                to_qty: self.table.yard_to_meter(),
            });
        }

        Ok(ItemDraft {
            item_name: line
                .design_name
                .clone()
                .unwrap_or_else(|| line.id.clone()),
            item_group,
            stock_uom: line.stock_uom.clone(),
            fabric_item: fabric_item.to_string(),
            customer: order.customer.clone(),
            image: line.design_image.clone(),
            design_width: line.design_width,
            design_height: line.design_height,
            design_gap: line.gap(),
            per_wastage: line.per_wastage.unwrap_or_default(),
            uom_conversions,
        })
    }

    /// 印花 BOM：布料、製程、必要組件
    pub fn design_bom(&self, order: &Order, line: &OrderLine) -> Result<BomDraft> {
        let item = required(&line.item_code, "Design Item")?;
        let fabric_item = required(&order.fabric.item, "Fabric Item")?;
        let process_item = required(&order.process.process_item, "Process Item")?;

        self.ensure_convertible(fabric_item, &Uom::Meter)?;
        let mut lines = vec![BomLine {
            item: fabric_item.to_string(),
            qty: Decimal::ONE,
            uom: Uom::Meter,
            skip_transfer: false,
        }];

        self.ensure_default_bom(process_item)?;
        self.ensure_convertible(process_item, &Uom::Meter)?;
        lines.push(BomLine {
            item: process_item.to_string(),
            qty: Decimal::ONE,
            uom: Uom::Meter,
            skip_transfer: true,
        });

        let components: Vec<&ProcessComponent> = ComponentKind::PRINTING
            .iter()
            .filter_map(|&kind| order.process.component(kind))
            .filter(|c| c.required && c.has_item())
            .collect();
        self.add_components(order, &components, &mut lines)?;

        Ok(BomDraft {
            item: item.to_string(),
            quantity: Decimal::ONE,
            lines,
        })
    }

    /// 前處理成品布 BOM：胚布加上有指定的前處理組件
    pub fn ready_fabric_bom(&self, order: &Order) -> Result<BomDraft> {
        let ready_item = required(&order.product_item, "Ready Fabric Item")?;
        let greige_item = required(&order.fabric.item, "Greige Fabric Item")?;

        self.ensure_convertible(greige_item, &Uom::Meter)?;
        let mut lines = vec![BomLine {
            item: greige_item.to_string(),
            qty: Decimal::ONE,
            uom: Uom::Meter,
            skip_transfer: false,
        }];

        let components: Vec<&ProcessComponent> = ComponentKind::PRETREATMENT
            .iter()
            .filter_map(|&kind| order.process.component(kind))
            .filter(|c| c.has_item())
            .collect();
        self.add_components(order, &components, &mut lines)?;

        Ok(BomDraft {
            item: ready_item.to_string(),
            quantity: Decimal::ONE,
            lines,
        })
    }

    /// 塗層使用物料既有的預設 BOM
    pub fn coating_bom(&self, order: &Order) -> Result<String> {
        let item = required(&order.fabric.item, "Fabric Item")?;
        self.catalog
            .default_bom(item)
            .ok_or_else(|| FulfillmentError::MissingDefaultBom(item.to_string()))
    }

    fn add_components(
        &self,
        order: &Order,
        components: &[&ProcessComponent],
        lines: &mut Vec<BomLine>,
    ) -> Result<()> {
        for component in components {
            let item = required(&component.item, component.kind.label())?;

            let (qty, uom) = if component.by_fabric_weight {
                let fabric = &order.fabric;
                for (value, label) in [
                    (fabric.width, "Fabric Width"),
                    (fabric.gsm, "Fabric GSM"),
                    (fabric.per_pickup, "Fabric Pickup %"),
                ] {
                    if value.is_zero() {
                        return Err(FulfillmentError::MissingMandatory(label.to_string()));
                    }
                }

                // 每公尺布重（克）× 吸收率
                let grams_per_meter = fabric.gsm * fabric.width * self.table.inch_to_meter();
                let qty = grams_per_meter * fabric.per_pickup / Decimal::ONE_HUNDRED;
                (
                    round_to(qty, self.settings.precision.length),
                    Uom::Other("Gram".to_string()),
                )
            } else {
                (Decimal::ONE, Uom::Meter)
            };

            self.ensure_default_bom(item)?;
            self.ensure_convertible(item, &uom)?;

            lines.push(BomLine {
                item: item.to_string(),
                qty,
                uom,
                skip_transfer: true,
            });
        }

        Ok(())
    }

    fn ensure_default_bom(&self, item: &str) -> Result<()> {
        match self.catalog.default_bom(item) {
            Some(_) => Ok(()),
            None => Err(FulfillmentError::MissingDefaultBom(item.to_string())),
        }
    }

    fn ensure_convertible(&self, item: &str, uom: &Uom) -> Result<()> {
        if self.catalog.is_convertible(item, uom) {
            Ok(())
        } else {
            Err(FulfillmentError::NotConvertible {
                item: item.to_string(),
                uom: uom.to_string(),
            })
        }
    }

    /// 布料轉移；未指定數量時轉移尚未轉移的布料長度
    pub fn transfer(&self, order: &Order, qty: Option<Decimal>) -> Result<TransferDraft> {
        let item = required(&order.fabric.item, "Fabric Item")?;
        let qty = qty.unwrap_or_else(|| {
            (order.totals.total_fabric_length - order.fabric_transfer_qty).max(Decimal::ZERO)
        });

        Ok(TransferDraft {
            order_id: order.id.clone(),
            company: order.company.clone(),
            item: item.to_string(),
            qty,
            uom: Uom::Meter,
            from_warehouse: order.warehouses.source.clone(),
            to_warehouse: order.warehouses.wip.clone(),
        })
    }

    /// 尚未下單的剩餘數量；沒有剩餘時回傳 None
    pub fn sales_order(&self, order: &Order) -> Option<SalesOrderDraft> {
        let lines: Vec<SalesOrderLineDraft> = order
            .lines
            .iter()
            .filter_map(|line| {
                let item = line.item_code.as_deref().filter(|i| !i.is_empty())?;
                let remaining = line.stock_print_length - line.progress.ordered_qty;
                if line.progress.ordered_qty.abs() >= line.stock_print_length.abs()
                    || remaining <= Decimal::ZERO
                {
                    return None;
                }

                Some(SalesOrderLineDraft {
                    order_line: line.id.clone(),
                    item: item.to_string(),
                    item_name: line.design_name.clone(),
                    bom: line.bom.clone(),
                    qty: remaining,
                    uom: line.stock_uom.clone(),
                })
            })
            .collect();

        if lines.is_empty() {
            return None;
        }

        Some(SalesOrderDraft {
            order_id: order.id.clone(),
            company: order.company.clone(),
            customer: order.customer.clone(),
            delivery_date: order.delivery_date,
            warehouse: order.warehouses.fg.clone(),
            lines,
        })
    }

    /// 工單：內部客戶按訂單明細，外部客戶按銷售訂單明細
    ///
    /// 剩餘數量無條件進位；進位後不大於 0 的略過
    pub fn work_orders(
        &self,
        order: &Order,
        snapshot: &DownstreamSnapshot,
    ) -> Result<Vec<WorkOrderDraft>> {
        let precision = self.settings.precision.work_order_qty;

        if order.is_internal_customer {
            let drafts = order
                .lines
                .iter()
                .filter_map(|line| {
                    let item = line.item_code.clone()?;
                    let pending = round_up_to(
                        line.stock_print_length - line.progress.work_order_qty,
                        precision,
                    );
                    (pending > Decimal::ZERO).then(|| WorkOrderDraft {
                        order_id: order.id.clone(),
                        order_line: line.id.clone(),
                        sales_order_line: None,
                        item,
                        bom: line.bom.clone(),
                        qty: pending,
                        warehouse: order.warehouses.fg.clone(),
                        customer: order.customer.clone(),
                    })
                })
                .collect();
            return Ok(drafts);
        }

        if !snapshot.has_sales_order() {
            return Err(FulfillmentError::SalesOrderMissing(order.id.clone()));
        }

        let drafts = snapshot
            .submitted_sales_order_lines()
            .filter_map(|row| {
                let line = order.line(&row.order_line)?;
                let item = line.item_code.clone()?;
                let pending = round_up_to(
                    row.stock_qty - snapshot.work_order_qty_for_sales_line(&row.row_id),
                    precision,
                );
                (pending > Decimal::ZERO).then(|| WorkOrderDraft {
                    order_id: order.id.clone(),
                    order_line: line.id.clone(),
                    sales_order_line: Some(row.row_id.clone()),
                    item,
                    bom: line.bom.clone(),
                    qty: pending,
                    warehouse: order.warehouses.fg.clone(),
                    customer: order.customer.clone(),
                })
            })
            .collect();

        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;
    use textile_core::{
        DocStatus, FabricDetails, OrderKind, ProcessConfig, SalesOrderLineRow, WorkOrderRow,
        WorkOrderState,
    };

    #[derive(Default)]
    struct Catalog {
        boms: BTreeSet<&'static str>,
        inconvertible: BTreeSet<&'static str>,
    }

    impl ItemCatalog for Catalog {
        fn default_bom(&self, item: &str) -> Option<String> {
            self.boms.contains(item).then(|| format!("BOM-{item}"))
        }

        fn is_convertible(&self, item: &str, _uom: &Uom) -> bool {
            !self.inconvertible.contains(item)
        }

        fn stock_qty(&self, _item: &str, _warehouse: Option<&str>) -> Decimal {
            Decimal::ZERO
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            boms: ["PROC-SUB", "PAPER-44", "COAT-1", "BLEACH"].into_iter().collect(),
            inconvertible: BTreeSet::new(),
        }
    }

    fn print_order() -> Order {
        let mut line = OrderLine::new("L1", dec!(10), Uom::Meter)
            .with_design("Rose", "rose.png", dec!(40), dec!(60));
        line.item_code = Some("DESIGN-1".into());
        line.stock_print_length = dec!(10);
        line.panel_length_meter = dec!(1.524);

        Order::new("PO-1", OrderKind::Print, "CUST")
            .with_fabric(FabricDetails::new("FAB-POLY").with_weight(dec!(58), dec!(120), dec!(80)))
            .with_process(
                ProcessConfig::new("PROC-SUB")
                    .with_component(ProcessComponent::new(ComponentKind::SublimationPaper, "PAPER-44"))
                    .with_component(
                        ProcessComponent::new(ComponentKind::Coating, "COAT-1")
                            .with_by_fabric_weight(true),
                    ),
            )
            .with_line(line)
    }

    #[test]
    fn test_design_item_requires_item_group() {
        let settings = FulfillmentSettings::new();
        let table = UnitConversionTable::default();
        let catalog = catalog();
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);

        let order = print_order();
        let err = drafter.design_item(&order, &order.lines[0]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_design_item_carries_panel_conversion() {
        let settings = FulfillmentSettings::new().with_default_design_item_group("Printed Designs");
        let table = UnitConversionTable::default();
        let catalog = catalog();
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);

        let order = print_order();
        let draft = drafter.design_item(&order, &order.lines[0]).unwrap();
        assert_eq!(draft.item_name, "Rose");
        assert_eq!(draft.fabric_item, "FAB-POLY");
        assert_eq!(draft.uom_conversions.len(), 1);
        assert_eq!(draft.uom_conversions[0].to_qty, dec!(1.524));
    }

    #[test]
    fn test_design_bom_lines() {
        let settings = FulfillmentSettings::new();
        let table = UnitConversionTable::default();
        let catalog = catalog();
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);

        let order = print_order();
        let bom = drafter.design_bom(&order, &order.lines[0]).unwrap();

        let items: Vec<&str> = bom.lines.iter().map(|l| l.item.as_str()).collect();
        assert_eq!(items, vec!["FAB-POLY", "PROC-SUB", "COAT-1", "PAPER-44"]);

        // 58 × 120 × 0.0254 × 80% = 141.4272
        let coating = &bom.lines[2];
        assert_eq!(coating.qty, dec!(141.427));
        assert_eq!(coating.uom, Uom::Other("Gram".into()));
        assert!(!bom.lines[0].skip_transfer);
        assert!(bom.lines[1].skip_transfer);
    }

    #[test]
    fn test_design_bom_requires_component_default_bom() {
        let settings = FulfillmentSettings::new();
        let table = UnitConversionTable::default();
        let mut catalog = catalog();
        catalog.boms.remove("PAPER-44");
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);

        let order = print_order();
        assert!(matches!(
            drafter.design_bom(&order, &order.lines[0]),
            Err(FulfillmentError::MissingDefaultBom(item)) if item == "PAPER-44"
        ));
    }

    #[test]
    fn test_design_bom_requires_convertible_fabric() {
        let settings = FulfillmentSettings::new();
        let table = UnitConversionTable::default();
        let mut catalog = catalog();
        catalog.inconvertible.insert("FAB-POLY");
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);

        let order = print_order();
        assert!(matches!(
            drafter.design_bom(&order, &order.lines[0]),
            Err(FulfillmentError::NotConvertible { .. })
        ));
    }

    #[test]
    fn test_coating_bom_missing_default_is_configuration_error() {
        let settings = FulfillmentSettings::new();
        let table = UnitConversionTable::default();
        let catalog = catalog();
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);

        let order = Order::new("CO-1", OrderKind::Coating, "CUST")
            .with_fabric(FabricDetails::new("FAB-COTTON"));
        let err = drafter.coating_bom(&order).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_transfer_defaults_to_untransferred_fabric() {
        let settings = FulfillmentSettings::new();
        let table = UnitConversionTable::default();
        let catalog = catalog();
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);

        let mut order = print_order();
        order.totals.total_fabric_length = dec!(12);
        order.fabric_transfer_qty = dec!(5);

        assert_eq!(drafter.transfer(&order, None).unwrap().qty, dec!(7));
        order.fabric_transfer_qty = dec!(20);
        assert_eq!(drafter.transfer(&order, None).unwrap().qty, dec!(0));
        assert_eq!(drafter.transfer(&order, Some(dec!(3))).unwrap().qty, dec!(3));
    }

    #[test]
    fn test_sales_order_covers_remainder_only() {
        let settings = FulfillmentSettings::new();
        let table = UnitConversionTable::default();
        let catalog = catalog();
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);

        let mut order = print_order();
        order.lines[0].progress.ordered_qty = dec!(4);
        let draft = drafter.sales_order(&order).unwrap();
        assert_eq!(draft.lines[0].qty, dec!(6));

        order.lines[0].progress.ordered_qty = dec!(10);
        assert!(drafter.sales_order(&order).is_none());
    }

    #[test]
    fn test_internal_work_orders_round_up() {
        let settings = FulfillmentSettings::new();
        let table = UnitConversionTable::default();
        let catalog = catalog();
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);

        let mut order = print_order().with_internal_customer(true);
        order.lines[0].stock_print_length = dec!(10.00012);
        order.lines[0].progress.work_order_qty = dec!(4);

        let drafts = drafter.work_orders(&order, &DownstreamSnapshot::default()).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].qty, dec!(6.001));

        order.lines[0].progress.work_order_qty = dec!(10.00012);
        assert!(drafter.work_orders(&order, &DownstreamSnapshot::default()).unwrap().is_empty());
    }

    #[test]
    fn test_external_work_orders_follow_sales_order_lines() {
        let settings = FulfillmentSettings::new();
        let table = UnitConversionTable::default();
        let catalog = catalog();
        let drafter = ArtifactDrafter::new(&settings, &table, &catalog);
        let order = print_order();

        assert!(matches!(
            drafter.work_orders(&order, &DownstreamSnapshot::default()),
            Err(FulfillmentError::SalesOrderMissing(_))
        ));

        let snapshot = DownstreamSnapshot {
            sales_order_lines: vec![SalesOrderLineRow {
                sales_order: "SO-1".into(),
                row_id: "SO-1-1".into(),
                order_line: "L1".into(),
                stock_qty: dec!(10),
                doc_status: DocStatus::Submitted,
                to_deliver: true,
                to_bill: true,
            }],
            work_orders: vec![WorkOrderRow {
                work_order: "WO-1".into(),
                order_line: "L1".into(),
                sales_order_line: Some("SO-1-1".into()),
                qty: dec!(3),
                produced_qty: dec!(0),
                doc_status: DocStatus::Submitted,
                state: WorkOrderState::NotStarted,
                packed: false,
            }],
            ..Default::default()
        };

        let drafts = drafter.work_orders(&order, &snapshot).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].qty, dec!(7));
        assert_eq!(drafts[0].sales_order_line.as_deref(), Some("SO-1-1"));
    }
}
