//! 訂單驗證與預設值

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use textile_core::numeric::round_to;
use textile_core::{
    ComponentKind, FulfillmentError, FulfillmentSettings, Order, OrderKind, QtyType, Result,
};

/// 訂單驗證器
pub struct OrderValidator<'a> {
    settings: &'a FulfillmentSettings,
}

impl<'a> OrderValidator<'a> {
    pub fn new(settings: &'a FulfillmentSettings) -> Self {
        Self { settings }
    }

    /// 以訂單預設值補齊明細，並同步單位與數量類型
    pub fn apply_order_defaults(order: &mut Order) {
        let defaults = order.defaults.clone();

        for line in &mut order.lines {
            if line.uom.is_none() {
                line.uom = Some(defaults.uom.clone());
            }
            if line.length_uom.is_none() {
                line.length_uom = Some(defaults.length_uom.clone());
            }
            if line.qty_type.is_none() {
                line.qty_type = Some(defaults.qty_type);
            }
            if line.per_wastage.is_none() {
                line.per_wastage = Some(defaults.per_wastage);
            }
            // 預設間距只套用於有圖案且未填間距的明細
            if line.design_gap.is_none() && line.design_image.is_some() {
                line.design_gap = Some(defaults.gap);
            }

            // 按片計量一律為印花數量；其他單位本身就是長度單位
            if line.is_panel() {
                line.qty_type = Some(QtyType::PrintQty);
            } else {
                line.length_uom = line.uom.clone();
            }
        }

        order.process.clear_unrequired();
    }

    /// 完整驗證
    pub fn validate(&self, order: &Order, for_submit: bool) -> Result<()> {
        Self::validate_dates(order)?;
        Self::validate_lines(order, for_submit)?;
        if order.kind == OrderKind::Print {
            self.validate_wastage(order)?;
        }
        if for_submit {
            self.validate_process(order)?;
        }
        Ok(())
    }

    /// 明細數量與圖案尺寸
    pub fn validate_lines(order: &Order, for_submit: bool) -> Result<()> {
        if for_submit && order.lines.is_empty() {
            return Err(FulfillmentError::EmptyLines(order.id.clone()));
        }

        for (idx, line) in order.lines.iter().enumerate() {
            let row = idx + 1;

            if line.qty <= Decimal::ZERO {
                return Err(FulfillmentError::InvalidQty { row });
            }

            if order.kind != OrderKind::Print {
                continue;
            }

            let has_image = line.design_image.as_deref().is_some_and(|img| !img.is_empty());
            if has_image && (line.design_width.is_zero() || line.design_height.is_zero()) {
                return Err(FulfillmentError::MissingDimensions { row });
            }

            if line.is_panel() && (line.design_height.is_zero() || line.gap().is_zero()) {
                return Err(FulfillmentError::MissingPanelDimensions { row });
            }
        }

        Ok(())
    }

    /// 損耗率：可設定為必填，且不可超過生產超額允差
    pub fn validate_wastage(&self, order: &Order) -> Result<()> {
        let allowance = self.settings.over_production_pct;

        for (idx, line) in order.lines.iter().enumerate() {
            let wastage = line.per_wastage.unwrap_or(Decimal::ZERO);

            if self.settings.wastage_mandatory && wastage <= Decimal::ZERO {
                return Err(FulfillmentError::WastageRequired { row: idx + 1 });
            }

            if wastage > allowance {
                return Err(FulfillmentError::WastageAboveAllowance {
                    row: idx + 1,
                    wastage,
                    allowance,
                });
            }
        }

        Ok(())
    }

    /// 提交時的製程必填檢查
    pub fn validate_process(&self, order: &Order) -> Result<()> {
        match order.kind {
            OrderKind::Print => {
                require(order.fabric.item.as_deref(), "Fabric Item")?;
                require(order.process.process_item.as_deref(), "Process Item")?;

                for component in order.process.required_components() {
                    require(component.item.as_deref(), component.kind.label())?;
                    if component.by_fabric_weight {
                        Self::require_fabric_weight(order, false)?;
                    }
                }
            }
            OrderKind::Pretreatment => {
                require(order.fabric.item.as_deref(), "Greige Fabric Item")?;
                require(order.product_item.as_deref(), "Ready Fabric Item")?;

                let mandatory = [
                    (ComponentKind::Bleaching, true),
                    (ComponentKind::Desizing, self.settings.desizing_mandatory),
                    (ComponentKind::Singeing, self.settings.singeing_mandatory),
                ];
                for (kind, is_mandatory) in mandatory {
                    let present = order.process.component(kind).is_some_and(|c| c.has_item());
                    if is_mandatory && !present {
                        return Err(FulfillmentError::MissingMandatory(kind.label().to_string()));
                    }
                }

                let by_weight = order
                    .process
                    .components
                    .iter()
                    .any(|c| c.has_item() && c.by_fabric_weight);
                if by_weight {
                    Self::require_fabric_weight(order, false)?;
                }
            }
            OrderKind::Coating => {
                require(order.fabric.item.as_deref(), "Fabric Item")?;
                let coating = order
                    .process
                    .component(ComponentKind::Coating)
                    .filter(|c| c.has_item())
                    .ok_or_else(|| {
                        FulfillmentError::MissingMandatory(ComponentKind::Coating.label().to_string())
                    })?;
                if coating.by_fabric_weight {
                    Self::require_fabric_weight(order, true)?;
                }
            }
        }

        Ok(())
    }

    fn require_fabric_weight(order: &Order, with_width: bool) -> Result<()> {
        if with_width && order.fabric.width.is_zero() {
            return Err(FulfillmentError::MissingMandatory("Fabric Width".into()));
        }
        if order.fabric.gsm.is_zero() {
            return Err(FulfillmentError::MissingMandatory("Fabric GSM".into()));
        }
        if order.fabric.per_pickup.is_zero() {
            return Err(FulfillmentError::MissingMandatory("Fabric Pickup %".into()));
        }
        Ok(())
    }

    /// 交貨日期不可早於訂單日期
    pub fn validate_dates(order: &Order) -> Result<()> {
        match (order.transaction_date, order.delivery_date) {
            (Some(ordered), Some(delivery)) if delivery < ordered => {
                Err(FulfillmentError::InvalidDeliveryDate)
            }
            _ => Ok(()),
        }
    }
}

fn require(value: Option<&str>, label: &str) -> Result<()> {
    match value {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(FulfillmentError::MissingMandatory(label.to_string())),
    }
}

/// 訂單標題：「客戶(前 20 字) 材質縮寫 整數長度 m」
pub fn order_title(order: &Order) -> String {
    let customer: String = order
        .customer_name
        .as_deref()
        .filter(|name| !name.is_empty())
        .unwrap_or(&order.customer)
        .chars()
        .take(20)
        .collect();

    let abbr = order
        .fabric
        .material_abbr
        .as_deref()
        .filter(|abbr| !abbr.is_empty())
        .unwrap_or("Xx");

    let length = round_to(order.totals.total_print_length, 0)
        .to_i64()
        .unwrap_or_default();

    format!("{} {} {} m", customer, abbr, length)
}
