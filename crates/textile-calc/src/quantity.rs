//! 明細數量換算
//!
//! 將輸入數量/單位換算為印花長度、布料長度與片數

use rust_decimal::Decimal;
use textile_core::numeric::round_to;
use textile_core::{FulfillmentError, OrderLine, Precision, QtyType, Result};

use crate::conversion::UnitConversionTable;

/// 明細數量計算器
pub struct LineQuantityCalculator;

impl LineQuantityCalculator {
    /// 計算印花明細的衍生欄位
    ///
    /// 損耗率 >= 100% 時，依賴損耗換算的長度直接為 0，不報錯；
    /// 只有數值溢位才回傳錯誤
    pub fn calculate(
        line: &mut OrderLine,
        table: &UnitConversionTable,
        precision: &Precision,
    ) -> Result<()> {
        let id = line.id.clone();
        let overflow = || FulfillmentError::QuantityOverflow(id.clone());

        let uom = line.uom.clone().unwrap_or_default();
        let is_panel = uom.is_panel();

        // 片長
        line.panel_based_qty = !line.gap().is_zero();
        line.panel_length_inch = line.design_height.checked_add(line.gap()).ok_or_else(overflow)?;
        line.panel_length_meter = line
            .panel_length_inch
            .checked_mul(table.inch_to_meter())
            .ok_or_else(overflow)?;
        line.panel_length_yard = line
            .panel_length_meter
            .checked_div(table.yard_to_meter())
            .ok_or_else(overflow)?;

        if !is_panel {
            line.length_uom = Some(uom);
        }
        let length_uom = line.length_uom.clone().unwrap_or_default();

        let waste = line.per_wastage.unwrap_or(Decimal::ZERO) / Decimal::ONE_HUNDRED;
        let conversion_factor = table.factor(&length_uom, &line.stock_uom);

        let (print_length, fabric_length) = if !is_panel {
            match line.qty_type.unwrap_or_default() {
                QtyType::PrintQty => (Some(line.qty), Self::gross_up(line.qty, waste)),
                QtyType::FabricQty => (Self::net_down(line.qty, waste), Some(line.qty)),
            }
        } else {
            let print_length = line
                .qty
                .checked_mul(line.panel_length_meter)
                .and_then(|v| v.checked_div(conversion_factor));
            (print_length, print_length.and_then(|p| Self::gross_up(p, waste)))
        };

        line.print_length = round_to(print_length.ok_or_else(overflow)?, precision.length);
        line.fabric_length = round_to(fabric_length.ok_or_else(overflow)?, precision.length);

        // 庫存單位
        line.stock_print_length = line
            .print_length
            .checked_mul(conversion_factor)
            .ok_or_else(overflow)?;
        line.stock_fabric_length = line
            .fabric_length
            .checked_mul(conversion_factor)
            .ok_or_else(overflow)?;

        line.panel_qty = if line.panel_length_meter.is_zero() {
            Decimal::ZERO
        } else {
            let panels = line
                .stock_print_length
                .checked_div(line.panel_length_meter)
                .ok_or_else(overflow)?;
            round_to(panels, precision.panel_qty)
        };

        tracing::debug!(
            line = %line.id,
            print_length = %line.print_length,
            fabric_length = %line.fabric_length,
            stock_print_length = %line.stock_print_length,
            panel_qty = %line.panel_qty,
            "明細數量已換算"
        );
        Ok(())
    }

    /// 單一數量的明細（前處理、塗層）：只做庫存單位換算
    pub fn calculate_stock_qty(
        line: &mut OrderLine,
        table: &UnitConversionTable,
        precision: &Precision,
    ) -> Result<()> {
        let uom = line.uom.clone().unwrap_or_default();
        let conversion_factor = table.factor(&uom, &line.stock_uom);
        let qty = round_to(line.qty, precision.length);
        let stock_qty = qty
            .checked_mul(conversion_factor)
            .ok_or_else(|| FulfillmentError::QuantityOverflow(line.id.clone()))?;

        line.length_uom = Some(uom);
        line.print_length = qty;
        line.fabric_length = qty;
        line.stock_print_length = stock_qty;
        line.stock_fabric_length = stock_qty;
        line.panel_qty = Decimal::ZERO;
        Ok(())
    }

    /// 印花長度加回損耗得布料長度；溢位時回傳 None
    pub fn gross_up(print_length: Decimal, waste: Decimal) -> Option<Decimal> {
        if waste < Decimal::ONE {
            print_length.checked_div(Decimal::ONE - waste)
        } else {
            Some(Decimal::ZERO)
        }
    }

    /// 布料長度扣除損耗得印花長度；溢位時回傳 None
    pub fn net_down(fabric_length: Decimal, waste: Decimal) -> Option<Decimal> {
        if waste < Decimal::ONE {
            fabric_length.checked_mul(Decimal::ONE - waste)
        } else {
            Some(Decimal::ZERO)
        }
    }
}
