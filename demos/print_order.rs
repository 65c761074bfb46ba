//! 印花訂單履約示例

use chrono::NaiveDate;
use rust_decimal::Decimal;
use textile_fulfillment::textile_core::{
    ComponentKind, FabricDetails, ProcessComponent, ProcessConfig, Warehouses,
};
use textile_fulfillment::{
    logging, FulfillmentOrchestrator, FulfillmentSettings, InMemoryBackend, Order, OrderKind,
    OrderLine, Stage, Uom,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    println!("=== 印花訂單履約示例 ===\n");

    let backend = InMemoryBackend::new()
        .with_default_bom("PROC-SUBLIMATION", "BOM-PROC-SUBLIMATION")
        .with_default_bom("PAPER-44", "BOM-PAPER-44")
        .with_stock("FAB-POLY-58", Decimal::from(500));

    let settings = FulfillmentSettings::new()
        .with_default_design_item_group("Printed Designs")
        .with_over_production_pct(Decimal::from(10))
        .with_over_delivery_pct(Decimal::from(5));

    let mut orchestrator = FulfillmentOrchestrator::new(backend, settings);

    let order = Order::new("PO-0001", OrderKind::Print, "CUST-OCEAN")
        .with_company("Textile Co")
        .with_dates(
            NaiveDate::from_ymd_opt(2025, 11, 1).ok_or("invalid date")?,
            NaiveDate::from_ymd_opt(2025, 11, 20),
        )
        .with_fabric(FabricDetails::new("FAB-POLY-58").with_material("Polyester", "Poly"))
        .with_process(
            ProcessConfig::new("PROC-SUBLIMATION").with_component(ProcessComponent::new(
                ComponentKind::SublimationPaper,
                "PAPER-44",
            )),
        )
        .with_warehouses(Warehouses {
            source: Some("Stores".into()),
            wip: Some("Work In Progress".into()),
            fg: Some("Finished Goods".into()),
        })
        .with_line(
            OrderLine::new("L1", Decimal::from(120), Uom::Panel)
                .with_design("Rose", "rose.png", Decimal::from(58), Decimal::from(40))
                .with_gap(Decimal::from(2))
                .with_wastage(Decimal::from(5)),
        )
        .with_line(
            OrderLine::new("L2", Decimal::from(50), Uom::Yard)
                .with_design("Wave", "wave.png", Decimal::from(58), Decimal::from(36))
                .with_wastage(Decimal::from(5)),
        );

    let order = orchestrator.save_draft(order)?;
    println!("訂單: {}", order.title.as_deref().unwrap_or_default());
    for line in &order.lines {
        println!(
            "  - {}: 印花長度 {} m, 布料長度 {} m, 片數 {}",
            line.id, line.stock_print_length, line.stock_fabric_length, line.panel_qty
        );
    }

    let status = orchestrator.submit(&order.id)?;
    println!("\n提交後狀態: {}", status);

    let fabric = orchestrator
        .backend()
        .order(&order.id)
        .map(|o| o.totals.total_fabric_length)
        .unwrap_or_default();
    let report = orchestrator.start(&order.id, Some(fabric))?;
    tracing::info!(order = %order.id, created = report.created.len(), "履約流程完成");

    println!("\n建立的單據:");
    for document in &report.created {
        println!("  - {:?} {}", document.kind, document.name);
    }

    if let Some(order) = orchestrator.backend().order(&order.id) {
        println!("\n階段進度:");
        for stage in Stage::ALL {
            println!(
                "  - {}: {}% ({})",
                stage,
                order.stages.percent(stage),
                order.stages.label(stage)
            );
        }
    }
    println!("\n目前狀態: {}", report.status);

    Ok(())
}
