//! # Textile Fulfillment Orchestrator
//!
//! 訂單履約流程：建立產品與 BOM、布料轉移、銷售訂單、工單，
//! 以及下游單據回呼、生命週期操作與背景佇列

pub mod artifacts;
pub mod context;
pub mod gateway;
pub mod hooks;
pub mod lifecycle;
pub mod memory;
pub mod orchestrator;
pub mod progress;
pub mod queue;

// Re-export 主要類型
pub use artifacts::{
    ArtifactDrafter, BomDraft, BomLine, ItemDraft, SalesOrderDraft, SalesOrderLineDraft,
    TransferDraft, UomConversion, WorkOrderDraft,
};
pub use context::OperationContext;
pub use gateway::{Backend, DocumentGateway, DownstreamSource, ItemCatalog, OrderStore};
pub use hooks::DocumentEvent;
pub use lifecycle::StatusUpdate;
pub use memory::{CreatedDocuments, InMemoryBackend};
pub use orchestrator::{CreatedDocument, CreatedKind, FulfillmentOrchestrator, StartReport};
pub use progress::{NoopProgress, ProgressBus, ProgressEvent, ProgressSink};
pub use queue::{Dispatch, Dispatcher, SharedOrchestrator, Task, WorkQueue};

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use textile_core::{
        ComponentKind, DocStatus, DocumentKind, FabricDetails, FulfillmentError,
        FulfillmentSettings, Order, OrderKind, OrderLine, OrderStatus, ProcessComponent,
        ProcessConfig, Stage, StageStatus, Uom, Warehouses,
    };

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn settings() -> FulfillmentSettings {
        FulfillmentSettings::new()
            .with_default_design_item_group("Printed Designs")
            .with_over_production_pct(dec!(10))
    }

    fn backend() -> InMemoryBackend {
        InMemoryBackend::new()
            .with_default_bom("PROC-SUB", "BOM-PROC-SUB")
            .with_default_bom("PAPER-44", "BOM-PAPER-44")
            .with_stock("FAB-POLY", dec!(1000))
    }

    fn print_line(id: &str, qty: Decimal, image: &str) -> OrderLine {
        OrderLine::new(id, qty, Uom::Meter).with_design(image, image, dec!(40), dec!(60))
    }

    fn print_order(id: &str, lines: usize) -> Order {
        let mut order = Order::new(id, OrderKind::Print, "CUST-A")
            .with_company("Textile Co")
            .with_fabric(FabricDetails::new("FAB-POLY"))
            .with_process(
                ProcessConfig::new("PROC-SUB").with_component(ProcessComponent::new(
                    ComponentKind::SublimationPaper,
                    "PAPER-44",
                )),
            )
            .with_warehouses(Warehouses {
                source: Some("Stores".into()),
                wip: Some("WIP".into()),
                fg: Some("Finished Goods".into()),
            });
        for idx in 0..lines {
            order = order.with_line(print_line(
                &format!("L{}", idx + 1),
                dec!(10),
                &format!("design-{}.png", idx + 1),
            ));
        }
        order
    }

    fn submitted(
        orchestrator: &mut FulfillmentOrchestrator<InMemoryBackend>,
        order: Order,
    ) -> String {
        let order = orchestrator.save_draft(order).unwrap();
        orchestrator.submit(&order.id).unwrap();
        order.id
    }

    #[test]
    fn test_start_runs_every_step() {
        init_tracing();
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 2));
        assert_eq!(orch.backend().order(&id).unwrap().status, OrderStatus::ToCreateItems);

        let report = orch.start(&id, Some(dec!(20))).unwrap();

        assert_eq!(report.count(CreatedKind::Item), 2);
        assert_eq!(report.count(CreatedKind::Bom), 2);
        assert_eq!(report.count(CreatedKind::Transfer), 1);
        assert_eq!(report.count(CreatedKind::SalesOrder), 1);
        assert_eq!(report.count(CreatedKind::WorkOrder), 2);
        assert_eq!(report.status, OrderStatus::ToProduce);

        let order = orch.backend().order(&id).unwrap();
        assert!(order.items_created);
        assert_eq!(order.stages.percent(Stage::Ordered), dec!(100));
        assert_eq!(order.stages.percent(Stage::WorkOrdered), dec!(100));
        assert_eq!(order.stages.status(Stage::Transferred), StageStatus::Completed);
    }

    #[test]
    fn test_start_twice_creates_nothing_new() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 1));

        orch.start(&id, Some(dec!(10))).unwrap();
        let again = orch.start(&id, Some(dec!(10))).unwrap();

        assert!(again.is_noop());
        let created = orch.backend().created();
        assert_eq!(created.count(CreatedKind::SalesOrder), 1);
        assert_eq!(created.count(CreatedKind::WorkOrder), 1);
        assert_eq!(created.count(CreatedKind::Transfer), 1);
    }

    #[test]
    fn test_same_design_lines_share_one_item() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let order = print_order("PO-1", 0)
            .with_line(print_line("L1", dec!(10), "rose.png"))
            .with_line(print_line("L2", dec!(5), "rose.png"));
        let id = submitted(&mut orch, order);

        let report = orch.start(&id, None).unwrap();

        assert_eq!(report.count(CreatedKind::Item), 1);
        assert_eq!(report.count(CreatedKind::Bom), 1);
        let order = orch.backend().order(&id).unwrap();
        assert_eq!(order.lines[0].item_code, order.lines[1].item_code);
    }

    #[test]
    fn test_later_order_reuses_prior_artifacts_on_submit() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let first = submitted(&mut orch, print_order("PO-1", 1));
        orch.start(&first, None).unwrap();

        let second = submitted(&mut orch, print_order("PO-2", 1));
        let order = orch.backend().order(&second).unwrap();
        assert!(order.items_created);
        assert_eq!(order.status, OrderStatus::ToConfirmOrder);

        let report = orch.start(&second, None).unwrap();
        assert_eq!(report.count(CreatedKind::Item), 0);
        assert_eq!(report.count(CreatedKind::SalesOrder), 1);
    }

    #[test]
    fn test_failed_step_keeps_earlier_work() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 2));
        orch.backend_mut().fail_on(CreatedKind::WorkOrder);

        let err = orch.start(&id, None).unwrap_err();
        assert!(matches!(err, FulfillmentError::Collaborator(_)));

        let order = orch.backend().order(&id).unwrap();
        assert!(order.items_created);
        assert_eq!(order.stages.percent(Stage::Ordered), dec!(100));
        assert_eq!(order.stages.percent(Stage::WorkOrdered), dec!(0));

        orch.backend_mut().clear_failure();
        let report = orch.start(&id, None).unwrap();
        assert_eq!(report.count(CreatedKind::Item), 0);
        assert_eq!(report.count(CreatedKind::SalesOrder), 0);
        assert_eq!(report.count(CreatedKind::WorkOrder), 2);
    }

    #[test]
    fn test_start_rejects_unsubmitted_and_closed_orders() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let draft = orch.save_draft(print_order("PO-1", 1)).unwrap();
        assert!(matches!(
            orch.start(&draft.id, None),
            Err(FulfillmentError::NotSubmitted(_))
        ));

        let id = submitted(&mut orch, print_order("PO-2", 1));
        orch.update_status(&id, StatusUpdate::Close).unwrap();
        assert!(matches!(
            orch.start(&id, None),
            Err(FulfillmentError::OrderClosed(_))
        ));
    }

    #[test]
    fn test_insufficient_fabric_stock() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 1));

        let err = orch.start(&id, Some(dec!(5000))).unwrap_err();
        assert!(matches!(err, FulfillmentError::InsufficientStock { .. }));
        assert!(orch.backend().created().items.is_empty());

        orch.update_settings(settings().with_allow_negative_stock(true));
        assert!(orch.start(&id, Some(dec!(5000))).is_ok());
    }

    #[test]
    fn test_internal_customer_skips_sales_order() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let order = print_order("PO-1", 1).with_internal_customer(true);
        let id = submitted(&mut orch, order);

        let report = orch.start(&id, None).unwrap();
        assert_eq!(report.count(CreatedKind::SalesOrder), 0);
        assert_eq!(report.count(CreatedKind::WorkOrder), 1);
        assert_eq!(report.status, OrderStatus::ToProduce);
    }

    #[test]
    fn test_sales_order_event_continues_with_work_orders() {
        let mut orch = FulfillmentOrchestrator::new(
            backend(),
            settings().with_auto_work_orders_on_sales_order(true),
        );
        let id = submitted(&mut orch, print_order("PO-1", 1));
        orch.create_artifacts(&id).unwrap();

        let order = orch.backend().order(&id).unwrap().clone();
        let table = orch.table();
        let draft = orch.drafter(&table).sales_order(&order).unwrap();
        orch.backend_mut().create_sales_order(&draft).unwrap();

        // 受保護時只重算狀態
        let status = orch
            .on_document_event(&id, DocumentKind::SalesOrder, &OperationContext::root().guarded())
            .unwrap();
        assert_eq!(status, OrderStatus::ToDeliver);
        assert!(orch.backend().created().work_orders.is_empty());

        let status = orch
            .on_document_event(&id, DocumentKind::SalesOrder, &OperationContext::root())
            .unwrap();
        assert_eq!(status, OrderStatus::ToProduce);
        assert_eq!(orch.backend().created().work_orders.len(), 1);
    }

    #[test]
    fn test_close_and_reopen() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 1));
        orch.start(&id, None).unwrap();

        assert_eq!(orch.update_status(&id, StatusUpdate::Close).unwrap(), OrderStatus::Closed);
        assert!(orch.backend().linked_documents_closed(&id));
        assert!(matches!(orch.cancel(&id), Err(FulfillmentError::CancelClosedOrder(_))));

        let order = orch.backend().order(&id).unwrap();
        assert_eq!(order.stages.status(Stage::Produced), StageStatus::NotApplicable);

        assert_eq!(orch.update_status(&id, StatusUpdate::Reopen).unwrap(), OrderStatus::ToProduce);
        assert!(!orch.backend().linked_documents_closed(&id));
    }

    #[test]
    fn test_update_status_ignores_drafts() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        orch.save_draft(print_order("PO-1", 1)).unwrap();

        assert_eq!(orch.update_status("PO-1", StatusUpdate::Close).unwrap(), OrderStatus::Draft);
        assert!(!orch.backend().linked_documents_closed("PO-1"));
    }

    #[test]
    fn test_cancel_submitted_order() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 1));

        assert_eq!(orch.cancel(&id).unwrap(), OrderStatus::Cancelled);
        let order = orch.backend().order(&id).unwrap();
        assert_eq!(order.doc_status, DocStatus::Cancelled);
        assert!(matches!(orch.submit(&id), Err(FulfillmentError::NotDraft(_))));
    }

    #[test]
    fn test_create_artifacts_twice_is_rejected() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 1));

        orch.create_artifacts(&id).unwrap();
        assert!(matches!(
            orch.create_artifacts(&id),
            Err(FulfillmentError::ArtifactsAlreadyCreated(_))
        ));
    }

    #[test]
    fn test_transfer_draft_defaults_to_remaining_fabric() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 2));
        assert!(matches!(
            orch.make_transfer_draft(&id, None),
            Err(FulfillmentError::ArtifactsMissing(_))
        ));

        orch.start(&id, Some(dec!(5))).unwrap();
        let draft = orch.make_transfer_draft(&id, None).unwrap();
        assert_eq!(draft.qty, dec!(15));
        assert_eq!(draft.to_warehouse.as_deref(), Some("WIP"));
    }

    #[test]
    fn test_batch_document_events_recompute_once_per_order() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 1));
        orch.start(&id, None).unwrap();

        orch.backend_mut().complete_work_orders(&id);
        orch.backend_mut().deliver_sales_orders(&id);
        orch.backend_mut().bill_sales_orders(&id);

        let events = [
            DocumentEvent::new(&id, DocumentKind::WorkOrder),
            DocumentEvent::new(&id, DocumentKind::DeliveryNote),
            DocumentEvent::new(&id, DocumentKind::SalesInvoice),
        ];
        let results = orch.on_document_events(&events);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, id);
        assert_eq!(results[0].1.as_ref().ok(), Some(&OrderStatus::Completed));
    }

    #[test]
    fn test_batch_error_does_not_skip_other_orders() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let over = submitted(&mut orch, print_order("PO-1", 1));
        let done = submitted(&mut orch, print_order("PO-2", 1));
        orch.start(&over, None).unwrap();
        orch.start(&done, None).unwrap();

        orch.backend_mut().downstream_mut(&over).delivery_lines.push(textile_core::QtyRow {
            document: "DN-1".into(),
            order_line: "L1".into(),
            stock_qty: dec!(12),
            doc_status: DocStatus::Submitted,
        });
        orch.backend_mut().complete_work_orders(&done);
        orch.backend_mut().deliver_sales_orders(&done);
        orch.backend_mut().bill_sales_orders(&done);

        let events = [
            DocumentEvent::new(&over, DocumentKind::DeliveryNote),
            DocumentEvent::new(&done, DocumentKind::WorkOrder),
            DocumentEvent::new(&done, DocumentKind::DeliveryNote),
            DocumentEvent::new(&done, DocumentKind::SalesInvoice),
        ];
        let results = orch.on_document_events(&events);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, over);
        assert!(matches!(
            results[0].1,
            Err(FulfillmentError::AllowanceExceeded { stage: Stage::Delivered, .. })
        ));
        assert_eq!(results[1].0, done);
        assert_eq!(results[1].1.as_ref().ok(), Some(&OrderStatus::Completed));
        assert_eq!(orch.backend().order(&done).unwrap().status, OrderStatus::Completed);
    }

    #[test]
    fn test_over_delivery_is_rejected() {
        let mut orch = FulfillmentOrchestrator::new(backend(), settings());
        let id = submitted(&mut orch, print_order("PO-1", 1));
        orch.start(&id, None).unwrap();

        orch.backend_mut().downstream_mut(&id).delivery_lines.push(textile_core::QtyRow {
            document: "DN-1".into(),
            order_line: "L1".into(),
            stock_qty: dec!(12),
            doc_status: DocStatus::Submitted,
        });

        assert!(matches!(
            orch.on_document_event(&id, DocumentKind::DeliveryNote, &OperationContext::root()),
            Err(FulfillmentError::AllowanceExceeded { stage: Stage::Delivered, .. })
        ));
    }

    #[test]
    fn test_progress_events_are_published() {
        let bus = Arc::new(ProgressBus::new(64));
        let mut rx = bus.subscribe();
        let mut orch = FulfillmentOrchestrator::new(backend(), settings()).with_progress(bus);
        let id = submitted(&mut orch, print_order("PO-1", 1));

        orch.start(&id, None).unwrap();

        let mut titles = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::Step { title, .. } = event {
                titles.push(title);
            }
        }
        assert!(titles.iter().any(|t| t == "Creating Design Items and BOMs"));
        assert!(titles.iter().any(|t| t == "Creating Work Orders"));
    }

    #[tokio::test]
    async fn test_small_order_runs_inline() {
        let orch = FulfillmentOrchestrator::new(backend(), settings());
        let (dispatcher, _worker) = Dispatcher::spawn(orch, 8);
        {
            let mut orch = dispatcher.orchestrator().lock().await;
            submitted(&mut orch, print_order("PO-1", 2));
        }

        let dispatch = dispatcher.start("PO-1", None).await.unwrap();
        assert!(matches!(dispatch, Dispatch::Completed(report) if report.count(CreatedKind::WorkOrder) == 2));
    }

    #[tokio::test]
    async fn test_large_order_runs_in_background() {
        let bus = Arc::new(ProgressBus::new(256));
        let mut rx = bus.subscribe();
        let orch = FulfillmentOrchestrator::new(backend(), settings()).with_progress(bus);
        let (dispatcher, _worker) = Dispatcher::spawn(orch, 8);
        {
            let mut orch = dispatcher.orchestrator().lock().await;
            submitted(&mut orch, print_order("PO-1", 6));
        }

        let Dispatch::Queued { task_id } = dispatcher.start("PO-1", None).await.unwrap() else {
            panic!("six lines should be queued");
        };

        loop {
            match rx.recv().await.unwrap() {
                ProgressEvent::TaskFinished { task_id: done, .. } if done == task_id => break,
                ProgressEvent::TaskFailed { message, .. } => panic!("task failed: {message}"),
                _ => {}
            }
        }

        let orch = dispatcher.orchestrator().lock().await;
        let order = orch.backend().order("PO-1").unwrap();
        assert_eq!(order.status, OrderStatus::ToProduce);
        assert_eq!(orch.backend().created().work_orders.len(), 6);
    }

    #[tokio::test]
    async fn test_background_failure_is_reported() {
        let bus = Arc::new(ProgressBus::new(256));
        let mut rx = bus.subscribe();
        let orch = FulfillmentOrchestrator::new(backend(), settings()).with_progress(bus);
        let (dispatcher, _worker) = Dispatcher::spawn(orch, 8);
        {
            let mut orch = dispatcher.orchestrator().lock().await;
            submitted(&mut orch, print_order("PO-1", 6));
            orch.backend_mut().fail_on(CreatedKind::SalesOrder);
        }

        let dispatch = dispatcher.start("PO-1", None).await.unwrap();
        assert!(matches!(dispatch, Dispatch::Queued { .. }));

        loop {
            match rx.recv().await.unwrap() {
                ProgressEvent::TaskFailed { order_id, .. } => {
                    assert_eq!(order_id, "PO-1");
                    break;
                }
                ProgressEvent::TaskFinished { .. } => panic!("task should fail"),
                _ => {}
            }
        }

        let orch = dispatcher.orchestrator().lock().await;
        assert!(orch.backend().order("PO-1").unwrap().items_created);
    }
}
