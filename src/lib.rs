//! # Textile Fulfillment
//!
//! 紡織訂單履約引擎：印花、前處理、塗層訂單的數量換算、階段追蹤、
//! 整體狀態推導與下游單據建立

pub mod logging;

pub use textile_cache;
pub use textile_calc;
pub use textile_core;
pub use textile_orchestrator;

// Re-export 常用類型
pub use textile_core::{
    FulfillmentError, FulfillmentSettings, Order, OrderKind, OrderLine, OrderStatus, Result,
    Stage, StageStatus, Uom,
};
pub use textile_orchestrator::{
    Dispatch, Dispatcher, DocumentEvent, FulfillmentOrchestrator, InMemoryBackend,
    OperationContext, ProgressBus, ProgressEvent, StartReport, StatusUpdate,
};
