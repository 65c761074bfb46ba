//! 日誌初始化
//!
//! 使用 tracing-subscriber，日誌等級由 `RUST_LOG` 控制

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日誌
///
/// 未設定 `RUST_LOG` 時預設為 info，例如 `RUST_LOG=textile_orchestrator=debug`
///
/// ```no_run
/// textile_fulfillment::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();

    tracing::debug!("日誌已初始化");
}

/// 測試用日誌：debug 等級，輸出交給測試框架擷取；可重複呼叫
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
