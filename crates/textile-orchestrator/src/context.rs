//! 操作上下文
//!
//! 取代全域旗標：防止遞迴的狀態沿呼叫鏈明確傳遞。

/// 單一邏輯操作的上下文
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationContext {
    /// 為 true 時，下游回呼只重算狀態，不再觸發履約流程
    suppress_downstream: bool,
    /// 是否發布進度事件
    publish_progress: bool,
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::root()
    }
}

impl OperationContext {
    /// 最外層操作
    pub fn root() -> Self {
        Self {
            suppress_downstream: false,
            publish_progress: true,
        }
    }

    /// 衍生出抑制下游連鎖的子上下文
    pub fn guarded(&self) -> Self {
        Self {
            suppress_downstream: true,
            ..*self
        }
    }

    /// 建構器模式：設置是否發布進度
    pub fn with_progress(mut self, publish_progress: bool) -> Self {
        self.publish_progress = publish_progress;
        self
    }

    pub fn is_guarded(&self) -> bool {
        self.suppress_downstream
    }

    pub fn publishes_progress(&self) -> bool {
        self.publish_progress
    }
}
