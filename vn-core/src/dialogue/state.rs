//! # State 模块
//!
//! 对话处理状态：当前是否有活动对话块、是否已完成排版、是否可以继续执行脚本。

use serde::Serialize;

/// 对话处理状态
///
/// 生命周期：无活动对话 → `set_dialogue_active(true)` → 首次推进时排版 →
/// 逐步推进 → 结束时清理回无活动对话。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DialogueProcessingState {
    /// 是否有活动对话块
    pub active: bool,
    /// 活动对话块是否已完成排版
    pub layout_done: bool,
    /// 当前段已显示完成，脚本可以继续
    pub ready_to_run: bool,
}

impl DialogueProcessingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 激活或结束对话块
    ///
    /// 结束是幂等的：在无活动对话时再次结束不会改变任何状态。
    pub fn set_dialogue_active(&mut self, active: bool) {
        if active {
            self.active = true;
            self.layout_done = false;
            self.ready_to_run = true;
        } else if self.active {
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 是否需要在下一步之前先排版
    pub fn needs_layout(&self) -> bool {
        self.active && !self.layout_done
    }
}
