//! # VN Core
//!
//! 视觉小说引擎核心：异步任务队列与对话文本排版。
//!
//! ## 架构概述
//!
//! `vn-core` 不包含 GPU、解码器或文件格式代码。
//! 媒体后端、字体测量与脚本解释器都通过 trait 注入：
//!
//! ```text
//! Interpreter                         vn-core
//!   │                                    │
//!   │── cache_image / play_sound ──────►│ AsyncController ──► 工作线程 ──► MediaBackend
//!   │◄── take_results / wait_result ────│
//!   │                                    │
//!   │── feed_text / advance_one_step ──►│ DialogueController ──► FontProvider
//!   │◄── DialogueStep / evaluate_command│
//!   │── tick / render_to ──────────────►│ ──► GlyphSink
//! ```
//!
//! ## 核心类型
//!
//! - [`AsyncController`]：九个固定命名队列的异步调度器
//! - [`Instruction`]：队列指令（封闭枚举）
//! - [`DialogueController`]：对话块的排版、逐步推进与逐字显示
//! - [`TextRenderingState`]：排版结果（段、行、片段、字形）
//! - [`EngineConfig`]：引擎配置
//!
//! ## 使用示例
//!
//! ```ignore
//! use vn_core::{DialogueController, EngineConfig, MonospaceFonts, BuiltinCommands};
//!
//! let config = EngineConfig::load("engine.json");
//! let mut dialogue = DialogueController::new(
//!     &config,
//!     Arc::new(MonospaceFonts),
//!     Arc::new(BuiltinCommands::standard()),
//! );
//!
//! dialogue.feed_text("你好[@]世界")?;
//! loop {
//!     match dialogue.advance_one_step(&mut host)? {
//!         DialogueStep::Part(DialoguePart::End) | DialogueStep::Inactive => break,
//!         DialogueStep::Part(DialoguePart::TextCmd(_)) => wait_for_click(),
//!         _ => {}
//!     }
//!     while !dialogue.tick(frame_time).finished {
//!         dialogue.render_to(&mut renderer, text_box);
//!     }
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`config`]：引擎配置
//! - [`error`]：错误类型定义
//! - [`scheduler`]：异步任务调度
//! - [`text`]：文本排版
//! - [`dialogue`]：对话扫描与控制

pub mod config;
pub mod dialogue;
pub mod error;
pub mod scheduler;
pub mod text;

// 重导出核心类型
pub use config::{EngineConfig, SchedulerConfig, TextConfig, TimingConfig};
pub use dialogue::{
    BuiltinCommands, CommandRegistry, DialogueController, DialoguePart, DialogueProcessingState,
    DialogueStep, InlineScanner, ScriptHost, TextCommand,
};
pub use error::{ConfigError, DialogueError, LayoutError, MediaError, Terminate, VnError, VnResult};
pub use scheduler::{
    AsyncController, CacheStats, ImageData, Instruction, InstructionOutput, MediaBackend,
    MediaCache, MediaFrame, PlaybackStatus, QueueId, QueueMode, SoundData, SoundFormat,
    SoundRequest, WorkerContext,
};
pub use text::{
    Color, FadeAction, FontId, FontProvider, GlyphKind, GlyphMetrics, GlyphSink, LayoutEngine,
    MonospaceFonts, PositionedGlyph, Rect, RenderBufferGlyph, ScriptLanguage, TextRenderingState,
    TextStyle, TickOutcome,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_public_api_accessible() {
        // 验证所有公共类型都可以正常使用
        let config = EngineConfig::default();

        let _queue = QueueId::ImageCache;

        let _instr = Instruction::CacheSound {
            id: 1,
            path: "voice.ogg".to_string(),
        };

        let engine = LayoutEngine::new(&MonospaceFonts, &config.text);
        let state = engine.layout_text("Hello");
        assert_eq!(state.glyph_count(), 5);

        let dialogue = DialogueController::new(
            &config,
            Arc::new(MonospaceFonts),
            Arc::new(BuiltinCommands::standard()),
        );
        assert!(!dialogue.is_active());
    }
}
