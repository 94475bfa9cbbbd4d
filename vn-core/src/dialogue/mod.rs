//! # Dialogue 模块
//!
//! 对话块的处理：内联命令扫描、处理状态与控制器。
//!
//! ## 文本格式
//!
//! 对话文本由普通文字与 `[...]` 内联命令交错组成：
//!
//! ```text
//! 你好[@]今天{r:てんき:天気}不错。[\]下一页[w 500][my_sub arg]
//! ```
//!
//! - 文字部分可以使用 `{b:..}` 等样式标记（见 [`crate::text::markup`]）
//! - `[@]` 等待点击，`[\]` 翻页，`[|]` 等待语音，`[*]` 与 `[#]` 暂停
//! - `[!name ..]` 与内置命令交给引擎，其余交给脚本的用户子程序

pub mod controller;
pub mod scanner;
pub mod state;

pub use controller::{DialogueController, DialogueStep, ScriptHost};
pub use scanner::{
    BuiltinCommands, CommandRegistry, DialoguePart, InlineScanner, MAX_COMMAND_NAME, TextCommand,
};
pub use state::DialogueProcessingState;
