//! # Text 模块
//!
//! 对话文本排版：字体测量接口、字形与样式值类型、断行规则、
//! 内联样式标记、排版引擎与逐字淡入计时。
//!
//! ## 模块结构
//!
//! - [`font`]：字体测量服务接口与等宽实现
//! - [`glyph`]：渲染缓冲记录与定位字形
//! - [`style`]：文本样式
//! - [`linebreak`]：西文/CJK 断行规则
//! - [`markup`]：文本块内的样式标记解析
//! - [`layout`]：排版引擎（分段、自动换行、注音、行定位）
//! - [`timing`]：逐字淡入计时与刷新动作

pub mod font;
pub mod glyph;
pub mod layout;
pub mod linebreak;
pub mod markup;
pub mod style;
pub mod timing;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use font::{FontId, FontProvider, GlyphMetrics, MonospaceFonts};
pub use glyph::{GlyphKind, GlyphSink, PositionedGlyph, Rect, RenderBufferGlyph};
pub use layout::{LayoutEngine, Line, Piece, PieceRef, Run, Segment, TextRenderingState};
pub use markup::{StyleOverride, Token};
pub use style::{Color, TextStyle};
pub use timing::{FadeAction, TickOutcome};

/// 断行规则所用的文字体系
///
/// 全局开关：同一份排版中的所有文字都按同一种规则断行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    /// 西文：在空格前断行
    #[default]
    Western,
    /// 中日韩：按字符类别断行
    Cjk,
}

impl FromStr for ScriptLanguage {
    type Err = ();

    /// 从字符串解析（不区分大小写）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "western" | "en" => Ok(Self::Western),
            "cjk" | "ja" | "zh" | "ko" => Ok(Self::Cjk),
            _ => Err(()),
        }
    }
}
