//! # Style 模块
//!
//! 文本样式。排版过程中每次样式变化都会追加一份完整样式到样式表，
//! 字形缓冲中的样式切换标记只保存样式表下标。

use serde::Serialize;

use crate::config::TextConfig;

/// RGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    /// 解析 `RRGGBB`（可带 `#` 前缀）
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.len() != 6 || !s.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// 文本样式
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    /// 字体预设编号
    pub font_preset: u32,
    /// 字号（像素）
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    /// 注音文本，非空时该样式覆盖的字形会带注音
    pub ruby: Option<String>,
    /// 整行居中
    pub center: bool,
    /// 整行缩放到换行宽度内，允许排版时越界
    pub fit: bool,
    /// 换行宽度（像素）
    pub wrap_width: f32,
}

impl TextStyle {
    /// 由排版配置得到基础样式
    pub fn from_config(config: &TextConfig) -> Self {
        Self {
            font_preset: config.font_preset,
            size: config.font_size,
            bold: false,
            italic: false,
            color: Color::WHITE,
            ruby: None,
            center: false,
            fit: false,
            wrap_width: config.wrap_width,
        }
    }

    /// 注音使用的样式：缩小字号、不换行、不继承注音与整行标志
    pub fn ruby_style(&self, scale: f32) -> Self {
        Self {
            size: self.size * scale,
            ruby: None,
            center: false,
            fit: false,
            wrap_width: f32::INFINITY,
            ..self.clone()
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::from_config(&TextConfig::default())
    }
}
