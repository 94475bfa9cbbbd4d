//! # Glyph 模块
//!
//! 渲染缓冲记录与输出给渲染器的定位字形。

use serde::Serialize;
use std::time::Duration;

use super::font::{FontId, GlyphMetrics};
use super::style::Color;

/// 渲染缓冲中的一条记录
///
/// 每条记录恰好是真实字形、样式切换标记、注音插入标记三者之一。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderBufferGlyph {
    pub kind: GlyphKind,
    /// 距离开始显示的倒计时
    pub fade_start: Duration,
    /// 距离显示完成的倒计时
    pub fade_stop: Duration,
}

/// 记录类型
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GlyphKind {
    /// 真实字形
    Glyph {
        codepoint: char,
        font: FontId,
        metrics: GlyphMetrics,
        /// 行内横坐标（相对行首）
        x: f32,
        /// 在此处换行时，下一行行首重复该字符
        duplicate_on_wrap: bool,
    },
    /// 此后的字形改用样式表中的该样式
    StyleChange(usize),
    /// 在此处显示所属片段的第 n 个注音
    Ruby(usize),
}

/// 隐藏中的记录使用的倒计时
pub(crate) const HIDDEN: Duration = Duration::MAX;

impl RenderBufferGlyph {
    pub fn glyph(
        codepoint: char,
        font: FontId,
        metrics: GlyphMetrics,
        x: f32,
        duplicate_on_wrap: bool,
    ) -> Self {
        Self::with_kind(GlyphKind::Glyph {
            codepoint,
            font,
            metrics,
            x,
            duplicate_on_wrap,
        })
    }

    pub fn style_change(style: usize) -> Self {
        Self::with_kind(GlyphKind::StyleChange(style))
    }

    pub fn ruby(index: usize) -> Self {
        Self::with_kind(GlyphKind::Ruby(index))
    }

    fn with_kind(kind: GlyphKind) -> Self {
        Self {
            kind,
            fade_start: Duration::ZERO,
            fade_stop: Duration::ZERO,
        }
    }

    /// 是否为真实字形
    pub fn is_glyph(&self) -> bool {
        matches!(self.kind, GlyphKind::Glyph { .. })
    }

    /// 真实字形的字符
    pub fn codepoint(&self) -> Option<char> {
        match self.kind {
            GlyphKind::Glyph { codepoint, .. } => Some(codepoint),
            _ => None,
        }
    }

    /// 立即完成显示
    pub fn reveal(&mut self) {
        self.fade_start = Duration::ZERO;
        self.fade_stop = Duration::ZERO;
    }

    /// 隐藏，直到重新计时
    pub fn hide(&mut self) {
        self.fade_start = HIDDEN;
        self.fade_stop = HIDDEN;
    }

    /// 推进倒计时
    pub fn advance(&mut self, delta: Duration) {
        if self.fade_start != HIDDEN {
            self.fade_start = self.fade_start.saturating_sub(delta);
            self.fade_stop = self.fade_stop.saturating_sub(delta);
        }
    }

    /// 当前不透明度
    pub fn alpha(&self, fade_duration: Duration) -> f32 {
        if self.fade_start > Duration::ZERO {
            return 0.0;
        }
        if self.fade_stop.is_zero() || fade_duration.is_zero() {
            return 1.0;
        }
        let remaining = self.fade_stop.as_secs_f32() / fade_duration.as_secs_f32();
        (1.0 - remaining).clamp(0.0, 1.0)
    }
}

/// 交给渲染器的定位字形
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionedGlyph {
    pub codepoint: char,
    pub font: FontId,
    pub size: f32,
    /// 左端横坐标（绝对）
    pub x: f32,
    /// 基线纵坐标（绝对）
    pub baseline: f32,
    /// 水平缩放
    pub scale_x: f32,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
    pub alpha: f32,
    /// 是否为注音字形
    pub ruby: bool,
}

/// 矩形区域
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 纵向区间是否完全落在矩形内
    pub fn contains_rows(&self, top: f32, bottom: f32) -> bool {
        top >= self.y && bottom <= self.y + self.height
    }
}

/// 字形输出端（外部渲染器）
pub trait GlyphSink {
    fn draw_glyph(&mut self, glyph: &PositionedGlyph);
}

impl GlyphSink for Vec<PositionedGlyph> {
    fn draw_glyph(&mut self, glyph: &PositionedGlyph) {
        self.push(glyph.clone());
    }
}
