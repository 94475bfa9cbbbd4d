//! # Font 模块
//!
//! 字体测量服务接口。字体加载与光栅化由宿主负责，排版只需要
//! 字体查找（样式 + 预设 → 具体字体）和单字测量。

use serde::Serialize;

use super::style::TextStyle;

/// 具体字体句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FontId(pub u32);

/// 单字测量结果
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GlyphMetrics {
    /// 步进宽度
    pub advance: f32,
    /// 基线以上高度
    pub ascent: f32,
    /// 基线以下深度（正数）
    pub descent: f32,
    /// 字距调整类别
    pub kerning_class: u32,
}

/// 字体测量服务
pub trait FontProvider {
    /// 根据样式中的预设与粗斜体选择具体字体
    fn resolve_font(&self, style: &TextStyle) -> FontId;

    /// 测量单个字符
    fn measure_glyph(&self, font: FontId, size: f32, codepoint: char) -> GlyphMetrics;

    /// 同一字体中相邻两字的字距调整
    fn kerning(&self, _font: FontId, _size: f32, _left: char, _right: char) -> f32 {
        0.0
    }
}

/// 等宽字体测量：半角字符宽 0.5 倍字号，全角字符宽 1 倍字号
///
/// 没有真实字体时使用，结果可预测，适合测试与离线工具。
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceFonts;

impl FontProvider for MonospaceFonts {
    fn resolve_font(&self, style: &TextStyle) -> FontId {
        FontId(style.font_preset * 4 + u32::from(style.bold) + u32::from(style.italic) * 2)
    }

    fn measure_glyph(&self, _font: FontId, size: f32, codepoint: char) -> GlyphMetrics {
        let wide = is_wide(codepoint);
        GlyphMetrics {
            advance: if wide { size } else { size * 0.5 },
            ascent: size * 0.8,
            descent: size * 0.2,
            kerning_class: u32::from(wide),
        }
    }
}

/// 是否为全角字符（CJK 表意文字、假名、谚文、全角符号）
pub fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x2FFFD
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monospace_widths() {
        let fonts = MonospaceFonts;
        let font = fonts.resolve_font(&TextStyle::default());

        assert_eq!(fonts.measure_glyph(font, 20.0, 'a').advance, 10.0);
        assert_eq!(fonts.measure_glyph(font, 20.0, '漢').advance, 20.0);
        assert_eq!(fonts.measure_glyph(font, 20.0, 'あ').advance, 20.0);
        assert_eq!(fonts.measure_glyph(font, 20.0, '。').advance, 20.0);

        let m = fonts.measure_glyph(font, 20.0, 'x');
        assert_eq!(m.ascent, 16.0);
        assert_eq!(m.descent, 4.0);
        assert_eq!(fonts.kerning(font, 20.0, 'A', 'V'), 0.0);
    }

    #[test]
    fn test_resolve_font_distinguishes_faces() {
        let fonts = MonospaceFonts;
        let mut style = TextStyle::default();
        let regular = fonts.resolve_font(&style);
        style.bold = true;
        let bold = fonts.resolve_font(&style);
        style.font_preset = 1;
        let other = fonts.resolve_font(&style);

        assert_ne!(regular, bold);
        assert_ne!(bold, other);
    }
}
