//! # Markup 模块
//!
//! 文本块内的样式标记。方括号保留给内联命令，样式使用花括号：
//!
//! ```text
//! {b:粗体} {i:斜体} {c:ff8000:颜色} {s:120%:字号} {s:40:字号}
//! {f:2:字体预设} {r:かんじ:漢字} {center:整行居中} {fit:整行缩放}
//! ```
//!
//! 标记可以嵌套。不认识的标记按原样式显示其内容，
//! 格式不完整的 `{` 按普通字符处理。换行符是强制换行。

use serde::Serialize;

use super::style::{Color, TextStyle};

/// 样式覆盖
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StyleOverride {
    Bold,
    Italic,
    Color(Color),
    /// 绝对字号（像素）
    Size(f32),
    /// 相对字号（百分比）
    SizePercent(f32),
    Font(u32),
    Ruby(String),
    Center,
    Fit,
    /// 不认识的标记，样式不变
    Plain,
}

impl StyleOverride {
    /// 在 `base` 上应用覆盖
    pub fn apply(&self, base: &TextStyle) -> TextStyle {
        let mut style = base.clone();
        match self {
            StyleOverride::Bold => style.bold = true,
            StyleOverride::Italic => style.italic = true,
            StyleOverride::Color(color) => style.color = *color,
            StyleOverride::Size(size) => style.size = *size,
            StyleOverride::SizePercent(percent) => style.size = base.size * percent / 100.0,
            StyleOverride::Font(preset) => style.font_preset = *preset,
            StyleOverride::Ruby(text) => style.ruby = Some(text.clone()),
            StyleOverride::Center => style.center = true,
            StyleOverride::Fit => style.fit = true,
            StyleOverride::Plain => {}
        }
        style
    }
}

/// 排版输入记号
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Token {
    Char(char),
    /// 进入样式
    Push(StyleOverride),
    /// 离开最近进入的样式
    Pop,
    /// 换行；`forced` 为源文本中的换行，否则为自动换行插入的标记
    Newline { forced: bool },
}

/// 把文本块解析为记号序列
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(text.len());
    let mut depth = 0usize;
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        let width = c.len_utf8();
        match c {
            '{' => {
                if let Some((style, consumed)) = parse_tag(&rest[width..]) {
                    tokens.push(Token::Push(style));
                    depth += 1;
                    rest = &rest[width + consumed..];
                    continue;
                }
                tokens.push(Token::Char(c));
            }
            '}' if depth > 0 => {
                tokens.push(Token::Pop);
                depth -= 1;
            }
            '\n' => tokens.push(Token::Newline { forced: true }),
            '\r' => {}
            _ => tokens.push(Token::Char(c)),
        }
        rest = &rest[width..];
    }

    tokens.extend(std::iter::repeat_n(Token::Pop, depth));
    tokens
}

/// 解析 `{` 之后的标记头，返回样式与消耗的字节数
fn parse_tag(rest: &str) -> Option<(StyleOverride, usize)> {
    let colon = rest.find(':')?;
    let name = &rest[..colon];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let after = &rest[colon + 1..];
    let (style, arg_len) = match name {
        "b" => (StyleOverride::Bold, 0),
        "i" => (StyleOverride::Italic, 0),
        "center" => (StyleOverride::Center, 0),
        "fit" => (StyleOverride::Fit, 0),
        "c" | "s" | "f" | "r" => {
            let end = after.find(':')?;
            let arg = &after[..end];
            let style = match name {
                "c" => StyleOverride::Color(Color::from_hex(arg)?),
                "s" => parse_size(arg)?,
                "f" => StyleOverride::Font(arg.parse().ok()?),
                _ if arg.is_empty() => StyleOverride::Plain,
                _ => StyleOverride::Ruby(arg.to_string()),
            };
            (style, end + 1)
        }
        _ => (StyleOverride::Plain, 0),
    };

    Some((style, colon + 1 + arg_len))
}

fn parse_size(arg: &str) -> Option<StyleOverride> {
    match arg.strip_suffix('%') {
        Some(percent) => {
            let value: f32 = percent.parse().ok()?;
            (value > 0.0).then_some(StyleOverride::SizePercent(value))
        }
        None => {
            let value: f32 = arg.parse().ok()?;
            (value > 0.0).then_some(StyleOverride::Size(value))
        }
    }
}
