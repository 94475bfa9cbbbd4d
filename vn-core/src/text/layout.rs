//! # Layout 模块
//!
//! 排版引擎：把文本块排成带位置与样式的字形缓冲。
//!
//! ## 结构
//!
//! ```text
//! TextRenderingState
//!   ├── Segment  每个文本块一个（文本块由内联命令分隔，逐段显示）
//!   │     └── Run    源文本中的一行
//!   │           └── Piece  一个可视行内的连续字形，拥有自己的注音子片段
//!   │                 └── RenderBufferGlyph
//!   └── Line     可视行，只保存 PieceRef 下标，用于行定位
//! ```
//!
//! ## 自动换行
//!
//! `add_fitting_chars` 贪心地向当前片段追加字形，并记录最近一个
//! 安全断点（完整的状态快照）。超出换行宽度时回退到该断点，在剩余记号前插入
//! 换行标记。没有安全断点时：不在行首则整体放弃，由调用方换行重试；在行首则在
//! 越界字之前断开（若它是行首第一个字则单独保留），保证每次都有进展。

use serde::Serialize;
use std::time::Duration;
use tracing::trace;

use super::ScriptLanguage;
use super::font::{FontId, FontProvider};
use super::glyph::{GlyphKind, GlyphSink, PositionedGlyph, Rect, RenderBufferGlyph};
use super::linebreak::{can_break_before, duplicates_on_wrap, is_glue};
use super::markup::{StyleOverride, Token, tokenize};
use super::style::TextStyle;
use crate::config::TextConfig;

/// 一次排版的根
#[derive(Debug, Clone, Default, Serialize)]
pub struct TextRenderingState {
    pub segments: Vec<Segment>,
    pub lines: Vec<Line>,
    /// 样式表，下标 0 为基础样式
    pub styles: Vec<TextStyle>,
    pub wrap_width: f32,
    /// 正在显示的段
    pub active_segment: Option<usize>,
    /// 正在显示的页
    pub current_page: usize,
    /// 下一段开始时的笔位置
    #[serde(skip)]
    pen_x: f32,
    /// 排版中的页号
    #[serde(skip)]
    layout_page: usize,
}

/// 一个文本块
#[derive(Debug, Clone, Default, Serialize)]
pub struct Segment {
    pub runs: Vec<Run>,
    pub page: usize,
}

/// 源文本中的一行
#[derive(Debug, Clone, Default, Serialize)]
pub struct Run {
    pub pieces: Vec<Piece>,
}

/// 一个可视行内的连续字形
#[derive(Debug, Clone, Default, Serialize)]
pub struct Piece {
    /// 所在可视行
    pub line: usize,
    /// 起始样式
    pub style: usize,
    /// 起始横坐标（相对行首）
    pub x: f32,
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
    /// 注音片段相对被注字基线的抬升量；正文片段为 0
    pub rise: f32,
    /// 该片段要求整行居中
    pub center: bool,
    /// 该片段要求整行缩放
    pub fit: bool,
    pub glyphs: Vec<RenderBufferGlyph>,
    /// 注音子片段，由缓冲中的 `Ruby` 标记引用
    pub rubies: Vec<Piece>,
}

/// 片段引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PieceRef {
    pub segment: usize,
    pub run: usize,
    pub piece: usize,
}

/// 可视行
#[derive(Debug, Clone, Default, Serialize)]
pub struct Line {
    pub pieces: Vec<PieceRef>,
    pub page: usize,
    /// 基线纵坐标（相对文本框顶端）
    pub baseline: f32,
    pub ascent: f32,
    pub descent: f32,
    pub width: f32,
    pub has_ruby: bool,
    /// 行首横向偏移（居中）
    pub offset_x: f32,
    /// 水平缩放（缩放到换行宽度）
    pub scale_x: f32,
}

impl Line {
    fn new(page: usize) -> Self {
        Self {
            page,
            scale_x: 1.0,
            ..Self::default()
        }
    }
}

impl Piece {
    /// 是否包含真实字形
    pub fn has_glyphs(&self) -> bool {
        self.glyphs.iter().any(RenderBufferGlyph::is_glyph)
    }

    /// 真实字形数量
    pub fn glyph_count(&self) -> usize {
        self.glyphs.iter().filter(|g| g.is_glyph()).count()
    }

    /// 按顺序拼出字形对应的文本
    pub fn text(&self) -> String {
        self.glyphs.iter().filter_map(RenderBufferGlyph::codepoint).collect()
    }
}

impl Segment {
    /// 拼出段落文本，源文本的行之间以 `\n` 连接
    pub fn text(&self) -> String {
        self.runs
            .iter()
            .map(|run| run.pieces.iter().map(Piece::text).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn pieces(&self) -> impl Iterator<Item = &Piece> {
        self.runs.iter().flat_map(|run| run.pieces.iter())
    }
}

impl TextRenderingState {
    /// 创建空状态，样式表只含基础样式
    pub fn new(base: TextStyle) -> Self {
        let mut state = Self::default();
        state.reset(base);
        state
    }

    /// 清空并复用
    pub fn reset(&mut self, base: TextStyle) {
        self.segments.clear();
        self.lines.clear();
        self.styles.clear();
        self.wrap_width = base.wrap_width;
        self.styles.push(base);
        self.lines.push(Line::new(0));
        self.active_segment = None;
        self.current_page = 0;
        self.pen_x = 0.0;
        self.layout_page = 0;
    }

    pub fn piece(&self, r: PieceRef) -> Option<&Piece> {
        self.segments.get(r.segment)?.runs.get(r.run)?.pieces.get(r.piece)
    }

    /// 全部真实字形数量（不含注音）
    pub fn glyph_count(&self) -> usize {
        self.segments
            .iter()
            .flat_map(Segment::pieces)
            .map(Piece::glyph_count)
            .sum()
    }

    /// 对一个段内的全部记录（含注音子片段）执行 `f`
    pub fn for_each_segment_glyph(
        &mut self,
        segment: usize,
        mut f: impl FnMut(&mut RenderBufferGlyph),
    ) {
        let Some(segment) = self.segments.get_mut(segment) else {
            return;
        };
        for piece in segment.runs.iter_mut().flat_map(|run| run.pieces.iter_mut()) {
            piece.glyphs.iter_mut().for_each(&mut f);
            for ruby in &mut piece.rubies {
                ruby.glyphs.iter_mut().for_each(&mut f);
            }
        }
    }

    /// 隐藏全部字形
    pub fn hide_all(&mut self) {
        for segment in 0..self.segments.len() {
            self.for_each_segment_glyph(segment, RenderBufferGlyph::hide);
        }
    }

    /// 立即显示一个段
    pub fn reveal_segment(&mut self, segment: usize) {
        self.for_each_segment_glyph(segment, RenderBufferGlyph::reveal);
    }

    /// 激活一个段，并切换到它所在的页
    pub fn activate_segment(&mut self, segment: usize) {
        if let Some(page) = self.segments.get(segment).map(|s| s.page) {
            self.active_segment = Some(segment);
            self.current_page = page;
        }
    }

    /// 把当前页的可见字形输出到 `sink`
    ///
    /// `clip` 同时是文本框：坐标以其左上角为原点，行与字形超出范围时跳过。
    pub fn render(&self, sink: &mut dyn GlyphSink, clip: Rect, fade_duration: Duration) {
        for line in self.lines.iter().filter(|l| l.page == self.current_page) {
            let baseline = clip.y + line.baseline;
            if !clip.contains_rows(baseline - line.ascent, baseline + line.descent) {
                continue;
            }
            for r in &line.pieces {
                if let Some(piece) = self.piece(*r) {
                    self.render_piece(sink, piece, line, clip, baseline, fade_duration);
                }
            }
        }
    }

    fn render_piece(
        &self,
        sink: &mut dyn GlyphSink,
        piece: &Piece,
        line: &Line,
        clip: Rect,
        baseline: f32,
        fade_duration: Duration,
    ) {
        let Some(mut style) = self.styles.get(piece.style) else {
            return;
        };

        for glyph in &piece.glyphs {
            match &glyph.kind {
                GlyphKind::StyleChange(index) => {
                    if let Some(next) = self.styles.get(*index) {
                        style = next;
                    }
                }
                GlyphKind::Ruby(index) => {
                    if let Some(ruby) = piece.rubies.get(*index) {
                        self.render_piece(
                            sink,
                            ruby,
                            line,
                            clip,
                            baseline - ruby.rise,
                            fade_duration,
                        );
                    }
                }
                GlyphKind::Glyph {
                    codepoint,
                    font,
                    metrics,
                    x,
                    ..
                } => {
                    let alpha = glyph.alpha(fade_duration);
                    if alpha <= 0.0 {
                        continue;
                    }
                    let left = clip.x + line.offset_x + x * line.scale_x;
                    let right = left + metrics.advance * line.scale_x;
                    if right <= clip.x || left >= clip.x + clip.width {
                        continue;
                    }
                    sink.draw_glyph(&PositionedGlyph {
                        codepoint: *codepoint,
                        font: *font,
                        size: style.size,
                        x: left,
                        baseline,
                        scale_x: line.scale_x,
                        color: style.color,
                        bold: style.bold,
                        italic: style.italic,
                        alpha,
                        ruby: piece.rise > 0.0,
                    });
                }
            }
        }
    }
}

/// 一次 `add_fitting_chars` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FitResult {
    /// 记号已用完
    End,
    /// 遇到换行标记；`forced` 为源文本中的换行
    Newline { forced: bool },
    /// 不在行首且没有安全断点，状态已恢复，需要换行后重试
    Retry,
}

/// 排版游标
#[derive(Debug, Clone)]
struct Cursor {
    pen_x: f32,
    /// 样式栈（样式表下标）
    stack: Vec<usize>,
    ruby: Option<OpenRuby>,
    /// 上一个字形，用于字距调整
    prev: Option<(FontId, char)>,
}

/// 正在排版的注音区间
#[derive(Debug, Clone)]
struct OpenRuby {
    text: String,
    /// 被注字的样式
    style: usize,
    /// 打开时的样式栈深度
    depth: usize,
    /// 被注字在缓冲中的起始下标
    start_glyph: usize,
    start_x: f32,
}

/// 安全断点：回退所需的全部状态
#[derive(Debug, Clone)]
struct BreakPoint {
    pos: usize,
    cursor: Cursor,
    glyph_len: usize,
    style_len: usize,
    ruby_len: usize,
    ascent: f32,
    descent: f32,
    center: bool,
    fit: bool,
}

/// 单个文本块的排版过程
struct LayoutPass<'a> {
    fonts: &'a dyn FontProvider,
    config: &'a TextConfig,
    styles: &'a mut Vec<TextStyle>,
    tokens: Vec<Token>,
    pos: usize,
    cursor: Cursor,
}

impl<'a> LayoutPass<'a> {
    fn new(
        fonts: &'a dyn FontProvider,
        config: &'a TextConfig,
        styles: &'a mut Vec<TextStyle>,
        tokens: Vec<Token>,
        pen_x: f32,
    ) -> Self {
        Self {
            fonts,
            config,
            styles,
            tokens,
            pos: 0,
            cursor: Cursor {
                pen_x,
                stack: vec![0],
                ruby: None,
                prev: None,
            },
        }
    }

    fn current_style(&self) -> usize {
        self.cursor.stack.last().copied().unwrap_or(0)
    }

    fn language(&self) -> ScriptLanguage {
        self.config.script_language
    }

    /// 在当前笔位置开始新片段，高度至少为当前样式的行高
    fn new_piece(&mut self, line: usize) -> Piece {
        let style = &self.styles[self.current_style()];
        let font = self.fonts.resolve_font(style);
        let metrics = self.fonts.measure_glyph(font, style.size, ' ');
        self.cursor.prev = None;
        Piece {
            line,
            style: self.current_style(),
            x: self.cursor.pen_x,
            ascent: metrics.ascent,
            descent: metrics.descent,
            ..Piece::default()
        }
    }

    fn snapshot(&self, piece: &Piece) -> BreakPoint {
        BreakPoint {
            pos: self.pos,
            cursor: self.cursor.clone(),
            glyph_len: piece.glyphs.len(),
            style_len: self.styles.len(),
            ruby_len: piece.rubies.len(),
            ascent: piece.ascent,
            descent: piece.descent,
            center: piece.center,
            fit: piece.fit,
        }
    }

    fn restore(&mut self, piece: &mut Piece, point: BreakPoint) {
        self.pos = point.pos;
        self.cursor = point.cursor;
        piece.glyphs.truncate(point.glyph_len);
        piece.rubies.truncate(point.ruby_len);
        self.styles.truncate(point.style_len);
        piece.ascent = point.ascent;
        piece.descent = point.descent;
        piece.center = point.center;
        piece.fit = point.fit;
    }

    fn skip_spaces(&mut self) {
        while let Some(Token::Char(' ')) = self.tokens.get(self.pos) {
            self.pos += 1;
        }
    }

    /// 向片段追加能放下的字形，直到换行、记号用完或需要重试
    fn add_fitting_chars(&mut self, piece: &mut Piece, line_start: bool) -> FitResult {
        let entry = self.snapshot(piece);
        let mut safe: Option<BreakPoint> = None;

        while let Some(token) = self.tokens.get(self.pos).cloned() {
            match token {
                Token::Newline { forced } => {
                    self.pos += 1;
                    self.close_ruby(piece);
                    if !forced {
                        self.skip_spaces();
                    }
                    return FitResult::Newline { forced };
                }
                Token::Push(style) => {
                    self.pos += 1;
                    self.push_style(piece, &style);
                }
                Token::Pop => {
                    self.pos += 1;
                    self.pop_style(piece);
                }
                Token::Char(c) => {
                    let before = self.snapshot(piece);
                    let prev = piece.glyphs.iter().rev().find_map(RenderBufferGlyph::codepoint);
                    if self.cursor.ruby.is_none() && can_break_before(self.language(), prev, c) {
                        safe = Some(before.clone());
                    }

                    self.pos += 1;
                    self.place_glyph(piece, c);

                    let style = &self.styles[self.current_style()];
                    if !style.fit && self.cursor.pen_x > style.wrap_width {
                        if let Some(point) = safe.take() {
                            self.restore(piece, point);
                        } else if !line_start {
                            self.restore(piece, entry);
                            self.skip_spaces();
                            return FitResult::Retry;
                        } else if piece.glyphs[..before.glyph_len]
                            .iter()
                            .any(RenderBufferGlyph::is_glyph)
                        {
                            self.restore(piece, before);
                        }
                        self.insert_wrap(piece);
                        continue;
                    }

                    if self.cursor.ruby.is_none() && is_glue(c) {
                        safe = Some(self.snapshot(piece));
                    }
                }
            }
        }

        FitResult::End
    }

    /// 在剩余记号前插入自动换行标记，必要时在下一行行首重复连接符
    fn insert_wrap(&mut self, piece: &Piece) {
        if self.pos >= self.tokens.len() {
            return;
        }
        let duplicate = piece.glyphs.iter().rev().find_map(|g| match g.kind {
            GlyphKind::Glyph {
                codepoint,
                duplicate_on_wrap,
                ..
            } => Some(duplicate_on_wrap.then_some(codepoint)),
            _ => None,
        });

        let mut inserted = vec![Token::Newline { forced: false }];
        if let Some(Some(c)) = duplicate {
            inserted.push(Token::Char(c));
        }
        self.tokens.splice(self.pos..self.pos, inserted);
        trace!(pos = self.pos, "自动换行");
    }

    fn place_glyph(&mut self, piece: &mut Piece, c: char) {
        let style = &self.styles[self.current_style()];
        let font = self.fonts.resolve_font(style);
        let metrics = self.fonts.measure_glyph(font, style.size, c);

        if let Some((prev_font, prev)) = self.cursor.prev
            && prev_font == font
        {
            self.cursor.pen_x += self.fonts.kerning(font, style.size, prev, c);
        }

        let duplicate = self.config.duplicate_hyphen_on_wrap && duplicates_on_wrap(c);
        piece.glyphs.push(RenderBufferGlyph::glyph(
            c,
            font,
            metrics,
            self.cursor.pen_x,
            duplicate,
        ));

        self.cursor.pen_x += metrics.advance;
        self.cursor.prev = Some((font, c));
        piece.ascent = piece.ascent.max(metrics.ascent);
        piece.descent = piece.descent.max(metrics.descent);
        piece.center |= style.center;
        piece.fit |= style.fit;
    }

    fn push_style(&mut self, piece: &mut Piece, style: &StyleOverride) {
        let next = style.apply(&self.styles[self.current_style()]);
        self.styles.push(next);
        let index = self.styles.len() - 1;
        self.cursor.stack.push(index);
        piece.glyphs.push(RenderBufferGlyph::style_change(index));

        if let StyleOverride::Ruby(text) = style
            && self.cursor.ruby.is_none()
        {
            self.cursor.ruby = Some(OpenRuby {
                text: text.clone(),
                style: index,
                depth: self.cursor.stack.len(),
                start_glyph: piece.glyphs.len(),
                start_x: self.cursor.pen_x,
            });
        }
    }

    fn pop_style(&mut self, piece: &mut Piece) {
        if self.cursor.stack.len() <= 1 {
            return;
        }
        if self
            .cursor
            .ruby
            .as_ref()
            .is_some_and(|ruby| ruby.depth == self.cursor.stack.len())
        {
            self.close_ruby(piece);
        }
        self.cursor.stack.pop();
        piece
            .glyphs
            .push(RenderBufferGlyph::style_change(self.current_style()));
    }

    /// 结束注音区间：排出注音子片段，居中到被注字上方，
    /// 并在第 N/2 个被注字处插入注音标记
    fn close_ruby(&mut self, piece: &mut Piece) {
        let Some(open) = self.cursor.ruby.take() else {
            return;
        };

        let start = open.start_glyph.min(piece.glyphs.len());
        let base: Vec<usize> = piece.glyphs[start..]
            .iter()
            .enumerate()
            .filter(|(_, g)| g.is_glyph())
            .map(|(i, _)| i)
            .collect();
        let tallest = piece.glyphs[start..]
            .iter()
            .filter_map(|g| match g.kind {
                GlyphKind::Glyph { metrics, .. } => Some(metrics.ascent),
                _ => None,
            })
            .fold(0.0f32, f32::max);
        let span = self.cursor.pen_x - open.start_x;

        let ruby_style = self.styles[open.style].ruby_style(self.config.ruby_scale);
        let font = self.fonts.resolve_font(&ruby_style);
        let size = ruby_style.size;
        self.styles.push(ruby_style);

        let mut ruby = Piece {
            line: piece.line,
            style: self.styles.len() - 1,
            ..Piece::default()
        };
        let mut pen = 0.0f32;
        let mut prev: Option<char> = None;
        for c in open.text.chars() {
            if let Some(p) = prev {
                pen += self.fonts.kerning(font, size, p, c);
            }
            let metrics = self.fonts.measure_glyph(font, size, c);
            ruby.glyphs
                .push(RenderBufferGlyph::glyph(c, font, metrics, pen, false));
            pen += metrics.advance;
            ruby.ascent = ruby.ascent.max(metrics.ascent);
            ruby.descent = ruby.descent.max(metrics.descent);
            prev = Some(c);
        }

        let offset = open.start_x + (span - pen) / 2.0;
        for glyph in &mut ruby.glyphs {
            if let GlyphKind::Glyph { x, .. } = &mut glyph.kind {
                *x += offset;
            }
        }
        ruby.x = offset;
        ruby.width = pen;
        ruby.rise = self.config.ruby_raise * tallest;

        let at = start + base.get(base.len() / 2).copied().unwrap_or(base.len());
        piece
            .glyphs
            .insert(at, RenderBufferGlyph::ruby(piece.rubies.len()));
        piece.rubies.push(ruby);
    }
}

/// 排版引擎
pub struct LayoutEngine<'a> {
    fonts: &'a dyn FontProvider,
    config: &'a TextConfig,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(fonts: &'a dyn FontProvider, config: &'a TextConfig) -> Self {
        Self { fonts, config }
    }

    /// 基础样式
    pub fn base_style(&self) -> TextStyle {
        TextStyle::from_config(self.config)
    }

    /// 创建空的排版状态
    pub fn new_state(&self) -> TextRenderingState {
        TextRenderingState::new(self.base_style())
    }

    /// 排版一个文本块，追加为新段，返回段下标
    ///
    /// 新段从上一段结束的位置继续排版。
    pub fn layout_segment(&self, state: &mut TextRenderingState, text: &str) -> usize {
        let index = state.segments.len();
        let page = state.layout_page;
        let mut segment = Segment {
            runs: vec![Run::default()],
            page,
        };

        let mut pass = LayoutPass::new(
            self.fonts,
            self.config,
            &mut state.styles,
            tokenize(text),
            state.pen_x,
        );

        loop {
            let line = state.lines.len() - 1;
            let line_start = pass.cursor.pen_x <= 0.0;
            let mut piece = pass.new_piece(line);

            let result = pass.add_fitting_chars(&mut piece, line_start);
            piece.width = pass.cursor.pen_x - piece.x;

            match result {
                FitResult::Retry => {
                    pass.cursor.pen_x = 0.0;
                    state.lines.push(Line::new(page));
                }
                FitResult::End => {
                    if piece.has_glyphs() {
                        attach(&mut state.lines, &mut segment, index, piece);
                    }
                    break;
                }
                FitResult::Newline { forced } => {
                    attach(&mut state.lines, &mut segment, index, piece);
                    pass.cursor.pen_x = 0.0;
                    state.lines.push(Line::new(page));
                    if forced {
                        segment.runs.push(Run::default());
                    }
                }
            }
        }

        state.pen_x = pass.cursor.pen_x;
        if segment.runs.len() > 1 && segment.runs.last().is_some_and(|r| r.pieces.is_empty()) {
            segment.runs.pop();
        }
        state.segments.push(segment);
        index
    }

    /// 开始新页：之后的段从新页的第一行排起
    pub fn break_page(&self, state: &mut TextRenderingState) {
        state.layout_page += 1;
        state.pen_x = 0.0;
        match state.lines.last_mut() {
            Some(line) if line.pieces.is_empty() => line.page = state.layout_page,
            _ => state.lines.push(Line::new(state.layout_page)),
        }
    }

    /// 行定位：自上而下累加基线，然后按整行标志居中或缩放
    ///
    /// `baseline[i] = baseline[i-1] + descent[i-1] + ascent[i] + line_spacing`，
    /// 带注音的行把上一行的下降高度减半，并加上注音超出的高度。
    /// 每页从顶端重新开始。
    pub fn layout_lines(&self, state: &mut TextRenderingState) {
        let base = self.base_style();
        let base_font = self.fonts.resolve_font(&base);
        let blank = self.fonts.measure_glyph(base_font, base.size, ' ');
        let wrap = state.wrap_width;

        let mut previous: Option<(usize, f32, f32)> = None;
        for i in 0..state.lines.len() {
            let mut ascent = 0.0f32;
            let mut descent = 0.0f32;
            let mut width = 0.0f32;
            let mut ruby_extent = 0.0f32;
            let mut has_ruby = false;
            let mut center = false;
            let mut fit = false;

            for r in &state.lines[i].pieces {
                let Some(piece) = state.piece(*r) else {
                    continue;
                };
                ascent = ascent.max(piece.ascent);
                descent = descent.max(piece.descent);
                width = width.max(piece.x + piece.width);
                center |= piece.center;
                fit |= piece.fit;
                for ruby in &piece.rubies {
                    has_ruby = true;
                    ruby_extent = ruby_extent.max(ruby.rise + ruby.ascent - piece.ascent);
                }
            }

            if state.lines[i].pieces.is_empty() {
                ascent = blank.ascent;
                descent = blank.descent;
            }

            let page = state.lines[i].page;
            let baseline = match previous {
                Some((prev_page, prev_baseline, prev_descent)) if prev_page == page => {
                    let gap = if has_ruby {
                        prev_descent / 2.0
                    } else {
                        prev_descent
                    };
                    prev_baseline + gap + ruby_extent + ascent + self.config.line_spacing
                }
                _ => ruby_extent + ascent,
            };

            let scale_x = if fit && width > wrap { wrap / width } else { 1.0 };
            let offset_x = if center {
                ((wrap - width * scale_x) / 2.0).max(0.0)
            } else {
                0.0
            };

            let line = &mut state.lines[i];
            line.baseline = baseline;
            line.ascent = ascent + ruby_extent;
            line.descent = descent;
            line.width = width;
            line.has_ruby = has_ruby;
            line.scale_x = scale_x;
            line.offset_x = offset_x;

            previous = Some((page, baseline, descent));
        }
    }

    /// 一次性排版任意文本（说话者名、临时文本），全部立即可见
    pub fn layout_text(&self, text: &str) -> TextRenderingState {
        let mut state = self.new_state();
        self.layout_segment(&mut state, text);
        self.layout_lines(&mut state);
        state.activate_segment(0);
        state
    }
}

fn attach(lines: &mut [Line], segment: &mut Segment, index: usize, piece: Piece) {
    let run = segment.runs.len() - 1;
    let slot = &mut segment.runs[run];
    if let Some(line) = lines.get_mut(piece.line) {
        line.pieces.push(PieceRef {
            segment: index,
            run,
            piece: slot.pieces.len(),
        });
    }
    slot.pieces.push(piece);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::font::MonospaceFonts;

    fn config(wrap: f32) -> TextConfig {
        TextConfig {
            wrap_width: wrap,
            font_size: 20.0,
            ..TextConfig::default()
        }
    }

    fn lines_text(state: &TextRenderingState) -> Vec<String> {
        state
            .lines
            .iter()
            .map(|line| {
                line.pieces
                    .iter()
                    .filter_map(|r| state.piece(*r))
                    .map(Piece::text)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_single_piece_round_trip() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("Hello, world!");

        assert_eq!(state.segments.len(), 1);
        let pieces: Vec<_> = state.segments[0].pieces().collect();
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].text(), "Hello, world!");
        assert_eq!(pieces[0].width, 13.0 * 10.0);
    }

    #[test]
    fn test_western_wrap_at_space() {
        // 每个半角字宽 10，宽度 100 可放 10 个字
        let cfg = config(100.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("hello world again");

        assert_eq!(lines_text(&state), vec!["hello", "world", "again"]);
        assert_eq!(state.segments[0].runs.len(), 1);
    }

    #[test]
    fn test_forced_newline_starts_new_run() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("one\ntwo");

        assert_eq!(state.segments[0].runs.len(), 2);
        assert_eq!(state.segments[0].text(), "one\ntwo");
        assert_eq!(lines_text(&state), vec!["one", "two"]);
    }

    #[test]
    fn test_wrap_after_glue_and_duplicate_hyphen() {
        let mut cfg = config(100.0);
        cfg.duplicate_hyphen_on_wrap = true;
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("abcdef-ghijk");

        assert_eq!(lines_text(&state), vec!["abcdef-", "-ghijk"]);
    }

    #[test]
    fn test_forward_progress_on_narrow_width() {
        let cfg = config(25.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let mut state = engine.new_state();
        let mut pass = LayoutPass::new(
            &MonospaceFonts,
            &cfg,
            &mut state.styles,
            tokenize("abcdef"),
            0.0,
        );
        let mut piece = pass.new_piece(0);

        let result = pass.add_fitting_chars(&mut piece, true);
        assert_eq!(result, FitResult::Newline { forced: false });
        assert_eq!(piece.text(), "ab");
    }

    #[test]
    fn test_single_glyph_wider_than_line_is_kept() {
        let cfg = config(5.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("ab");

        assert_eq!(lines_text(&state), vec!["a", "b"]);
    }

    #[test]
    fn test_retry_when_not_at_line_start() {
        let cfg = config(100.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let mut state = engine.new_state();
        engine.layout_segment(&mut state, "abcdef");
        engine.layout_segment(&mut state, "ghijkl");
        engine.layout_lines(&mut state);

        assert_eq!(lines_text(&state), vec!["abcdef", "ghijkl"]);
        assert_eq!(state.segments[1].runs[0].pieces[0].line, 1);
    }

    #[test]
    fn test_segments_continue_on_same_line() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let mut state = engine.new_state();
        engine.layout_segment(&mut state, "Hi ");
        engine.layout_segment(&mut state, "there");

        let second = &state.segments[1].runs[0].pieces[0];
        assert_eq!(second.line, 0);
        assert_eq!(second.x, 30.0);
        assert_eq!(state.lines[0].pieces.len(), 2);
    }

    #[test]
    fn test_cjk_wrap_respects_no_line_start() {
        let mut cfg = config(60.0);
        cfg.script_language = ScriptLanguage::Cjk;
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        // 每个全角字宽 20，一行 3 个字；句号不能出现在行首
        let state = engine.layout_text("漢字漢。字");

        assert_eq!(lines_text(&state), vec!["漢字", "漢。字"]);
    }

    #[test]
    fn test_ruby_marker_at_half_of_base_span() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("a{r:かんじ:漢字漢字}b");

        let piece = &state.segments[0].runs[0].pieces[0];
        let start = piece
            .glyphs
            .iter()
            .position(|g| g.codepoint() == Some('漢'))
            .unwrap();
        assert_eq!(piece.glyphs[start + 2].kind, GlyphKind::Ruby(0));

        let ruby = &piece.rubies[0];
        assert_eq!(ruby.text(), "かんじ");
        // 注音字号 10，宽 30；被注字从 x=10 起宽 80
        assert_eq!(ruby.x, 10.0 + (80.0 - 30.0) / 2.0);
        assert_eq!(ruby.rise, 16.0);
    }

    fn glyph_index(piece: &Piece, c: char) -> usize {
        piece
            .glyphs
            .iter()
            .position(|g| g.codepoint() == Some(c))
            .unwrap()
    }

    #[test]
    fn test_ruby_marker_with_odd_base_count() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("{r:xx:abc}");

        let piece = &state.segments[0].runs[0].pieces[0];
        // 3 个被注字，标记落在第 2 个之前
        let b = glyph_index(piece, 'b');
        assert_eq!(piece.glyphs[b - 1].kind, GlyphKind::Ruby(0));
        assert_eq!(piece.glyphs[b - 2].codepoint(), Some('a'));
        assert_eq!(piece.rubies.len(), 1);
    }

    #[test]
    fn test_ruby_marker_skips_nested_style_changes() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("{r:xx:a{b:bc}d}");

        let piece = &state.segments[0].runs[0].pieces[0];
        // 样式标记不计入被注字，标记落在第 3 个真实字形 c 之前
        let c = glyph_index(piece, 'c');
        assert_eq!(piece.glyphs[c - 1].kind, GlyphKind::Ruby(0));
        assert_eq!(piece.glyphs[c - 2].codepoint(), Some('b'));
        assert_eq!(
            piece
                .glyphs
                .iter()
                .filter(|g| g.kind == GlyphKind::Ruby(0))
                .count(),
            1
        );

        let ruby = &piece.rubies[0];
        assert_eq!(ruby.text(), "xx");
        // 被注字宽 40，注音宽 10
        assert_eq!(ruby.x, (40.0 - 10.0) / 2.0);
    }

    #[test]
    fn test_ruby_wider_than_base_is_centered() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("a{r:abcdefgh:xy}");

        let piece = &state.segments[0].runs[0].pieces[0];
        let y = glyph_index(piece, 'y');
        assert_eq!(piece.glyphs[y - 1].kind, GlyphKind::Ruby(0));

        let ruby = &piece.rubies[0];
        assert_eq!(ruby.text(), "abcdefgh");
        assert_eq!(ruby.width, 40.0);
        // 被注字从 x=10 起宽 20，注音向两侧各伸出 10
        assert_eq!(ruby.x, 0.0);
        let xs: Vec<f32> = ruby
            .glyphs
            .iter()
            .filter_map(|g| match g.kind {
                GlyphKind::Glyph { x, .. } => Some(x),
                _ => None,
            })
            .collect();
        assert_eq!(xs.first(), Some(&0.0));
        assert_eq!(xs.last(), Some(&35.0));
    }

    #[test]
    fn test_layout_lines_baselines_and_center() {
        let mut cfg = config(100.0);
        cfg.line_spacing = 2.0;
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("{center:ab}\ncd");

        assert_eq!(state.lines[0].baseline, 16.0);
        assert_eq!(state.lines[1].baseline, 16.0 + 4.0 + 16.0 + 2.0);
        assert_eq!(state.lines[0].offset_x, 40.0);
        assert_eq!(state.lines[1].offset_x, 0.0);
    }

    #[test]
    fn test_fit_scales_whole_line() {
        let cfg = config(100.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("{fit:abcdefghijklmnopqrst}");

        assert_eq!(state.lines.len(), 1);
        assert_eq!(state.lines[0].width, 200.0);
        assert_eq!(state.lines[0].scale_x, 0.5);
    }

    #[test]
    fn test_page_break_restarts_baselines() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let mut state = engine.new_state();
        engine.layout_segment(&mut state, "first");
        engine.break_page(&mut state);
        engine.layout_segment(&mut state, "second");
        engine.layout_lines(&mut state);

        assert_eq!(state.segments[1].page, 1);
        assert_eq!(state.lines[1].page, 1);
        assert_eq!(state.lines[1].baseline, state.lines[0].baseline);
    }

    #[test]
    fn test_render_emits_visible_glyphs() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("{c:ff0000:ab}c");

        let mut out: Vec<PositionedGlyph> = Vec::new();
        state.render(
            &mut out,
            Rect::new(100.0, 50.0, 500.0, 100.0),
            Duration::from_millis(100),
        );

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].x, 100.0);
        assert_eq!(out[0].baseline, 66.0);
        assert_eq!(out[0].color.r, 255);
        assert_eq!(out[2].color, crate::text::style::Color::WHITE);
    }

    #[test]
    fn test_render_clips_rows() {
        let cfg = config(1000.0);
        let engine = LayoutEngine::new(&MonospaceFonts, &cfg);
        let state = engine.layout_text("a\nb\nc");

        let mut out: Vec<PositionedGlyph> = Vec::new();
        state.render(&mut out, Rect::new(0.0, 0.0, 100.0, 30.0), Duration::ZERO);

        let text: String = out.iter().map(|g| g.codepoint).collect();
        assert_eq!(text, "a");
    }
}
