//! # Controller 模块
//!
//! 对话控制器：把扫描器、排版引擎与逐字计时组合成解释器可直接驱动的接口。
//!
//! ## 使用方式
//!
//! ```text
//! feed_text → advance_one_step（首次调用完成整块排版）→ tick / render_to → ... → End
//! ```
//!
//! 控制器在主线程上同步运行，不做任何阻塞等待。

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error};

use super::scanner::{CommandRegistry, DialoguePart, InlineScanner, TextCommand};
use super::state::DialogueProcessingState;
use crate::config::{EngineConfig, TextConfig, TimingConfig};
use crate::error::{DialogueError, LayoutError, VnError};
use crate::text::font::FontProvider;
use crate::text::glyph::{GlyphSink, Rect};
use crate::text::layout::{LayoutEngine, TextRenderingState};
use crate::text::timing::{FadeAction, TickOutcome, time_segment};

/// 脚本解释器侧的回调
pub trait ScriptHost {
    /// 执行一个内联命令（用户子程序或引擎命令）
    fn evaluate_command(&mut self, name: &str, args: &[String]);
}

/// 推进一步的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DialogueStep {
    /// 扫描到的下一部分
    Part(DialoguePart),
    /// 当前段仍在显示中，本次推进把它立即显示完
    RevealSkipped,
    /// 没有活动对话
    Inactive,
}

/// 对话控制器
pub struct DialogueController {
    text_config: TextConfig,
    timing: TimingConfig,
    fonts: Arc<dyn FontProvider>,
    registry: Arc<dyn CommandRegistry>,

    state: DialogueProcessingState,
    text: String,
    scanner: InlineScanner,
    rendering: TextRenderingState,
    speaker: Option<TextRenderingState>,
    fade: Option<FadeAction>,
}

impl DialogueController {
    pub fn new(
        config: &EngineConfig,
        fonts: Arc<dyn FontProvider>,
        registry: Arc<dyn CommandRegistry>,
    ) -> Self {
        let text_config = config.text.clone();
        let rendering = LayoutEngine::new(fonts.as_ref(), &text_config).new_state();
        let scanner = InlineScanner::new(text_config.ignored_inline_functions.iter().cloned());

        Self {
            timing: config.timing.clone(),
            text_config,
            fonts,
            registry,
            state: DialogueProcessingState::new(),
            text: String::new(),
            scanner,
            rendering,
            speaker: None,
            fade: None,
        }
    }

    /// 提交一个新的对话块
    ///
    /// 排版推迟到第一次 [`advance_one_step`](Self::advance_one_step)。
    pub fn feed_text(&mut self, text: impl Into<String>) -> Result<(), DialogueError> {
        if self.state.active {
            return Err(DialogueError::InvalidState {
                message: "上一个对话块尚未结束".to_string(),
            });
        }

        self.text = text.into();
        self.scanner.rewind();
        self.fade = None;
        let base = LayoutEngine::new(self.fonts.as_ref(), &self.text_config).base_style();
        self.rendering.reset(base);
        self.state.set_dialogue_active(true);
        debug!(len = self.text.len(), "提交对话块");
        Ok(())
    }

    /// 设置说话者名（单独排版，立即完全可见）；空字符串清除
    pub fn set_speaker_name(&mut self, name: &str) {
        if name.is_empty() {
            self.speaker = None;
            return;
        }
        let engine = LayoutEngine::new(self.fonts.as_ref(), &self.text_config);
        self.speaker = Some(engine.layout_text(name));
    }

    /// 推进一步
    ///
    /// 首次调用时对整块文本排版。排版错误是致命的：
    /// 对话块被清理，错误返回给调用方。
    pub fn advance_one_step(&mut self, host: &mut dyn ScriptHost) -> Result<DialogueStep, VnError> {
        if !self.state.active {
            return Ok(DialogueStep::Inactive);
        }

        if self.state.needs_layout()
            && let Err(e) = self.layout_dialogue()
        {
            self.abort(&e);
            return Err(e.into());
        }

        if let Some(fade) = self.fade.as_mut().filter(|f| !f.is_finished()) {
            fade.skip(&mut self.rendering);
            self.state.ready_to_run = true;
            return Ok(DialogueStep::RevealSkipped);
        }

        let part = match self.scanner.next_part(&self.text, self.registry.as_ref()) {
            Ok(part) => part,
            Err(e) => {
                self.abort(&e);
                return Err(e.into());
            }
        };

        match &part {
            DialoguePart::Text { segment, .. } => self.start_segment(*segment),
            DialoguePart::UserCmd { name, args } | DialoguePart::SysCmd { name, args } => {
                host.evaluate_command(name, args);
            }
            DialoguePart::TextCmd(command) => {
                debug!(marker = %command.marker(), "文本命令");
            }
            DialoguePart::End => self.end_dialogue(),
        }

        Ok(DialogueStep::Part(part))
    }

    /// 结束当前对话块（幂等）
    ///
    /// 已显示的文字保留在渲染状态中，直到下一次提交。
    pub fn end_dialogue(&mut self) {
        if self.state.active {
            debug!("对话块结束");
        }
        self.state.set_dialogue_active(false);
        self.fade = None;
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// 当前段已显示完成
    pub fn is_ready_to_run(&self) -> bool {
        self.state.ready_to_run
    }

    pub fn processing_state(&self) -> &DialogueProcessingState {
        &self.state
    }

    pub fn rendering_state(&self) -> &TextRenderingState {
        &self.rendering
    }

    pub fn speaker_state(&self) -> Option<&TextRenderingState> {
        self.speaker.as_ref()
    }

    /// 修改文字速度倍率，0 表示立即显示（从下一段开始生效）
    pub fn set_text_speed(&mut self, speed: f32) {
        self.timing.text_speed = speed.max(0.0);
    }

    /// 输出对话正文
    pub fn render_to(&self, sink: &mut dyn GlyphSink, clip: Rect) {
        self.rendering.render(sink, clip, self.timing.fade_duration());
    }

    /// 输出说话者名
    pub fn render_speaker_to(&self, sink: &mut dyn GlyphSink, clip: Rect) {
        if let Some(speaker) = &self.speaker {
            speaker.render(sink, clip, Duration::ZERO);
        }
    }

    /// 推进淡入时钟
    pub fn tick(&mut self, delta: Duration) -> TickOutcome {
        let Some(fade) = self.fade.as_mut() else {
            return TickOutcome {
                redraw: false,
                finished: true,
            };
        };

        let outcome = fade.tick(&mut self.rendering, delta);
        if outcome.finished {
            self.state.ready_to_run = true;
        }
        outcome
    }

    /// 释放全部状态
    pub fn dispose(&mut self) {
        self.state.reset();
        self.text.clear();
        self.scanner.rewind();
        self.fade = None;
        self.speaker = None;
        let base = LayoutEngine::new(self.fonts.as_ref(), &self.text_config).base_style();
        self.rendering.reset(base);
    }

    /// 扫描整块文本并排版全部文本块
    fn layout_dialogue(&mut self) -> Result<(), LayoutError> {
        let engine = LayoutEngine::new(self.fonts.as_ref(), &self.text_config);
        let mut scanner =
            InlineScanner::new(self.text_config.ignored_inline_functions.iter().cloned());

        loop {
            match scanner.next_part(&self.text, self.registry.as_ref())? {
                DialoguePart::Text { range, .. } => {
                    engine.layout_segment(&mut self.rendering, &self.text[range]);
                }
                DialoguePart::TextCmd(TextCommand::NewPage) => {
                    engine.break_page(&mut self.rendering);
                }
                DialoguePart::End => break,
                _ => {}
            }
        }

        engine.layout_lines(&mut self.rendering);
        self.rendering.hide_all();
        self.state.layout_done = true;
        debug!(
            segments = self.rendering.segments.len(),
            lines = self.rendering.lines.len(),
            "对话排版完成"
        );
        Ok(())
    }

    fn start_segment(&mut self, segment: usize) {
        self.rendering.activate_segment(segment);

        if self.timing.is_instant() {
            self.rendering.reveal_segment(segment);
            self.fade = None;
            self.state.ready_to_run = true;
            return;
        }

        let total = time_segment(&mut self.rendering, segment, &self.timing);
        debug!(segment, total_ms = total.as_millis() as u64, "开始显示文本段");
        self.fade = Some(FadeAction::new(segment));
        self.state.ready_to_run = false;
    }

    fn abort(&mut self, e: &LayoutError) {
        error!(error = %e, "对话排版失败，中止对话块");
        self.state.reset();
        self.fade = None;
    }
}
