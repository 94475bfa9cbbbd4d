//! # Timing 模块
//!
//! 逐字淡入计时与每帧刷新动作。
//!
//! 每个真实字形得到两条倒计时：`fade_start`（何时开始显示）与
//! `fade_stop`（何时显示完成，等于 `fade_start + 淡入时长`）。
//! 累计时间每个字先加显示前延迟，再加按字符类别决定的显示后延迟。
//! 注音字形从其标记所在位置的时间开始显示。

use std::time::Duration;

use super::glyph::{GlyphKind, RenderBufferGlyph};
use super::layout::TextRenderingState;
use crate::config::TimingConfig;

/// 句末标点
const SENTENCE_END: &[char] = &['.', '!', '?', '。', '！', '？', '…', '‥'];

/// 句中停顿标点
const CLAUSE: &[char] = &[',', ';', ':', '、', '，', '；', '：'];

/// 字符显示后的延迟（毫秒，未缩放）
fn post_delay_ms(c: char, next: Option<char>, timing: &TimingConfig) -> u64 {
    if c == '.' && next.is_some_and(|n| !n.is_whitespace()) {
        return timing.period_run_delay_ms;
    }
    if SENTENCE_END.contains(&c) {
        timing.sentence_delay_ms
    } else if CLAUSE.contains(&c) {
        timing.clause_delay_ms
    } else {
        timing.char_delay_ms
    }
}

/// 为一个段的全部字形计时，返回整段显示完成所需时长
pub fn time_segment(
    state: &mut TextRenderingState,
    segment: usize,
    timing: &TimingConfig,
) -> Duration {
    let Some(seg) = state.segments.get_mut(segment) else {
        return Duration::ZERO;
    };

    let chars: Vec<char> = seg
        .pieces()
        .flat_map(|piece| piece.glyphs.iter().filter_map(RenderBufferGlyph::codepoint))
        .collect();

    let pre = timing.scaled(timing.char_pre_delay_ms);
    let fade = timing.fade_duration();
    let mut elapsed = Duration::ZERO;
    let mut finish = Duration::ZERO;
    let mut index = 0;

    for piece in seg.runs.iter_mut().flat_map(|run| run.pieces.iter_mut()) {
        for glyph in piece.glyphs.iter_mut() {
            match glyph.kind {
                GlyphKind::Glyph { codepoint, .. } => {
                    let start = elapsed + pre;
                    glyph.fade_start = start;
                    glyph.fade_stop = start + fade;
                    finish = finish.max(glyph.fade_stop);

                    index += 1;
                    let next = chars.get(index).copied();
                    elapsed = start + timing.scaled(post_delay_ms(codepoint, next, timing));
                }
                GlyphKind::Ruby(ruby) => {
                    glyph.reveal();
                    let start = elapsed + pre;
                    if let Some(ruby) = piece.rubies.get_mut(ruby) {
                        for ruby_glyph in ruby.glyphs.iter_mut() {
                            ruby_glyph.fade_start = start;
                            ruby_glyph.fade_stop = start + fade;
                        }
                        finish = finish.max(start + fade);
                    }
                }
                GlyphKind::StyleChange(_) => glyph.reveal(),
            }
        }
    }

    finish
}

/// 一次刷新的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    /// 有字形开始或正在淡入，需要重绘
    pub redraw: bool,
    /// 本段已全部显示完成
    pub finished: bool,
}

/// 常驻刷新动作：推进活动段的淡入倒计时
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FadeAction {
    segment: usize,
    finished: bool,
}

impl FadeAction {
    pub fn new(segment: usize) -> Self {
        Self {
            segment,
            finished: false,
        }
    }

    pub fn segment(&self) -> usize {
        self.segment
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 推进 `delta`
    pub fn tick(&mut self, state: &mut TextRenderingState, delta: Duration) -> TickOutcome {
        if self.finished {
            return TickOutcome {
                redraw: false,
                finished: true,
            };
        }

        let mut redraw = false;
        let mut pending = false;
        state.for_each_segment_glyph(self.segment, |glyph| {
            let animating = !glyph.fade_stop.is_zero();
            glyph.advance(delta);
            if animating && glyph.fade_start.is_zero() {
                redraw = true;
            }
            if !glyph.fade_stop.is_zero() {
                pending = true;
            }
        });

        self.finished = !pending;
        TickOutcome {
            redraw,
            finished: self.finished,
        }
    }

    /// 立即完成本段显示
    pub fn skip(&mut self, state: &mut TextRenderingState) {
        state.reveal_segment(self.segment);
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextConfig;
    use crate::text::font::MonospaceFonts;
    use crate::text::layout::LayoutEngine;

    fn timing() -> TimingConfig {
        TimingConfig {
            fade_duration_ms: 100,
            char_pre_delay_ms: 0,
            char_delay_ms: 10,
            clause_delay_ms: 50,
            sentence_delay_ms: 200,
            period_run_delay_ms: 20,
            text_speed: 1.0,
        }
    }

    fn starts(state: &TextRenderingState) -> Vec<u64> {
        state.segments[0]
            .pieces()
            .flat_map(|p| p.glyphs.iter())
            .filter(|g| g.is_glyph())
            .map(|g| g.fade_start.as_millis() as u64)
            .collect()
    }

    fn laid_out(text: &str) -> TextRenderingState {
        let cfg = TextConfig::default();
        LayoutEngine::new(&MonospaceFonts, &cfg).layout_text(text)
    }

    #[test]
    fn test_post_delay_classes() {
        let mut state = laid_out("a,b. c");
        let total = time_segment(&mut state, 0, &timing());

        // a:0 ,:10 b:60 .:70 (句末后接空格) ' ':270 c:280
        assert_eq!(starts(&state), vec![0, 10, 60, 70, 270, 280]);
        assert_eq!(total, Duration::from_millis(380));
    }

    #[test]
    fn test_period_run_uses_short_delay() {
        let mut state = laid_out("..a");
        time_segment(&mut state, 0, &timing());
        assert_eq!(starts(&state), vec![0, 20, 40]);
    }

    #[test]
    fn test_text_speed_scales_delays() {
        let mut state = laid_out("ab");
        let mut fast = timing();
        fast.text_speed = 2.0;
        let total = time_segment(&mut state, 0, &fast);
        assert_eq!(starts(&state), vec![0, 5]);
        assert_eq!(total, Duration::from_millis(55));
    }

    #[test]
    fn test_ruby_starts_at_marker_time() {
        let mut state = laid_out("{r:ab:xxxx}");
        time_segment(&mut state, 0, &timing());

        let piece = &state.segments[0].runs[0].pieces[0];
        // 标记位于第 2 个被注字之前，此时累计 20ms
        assert!(
            piece.rubies[0]
                .glyphs
                .iter()
                .all(|g| g.fade_start == Duration::from_millis(20))
        );
    }

    #[test]
    fn test_fade_action_reports_redraw_and_finish() {
        let mut state = laid_out("ab");
        time_segment(&mut state, 0, &timing());
        let mut action = FadeAction::new(0);

        let first = action.tick(&mut state, Duration::from_millis(1));
        assert!(first.redraw);
        assert!(!first.finished);

        let done = action.tick(&mut state, Duration::from_millis(500));
        assert!(done.finished);

        let idle = action.tick(&mut state, Duration::from_millis(1));
        assert_eq!(
            idle,
            TickOutcome {
                redraw: false,
                finished: true
            }
        );
    }

    #[test]
    fn test_skip_reveals_everything() {
        let mut state = laid_out("abc");
        time_segment(&mut state, 0, &timing());
        let mut action = FadeAction::new(0);
        action.skip(&mut state);

        assert!(action.is_finished());
        assert!(starts(&state).iter().all(|&s| s == 0));
    }
}
